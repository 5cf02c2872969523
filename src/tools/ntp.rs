//! NTP server check over SNTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::net::UdpSocket;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, Target};
use crate::InstabilityResult;

pub const NTP_SERVERS: &[&str] = &[
    "time.google.com",
    "time1.google.com",
    "time2.google.com",
    "time3.google.com",
    "time4.google.com",
    "time.nist.gov",
    "time.windows.com",
    "pool.ntp.org",
    "time.apple.com",
    "ntp2.usno.navy.mil",
    "tick.usno.navy.mil",
    "tock.usno.navy.mil",
];

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Client request: LI 0, version 3, mode 3 (client).
fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Parses a server reply and returns its transmit timestamp.
fn parse_reply(packet: &[u8]) -> Result<DateTime<Utc>, String> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(format!("short reply ({} bytes)", packet.len()));
    }

    let mode = packet[0] & 0x07;
    if mode != 4 {
        return Err(format!("unexpected mode {} in reply", mode));
    }

    let stratum = packet[1];
    if stratum == 0 {
        return Err("server sent a kiss-o'-death reply".to_string());
    }

    let seconds = u64::from(u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]));
    let fraction = u64::from(u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]));

    let unix = seconds
        .checked_sub(NTP_UNIX_OFFSET)
        .ok_or_else(|| "timestamp before 1970".to_string())?;
    let nanos = ((fraction * 1_000_000_000) >> 32) as u32;

    DateTime::from_timestamp(unix as i64, nanos).ok_or_else(|| "timestamp out of range".to_string())
}

async fn query(server: String) -> Result<Option<String>, String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| format!("cannot open socket: {}", e))?;
    socket
        .connect((server.as_str(), NTP_PORT))
        .await
        .map_err(|e| format!("cannot resolve: {}", e))?;
    socket
        .send(&request_packet())
        .await
        .map_err(|e| format!("send failed: {}", e))?;

    let mut buf = [0u8; 512];
    let len = socket
        .recv(&mut buf)
        .await
        .map_err(|e| format!("no reply: {}", e))?;

    let time = parse_reply(&buf[..len])?;
    Ok(Some(format!("server time {}", time.format("%Y-%m-%d %H:%M:%S UTC"))))
}

pub struct NtpServers;

#[async_trait]
impl DiagnosticTool for NtpServers {
    fn name(&self) -> &'static str {
        "check_ntp_servers"
    }

    fn description(&self) -> &'static str {
        "Query well-known NTP time servers and report their time"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = NTP_SERVERS.iter().map(|s| Target::new(*s, *s)).collect();
        let results = probe_all(&targets, ctx, |t: Target| query(t.address)).await;

        Ok(ToolOutput::report(&CheckReport::new("NTP servers", results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(mode: u8, stratum: u8, seconds: u32) -> Vec<u8> {
        let mut packet = vec![0u8; NTP_PACKET_LEN];
        packet[0] = 0x18 | mode;
        packet[1] = stratum;
        packet[40..44].copy_from_slice(&seconds.to_be_bytes());
        packet[44..48].copy_from_slice(&0x8000_0000u32.to_be_bytes());
        packet
    }

    #[test]
    fn test_request_packet() {
        let packet = request_packet();
        assert_eq!(packet.len(), 48);
        assert_eq!(packet[0], 0x1B);
    }

    #[test]
    fn test_parse_reply_timestamp() {
        // 2024-01-01T00:00:00Z
        let ntp_seconds = (1_704_067_200u64 + NTP_UNIX_OFFSET) as u32;
        let time = parse_reply(&reply(4, 2, ntp_seconds)).unwrap();

        assert_eq!(time.timestamp(), 1_704_067_200);
        assert_eq!(time.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_reply_rejects_bad_packets() {
        assert!(parse_reply(&[0u8; 10]).unwrap_err().contains("short reply"));
        assert!(parse_reply(&reply(3, 2, 3_900_000_000)).unwrap_err().contains("mode"));
        assert!(parse_reply(&reply(4, 0, 3_900_000_000)).unwrap_err().contains("kiss"));
    }
}
