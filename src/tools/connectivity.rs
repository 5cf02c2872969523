//! Basic connectivity: internet reachability and ping.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::process::Command;

use super::base::{str_arg, u64_arg, DiagnosticTool, ToolContext, ToolOutput};
use crate::{InstabilityError, InstabilityResult};

const CONNECTIVITY_PROBE: &str = "8.8.8.8:53";
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(3);

const DEFAULT_PING_COUNT: u64 = 4;
const MAX_PING_COUNT: u64 = 20;
const PING_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// check_internet_connection
// ============================================================================

pub struct InternetConnection;

#[async_trait]
impl DiagnosticTool for InternetConnection {
    fn name(&self) -> &'static str {
        "check_internet_connection"
    }

    fn description(&self) -> &'static str {
        "Quick check that the internet is reachable (TCP to 8.8.8.8:53)"
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let start = Instant::now();
        let output = match tokio::time::timeout(CONNECTIVITY_TIMEOUT, TcpStream::connect(CONNECTIVITY_PROBE)).await {
            Ok(Ok(_)) => ToolOutput::text(format!(
                "Connected: reached {} in {} ms.",
                CONNECTIVITY_PROBE,
                start.elapsed().as_millis()
            )),
            Ok(Err(e)) => ToolOutput::text(format!(
                "Disconnected: {} refused the connection ({}).",
                CONNECTIVITY_PROBE, e
            ))
            .with_health(false),
            Err(_) => ToolOutput::text(format!(
                "Disconnected: no answer from {} within {} s.",
                CONNECTIVITY_PROBE,
                CONNECTIVITY_TIMEOUT.as_secs()
            ))
            .with_health(false),
        };

        Ok(output)
    }
}

// ============================================================================
// ping_target
// ============================================================================

pub struct Ping;

/// Rejects anything that is not a plain hostname or IP literal.
fn validate_host(host: &str) -> Result<(), String> {
    if host.starts_with('-') {
        return Err("host must not start with '-'".to_string());
    }
    if host.len() > 253 {
        return Err("host is too long".to_string());
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_'))
    {
        return Err(format!("'{}' is not a valid hostname or IP address", host));
    }
    Ok(())
}

/// Picks the round-trip summary out of ping output.
fn extract_ping_summary(output: &str) -> Option<String> {
    let lines: Vec<&str> = output.lines().map(str::trim).collect();

    let rtt = lines
        .iter()
        .find(|line| line.contains("min/avg") || line.contains("Average"));
    let loss = lines
        .iter()
        .find(|line| line.contains("packet loss") || line.contains("Lost ="));

    match (loss, rtt) {
        (Some(loss), Some(rtt)) => Some(format!("{}\n{}", loss, rtt)),
        (None, Some(rtt)) => Some(rtt.to_string()),
        (Some(loss), None) => Some(loss.to_string()),
        (None, None) => None,
    }
}

#[async_trait]
impl DiagnosticTool for Ping {
    fn name(&self) -> &'static str {
        "ping_target"
    }

    fn description(&self) -> &'static str {
        "Ping a host with the system ping command (args: host, count)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": { "type": "string", "description": "Hostname or IP to ping" },
                "count": { "type": "integer", "description": "Number of echo requests (default 4)" }
            }
        })
    }

    async fn run(&self, args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let host = str_arg(args, &["host", "target"]).unwrap_or("8.8.8.8");
        validate_host(host).map_err(|e| InstabilityError::invalid_args(self.name(), e))?;

        let count = u64_arg(self.name(), args, "count")?
            .unwrap_or(DEFAULT_PING_COUNT)
            .clamp(1, MAX_PING_COUNT);
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };

        tracing::debug!(host, count, "Running ping");

        let child = Command::new("ping")
            .arg(count_flag)
            .arg(count.to_string())
            .arg(host)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(PING_TIMEOUT + Duration::from_secs(count), child)
            .await
            .map_err(|_| InstabilityError::Timeout(format!("ping {}", host)))?
            .map_err(|e| InstabilityError::tool_failed(self.name(), format!("could not run ping: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(ToolOutput::text(format!("Ping to {} failed: {}", host, stderr.trim())).with_health(false));
        }

        let text = match extract_ping_summary(&stdout) {
            Some(summary) => format!("Ping {} ({} packets):\n{}", host, count, summary),
            None => format!("Ping {} ({} packets):\n{}", host, count, stdout.trim()),
        };

        Ok(ToolOutput::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_host() {
        assert!(validate_host("example.com").is_ok());
        assert!(validate_host("2001:4860:4860::8888").is_ok());
        assert!(validate_host("-f").is_err());
        assert!(validate_host("example.com; rm -rf /").is_err());
    }

    #[test]
    fn test_extract_unix_summary() {
        let output = "\
PING example.com (93.184.216.34): 56 data bytes
64 bytes from 93.184.216.34: icmp_seq=0 ttl=56 time=11.6 ms

--- example.com ping statistics ---
4 packets transmitted, 4 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 11.1/11.5/11.9/0.3 ms
";
        let summary = extract_ping_summary(output).unwrap();
        assert!(summary.contains("0.0% packet loss"));
        assert!(summary.contains("min/avg/max"));
    }

    #[test]
    fn test_extract_windows_summary() {
        let output = "\
Ping statistics for 8.8.8.8:
    Packets: Sent = 4, Received = 4, Lost = 0 (0% loss),
Approximate round trip times in milli-seconds:
    Minimum = 9ms, Maximum = 12ms, Average = 10ms
";
        let summary = extract_ping_summary(output).unwrap();
        assert!(summary.contains("Average = 10ms"));
        assert!(summary.contains("Lost = 0"));
    }

    #[tokio::test]
    async fn test_ping_rejects_option_injection() {
        let ctx = ToolContext::fast().unwrap();
        let err = Ping
            .run(&json!({ "host": "--help" }), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, InstabilityError::InvalidArguments(_, _)));
    }
}
