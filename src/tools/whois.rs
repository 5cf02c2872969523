//! WHOIS server check over TCP port 43.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, Target};
use crate::InstabilityResult;

pub const WHOIS_SERVERS: &[&str] = &[
    "whois.apnic.net",
    "whois.ripe.net",
    "whois.arin.net",
    "whois.afrinic.net",
    "whois.lacnic.net",
    "whois.pir.org",
    "whois.educause.edu",
    "whois.iana.org",
    "riswhois.ripe.net",
    "whois.nic.mobi",
    "whois.verisign-grs.com",
    "whois.nic.google",
];

const WHOIS_PORT: u16 = 43;
const WHOIS_QUERY: &[u8] = b"example.com\r\n";

async fn query(server: String, port: u16) -> Result<Option<String>, String> {
    let mut stream = TcpStream::connect((server.as_str(), port))
        .await
        .map_err(|e| format!("connect failed: {}", e))?;
    stream
        .write_all(WHOIS_QUERY)
        .await
        .map_err(|e| format!("write failed: {}", e))?;

    let mut buf = vec![0u8; 1024];
    let len = stream
        .read(&mut buf)
        .await
        .map_err(|e| format!("read failed: {}", e))?;

    if len == 0 {
        return Err("connection closed without a reply".to_string());
    }
    Ok(Some(format!("{} bytes received", len)))
}

pub struct WhoisServers;

#[async_trait]
impl DiagnosticTool for WhoisServers {
    fn name(&self) -> &'static str {
        "check_whois_servers"
    }

    fn description(&self) -> &'static str {
        "Send a query to regional and registry WHOIS servers on port 43"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = WHOIS_SERVERS.iter().map(|s| Target::new(*s, *s)).collect();
        let results = probe_all(&targets, ctx, |t: Target| query(t.address, WHOIS_PORT)).await;

        Ok(ToolOutput::report(&CheckReport::new("WHOIS servers", results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_query_reads_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"% IANA WHOIS server\n").await.unwrap();
        });

        let detail = query("127.0.0.1".to_string(), addr.port()).await.unwrap();
        assert_eq!(detail.as_deref(), Some("20 bytes received"));
    }

    #[tokio::test]
    async fn test_query_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let err = query("127.0.0.1".to_string(), addr.port()).await.unwrap_err();
        assert!(err.contains("closed") || err.contains("failed"));
    }

    #[test]
    fn test_server_list() {
        assert_eq!(WHOIS_SERVERS.len(), 12);
        assert!(WHOIS_SERVERS.contains(&"whois.iana.org"));
    }
}
