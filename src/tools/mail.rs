//! IMAP and SMTP provider checks.

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpStream;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, Target};
use crate::InstabilityResult;

pub const IMAP_PROVIDERS: &[(&str, &str)] = &[
    ("Gmail", "imap.gmail.com"),
    ("Outlook/Office 365", "outlook.office365.com"),
    ("Yahoo Mail", "imap.mail.yahoo.com"),
    ("iCloud Mail", "imap.mail.me.com"),
    ("AOL Mail", "imap.aol.com"),
    ("Zoho Mail", "imap.zoho.com"),
    ("Mail.com", "imap.mail.com"),
    ("GMX Mail", "imap.gmx.com"),
    ("Fastmail", "imap.fastmail.com"),
];

pub const SMTP_PROVIDERS: &[(&str, &str)] = &[
    ("Gmail", "smtp.gmail.com"),
    ("Outlook/Office 365", "smtp.office365.com"),
    ("Yahoo Mail", "smtp.mail.yahoo.com"),
    ("iCloud Mail", "smtp.mail.me.com"),
    ("AOL Mail", "smtp.aol.com"),
    ("Zoho Mail", "smtp.zoho.com"),
    ("Mail.com", "smtp.mail.com"),
    ("GMX Mail", "smtp.gmx.com"),
    ("Fastmail", "smtp.fastmail.com"),
];

/// IMAP over TLS.
const IMAPS_PORT: u16 = 993;

/// Mail submission (STARTTLS).
const SUBMISSION_PORT: u16 = 587;

async fn connect(host: String, port: u16) -> Result<Option<String>, String> {
    let stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| format!("connect failed: {}", e))?;
    let peer = stream.peer_addr().map_err(|e| e.to_string())?;
    Ok(Some(format!("connected to {}", peer)))
}

/// Connects to `port` on every provider host.
async fn check_providers(
    providers: &[(&str, &str)],
    port: u16,
    noun: &str,
    ctx: &ToolContext,
) -> ToolOutput {
    let targets: Vec<Target> = providers
        .iter()
        .map(|(label, host)| Target::new(*label, *host))
        .collect();
    let results = probe_all(&targets, ctx, move |t: Target| connect(t.address, port)).await;

    ToolOutput::report(&CheckReport::new(noun, results))
}

pub struct ImapServers;

#[async_trait]
impl DiagnosticTool for ImapServers {
    fn name(&self) -> &'static str {
        "check_imap_servers"
    }

    fn description(&self) -> &'static str {
        "Connect to the IMAP port (993) of major email providers"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        Ok(check_providers(IMAP_PROVIDERS, IMAPS_PORT, "IMAP servers", ctx).await)
    }
}

pub struct SmtpServers;

#[async_trait]
impl DiagnosticTool for SmtpServers {
    fn name(&self) -> &'static str {
        "check_smtp_servers"
    }

    fn description(&self) -> &'static str {
        "Connect to the mail submission port (587) of major email providers"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        Ok(check_providers(SMTP_PROVIDERS, SUBMISSION_PORT, "SMTP servers", ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_reports_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let detail = connect("127.0.0.1".to_string(), port).await.unwrap().unwrap();
        assert!(detail.contains(&port.to_string()));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(connect("127.0.0.1".to_string(), port).await.is_err());
    }

    #[tokio::test]
    async fn test_all_providers_down_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let ctx = ToolContext::fast().unwrap();
        let output = check_providers(&[("Local", "127.0.0.1")], port, "IMAP servers", &ctx).await;

        assert!(!output.healthy);
        assert!(output.text.contains("None of the 1 IMAP servers are reachable."));
    }

    #[tokio::test]
    async fn test_listening_provider_is_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let ctx = ToolContext::fast().unwrap();
        let output = check_providers(&[("Local", "127.0.0.1")], port, "SMTP servers", &ctx).await;

        assert!(output.healthy);
        assert!(output.text.contains("All 1 SMTP servers are reachable."));
    }
}
