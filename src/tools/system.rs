//! Local host information: OS, addresses, clock, interfaces.

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::process::Command;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use crate::{InstabilityError, InstabilityResult};

/// Runs a command and returns its trimmed stdout, if it succeeded.
pub(crate) async fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

// ============================================================================
// get_os_info
// ============================================================================

pub struct OsInfo;

impl OsInfo {
    async fn os_version() -> String {
        match std::env::consts::OS {
            "linux" => match tokio::fs::read_to_string("/etc/os-release").await {
                Ok(content) => parse_os_release(&content).unwrap_or_else(|| "Linux".to_string()),
                Err(_) => "Linux".to_string(),
            },
            "macos" => command_stdout("sw_vers", &["-productVersion"])
                .await
                .map(|v| format!("macOS {}", v))
                .unwrap_or_else(|| "macOS".to_string()),
            "windows" => command_stdout("cmd", &["/C", "ver"])
                .await
                .unwrap_or_else(|| "Windows".to_string()),
            other => other.to_string(),
        }
    }
}

/// Extracts `PRETTY_NAME` from an os-release file.
fn parse_os_release(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl DiagnosticTool for OsInfo {
    fn name(&self) -> &'static str {
        "get_os_info"
    }

    fn description(&self) -> &'static str {
        "Operating system, version, architecture and hostname of this machine"
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let version = Self::os_version().await;
        let kernel = if cfg!(unix) {
            command_stdout("uname", &["-r"]).await
        } else {
            None
        };
        let hostname = command_stdout("hostname", &[])
            .await
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());

        let mut text = format!(
            "Operating system: {}\nVersion: {}\nArchitecture: {}\nHostname: {}",
            std::env::consts::OS,
            version,
            std::env::consts::ARCH,
            hostname
        );
        if let Some(kernel) = kernel {
            text.push_str(&format!("\nKernel: {}", kernel));
        }

        Ok(ToolOutput::text(text))
    }
}

// ============================================================================
// get_local_ip
// ============================================================================

pub struct LocalIp;

#[async_trait]
impl DiagnosticTool for LocalIp {
    fn name(&self) -> &'static str {
        "get_local_ip"
    }

    fn description(&self) -> &'static str {
        "IP address of the interface used for outbound traffic"
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        // Connecting a UDP socket picks a route without sending anything.
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket
            .connect("8.8.8.8:80")
            .await
            .map_err(|e| InstabilityError::tool_failed(self.name(), format!("no route to the internet: {}", e)))?;
        let addr = socket.local_addr()?;

        Ok(ToolOutput::text(format!("Local IP address: {}", addr.ip())))
    }
}

// ============================================================================
// get_local_datetime
// ============================================================================

pub struct LocalDateTime;

#[async_trait]
impl DiagnosticTool for LocalDateTime {
    fn name(&self) -> &'static str {
        "get_local_datetime"
    }

    fn description(&self) -> &'static str {
        "Local time, date and timezone of this machine"
    }

    fn in_batch(&self) -> bool {
        false
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let now = Local::now();
        let zone = std::env::var("TZ").ok().filter(|tz| !tz.is_empty());

        let mut text = format!(
            "Time: {}\nDate: {}\nTimezone: UTC{}",
            now.format("%H:%M:%S"),
            now.format("%Y-%m-%d"),
            now.format("%:z")
        );
        if let Some(zone) = zone {
            text.push_str(&format!(" ({})", zone));
        }

        Ok(ToolOutput::text(text))
    }
}

// ============================================================================
// check_local_network
// ============================================================================

pub struct LocalNetwork;

#[cfg(windows)]
const INTERFACE_COMMANDS: &[(&str, &[&str])] = &[("ipconfig", &["/all"])];

#[cfg(not(windows))]
const INTERFACE_COMMANDS: &[(&str, &[&str])] = &[("ip", &["addr", "show"]), ("ifconfig", &[])];

#[async_trait]
impl DiagnosticTool for LocalNetwork {
    fn name(&self) -> &'static str {
        "check_local_network"
    }

    fn description(&self) -> &'static str {
        "Network interfaces and addresses configured on this machine"
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        for (program, args) in INTERFACE_COMMANDS {
            if let Some(output) = command_stdout(program, args).await {
                tracing::debug!(program, "Collected interface listing");
                return Ok(ToolOutput::text(format!(
                    "Local network configuration ({}):\n{}",
                    program, output
                )));
            }
        }

        Err(InstabilityError::tool_failed(
            self.name(),
            "no interface listing command (ip, ifconfig, ipconfig) is available",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release() {
        let content = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\nID=ubuntu\n";
        assert_eq!(parse_os_release(content).as_deref(), Some("Ubuntu 24.04 LTS"));
        assert_eq!(parse_os_release("ID=alpine\n"), None);
    }

    #[tokio::test]
    async fn test_os_info_reports_arch() {
        let ctx = ToolContext::fast().unwrap();
        let output = OsInfo.run(&Value::Null, &ctx).await.unwrap();
        assert!(output.text.contains(std::env::consts::ARCH));
        assert!(output.text.contains("Hostname:"));
    }

    #[tokio::test]
    async fn test_local_datetime_format() {
        let ctx = ToolContext::fast().unwrap();
        let output = LocalDateTime.run(&Value::Null, &ctx).await.unwrap();
        assert!(output.text.starts_with("Time: "));
        assert!(output.text.contains("Date: "));
        assert!(output.text.contains("Timezone: UTC"));
    }
}
