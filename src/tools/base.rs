//! Base trait for diagnostic tools.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::probe::CheckReport;
use crate::types::config::ChecksConfig;
use crate::{InstabilityError, InstabilityResult};

/// User agent sent by every HTTP probe.
pub const USER_AGENT: &str = concat!("instability/", env!("CARGO_PKG_VERSION"));

/// Shared resources handed to every tool run.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Probe timeouts and retry policy.
    pub checks: ChecksConfig,

    /// HTTP client for web, CDN and cloud probes.
    pub http: reqwest::Client,
}

impl ToolContext {
    /// Builds a context from the check settings.
    ///
    /// Certificate validation is off: a broken certificate chain still proves
    /// the host is reachable.
    pub fn new(checks: ChecksConfig) -> InstabilityResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(checks.timeout())
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { checks, http })
    }

    /// Context with zero retry delay, for tests.
    pub fn fast() -> InstabilityResult<Self> {
        Self::new(ChecksConfig {
            timeout_secs: 2,
            retry_delay_secs: 0,
            retries: 0,
        })
    }

    /// Per-probe timeout.
    pub fn timeout(&self) -> Duration {
        self.checks.timeout()
    }
}

/// Output of a tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Human-readable result.
    pub text: String,

    /// False when the check ran but found a problem (targets down, offline).
    pub healthy: bool,

    /// Extra cache entries recorded alongside the result.
    pub facts: Vec<(String, String)>,
}

impl ToolOutput {
    /// Creates a healthy output with no facts.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            healthy: true,
            facts: Vec::new(),
        }
    }

    /// Renders a probe report; healthy only when every target answered.
    pub fn report(report: &CheckReport) -> Self {
        Self::text(report.render()).with_health(report.is_healthy())
    }

    #[must_use]
    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// Adds a fact to record in the cache.
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.push((key.into(), value.into()));
        self
    }
}

/// A named diagnostic check.
#[async_trait]
pub trait DiagnosticTool: Send + Sync {
    /// Registry name, as typed after `/` or requested by the model.
    fn name(&self) -> &'static str;

    /// One-line description shown in `/tools` and in the system prompt.
    fn description(&self) -> &'static str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    /// Whether `manual all` and `batch` include this tool by default.
    fn in_batch(&self) -> bool {
        true
    }

    /// Runs the check.
    async fn run(&self, args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput>;
}

/// Reads an optional string argument, trying each key in order.
pub fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Reads an optional unsigned argument; numeric strings are accepted.
pub fn u64_arg(tool: &str, args: &Value, key: &str) -> InstabilityResult<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| InstabilityError::invalid_args(tool, format!("'{}' must be a positive integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| InstabilityError::invalid_args(tool, format!("'{}' must be a positive integer", key))),
        Some(_) => Err(InstabilityError::invalid_args(
            tool,
            format!("'{}' must be a positive integer", key),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_arg_tries_keys_in_order() {
        let args = json!({ "target": "example.com" });
        assert_eq!(str_arg(&args, &["host", "target"]), Some("example.com"));
        assert_eq!(str_arg(&args, &["host"]), None);
    }

    #[test]
    fn test_str_arg_ignores_blank() {
        let args = json!({ "host": "   " });
        assert_eq!(str_arg(&args, &["host"]), None);
    }

    #[test]
    fn test_u64_arg_accepts_strings() {
        let args = json!({ "count": "3" });
        assert_eq!(u64_arg("ping_target", &args, "count").unwrap(), Some(3));
    }

    #[test]
    fn test_u64_arg_rejects_negative() {
        let args = json!({ "count": -1 });
        let err = u64_arg("ping_target", &args, "count").unwrap_err();
        assert!(matches!(err, InstabilityError::InvalidArguments(_, _)));
    }

    #[test]
    fn test_output_facts() {
        let output = ToolOutput::text("ok").with_fact("external_ip", "1.2.3.4");
        assert_eq!(output.facts.len(), 1);
        assert_eq!(output.text, "ok");
    }
}
