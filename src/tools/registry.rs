//! Static tool registry.

use serde_json::Value;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::{cloud, connectivity, dns, external_ip, infra, mail, ntp, speed, system, web, whois};
use crate::{InstabilityError, InstabilityResult};

/// Name to tool mapping, in display order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn DiagnosticTool>>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with every built-in check.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(system::OsInfo));
        registry.register(Box::new(system::LocalIp));
        registry.register(Box::new(system::LocalDateTime));
        registry.register(Box::new(external_ip::ExternalIp));
        registry.register(Box::new(connectivity::InternetConnection));
        registry.register(Box::new(connectivity::Ping));
        registry.register(Box::new(dns::DnsResolvers));
        registry.register(Box::new(dns::DnsRootServers));
        registry.register(Box::new(ntp::NtpServers));
        registry.register(Box::new(whois::WhoisServers));
        registry.register(Box::new(web::Websites));
        registry.register(Box::new(mail::ImapServers));
        registry.register(Box::new(mail::SmtpServers));
        registry.register(Box::new(infra::TlsCas));
        registry.register(Box::new(infra::Ixps));
        registry.register(Box::new(cloud::Cdns));
        registry.register(Box::new(cloud::CloudStatusPages));
        registry.register(Box::new(system::LocalNetwork));
        registry.register(Box::new(speed::SpeedTest));
        registry
    }

    /// Adds a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn DiagnosticTool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&dyn DiagnosticTool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Case-insensitive lookup, used for slash commands.
    pub fn find(&self, name: &str) -> Option<&dyn DiagnosticTool> {
        self.tools
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Tool names in display order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tools in display order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn DiagnosticTool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// Tools included in `manual all` and batch runs.
    pub fn batch_names(&self) -> Vec<&'static str> {
        self.tools.iter().filter(|t| t.in_batch()).map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool catalogue for the system prompt, one tool per line.
    pub fn catalogue(&self) -> String {
        self.tools
            .iter()
            .map(|t| {
                let params = t.parameters();
                let has_args = params
                    .get("properties")
                    .and_then(Value::as_object)
                    .is_some_and(|p| !p.is_empty());
                if has_args {
                    format!("- {}: {} (args schema: {})", t.name(), t.description(), params)
                } else {
                    format!("- {}: {}", t.name(), t.description())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Runs a tool by exact name.
    pub async fn execute(&self, name: &str, args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let tool = self.get(name).ok_or_else(|| InstabilityError::ToolNotFound {
            name: name.to_string(),
            available: self.names().join(", "),
        })?;

        tracing::info!(tool = name, "Running tool");
        tool.run(args, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
