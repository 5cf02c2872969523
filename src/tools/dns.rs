//! DNS checks: public resolvers and root servers.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::{Name, TokioAsyncResolver};

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, Target};
use crate::InstabilityResult;

/// Name resolved against every resolver.
const TEST_DOMAIN: &str = "example.com.";

/// Address used for the system resolver target.
const SYSTEM_RESOLVER: &str = "system";

pub const PUBLIC_RESOLVERS: &[(&str, &str)] = &[
    ("Google Public DNS", "8.8.8.8"),
    ("Google Public DNS (secondary)", "8.8.4.4"),
    ("Cloudflare", "1.1.1.1"),
    ("Cloudflare (secondary)", "1.0.0.1"),
    ("OpenDNS", "208.67.222.222"),
    ("OpenDNS (secondary)", "208.67.220.220"),
    ("Quad9", "9.9.9.9"),
    ("Quad9 (secondary)", "149.112.112.112"),
    ("Comodo Secure DNS", "8.26.56.26"),
    ("Comodo Secure DNS (secondary)", "8.20.247.20"),
];

pub const ROOT_SERVERS: &[(&str, &str)] = &[
    ("A (Verisign)", "198.41.0.4"),
    ("B (USC-ISI)", "199.9.14.201"),
    ("C (Cogent)", "192.33.4.12"),
    ("D (University of Maryland)", "199.7.91.13"),
    ("E (NASA Ames)", "192.203.230.10"),
    ("F (ISC)", "192.5.5.241"),
    ("G (US DoD NIC)", "192.112.36.4"),
    ("H (US Army Research Lab)", "198.97.190.53"),
    ("I (Netnod)", "192.36.148.17"),
    ("J (Verisign)", "192.58.128.30"),
    ("K (RIPE NCC)", "193.0.14.129"),
    ("L (ICANN)", "199.7.83.42"),
    ("M (WIDE Project)", "202.12.27.33"),
];

/// Resolver that talks to exactly one name server, without cache, hosts file
/// or retries.
fn single_server_resolver(ip: IpAddr, timeout: Duration) -> TokioAsyncResolver {
    let config = ResolverConfig::from_parts(
        None,
        vec![],
        NameServerConfigGroup::from_ips_clear(&[ip], 53, true),
    );
    TokioAsyncResolver::tokio(config, probe_opts(timeout))
}

fn probe_opts(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.cache_size = 0;
    opts.use_hosts_file = false;
    opts
}

/// An empty answer still proves the server responded.
fn answered(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

async fn query_a(address: String, timeout: Duration) -> Result<Option<String>, String> {
    let resolver = if address == SYSTEM_RESOLVER {
        let (config, _) = trust_dns_resolver::system_conf::read_system_conf()
            .map_err(|e| format!("cannot read system resolver configuration: {}", e))?;
        TokioAsyncResolver::tokio(config, probe_opts(timeout))
    } else {
        let ip: IpAddr = address
            .parse()
            .map_err(|e| format!("invalid resolver address: {}", e))?;
        single_server_resolver(ip, timeout)
    };

    match resolver.lookup_ip(TEST_DOMAIN).await {
        Ok(lookup) => Ok(lookup
            .iter()
            .next()
            .map(|ip| format!("{} -> {}", TEST_DOMAIN.trim_end_matches('.'), ip))),
        Err(e) if answered(&e) => Ok(Some("no records".to_string())),
        Err(e) => Err(e.to_string()),
    }
}

async fn query_root(address: String, timeout: Duration) -> Result<Option<String>, String> {
    let ip: IpAddr = address
        .parse()
        .map_err(|e| format!("invalid server address: {}", e))?;
    let resolver = single_server_resolver(ip, timeout);

    match resolver.soa_lookup(Name::root()).await {
        Ok(lookup) => Ok(lookup.iter().next().map(|soa| format!("serial {}", soa.serial()))),
        Err(e) if answered(&e) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

fn targets(list: &[(&str, &str)]) -> Vec<Target> {
    list.iter()
        .map(|(label, address)| Target::new(*label, *address))
        .collect()
}

// ============================================================================
// check_dns_resolvers
// ============================================================================

pub struct DnsResolvers;

#[async_trait]
impl DiagnosticTool for DnsResolvers {
    fn name(&self) -> &'static str {
        "check_dns_resolvers"
    }

    fn description(&self) -> &'static str {
        "Query public DNS resolvers and the local resolver, with response times"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let mut list = targets(PUBLIC_RESOLVERS);
        list.push(Target::new("Local default resolver", SYSTEM_RESOLVER));

        let timeout = ctx.timeout();
        let results = probe_all(&list, ctx, move |t: Target| query_a(t.address, timeout)).await;

        Ok(ToolOutput::report(&CheckReport::new("DNS resolvers", results)))
    }
}

// ============================================================================
// check_dns_root_servers
// ============================================================================

pub struct DnsRootServers;

#[async_trait]
impl DiagnosticTool for DnsRootServers {
    fn name(&self) -> &'static str {
        "check_dns_root_servers"
    }

    fn description(&self) -> &'static str {
        "Query the 13 DNS root servers (A to M)"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let timeout = ctx.timeout();
        let results = probe_all(&targets(ROOT_SERVERS), ctx, move |t: Target| {
            query_root(t.address, timeout)
        })
        .await;

        Ok(ToolOutput::report(&CheckReport::new("root servers", results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_lists() {
        assert_eq!(PUBLIC_RESOLVERS.len(), 10);
        assert_eq!(ROOT_SERVERS.len(), 13);
        for (_, address) in PUBLIC_RESOLVERS.iter().chain(ROOT_SERVERS) {
            assert!(address.parse::<IpAddr>().is_ok(), "{} is not an IP", address);
        }
    }

    #[tokio::test]
    async fn test_invalid_address_is_unreachable() {
        let result = query_root("not-an-ip".to_string(), Duration::from_millis(100)).await;
        assert!(result.unwrap_err().contains("invalid server address"));
    }
}
