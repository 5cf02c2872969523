//! Public IP lookup with optional AbuseIPDB reputation.

use std::net::IpAddr;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use crate::{InstabilityError, InstabilityResult};

/// Cache key for the last known public IP.
pub const EXTERNAL_IP_KEY: &str = "external_ip";

/// Environment variable holding the AbuseIPDB key.
pub const ABUSEIPDB_KEY_ENV: &str = "ABUSEIPDB_API_KEY";

const ABUSEIPDB_URL: &str = "https://api.abuseipdb.com/api/v2/check";

/// How a lookup service formats its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFormat {
    /// `{"ip": "..."}`
    Json,
    PlainText,
}

pub const IP_SERVICES: &[(&str, IpFormat)] = &[
    ("https://api.ipify.org?format=json", IpFormat::Json),
    ("https://ifconfig.me/ip", IpFormat::PlainText),
    ("https://icanhazip.com", IpFormat::PlainText),
    ("https://ident.me", IpFormat::PlainText),
];

#[derive(Debug, Deserialize)]
struct IpifyResponse {
    ip: String,
}

async fn query_service(client: &Client, url: &str, format: IpFormat) -> Result<IpAddr, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("status code {}", resp.status().as_u16()));
    }

    let raw = match format {
        IpFormat::Json => resp
            .json::<IpifyResponse>()
            .await
            .map_err(|e| e.to_string())?
            .ip,
        IpFormat::PlainText => resp.text().await.map_err(|e| e.to_string())?,
    };

    raw.trim()
        .parse()
        .map_err(|_| format!("'{}' is not an IP address", raw.trim()))
}

/// Asks each service in turn and returns the first valid answer.
pub async fn fetch_external_ip(client: &Client, services: &[(&str, IpFormat)]) -> InstabilityResult<IpAddr> {
    let mut errors = Vec::new();

    for (url, format) in services {
        match query_service(client, url, *format).await {
            Ok(ip) => {
                tracing::debug!(service = url, %ip, "External IP resolved");
                return Ok(ip);
            }
            Err(e) => {
                tracing::debug!(service = url, error = %e, "External IP service failed");
                errors.push(format!("{}: {}", url, e));
            }
        }
    }

    Err(InstabilityError::tool_failed(
        "get_external_ip",
        format!(
            "could not determine external IP (offline or no connectivity): {}",
            errors.join("; ")
        ),
    ))
}

// ============================================================================
// AbuseIPDB
// ============================================================================

#[derive(Debug, Deserialize)]
struct AbuseEnvelope {
    data: AbuseReport,
}

/// Fields read from an AbuseIPDB `check` response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbuseReport {
    pub ip_address: String,
    #[serde(default)]
    pub abuse_confidence_score: u32,
    #[serde(default)]
    pub total_reports: u32,
    pub last_reported_at: Option<String>,
    pub country_code: Option<String>,
    pub isp: Option<String>,
    pub domain: Option<String>,
}

impl AbuseReport {
    pub fn render(&self) -> String {
        let unknown = || "Unknown".to_string();
        [
            format!("IP Address: {}", self.ip_address),
            format!("Abuse Confidence Score: {}%", self.abuse_confidence_score),
            format!("Total Reports: {}", self.total_reports),
            format!(
                "Last Reported: {}",
                self.last_reported_at.clone().unwrap_or_else(|| "Never reported".to_string())
            ),
            format!("Country: {}", self.country_code.clone().unwrap_or_else(unknown)),
            format!("ISP: {}", self.isp.clone().unwrap_or_else(unknown)),
            format!("Domain: {}", self.domain.clone().unwrap_or_else(unknown)),
        ]
        .join("\n")
    }
}

/// Looks up `ip` on AbuseIPDB (last 90 days).
pub async fn check_reputation(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    ip: IpAddr,
) -> InstabilityResult<AbuseReport> {
    let resp = client
        .get(endpoint)
        .query(&[("ipAddress", ip.to_string().as_str()), ("maxAgeInDays", "90")])
        .header("Key", api_key)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(InstabilityError::tool_failed(
            "get_external_ip",
            format!("AbuseIPDB returned status {}", resp.status().as_u16()),
        ));
    }

    let envelope: AbuseEnvelope = resp.json().await?;
    Ok(envelope.data)
}

pub struct ExternalIp;

#[async_trait]
impl DiagnosticTool for ExternalIp {
    fn name(&self) -> &'static str {
        "get_external_ip"
    }

    fn description(&self) -> &'static str {
        "Public IP address of this connection, with reputation when ABUSEIPDB_API_KEY is set"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let ip = fetch_external_ip(&ctx.http, IP_SERVICES).await?;
        let mut text = format!("External IP: {}", ip);

        if let Some(key) = std::env::var(ABUSEIPDB_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
            match check_reputation(&ctx.http, ABUSEIPDB_URL, &key, ip).await {
                Ok(report) => {
                    text.push('\n');
                    text.push_str(&report.render());
                }
                Err(e) => {
                    tracing::warn!("IP reputation lookup failed: {}", e);
                    text.push_str(&format!("\nReputation check failed: {}", e));
                }
            }
        }

        Ok(ToolOutput::text(text).with_fact(EXTERNAL_IP_KEY, ip.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_falls_through_to_next_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7\n"))
            .mount(&server)
            .await;

        let json_url = format!("{}/json", server.uri());
        let plain_url = format!("{}/plain", server.uri());
        let services = [
            (json_url.as_str(), IpFormat::Json),
            (plain_url.as_str(), IpFormat::PlainText),
        ];

        let ip = fetch_external_ip(&Client::new(), &services).await.unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[tokio::test]
    async fn test_json_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "198.51.100.4" })))
            .mount(&server)
            .await;

        let url = server.uri();
        let ip = fetch_external_ip(&Client::new(), &[(url.as_str(), IpFormat::Json)])
            .await
            .unwrap();
        assert_eq!(ip.to_string(), "198.51.100.4");
    }

    #[tokio::test]
    async fn test_all_services_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&server)
            .await;

        let url = server.uri();
        let err = fetch_external_ip(&Client::new(), &[(url.as_str(), IpFormat::PlainText)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not determine external IP"));
    }

    #[tokio::test]
    async fn test_reputation_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/check"))
            .and(query_param("ipAddress", "203.0.113.7"))
            .and(query_param("maxAgeInDays", "90"))
            .and(header("Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "ipAddress": "203.0.113.7",
                    "abuseConfidenceScore": 0,
                    "totalReports": 0,
                    "lastReportedAt": null,
                    "countryCode": "US",
                    "isp": "Example ISP",
                    "domain": "example.net"
                }
            })))
            .mount(&server)
            .await;

        let endpoint = format!("{}/api/v2/check", server.uri());
        let report = check_reputation(&Client::new(), &endpoint, "secret", "203.0.113.7".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(report.isp.as_deref(), Some("Example ISP"));
        let rendered = report.render();
        assert!(rendered.contains("Abuse Confidence Score: 0%"));
        assert!(rendered.contains("Last Reported: Never reported"));
    }
}
