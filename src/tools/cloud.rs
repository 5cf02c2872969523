//! CDN reachability and cloud provider status pages.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, ProbeStatus, Target};
use crate::InstabilityResult;

pub const CDN_ENDPOINTS: &[(&str, &str)] = &[
    ("Cloudflare", "https://www.cloudflare.com/robots.txt"),
    ("Akamai", "https://developer.akamai.com/"),
    ("Fastly", "https://www.fastly.com/robots.txt"),
    ("Amazon CloudFront", "https://d1.awsstatic.com/"),
    ("Google Cloud CDN", "https://www.google.com/robots.txt"),
    ("Microsoft Azure CDN", "https://www.microsoft.com/robots.txt"),
];

pub const CLOUD_STATUS_PAGES: &[(&str, &str)] = &[
    ("AWS", "https://health.aws.amazon.com/health/status"),
    ("Google Cloud", "https://status.cloud.google.com/"),
    ("Azure", "https://status.azure.com/"),
];

/// Share of Google Cloud services in warning state above which the page is
/// reported as a warning (percent).
const GCP_WARNING_THRESHOLD: f64 = 1.0;

// ============================================================================
// check_cdns
// ============================================================================

async fn check_cdn(client: Client, url: String) -> Result<Option<String>, String> {
    let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
    match resp.status() {
        StatusCode::OK => Ok(None),
        StatusCode::NO_CONTENT => Ok(Some("204 No Content".to_string())),
        status => Err(format!("status code {}", status.as_u16())),
    }
}

pub struct Cdns;

#[async_trait]
impl DiagnosticTool for Cdns {
    fn name(&self) -> &'static str {
        "check_cdns"
    }

    fn description(&self) -> &'static str {
        "Check that the major content delivery networks respond"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = CDN_ENDPOINTS
            .iter()
            .map(|(label, url)| Target::new(*label, *url))
            .collect();

        let client = ctx.http.clone();
        let results = probe_all(&targets, ctx, move |t: Target| check_cdn(client.clone(), t.address)).await;

        Ok(ToolOutput::report(&CheckReport::new("CDNs", results)))
    }
}

// ============================================================================
// check_cloud_status
// ============================================================================

/// Verdict read off a status page.
#[derive(Debug, Clone, PartialEq)]
pub enum CloudStatus {
    NoIssues,
    Warning(String),
    IssuesDetected(String),
}

impl CloudStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, CloudStatus::NoIssues)
    }
}

impl std::fmt::Display for CloudStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudStatus::NoIssues => write!(f, "no issues"),
            CloudStatus::Warning(detail) => write!(f, "warning: {}", detail),
            CloudStatus::IssuesDetected(detail) => write!(f, "issues detected: {}", detail),
        }
    }
}

/// Reads a provider's status page.
pub fn classify_cloud_page(provider: &str, body: &str) -> CloudStatus {
    match provider {
        "AWS" if body.contains("No recent issues") => CloudStatus::NoIssues,
        "Azure" if body.contains("There are currently no active events") => CloudStatus::NoIssues,
        "Google Cloud" => classify_gcp(body),
        _ => CloudStatus::IssuesDetected("status page does not report all clear".to_string()),
    }
}

fn classify_gcp(body: &str) -> CloudStatus {
    let total = body.matches("psd__status-icon").count();
    if total == 0 {
        return CloudStatus::IssuesDetected("unable to determine status".to_string());
    }

    let available = body.matches("psd__available").count();
    let warnings = body.matches("psd__warning").count();
    let pct_available = available as f64 / total as f64 * 100.0;
    let pct_warning = warnings as f64 / total as f64 * 100.0;

    if available == total {
        CloudStatus::NoIssues
    } else if pct_warning > GCP_WARNING_THRESHOLD {
        CloudStatus::Warning(format!(
            "{:.1}% services with warnings, {:.1}% fully available",
            pct_warning, pct_available
        ))
    } else if pct_available >= 99.0 {
        CloudStatus::NoIssues
    } else {
        CloudStatus::IssuesDetected(format!("only {:.1}% services fully available", pct_available))
    }
}

async fn fetch_status(client: Client, provider: String, url: String) -> Result<Option<String>, String> {
    let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("status code {}", resp.status().as_u16()));
    }
    let body = resp.text().await.map_err(|e| e.to_string())?;
    Ok(Some(classify_cloud_page(&provider, &body).to_string()))
}

pub struct CloudStatusPages;

#[async_trait]
impl DiagnosticTool for CloudStatusPages {
    fn name(&self) -> &'static str {
        "check_cloud_status"
    }

    fn description(&self) -> &'static str {
        "Read the AWS, Google Cloud and Azure status pages"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = CLOUD_STATUS_PAGES
            .iter()
            .map(|(label, url)| Target::new(*label, *url))
            .collect();

        let client = ctx.http.clone();
        let results = probe_all(&targets, ctx, move |t: Target| {
            fetch_status(client.clone(), t.label, t.address)
        })
        .await;

        let report = CheckReport::new("status pages", results);
        let mut text = report.render();

        let troubled: Vec<String> = report
            .results
            .iter()
            .filter_map(|r| match &r.status {
                ProbeStatus::Reachable {
                    detail: Some(detail), ..
                } if !detail.starts_with("no issues") => Some(format!("{} ({})", r.target.label, detail)),
                _ => None,
            })
            .collect();

        if troubled.is_empty() {
            if report.is_healthy() {
                text.push_str("\nAll cloud providers report no issues.");
            }
        } else {
            text.push_str(&format!("\nProviders reporting issues: {}", troubled.join("; ")));
        }

        let healthy = troubled.is_empty() && report.is_healthy();
        Ok(ToolOutput::text(text).with_health(healthy))
    }
}
