//! Website reachability check.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, Target};
use crate::InstabilityResult;

pub const WEBSITES: &[&str] = &[
    "https://www.google.com",
    "https://www.amazon.com",
    "https://www.facebook.com",
    "https://www.apple.com",
    "https://www.microsoft.com",
    "https://www.reddit.com",
    "https://www.wikipedia.org",
    "https://www.netflix.com",
    "https://www.bbc.com",
    "https://www.nytimes.com",
    "https://www.usa.gov",
    "https://www.canada.ca",
    "https://www.gov.uk",
    "https://www.gouvernement.fr",
    "https://www.bund.de",
    "https://www.australia.gov.au",
    "https://www.gov.sg",
];

/// Fetches `/robots.txt`, falling back to the root page when it is missing.
pub(crate) async fn check_site(client: Client, base: String) -> Result<Option<String>, String> {
    let base = base.trim_end_matches('/').to_string();
    let robots = format!("{}/robots.txt", base);

    let resp = client.get(&robots).send().await.map_err(|e| e.to_string())?;
    match resp.status() {
        StatusCode::OK => Ok(Some("robots.txt".to_string())),
        StatusCode::NOT_FOUND => {
            let resp = client.get(&base).send().await.map_err(|e| e.to_string())?;
            let status = resp.status();
            if status.is_success() || status.is_redirection() {
                Ok(Some(format!("root page ({})", status.as_u16())))
            } else {
                Err(format!("status code {}", status.as_u16()))
            }
        }
        status => Err(format!("status code {}", status.as_u16())),
    }
}

/// Explains what a mix of reachable and unreachable sites suggests.
pub fn diagnose(reachable: usize, unreachable: usize) -> Option<&'static str> {
    if unreachable == 0 {
        None
    } else if reachable == 0 {
        Some(
            "Complete connectivity failure. No websites are reachable. \
             You appear to be offline or experiencing a severe network outage.",
        )
    } else if unreachable <= 3 {
        Some(
            "You appear to have internet connectivity, but some specific websites are unreachable. \
             This could indicate regional blocking, DNS issues specific to those domains, \
             or temporary service outages.",
        )
    } else if unreachable > reachable {
        Some(
            "Significant connectivity issues detected. Most websites are unreachable. \
             This suggests serious network problems, possibly with your ISP or internet connection.",
        )
    } else {
        Some("Several websites are unreachable; connectivity is degraded.")
    }
}

pub struct Websites;

#[async_trait]
impl DiagnosticTool for Websites {
    fn name(&self) -> &'static str {
        "check_websites"
    }

    fn description(&self) -> &'static str {
        "Check that major and government websites are reachable, with response times"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = WEBSITES
            .iter()
            .map(|url| Target::new(url.trim_start_matches("https://"), *url))
            .collect();

        let client = ctx.http.clone();
        let results = probe_all(&targets, ctx, move |t: Target| check_site(client.clone(), t.address)).await;

        let report = CheckReport::new("websites", results);
        let mut text = report.render();
        if let Some(diagnosis) = diagnose(report.reachable().count(), report.unreachable_count()) {
            text.push_str("\nDiagnosis: ");
            text.push_str(diagnosis);
        }

        Ok(ToolOutput::text(text).with_health(report.is_healthy()))
    }
}
