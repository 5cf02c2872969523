//! Shared multi-target probing.
//!
//! Every multi-target check probes all targets concurrently, waits the
//! configured retry delay, re-probes whatever failed, and renders the same
//! reachable/unreachable report.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use super::base::ToolContext;

/// A probed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Display name, e.g. "Google Public DNS".
    pub label: String,

    /// Address probed (host, IP or URL).
    pub address: String,
}

impl Target {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
        }
    }
}

/// Outcome of probing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable {
        elapsed: Duration,
        detail: Option<String>,
    },
    Unreachable {
        error: String,
    },
}

/// A target and its final status.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub target: Target,
    pub status: ProbeStatus,
}

impl ProbeResult {
    pub fn is_reachable(&self) -> bool {
        matches!(self.status, ProbeStatus::Reachable { .. })
    }
}

/// Probes every target, then re-probes the unreachable ones after the retry
/// delay, `ctx.checks.retries` times.
///
/// `probe` returns an optional detail for the report on success, or an error
/// message. Each call is bounded by the context timeout.
pub async fn probe_all<F, Fut>(targets: &[Target], ctx: &ToolContext, probe: F) -> Vec<ProbeResult>
where
    F: Fn(Target) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<Option<String>, String>> + Send + 'static,
{
    let mut statuses = probe_round(targets, ctx.timeout(), &probe).await;

    for round in 0..ctx.checks.retries {
        let failed: Vec<usize> = statuses
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, ProbeStatus::Unreachable { .. }))
            .map(|(i, _)| i)
            .collect();

        if failed.is_empty() {
            break;
        }

        tracing::debug!(
            round = round + 1,
            failed = failed.len(),
            "Retrying unreachable targets"
        );
        tokio::time::sleep(ctx.checks.retry_delay()).await;

        let retry_targets: Vec<Target> = failed.iter().map(|&i| targets[i].clone()).collect();
        let retried = probe_round(&retry_targets, ctx.timeout(), &probe).await;

        for (index, status) in failed.into_iter().zip(retried) {
            statuses[index] = status;
        }
    }

    targets
        .iter()
        .cloned()
        .zip(statuses)
        .map(|(target, status)| ProbeResult { target, status })
        .collect()
}

async fn probe_round<F, Fut>(targets: &[Target], timeout: Duration, probe: &F) -> Vec<ProbeStatus>
where
    F: Fn(Target) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<Option<String>, String>> + Send + 'static,
{
    let mut set = JoinSet::new();

    for (index, target) in targets.iter().cloned().enumerate() {
        let probe = probe.clone();
        set.spawn(async move {
            let start = Instant::now();
            let status = match tokio::time::timeout(timeout, probe(target)).await {
                Ok(Ok(detail)) => ProbeStatus::Reachable {
                    elapsed: start.elapsed(),
                    detail,
                },
                Ok(Err(error)) => ProbeStatus::Unreachable { error },
                Err(_) => ProbeStatus::Unreachable {
                    error: format!("timed out after {}s", timeout.as_secs_f32()),
                },
            };
            (index, status)
        });
    }

    let mut statuses = vec![
        ProbeStatus::Unreachable {
            error: "probe did not complete".to_string(),
        };
        targets.len()
    ];

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, status)) => statuses[index] = status,
            Err(e) => tracing::warn!("Probe task failed: {}", e),
        }
    }

    statuses
}

/// Report over a set of probe results.
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// Plural noun for the targets, e.g. "DNS resolvers".
    pub noun: String,
    pub results: Vec<ProbeResult>,
}

impl CheckReport {
    pub fn new(noun: impl Into<String>, results: Vec<ProbeResult>) -> Self {
        Self {
            noun: noun.into(),
            results,
        }
    }

    pub fn reachable(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.is_reachable())
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.is_reachable())
    }

    pub fn unreachable_count(&self) -> usize {
        self.unreachable().count()
    }

    pub fn is_healthy(&self) -> bool {
        self.unreachable_count() == 0
    }

    /// One-line verdict.
    pub fn summary(&self) -> String {
        let total = self.results.len();
        let failed: Vec<&str> = self.unreachable().map(|r| r.target.label.as_str()).collect();

        if failed.is_empty() {
            format!("All {} {} are reachable.", total, self.noun)
        } else if failed.len() == total {
            format!("None of the {} {} are reachable.", total, self.noun)
        } else {
            format!(
                "{} of {} {} are unreachable: {}.",
                failed.len(),
                total,
                self.noun,
                failed.join(", ")
            )
        }
    }

    /// Full multi-line report.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let reachable: Vec<&ProbeResult> = self.reachable().collect();
        if !reachable.is_empty() {
            out.push_str(&format!("Reachable {}:\n", self.noun));
            for result in reachable {
                if let ProbeStatus::Reachable { elapsed, detail } = &result.status {
                    out.push_str(&format!(
                        "  ✓ {} ({}): {} ms",
                        result.target.label,
                        result.target.address,
                        elapsed.as_millis()
                    ));
                    if let Some(detail) = detail {
                        out.push_str(&format!(" - {}", detail));
                    }
                    out.push('\n');
                }
            }
        }

        let unreachable: Vec<&ProbeResult> = self.unreachable().collect();
        if !unreachable.is_empty() {
            out.push_str(&format!("Unreachable {}:\n", self.noun));
            for result in unreachable {
                if let ProbeStatus::Unreachable { error } = &result.status {
                    out.push_str(&format!(
                        "  ✗ {} ({}): {}\n",
                        result.target.label, result.target.address, error
                    ));
                }
            }
        }

        out.push_str(&self.summary());
        out
    }
}
