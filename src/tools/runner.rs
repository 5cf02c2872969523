//! Runs tools and records their results in the cache.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::ToolContext;
use super::external_ip::EXTERNAL_IP_KEY;
use super::registry::ToolRegistry;
use crate::cache::{CacheEntry, ResultCache};
use crate::{InstabilityError, InstabilityResult};

/// Outcome of one tool invocation.
///
/// `ok` says the tool ran; `healthy` says what it checked is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolRun {
    pub tool: String,
    pub ok: bool,
    pub healthy: bool,
    pub output: String,
    pub duration_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl ToolRun {
    /// Ran and found nothing wrong.
    pub fn passed(&self) -> bool {
        self.ok && self.healthy
    }

    /// Last non-empty line of the output, where checks put their verdict.
    pub fn summary_line(&self) -> &str {
        self.output.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
    }
}

/// Registry plus the shared probe context.
pub struct ToolRunner {
    registry: ToolRegistry,
    ctx: ToolContext,
}

impl ToolRunner {
    pub fn new(registry: ToolRegistry, ctx: ToolContext) -> Self {
        Self { registry, ctx }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs `name` and records a successful result in `cache`.
    ///
    /// Only an unknown tool name is an error; a failing tool produces a run
    /// with `ok == false` and the error as output.
    pub async fn run(&self, name: &str, args: &Value, cache: &mut ResultCache) -> InstabilityResult<ToolRun> {
        if !self.registry.contains(name) {
            return Err(InstabilityError::ToolNotFound {
                name: name.to_string(),
                available: self.registry.names().join(", "),
            });
        }

        let start = Instant::now();
        let result = self.registry.execute(name, args, &self.ctx).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (ok, healthy, output) = match result {
            Ok(output) => {
                let healthy = output.healthy;
                let mut text = output.text;
                for (key, value) in output.facts {
                    let previous = cache.update(key.clone(), value.clone());
                    if key == EXTERNAL_IP_KEY {
                        text.push('\n');
                        text.push_str(&describe_ip_change(previous.as_ref(), &value));
                    }
                }
                cache.update(name, text.clone());
                if !healthy {
                    tracing::info!(tool = name, "Check reported problems");
                }
                (true, healthy, text)
            }
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool failed");
                (false, false, e.to_string())
            }
        };

        if ok {
            if let Err(e) = cache.save() {
                tracing::warn!("Could not save cache to {}: {}", cache.path().display(), e);
            }
        }

        Ok(ToolRun {
            tool: name.to_string(),
            ok,
            healthy,
            output,
            duration_ms,
            checked_at: Utc::now(),
        })
    }
}

/// Compares the new external IP with the last recorded one.
pub fn describe_ip_change(previous: Option<&CacheEntry>, current: &str) -> String {
    match previous {
        None => "First time recording the external IP.".to_string(),
        Some(entry) if entry.value == current => format!(
            "External IP unchanged since {}.",
            entry.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        Some(entry) => format!(
            "External IP changed from {} to {} (last recorded {}).",
            entry.value,
            current,
            entry.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    }
}
