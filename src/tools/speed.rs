//! Bandwidth test through macOS `networkQuality`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use crate::{InstabilityError, InstabilityResult};

const SPEED_TEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Reference line rates in Mbps.
const TELECOM_SPEEDS: &[(f64, &str)] = &[
    (0.064, "an ISDN line (single channel)"),
    (0.128, "a dual-channel ISDN line"),
    (0.384, "basic DSL at 384 kbps"),
    (1.0, "roughly one Mbps"),
    (1.544, "a single T-1 line"),
    (0.772, "half a T-1 line"),
    (2.0, "DSL2 at 2 Mbps"),
    (3.0, "typical DSL speeds"),
    (5.0, "a basic cable internet connection or ADSL"),
    (10.0, "ten T-1 bonded lines, or old school Ethernet"),
    (22.368, "about 15 bonded T-1 lines"),
    (45.0, "a DS-3 line or T-3 line"),
    (22.5, "half a T-3 line"),
    (100.0, "Fast Ethernet"),
    (155.0, "an OC-3 circuit"),
    (310.0, "two OC-3 circuits"),
    (622.0, "an OC-12 circuit"),
    (1244.0, "two OC-12 circuits"),
    (2488.0, "an OC-48 circuit"),
    (4976.0, "two OC-48 circuits"),
    (10000.0, "10 Gigabit Ethernet"),
    (40000.0, "40 Gigabit Ethernet"),
    (100000.0, "100 Gigabit Ethernet"),
];

/// Metrics reported by `networkQuality -p -s`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedSummary {
    pub uplink_capacity: Option<String>,
    pub downlink_capacity: Option<String>,
    pub uplink_responsiveness: Option<String>,
    pub downlink_responsiveness: Option<String>,
    pub idle_latency: Option<String>,
}

/// Extracts the metric lines from `networkQuality` output.
pub fn parse_network_quality(output: &str) -> SpeedSummary {
    let mut summary = SpeedSummary::default();

    for line in output.lines() {
        let Some((label, value)) = line.split_once(": ") else {
            continue;
        };
        let value = Some(value.trim().to_string());

        if label.contains("Uplink capacity") {
            summary.uplink_capacity = value;
        } else if label.contains("Downlink capacity") {
            summary.downlink_capacity = value;
        } else if label.contains("Uplink Responsiveness") {
            summary.uplink_responsiveness = value;
        } else if label.contains("Downlink Responsiveness") {
            summary.downlink_responsiveness = value;
        } else if label.contains("Idle Latency") {
            summary.idle_latency = value;
        }
    }

    summary
}

/// Converts a capacity such as "245.331 Mbps" to Mbps.
pub fn capacity_mbps(capacity: &str) -> Option<f64> {
    let mut parts = capacity.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let factor = match parts.next().unwrap_or("Mbps") {
        "Kbps" | "kbps" => 0.001,
        "Mbps" => 1.0,
        "Gbps" => 1000.0,
        _ => return None,
    };
    Some(value * factor)
}

/// Sentence fragment naming the closest reference line rate.
pub fn compare_speed_to_telecom(speed_mbps: f64) -> String {
    let closest = TELECOM_SPEEDS
        .iter()
        .min_by(|a, b| {
            (speed_mbps - a.0)
                .abs()
                .total_cmp(&(speed_mbps - b.0).abs())
        })
        .map(|(_, name)| *name)
        .unwrap_or("an unknown line rate");

    format!("this speed is similar to {}", closest)
}

/// Plain-language rendering of a summary.
pub fn describe(summary: &SpeedSummary) -> String {
    let mut sentences = Vec::new();

    let direction = |label: &str, capacity: &Option<String>| {
        capacity.as_ref().map(|c| match capacity_mbps(c) {
            Some(mbps) => format!("Your {} speed is {}, {}.", label, c, compare_speed_to_telecom(mbps)),
            None => format!("Your {} speed is {}.", label, c),
        })
    };

    sentences.extend(direction("uplink", &summary.uplink_capacity));
    sentences.extend(direction("downlink", &summary.downlink_capacity));
    if let Some(r) = &summary.uplink_responsiveness {
        sentences.push(format!("Uplink responsiveness is measured at {}.", r));
    }
    if let Some(r) = &summary.downlink_responsiveness {
        sentences.push(format!("Downlink responsiveness is {}.", r));
    }
    if let Some(l) = &summary.idle_latency {
        sentences.push(format!("The idle latency of the connection is {}.", l));
    }

    sentences.join(" ")
}

pub struct SpeedTest;

#[async_trait]
impl DiagnosticTool for SpeedTest {
    fn name(&self) -> &'static str {
        "run_speed_test"
    }

    fn description(&self) -> &'static str {
        "Measure upload/download capacity and latency (macOS networkQuality, about a minute)"
    }

    fn in_batch(&self) -> bool {
        false
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        if !cfg!(target_os = "macos") {
            return Ok(ToolOutput::text(format!(
                "The speed test uses the networkQuality command, which is only available on macOS 12 or later (this system is {}).",
                std::env::consts::OS
            )));
        }

        let child = Command::new("networkQuality")
            .args(["-p", "-s"])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(SPEED_TEST_TIMEOUT, child)
            .await
            .map_err(|_| InstabilityError::Timeout(self.name().to_string()))?
            .map_err(|e| {
                InstabilityError::tool_failed(
                    self.name(),
                    format!("networkQuality not found, macOS 12 or later is required: {}", e),
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = parse_network_quality(&stdout);
        if summary == SpeedSummary::default() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstabilityError::tool_failed(
                self.name(),
                format!("no measurements in networkQuality output: {}", stderr.trim()),
            ));
        }

        Ok(ToolOutput::text(describe(&summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
==== SUMMARY ====
Uplink capacity: 23.456 Mbps
Downlink capacity: 1.2 Gbps
Uplink Responsiveness: High (1234 RPM)
Downlink Responsiveness: Medium (654 RPM)
Idle Latency: 18.250 milli-seconds
";

    #[test]
    fn test_parse_network_quality() {
        let summary = parse_network_quality(SAMPLE);
        assert_eq!(summary.uplink_capacity.as_deref(), Some("23.456 Mbps"));
        assert_eq!(summary.downlink_capacity.as_deref(), Some("1.2 Gbps"));
        assert_eq!(summary.idle_latency.as_deref(), Some("18.250 milli-seconds"));
    }

    #[test]
    fn test_capacity_units() {
        assert_eq!(capacity_mbps("23.5 Mbps"), Some(23.5));
        assert_eq!(capacity_mbps("2 Gbps"), Some(2000.0));
        assert_eq!(capacity_mbps("fast"), None);
    }

    #[test]
    fn test_compare_speed_to_telecom() {
        assert_eq!(
            compare_speed_to_telecom(95.0),
            "this speed is similar to Fast Ethernet"
        );
        assert_eq!(
            compare_speed_to_telecom(1.5),
            "this speed is similar to a single T-1 line"
        );
        assert_eq!(
            compare_speed_to_telecom(0.8),
            "this speed is similar to half a T-1 line"
        );
    }

    #[test]
    fn test_describe() {
        let text = describe(&parse_network_quality(SAMPLE));
        assert!(text.starts_with("Your uplink speed is 23.456 Mbps, this speed is similar to"));
        assert!(text.contains("1.2 Gbps, this speed is similar to two OC-12 circuits"));
        assert!(text.contains("idle latency of the connection is 18.250 milli-seconds"));
    }
}
