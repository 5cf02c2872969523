//! Batch report formatting: text, JSON and table.

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use console::style;
use serde::Serialize;

use crate::tools::ToolRun;

/// Output format of a batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

/// Verdict shown for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Passed,
    Issues,
    Failed,
}

impl Verdict {
    fn of(run: &ToolRun) -> Self {
        match (run.ok, run.healthy) {
            (true, true) => Verdict::Passed,
            (true, false) => Verdict::Issues,
            (false, _) => Verdict::Failed,
        }
    }

    fn mark(self) -> &'static str {
        match self {
            Verdict::Passed => "✓",
            Verdict::Issues => "⚠",
            Verdict::Failed => "✗",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Verdict::Passed => "OK",
            Verdict::Issues => "ISSUES",
            Verdict::Failed => "FAIL",
        }
    }

    fn color(self) -> Color {
        match self {
            Verdict::Passed => Color::Green,
            Verdict::Issues => Color::Yellow,
            Verdict::Failed => Color::Red,
        }
    }
}

/// JSON document for one batch pass.
#[derive(Debug, Serialize)]
struct Report<'a> {
    generated_at: DateTime<Utc>,
    runs: &'a [ToolRun],
}

/// Formats `runs` in the requested format.
pub fn format_report(runs: &[ToolRun], format: OutputFormat, no_color: bool) -> String {
    match format {
        OutputFormat::Text => format_text(runs, no_color),
        OutputFormat::Json => format_json(runs),
        OutputFormat::Table => format_table(runs, no_color),
    }
}

fn format_json(runs: &[ToolRun]) -> String {
    let report = Report {
        generated_at: Utc::now(),
        runs,
    };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

fn format_text(runs: &[ToolRun], no_color: bool) -> String {
    let mut out = String::new();

    for run in runs {
        let verdict = Verdict::of(run);
        let header = format!("{} {}", verdict.mark(), run.tool);
        let header = match verdict {
            _ if no_color => header,
            Verdict::Passed => style(header).green().bold().to_string(),
            Verdict::Issues => style(header).yellow().bold().to_string(),
            Verdict::Failed => style(header).red().bold().to_string(),
        };

        out.push_str(&format!(
            "{} ({} ms, {})\n",
            header,
            run.duration_ms,
            run.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        for line in run.output.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    let failed = runs.iter().filter(|r| !r.ok).count();
    let issues = runs.iter().filter(|r| Verdict::of(r) == Verdict::Issues).count();
    let mut totals = format!("{} checks, {} failed", runs.len(), failed);
    if issues > 0 {
        totals.push_str(&format!(", {} with issues", issues));
    }
    if no_color || failed + issues == 0 {
        out.push_str(&totals);
    } else {
        out.push_str(&style(totals).yellow().to_string());
    }
    out
}

fn format_table(runs: &[ToolRun], no_color: bool) -> String {
    if runs.is_empty() {
        return "No checks were run.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(vec!["Status", "Tool", "Duration", "Checked", "Summary"]);
    } else {
        table.set_header(vec![
            Cell::new("Status").fg(Color::Cyan),
            Cell::new("Tool").fg(Color::Cyan),
            Cell::new("Duration").fg(Color::Cyan),
            Cell::new("Checked").fg(Color::Cyan),
            Cell::new("Summary").fg(Color::Cyan),
        ]);
    }

    for run in runs {
        let verdict = Verdict::of(run);
        let status_cell = if no_color {
            Cell::new(verdict.label())
        } else {
            Cell::new(verdict.label()).fg(verdict.color())
        };

        table.add_row(Row::from(vec![
            status_cell,
            Cell::new(&run.tool),
            Cell::new(format!("{} ms", run.duration_ms)),
            Cell::new(run.checked_at.format("%H:%M:%S").to_string()),
            Cell::new(truncate(run.summary_line(), 80)),
        ]));
    }

    table.to_string()
}

/// Cuts `s` to `max` chars, adding an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
