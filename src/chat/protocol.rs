//! Text protocol between the model and the session.
//!
//! The model asks for a tool with two lines anywhere in its reply:
//!
//! ```text
//! TOOL: check_dns_resolvers
//! ARGS: {}
//! ```

use serde_json::{Map, Value};

/// Delimiters of reasoning blocks emitted by thinking models.
const THINKING_TAGS: &[(&str, &str)] = &[
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
    ("[thinking]", "[/thinking]"),
];

/// A tool requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(Map::new())
}

/// Finds a `TOOL:` request in the model's reply.
///
/// A missing `ARGS:` line gives `{}`; so does malformed JSON, which is logged.
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    let (_, after) = content.split_once("TOOL:")?;
    let after = after.trim_start();

    let (name_part, args_part) = match after.split_once("ARGS:") {
        Some((name, args)) => (name, Some(args)),
        None => (after, None),
    };

    let name = name_part
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '`' || c == '*' || c == '"')
        .to_string();
    if name.is_empty() {
        return None;
    }

    let args = args_part.map(parse_args).unwrap_or_else(empty_args);

    Some(ToolCall { name, args })
}

fn parse_args(text: &str) -> Value {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return empty_args();
    };
    if end < start {
        return empty_args();
    }

    let json = &text[start..=end];
    match serde_json::from_str::<Value>(json) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::warn!("Tool arguments are not an object: {}", other);
            empty_args()
        }
        Err(e) => {
            tracing::warn!("Invalid JSON in tool arguments {}: {}", json, e);
            empty_args()
        }
    }
}

/// Splits reasoning blocks from the visible answer.
///
/// Returns the joined reasoning (if any) and the remaining content, trimmed.
/// An unterminated block is left in place.
pub fn extract_thinking(content: &str) -> (Option<String>, String) {
    let mut visible = content.to_string();
    let mut thoughts = Vec::new();

    for (open, close) in THINKING_TAGS {
        while let Some(start) = visible.find(open) {
            let body_start = start + open.len();
            let Some(rel_end) = visible[body_start..].find(close) else {
                break;
            };
            let body_end = body_start + rel_end;

            let thought = visible[body_start..body_end].trim();
            if !thought.is_empty() {
                thoughts.push(thought.to_string());
            }
            visible.replace_range(start..body_end + close.len(), "");
        }
    }

    let thinking = (!thoughts.is_empty()).then(|| thoughts.join("\n"));
    (thinking, visible.trim().to_string())
}
