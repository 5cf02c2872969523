//! Chat session: slash commands, the tool-call protocol and the turn loop.

mod commands;
mod protocol;
mod session;

pub use commands::{help_lines, SlashCommand, BUILTIN_COMMANDS};
pub use protocol::{extract_thinking, parse_tool_call, ToolCall};
pub use session::{ChatEvent, ChatSession, EventSink, Flow};
