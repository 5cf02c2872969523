//! Slash commands typed at the prompt.

/// Names completed at the prompt, besides tool names.
pub const BUILTIN_COMMANDS: &[&str] = &["/help", "/exit", "/quit", "/clear", "/tools", "/cache", "/history"];

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Exit,
    Clear,
    Tools,
    Cache,
    History,
    /// `/<name>`: a tool to run directly, resolved against the registry later.
    Tool(String),
}

impl SlashCommand {
    /// Parses `input`; `None` means the line is a message for the model.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;
        let word = rest.split_whitespace().next().unwrap_or("");

        let command = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "exit" | "quit" => Self::Exit,
            "clear" => Self::Clear,
            "tools" => Self::Tools,
            "cache" => Self::Cache,
            "history" => Self::History,
            _ => Self::Tool(word.to_string()),
        };
        Some(command)
    }
}

/// Help text for `/help`.
pub fn help_lines() -> Vec<(&'static str, &'static str)> {
    vec![
        ("/help", "Show this help message"),
        ("/exit", "Exit the chatbot"),
        ("/quit", "Same as /exit"),
        ("/clear", "Clear conversation history"),
        ("/tools", "List available diagnostic tools"),
        ("/cache", "Display cached results"),
        ("/history", "Show the conversation so far"),
        ("/<tool>", "Run a specific tool directly"),
    ]
}
