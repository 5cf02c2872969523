//! Interactive chatbot front end.
//!
//! Reads lines with dialoguer (history and slash-command completion), feeds
//! them to a [`ChatSession`] and renders the resulting events.

use std::time::Duration;

use chrono::Local;
use console::style;
use dialoguer::{theme::ColorfulTheme, BasicHistory, Completion, Input};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cache::ResultCache;
use crate::chat::{ChatEvent, ChatSession, EventSink, Flow, BUILTIN_COMMANDS};
use crate::llm::{ChatBackend, OllamaClient};
use crate::tools::ToolRun;
use crate::types::config::Config;
use crate::types::messages::Role;
use crate::InstabilityResult;

use super::commands::build_runner;

/// Creates a spinner on stderr with `msg`.
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints a finished tool run.
pub fn print_tool_run(run: &ToolRun) {
    let header = if run.passed() {
        style(format!("✓ {}", run.tool)).green().bold()
    } else if run.ok {
        style(format!("⚠ {}", run.tool)).yellow().bold()
    } else {
        style(format!("✗ {}", run.tool)).red().bold()
    };
    println!("{} {}", header, style(format!("({} ms)", run.duration_ms)).dim());
    for line in run.output.lines() {
        println!("  {}", line);
    }
    println!();
}

/// Completes slash commands and tool names.
struct SlashCompletion {
    candidates: Vec<String>,
}

impl SlashCompletion {
    fn new(tool_names: &[&str]) -> Self {
        let candidates = BUILTIN_COMMANDS
            .iter()
            .map(|c| c.to_string())
            .chain(tool_names.iter().map(|n| format!("/{}", n)))
            .collect();
        Self { candidates }
    }
}

impl Completion for SlashCompletion {
    fn get(&self, input: &str) -> Option<String> {
        if !input.starts_with('/') {
            return None;
        }
        let lowered = input.to_ascii_lowercase();
        self.candidates
            .iter()
            .find(|c| c.starts_with(&lowered) && c.len() > lowered.len())
            .cloned()
    }
}

/// Renders events on the terminal.
#[derive(Default)]
struct TerminalSink {
    spinner: Option<ProgressBar>,
}

impl TerminalSink {
    fn stop_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn start_spinner(&mut self, msg: String) {
        self.stop_spinner();
        self.spinner = Some(spinner(msg));
    }
}

impl EventSink for TerminalSink {
    fn emit(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::AwaitingModel => self.start_spinner("Thinking...".to_string()),
            ChatEvent::ToolStarted(name) => self.start_spinner(format!("Running {}...", name)),
            other => {
                self.stop_spinner();
                render(other);
            }
        }
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}

fn render(event: ChatEvent) {
    match event {
        ChatEvent::AwaitingModel | ChatEvent::ToolStarted(_) => {}
        ChatEvent::Thinking(text) => {
            println!("{}", style("Thinking:").magenta().italic());
            for line in text.lines() {
                println!("  {}", style(line).dim());
            }
            println!();
        }
        ChatEvent::Assistant(text) => {
            println!("{} {}\n", style("Assistant:").cyan().bold(), text);
        }
        ChatEvent::ToolFinished(run) => print_tool_run(&run),
        ChatEvent::Error(msg) => println!("{} {}\n", style("Error:").red().bold(), style(msg).red()),
        ChatEvent::Info(msg) => println!("{}\n", style(msg).yellow()),
        ChatEvent::Help(lines) => {
            println!("{}", style("Commands:").cyan().bold());
            for (command, text) in lines {
                println!("  {:<12} {}", style(command).green(), text);
            }
            println!("\nAnything else is sent to the model.\n");
        }
        ChatEvent::Tools(tools) => {
            println!("{}", style("Available tools:").cyan().bold());
            for (name, description) in tools {
                println!("  {} - {}", style(format!("/{}", name)).green(), description);
            }
            println!();
        }
        ChatEvent::Cache(entries) => {
            if entries.is_empty() {
                println!("{}\n", style("Cache is empty.").yellow());
                return;
            }
            println!("{}", style("Cached results:").cyan().bold());
            for (key, entry) in entries {
                let when = entry.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
                println!("{} {}", style(key).green().bold(), style(format!("({})", when)).dim());
                for line in entry.value.lines() {
                    println!("  {}", line);
                }
            }
            println!();
        }
        ChatEvent::History(messages) => {
            if messages.is_empty() {
                println!("{}\n", style("No messages yet.").yellow());
                return;
            }
            for message in messages {
                let label = match message.role {
                    Role::User => style("You:").green().bold(),
                    Role::Assistant => style("Assistant:").cyan().bold(),
                    Role::System => style("System:").dim(),
                };
                println!("{} {}", label, message.content);
            }
            println!();
        }
    }
}

fn print_banner(backend: &impl ChatBackend) {
    println!();
    println!("{}", style("Instability - network diagnostics chatbot").cyan().bold());
    println!(
        "Model: {} via {}. Type {} for commands, {} to leave.",
        style(backend.model()).green(),
        backend.name(),
        style("/help").green(),
        style("/exit").green()
    );
    println!();
}

/// Runs the chatbot until `/exit`, Ctrl-C or end of input.
pub async fn run_chatbot(model: Option<String>, config: &Config) -> InstabilityResult<()> {
    let mut backend = OllamaClient::from_config(&config.llm)?;
    if let Some(model) = model {
        backend = backend.with_model(model);
    }

    let runner = build_runner(config)?;
    let cache = ResultCache::from_config(&config.cache);
    let completion = SlashCompletion::new(&runner.registry().names());

    print_banner(&backend);
    if !backend.is_available().await {
        println!(
            "{} {} is not reachable at {}. Slash commands still work; chat will fail until it is up.\n",
            style("⚠").yellow().bold(),
            backend.name(),
            config.llm.base_url
        );
    }

    let mut session = ChatSession::new(backend, runner, cache, config.llm.max_history);
    let theme = ColorfulTheme::default();
    let mut history = BasicHistory::new().max_entries(100).no_duplicates(true);
    let mut sink = TerminalSink::default();

    loop {
        let read = tokio::task::block_in_place(|| {
            Input::<String>::with_theme(&theme)
                .with_prompt("You")
                .allow_empty(true)
                .history_with(&mut history)
                .completion_with(&completion)
                .interact_text()
        });

        let line = match read {
            Ok(line) => line,
            Err(dialoguer::Error::IO(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::Interrupted | std::io::ErrorKind::UnexpectedEof
                ) =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if session.handle_input(&line, &mut sink).await == Flow::Exit {
            break;
        }
    }

    println!("Goodbye!");
    Ok(())
}
