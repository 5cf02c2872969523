//! Conversation loop between the user, the model and the tools.

use serde_json::{json, Value};

use super::commands::{help_lines, SlashCommand};
use super::protocol::{extract_thinking, parse_tool_call};
use crate::cache::{CacheEntry, ResultCache};
use crate::llm::ChatBackend;
use crate::tools::{ToolRun, ToolRunner};
use crate::types::messages::ChatMessage;

/// Number of pinned system messages at the head of the conversation.
const PINNED_MESSAGES: usize = 2;

const SYSTEM_PROMPT: &str = "\
You are a network diagnostics specialist that helps troubleshoot connectivity issues.
You have access to various networking tools that can be called to diagnose problems.
When you need specific information, call a tool using this format:

TOOL: tool_name
ARGS: {\"arg_name\": \"value\"} (or {} if no arguments are needed)

Request at most one tool per reply. After a tool runs you will receive its output
as a system message starting with \"Tool result:\".
Always explain what the tools do and what the results mean.
If you are unsure about a problem, suggest several possible diagnoses and how to confirm them.";

/// Something the front end should show.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A request to the model is in flight.
    AwaitingModel,
    /// Reasoning split from the model's reply.
    Thinking(String),
    /// Visible model reply.
    Assistant(String),
    /// A tool is about to run.
    ToolStarted(String),
    /// A tool finished, successfully or not.
    ToolFinished(ToolRun),
    /// Recoverable error; the session goes on.
    Error(String),
    /// Neutral notice.
    Info(String),
    /// `/help` listing.
    Help(Vec<(&'static str, &'static str)>),
    /// `/tools` listing: name and description.
    Tools(Vec<(&'static str, &'static str)>),
    /// `/cache` listing.
    Cache(Vec<(String, CacheEntry)>),
    /// `/history` listing, pinned messages excluded.
    History(Vec<ChatMessage>),
}

/// Receives events as the session produces them.
pub trait EventSink {
    fn emit(&mut self, event: ChatEvent);
}

impl EventSink for Vec<ChatEvent> {
    fn emit(&mut self, event: ChatEvent) {
        self.push(event);
    }
}

/// What the caller should do after a line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// An interactive chat session.
///
/// Owns the conversation, the result cache and the tool runner. LLM failures
/// are reported as events and never end the session, so slash commands keep
/// working without a model.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    runner: ToolRunner,
    cache: ResultCache,
    conversation: Vec<ChatMessage>,
    max_history: usize,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B, runner: ToolRunner, cache: ResultCache, max_history: usize) -> Self {
        let conversation = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::system(format!(
                "Available tools:\n{}",
                runner.registry().catalogue()
            )),
        ];

        Self {
            backend,
            runner,
            cache,
            conversation,
            max_history,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Full conversation as sent to the model.
    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    /// Conversation without the pinned system messages.
    pub fn history(&self) -> &[ChatMessage] {
        &self.conversation[PINNED_MESSAGES..]
    }

    /// Drops everything but the pinned system messages.
    pub fn clear_history(&mut self) {
        self.conversation.truncate(PINNED_MESSAGES);
    }

    /// Handles one line of user input.
    pub async fn handle_input(&mut self, input: &str, sink: &mut dyn EventSink) -> Flow {
        let input = input.trim();
        if input.is_empty() {
            return Flow::Continue;
        }

        match SlashCommand::parse(input) {
            Some(command) => self.handle_command(command, sink).await,
            None => {
                self.chat_turn(input, sink).await;
                Flow::Continue
            }
        }
    }

    async fn handle_command(&mut self, command: SlashCommand, sink: &mut dyn EventSink) -> Flow {
        match command {
            SlashCommand::Exit => return Flow::Exit,
            SlashCommand::Help => sink.emit(ChatEvent::Help(help_lines())),
            SlashCommand::Clear => {
                self.clear_history();
                sink.emit(ChatEvent::Info("Conversation history cleared".to_string()));
            }
            SlashCommand::Tools => {
                let tools = self
                    .runner
                    .registry()
                    .iter()
                    .map(|t| (t.name(), t.description()))
                    .collect();
                sink.emit(ChatEvent::Tools(tools));
            }
            SlashCommand::Cache => {
                let entries = self
                    .cache
                    .entries()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                sink.emit(ChatEvent::Cache(entries));
            }
            SlashCommand::History => sink.emit(ChatEvent::History(self.history().to_vec())),
            SlashCommand::Tool(name) => {
                let resolved = self.runner.registry().find(&name).map(|t| t.name());
                match resolved {
                    Some(tool) => {
                        self.run_tool(tool, &json!({}), sink).await;
                    }
                    None => sink.emit(ChatEvent::Error(format!("Unknown command or tool: /{}", name))),
                }
            }
        }
        Flow::Continue
    }

    /// Runs a registered tool, recording the result in the cache.
    pub async fn run_tool(&mut self, name: &str, args: &Value, sink: &mut dyn EventSink) -> Option<ToolRun> {
        sink.emit(ChatEvent::ToolStarted(name.to_string()));

        match self.runner.run(name, args, &mut self.cache).await {
            Ok(run) => {
                sink.emit(ChatEvent::ToolFinished(run.clone()));
                Some(run)
            }
            Err(e) => {
                sink.emit(ChatEvent::Error(e.to_string()));
                None
            }
        }
    }

    async fn ask_model(&self, sink: &mut dyn EventSink) -> Option<String> {
        sink.emit(ChatEvent::AwaitingModel);
        match self.backend.chat(&self.conversation).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Model request failed");
                sink.emit(ChatEvent::Error(format!("Error generating response: {}", e)));
                None
            }
        }
    }

    async fn chat_turn(&mut self, input: &str, sink: &mut dyn EventSink) {
        self.conversation.push(ChatMessage::user(input));

        if let Some(reply) = self.ask_model(sink).await {
            let (thinking, content) = extract_thinking(&reply);
            if let Some(thinking) = thinking {
                sink.emit(ChatEvent::Thinking(thinking));
            }

            match parse_tool_call(&content) {
                Some(call) => {
                    sink.emit(ChatEvent::Assistant(content.clone()));

                    if self.runner.registry().contains(&call.name) {
                        self.tool_turn(&call.name, &call.args, content, sink).await;
                    } else {
                        let msg = format!("Tool not found: {}", call.name);
                        sink.emit(ChatEvent::Error(msg.clone()));
                        self.conversation.push(ChatMessage::system(msg));
                    }
                }
                None => {
                    self.conversation.push(ChatMessage::assistant(content.clone()));
                    sink.emit(ChatEvent::Assistant(content));
                }
            }
        }

        self.trim_history();
    }

    async fn tool_turn(&mut self, name: &str, args: &Value, content: String, sink: &mut dyn EventSink) {
        let Some(run) = self.run_tool(name, args, sink).await else {
            return;
        };

        if !run.ok {
            let msg = format!("Error executing tool {}: {}", name, run.output);
            self.conversation.push(ChatMessage::system(msg));
            return;
        }

        self.conversation.push(ChatMessage::assistant(content));
        self.conversation
            .push(ChatMessage::system(format!("Tool result: {}", run.output)));

        if let Some(follow_up) = self.ask_model(sink).await {
            let (thinking, content) = extract_thinking(&follow_up);
            if let Some(thinking) = thinking {
                sink.emit(ChatEvent::Thinking(thinking));
            }
            if !content.is_empty() {
                self.conversation.push(ChatMessage::assistant(content.clone()));
                sink.emit(ChatEvent::Assistant(content));
            }
        }
    }

    /// Keeps the pinned messages and the most recent `max_history` others.
    fn trim_history(&mut self) {
        let limit = PINNED_MESSAGES + self.max_history;
        if self.conversation.len() > limit {
            let excess = self.conversation.len() - limit;
            self.conversation.drain(PINNED_MESSAGES..PINNED_MESSAGES + excess);
            tracing::debug!(dropped = excess, "Trimmed conversation history");
        }
    }
}
