//! # Instability
//!
//! Network diagnostics chatbot for the terminal.
//!
//! A local LLM served by Ollama talks with the user and asks for diagnostic
//! tools (DNS resolvers and root servers, NTP, WHOIS, IMAP, websites, CDNs,
//! cloud status pages, external IP, ping, speed test). Tool results are kept
//! in a small JSON cache between runs.
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface and interactive front end
//! - [`chat`] - Conversation loop, tool-call protocol and slash commands
//! - [`llm`] - Chat backends (Ollama)
//! - [`tools`] - Diagnostic tools, registry and runner
//! - [`cache`] - Persistent JSON result cache
//! - [`report`] - Batch report formatting
//! - [`types`] - Shared types

pub mod cache;
pub mod chat;
#[cfg(feature = "cli")]
pub mod cli;
pub mod llm;
pub mod report;
pub mod tools;
pub mod types;

pub use types::config::Config;
pub use types::errors::{InstabilityError, InstabilityResult};
