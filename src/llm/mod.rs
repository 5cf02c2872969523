//! LLM backends.
//!
//! The chat session talks to a [`ChatBackend`]; [`OllamaClient`] is the one
//! shipped implementation.

mod base;
mod ollama;

pub use base::ChatBackend;
pub use ollama::OllamaClient;
