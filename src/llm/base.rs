//! Base trait for LLM backends.

use async_trait::async_trait;

use crate::types::messages::ChatMessage;
use crate::InstabilityResult;

/// A chat-capable LLM backend.
///
/// The backend is stateless: the whole conversation is sent on every call and
/// the session keeps the history.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the backend name.
    fn name(&self) -> &str;

    /// Returns the model the backend talks to.
    fn model(&self) -> &str;

    /// Checks whether the backend answers at all.
    async fn is_available(&self) -> bool {
        self.list_models().await.is_ok()
    }

    /// Lists the models installed on the backend.
    async fn list_models(&self) -> InstabilityResult<Vec<String>>;

    /// Sends the conversation and returns the assistant's reply.
    async fn chat(&self, messages: &[ChatMessage]) -> InstabilityResult<String>;
}
