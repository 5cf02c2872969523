//! Error types for Instability.

use thiserror::Error;

/// Default result type for Instability.
pub type InstabilityResult<T> = Result<T, InstabilityError>;

/// Errors that can surface from tools, the LLM backend, the cache or the CLI.
#[derive(Error, Debug)]
pub enum InstabilityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tool '{name}' not found. Available tools: {available}")]
    ToolNotFound { name: String, available: String },

    #[error("Invalid arguments for '{0}': {1}")]
    InvalidArguments(String, String),

    #[error("Tool '{0}' failed: {1}")]
    ToolFailed(String, String),

    #[error("Timed out while running '{0}'")]
    Timeout(String),

    #[error("LLM backend error: {0}")]
    Llm(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[cfg(feature = "cli")]
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(String),
}

impl InstabilityError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a tool failure for `tool`.
    pub fn tool_failed(tool: &str, msg: impl Into<String>) -> Self {
        Self::ToolFailed(tool.to_string(), msg.into())
    }

    /// Creates an argument validation error for `tool`.
    pub fn invalid_args(tool: &str, msg: impl Into<String>) -> Self {
        Self::InvalidArguments(tool.to_string(), msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_lists_available() {
        let err = InstabilityError::ToolNotFound {
            name: "nope".to_string(),
            available: "get_os_info, get_local_ip".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("get_local_ip"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: InstabilityError = io.into();
        assert!(matches!(err, InstabilityError::Io(_)));
    }
}
