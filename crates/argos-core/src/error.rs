//! Error types shared by the registry, dispatcher, plugins and transport.

use thiserror::Error;

/// Result alias used throughout Argos
pub type ArgosResult<T> = Result<T, ArgosError>;

#[derive(Debug, Error)]
pub enum ArgosError {
    /// Dispatch received a call for a name that was never registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A handler failed; the message is surfaced to the caller verbatim
    #[error("{0}")]
    Tool(String),

    /// A second descriptor was registered under an existing name
    #[error("Tool already registered: {0}")]
    RegistrationConflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ArgosError {
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// True when the error came from the dispatcher itself rather than a handler
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ToolNotFound(_))
    }
}
