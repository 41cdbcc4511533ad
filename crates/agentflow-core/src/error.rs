//! Error types for the engine.

use thiserror::Error;

/// Error type for the AgentFlow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Canvas compilation/deployment error
    #[error("Canvas compilation error: {0}")]
    Compilation(String),

    /// Process start error
    #[error("Process start error: {0}")]
    ProcessStart(String),

    /// Process instance not found
    #[error("Process instance not found: {0}")]
    ProcessInstanceNotFound(String),

    /// No pending suspension for a task key
    #[error("Unknown task instance: {0}")]
    UnknownTaskInstance(String),

    /// Signal delivery error
    #[error("Signal error: {0}")]
    SignalError(String),

    /// Result channel already terminated
    #[error("Result channel closed: {0}")]
    ChannelClosed(String),

    /// Execution scope is missing or carries inconsistent data
    #[error("Invalid execution scope: {0}")]
    InvalidScope(String),

    /// Inbound event source error in a duplex session
    #[error("Inbound source error: {0}")]
    InboundSource(String),

    /// Model adapter error
    #[error("Model adapter error: {0}")]
    ModelAdapter(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<String> for EngineError {
    fn from(err: String) -> Self {
        EngineError::Other(err)
    }
}

impl From<&str> for EngineError {
    fn from(err: &str) -> Self {
        EngineError::Other(err.to_string())
    }
}
