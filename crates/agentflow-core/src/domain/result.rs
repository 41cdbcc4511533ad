//! Terminal and intermediate values published into a result channel.

use serde::{Deserialize, Serialize};

use crate::{EngineError, Payload};

/// Captured failure cause carried by a failing [`FlowResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowError {
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl FlowError {
    /// Create a new flow error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&EngineError> for FlowError {
    fn from(err: &EngineError) -> Self {
        let code = match err {
            EngineError::Compilation(_) => "COMPILATION",
            EngineError::ProcessStart(_) => "PROCESS_START",
            EngineError::ProcessInstanceNotFound(_) => "PROCESS_INSTANCE_NOT_FOUND",
            EngineError::UnknownTaskInstance(_) => "UNKNOWN_TASK_INSTANCE",
            EngineError::SignalError(_) => "SIGNAL_ERROR",
            EngineError::ChannelClosed(_) => "CHANNEL_CLOSED",
            EngineError::InvalidScope(_) => "INVALID_SCOPE",
            EngineError::InboundSource(_) => "INBOUND_SOURCE",
            EngineError::ModelAdapter(_) => "MODEL_ADAPTER",
            EngineError::Serialization(_) => "SERIALIZATION",
            EngineError::Other(_) => "INTERNAL",
        };
        Self::new(code, err.to_string())
    }
}

/// A success payload or a captured failure, never both
///
/// Failures inside the engine are data on the channel, not propagated
/// exceptions: every boundary that crosses into the channel abstraction
/// converts errors into a failing `FlowResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowResult {
    /// Successful payload
    Success(Payload),
    /// Captured failure
    Failure(FlowError),
}

impl FlowResult {
    /// Create a successful result
    pub fn ok(payload: Payload) -> Self {
        FlowResult::Success(payload)
    }

    /// Create a failing result
    pub fn fail(code: impl Into<String>, message: impl Into<String>) -> Self {
        FlowResult::Failure(FlowError::new(code, message))
    }

    /// Capture an engine error as a failing result
    pub fn from_error(err: &EngineError) -> Self {
        FlowResult::Failure(FlowError::from(err))
    }

    /// Whether this is a success result
    pub fn is_success(&self) -> bool {
        matches!(self, FlowResult::Success(_))
    }

    /// The success payload, if any
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            FlowResult::Success(payload) => Some(payload),
            FlowResult::Failure(_) => None,
        }
    }

    /// The failure cause, if any
    pub fn error(&self) -> Option<&FlowError> {
        match self {
            FlowResult::Success(_) => None,
            FlowResult::Failure(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_xor_failure() {
        let ok = FlowResult::ok(Payload::new(json!({"answer": 4})));
        assert!(ok.is_success());
        assert!(ok.payload().is_some());
        assert!(ok.error().is_none());

        let fail = FlowResult::fail("PROCESS_START", "engine unreachable");
        assert!(!fail.is_success());
        assert!(fail.payload().is_none());
        assert_eq!(fail.error().unwrap().code, "PROCESS_START");
    }

    #[test]
    fn test_from_engine_error() {
        let err = EngineError::UnknownTaskInstance("p1/a1".to_string());
        let result = FlowResult::from_error(&err);

        let cause = result.error().unwrap();
        assert_eq!(cause.code, "UNKNOWN_TASK_INSTANCE");
        assert!(cause.message.contains("p1/a1"));
    }
}
