//! Typed execution scope exchanged with the process engine.

use std::collections::HashMap;

use crate::domain::context::SystemContext;
use crate::domain::request::Request;
use crate::domain::result::FlowResult;
use crate::domain::task_instance::ActivityId;
use crate::EngineError;

/// Well-known keys for the engine-facing open payload map
pub mod keys {
    /// The original caller request
    pub const ORIGIN_REQUEST: &str = "ORIGIN_REQUEST";
    /// The per-invocation system context
    pub const SYSTEM_CONTEXT: &str = "SYSTEM_CONTEXT";
    /// The externally produced value injected by a signal
    pub const CALLBACK_RESULT: &str = "CALLBACK_RESULT";
    /// Prefix under which each activity's output is recorded
    pub const ACTIVITY_OUTPUT_PREFIX: &str = "out.";
}

/// The variable bundle handed to the process engine when starting or
/// resuming a run
///
/// The engine-facing contract used to be an untyped string-keyed map; the
/// fixed entries are named fields here, while activities keep an
/// open-ended `payload` map for business data.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    /// The original request, under the well-known `ORIGIN_REQUEST` slot
    pub origin_request: Request,
    /// The system context, under the well-known `SYSTEM_CONTEXT` slot
    pub system_context: SystemContext,
    /// The signal value, under the well-known `CALLBACK_RESULT` slot
    pub callback_result: Option<FlowResult>,
    /// Open-ended business data read and written by activities
    pub payload: HashMap<String, serde_json::Value>,
}

impl ExecutionScope {
    /// Build a scope from a request, deriving the system context
    pub fn for_request(request: Request) -> Self {
        let system_context = SystemContext::from_request(&request);
        Self::new(request, system_context)
    }

    /// Build a scope from a request and an already-captured context
    pub fn new(origin_request: Request, system_context: SystemContext) -> Self {
        Self {
            origin_request,
            system_context,
            callback_result: None,
            payload: HashMap::new(),
        }
    }

    /// Inject the externally produced value for a resume
    pub fn set_callback_result(&mut self, result: FlowResult) {
        self.callback_result = Some(result);
    }

    /// Record one activity's output in the open payload map
    pub fn record_activity_output(&mut self, activity_id: &ActivityId, result: &FlowResult) {
        if let Ok(value) = serde_json::to_value(result) {
            self.payload
                .insert(format!("{}{}", keys::ACTIVITY_OUTPUT_PREFIX, activity_id.0), value);
        }
    }

    /// Look up a previously recorded activity output
    pub fn activity_output(&self, activity_id: &ActivityId) -> Option<&serde_json::Value> {
        self.payload
            .get(&format!("{}{}", keys::ACTIVITY_OUTPUT_PREFIX, activity_id.0))
    }

    // The typed fields rule out most of the missing-variable class; the one
    // caller error left is a request/context mode mismatch.
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.origin_request.invoke_mode() != self.system_context.invoke_mode() {
            return Err(EngineError::InvalidScope(format!(
                "request mode {:?} does not match context mode {:?}",
                self.origin_request.invoke_mode(),
                self.system_context.invoke_mode()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Payload, Request};
    use serde_json::json;

    #[test]
    fn test_activity_output_roundtrip() {
        let mut scope = ExecutionScope::for_request(Request::sync(Payload::null()));
        let activity = ActivityId("search".to_string());
        let result = FlowResult::ok(Payload::new(json!({"hits": 3})));

        scope.record_activity_output(&activity, &result);

        let stored = scope.activity_output(&activity).unwrap();
        let back: FlowResult = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(back, result);
        assert!(scope.payload.contains_key("out.search"));
    }

    #[test]
    fn test_validate_mode_mismatch() {
        let sync_request = Request::sync(Payload::null());
        let sse_context = SystemContext::from_request(&Request::sse(Payload::null()));
        let scope = ExecutionScope::new(sync_request, sse_context);

        assert!(matches!(
            scope.validate(),
            Err(EngineError::InvalidScope(_))
        ));
    }

    #[test]
    fn test_validate_consistent_scope() {
        let scope = ExecutionScope::for_request(Request::sse(Payload::null()));
        assert!(scope.validate().is_ok());
    }
}
