//! Drives one execution of a deployed flow to completion or suspension.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::signal_bridge::SignalBridge;
use crate::domain::channel::ResultChannel;
use crate::domain::context::ChunkSink;
use crate::domain::process_engine::{FlowDefinition, ProcessEngine, StartOutcome};
use crate::domain::result::FlowResult;
use crate::domain::scope::ExecutionScope;
use crate::domain::task_instance::TaskInstance;

/// Executes one run of a flow definition against the process engine
///
/// `run` never blocks and never returns an error: the caller receives a
/// [`ResultChannel`] immediately and observes completion, suspension
/// silence, or failure there. Start-time caller errors are published as an
/// immediate failing result, keeping "errors are channel events" as the
/// single success/failure path.
pub struct PipelineExecutor {
    process_engine: Arc<dyn ProcessEngine>,
    signal_bridge: Arc<SignalBridge>,
}

impl PipelineExecutor {
    /// Create an executor over the given engine and bridge
    pub fn new(process_engine: Arc<dyn ProcessEngine>, signal_bridge: Arc<SignalBridge>) -> Self {
        Self {
            process_engine,
            signal_bridge,
        }
    }

    /// Start a run, returning its result channel immediately
    pub fn run(&self, definition: &FlowDefinition, scope: ExecutionScope) -> Arc<ResultChannel> {
        let channel = Arc::new(ResultChannel::new());
        self.run_into(definition, scope, channel.clone());
        channel
    }

    /// Start a run that publishes into an existing channel
    pub(crate) fn run_into(
        &self,
        definition: &FlowDefinition,
        mut scope: ExecutionScope,
        channel: Arc<ResultChannel>,
    ) {
        if let Err(e) = scope.validate() {
            warn!(definition_id = %definition.definition_id, error = %e, "invalid scope");
            let _ = channel.finish(FlowResult::from_error(&e));
            return;
        }

        // Streaming runs surface activity chunks as intermediate results.
        if scope.system_context.invoke_mode().is_streaming() {
            scope
                .system_context
                .attach_chunk_sink(ChunkSink::new(channel.clone()));
        }

        let engine = self.process_engine.clone();
        let bridge = self.signal_bridge.clone();
        let definition = definition.clone();
        // Captured before the scope moves into the engine; a suspension
        // must restore these verbatim on resume.
        let task_request = scope.origin_request.clone();
        let task_context = scope.system_context.clone();

        tokio::spawn(async move {
            match engine.start(&definition, scope).await {
                Ok(StartOutcome::Completed(result)) => {
                    debug!(
                        definition_id = %definition.definition_id,
                        success = result.is_success(),
                        "run completed"
                    );
                    if let Err(e) = channel.finish(result) {
                        debug!(definition_id = %definition.definition_id, error = %e, "terminal publish dropped");
                    }
                }
                Ok(StartOutcome::Suspended {
                    process_instance_id,
                    activity_id,
                }) => {
                    debug!(
                        definition_id = %definition.definition_id,
                        instance_id = %process_instance_id.0,
                        activity_id = %activity_id.0,
                        "run suspended"
                    );
                    let task = TaskInstance::new(
                        process_instance_id,
                        activity_id,
                        task_request,
                        task_context,
                    );
                    // Channel stays open; nothing is published until a signal.
                    bridge.register(task, channel);
                }
                Err(e) => {
                    warn!(definition_id = %definition.definition_id, error = %e, "run failed to start");
                    let _ = channel.finish(FlowResult::from_error(&e));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::SystemContext;
    use crate::domain::process_engine::memory::MemoryProcessEngine;
    use crate::domain::process_engine::Canvas;
    use crate::{Payload, Request};
    use serde_json::json;

    fn executor_over(engine: Arc<MemoryProcessEngine>) -> PipelineExecutor {
        let bridge = Arc::new(SignalBridge::new(engine.clone()));
        PipelineExecutor::new(engine, bridge)
    }

    async fn deploy(engine: &MemoryProcessEngine, canvas: Canvas) -> FlowDefinition {
        use crate::domain::process_engine::ProcessEngine;
        engine.deploy(&canvas).await.unwrap()
    }

    #[tokio::test]
    async fn test_start_error_is_a_channel_event() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let executor = executor_over(engine);

        let ghost = FlowDefinition {
            definition_id: "ghost".to_string(),
            version: "1.0.0".to_string(),
        };
        let scope = ExecutionScope::for_request(Request::sync(Payload::null()));
        let channel = executor.run(&ghost, scope);

        let results = channel.subscribe().collect_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error().unwrap().code, "PROCESS_START");
    }

    #[tokio::test]
    async fn test_invalid_scope_is_a_channel_event() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let canvas = Canvas::new(
            "echo_flow",
            "1.0.0",
            json!({"activities": [{"id": "final", "kind": "echo"}]}),
        );
        let definition = deploy(&engine, canvas).await;
        let executor = executor_over(engine);

        // Context derived from a request with a different mode tag.
        let mismatched = ExecutionScope::new(
            Request::sync(Payload::null()),
            SystemContext::from_request(&Request::sse(Payload::null())),
        );
        let channel = executor.run(&definition, mismatched);

        let results = channel.subscribe().collect_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error().unwrap().code, "INVALID_SCOPE");
    }

    #[tokio::test]
    async fn test_sse_run_streams_chunks_before_terminal() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let canvas = Canvas::new(
            "stream_flow",
            "1.0.0",
            json!({"activities": [
                {"id": "draft", "kind": "emit", "output": "partial one"},
                {"id": "revise", "kind": "emit", "output": "partial two"},
                {"id": "final", "kind": "echo"}
            ]}),
        );
        let definition = deploy(&engine, canvas).await;
        let executor = executor_over(engine);

        let scope =
            ExecutionScope::for_request(Request::sse(Payload::new(json!({"q": "stream"}))));
        let channel = executor.run(&definition, scope);

        let results = channel.subscribe().collect_all().await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].payload().unwrap().as_str(), Some("partial one"));
        assert_eq!(results[1].payload().unwrap().as_str(), Some("partial two"));
        assert_eq!(results[2].payload().unwrap().as_value()["q"], "stream");
        assert!(channel.is_terminated());
    }

    #[tokio::test]
    async fn test_sync_run_drops_chunks() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let canvas = Canvas::new(
            "quiet_flow",
            "1.0.0",
            json!({"activities": [
                {"id": "draft", "kind": "emit", "output": "partial"},
                {"id": "final", "kind": "echo"}
            ]}),
        );
        let definition = deploy(&engine, canvas).await;
        let executor = executor_over(engine);

        let scope =
            ExecutionScope::for_request(Request::sync(Payload::new(json!({"q": "quiet"}))));
        let channel = executor.run(&definition, scope);

        // No chunk sink in sync mode; only the terminal result appears.
        let results = channel.subscribe().collect_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload().unwrap().as_value()["q"], "quiet");
    }
}
