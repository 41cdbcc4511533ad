//! Selects the execution strategy for a request by invocation mode.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::pipeline_executor::PipelineExecutor;
use crate::domain::channel::ResultChannel;
use crate::domain::process_engine::FlowDefinition;
use crate::domain::request::{InvokeMode, Request};
use crate::domain::result::FlowResult;
use crate::domain::scope::ExecutionScope;

/// Routes a request to the right execution strategy
///
/// `Sync` and `Sse` delegate directly to the [`PipelineExecutor`]; `Bidi`
/// subscribes to the request's inbound event source and fans out one
/// nested run per event, multiplexing every nested result onto one shared
/// channel.
pub struct InvocationRouter {
    executor: Arc<PipelineExecutor>,
}

impl InvocationRouter {
    /// Create a router over the given executor
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        Self { executor }
    }

    /// Execute a request, returning its result channel immediately
    pub fn route(&self, definition: &FlowDefinition, request: Request) -> Arc<ResultChannel> {
        match request.invoke_mode() {
            InvokeMode::Sync | InvokeMode::Sse => {
                let scope = ExecutionScope::for_request(request);
                self.executor.run(definition, scope)
            }
            InvokeMode::Bidi => self.run_duplex(definition, request),
        }
    }

    /// Long-lived duplex session: one nested run per inbound event
    ///
    /// Results from different events interleave by nested-run completion
    /// order, not by inbound arrival order; callers needing strict ordering
    /// must correlate through the result payload.
    fn run_duplex(&self, definition: &FlowDefinition, mut request: Request) -> Arc<ResultChannel> {
        let shared = Arc::new(ResultChannel::new());

        let Some(mut events) = request.take_event_source() else {
            let _ = shared.finish(FlowResult::fail(
                "INBOUND_SOURCE",
                "duplex request carries no inbound event source",
            ));
            return shared;
        };

        let executor = self.executor.clone();
        let definition = definition.clone();
        let channel = shared.clone();

        tokio::spawn(async move {
            let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

            loop {
                tokio::select! {
                    // A disposed shared channel ends the inbound subscription
                    // so no orphan nested runs keep spawning.
                    _ = channel.closed() => {
                        debug!(definition_id = %definition.definition_id, "duplex channel closed, dropping inbound subscription");
                        return;
                    }
                    inbound = events.recv() => match inbound {
                        Some(Ok(payload)) => {
                            let nested = Request::bidi_event(payload);
                            let scope = ExecutionScope::for_request(nested);
                            let nested_channel = executor.run(&definition, scope);
                            let shared = channel.clone();
                            // Nested results are forwarded as non-terminal
                            // publishes: one event's failure must not end the
                            // session for the others.
                            forwarders.push(tokio::spawn(async move {
                                let mut stream = nested_channel.subscribe();
                                while let Some(result) = stream.recv().await {
                                    if shared.publish(result).is_err() {
                                        break;
                                    }
                                }
                            }));
                        }
                        Some(Err(error)) => {
                            warn!(definition_id = %definition.definition_id, error = %error, "inbound source failed");
                            let _ = channel.finish(FlowResult::from_error(&error));
                            return;
                        }
                        None => break,
                    }
                }
            }

            // Inbound source exhausted: drain in-flight nested runs, then
            // complete the session.
            for handle in forwarders {
                let _ = handle.await;
            }
            debug!(definition_id = %definition.definition_id, "inbound source completed, closing duplex channel");
            let _ = channel.complete();
        });

        shared
    }
}
