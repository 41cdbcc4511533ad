//! Per-invocation system context and the streaming chunk sink.

use std::sync::Arc;

use crate::domain::channel::ResultChannel;
use crate::domain::request::{InvokeMode, Request};
use crate::domain::result::FlowResult;
use crate::{EngineError, Payload};

/// Publishes intermediate results into the invocation's result channel
#[derive(Clone)]
pub struct ChunkSink {
    channel: Arc<ResultChannel>,
}

impl ChunkSink {
    pub(crate) fn new(channel: Arc<ResultChannel>) -> Self {
        Self { channel }
    }

    /// Emit one intermediate result; fails once the channel is terminal
    pub fn emit(&self, result: FlowResult) -> Result<(), EngineError> {
        self.channel.publish(result)
    }
}

impl std::fmt::Debug for ChunkSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSink").finish()
    }
}

/// Per-invocation execution state visible to activities
///
/// Derived once per logical invocation from a [`Request`] and owned by the
/// run that created it. A suspending run captures the context by value into
/// its task instance so that resumption restores it verbatim, independent
/// of whatever changed in the system since suspension.
#[derive(Debug, Clone)]
pub struct SystemContext {
    invoke_mode: InvokeMode,
    params: Payload,
    chunk_sink: Option<ChunkSink>,
}

impl SystemContext {
    /// Derive a context from a request; no chunk sink is attached yet
    pub fn from_request(request: &Request) -> Self {
        Self {
            invoke_mode: request.invoke_mode(),
            params: request.params().clone(),
            chunk_sink: None,
        }
    }

    /// The invocation mode tag
    pub fn invoke_mode(&self) -> InvokeMode {
        self.invoke_mode
    }

    /// The original request parameters
    pub fn params(&self) -> &Payload {
        &self.params
    }

    /// The incremental-chunk sink, present only for streaming runs
    pub fn chunk_sink(&self) -> Option<&ChunkSink> {
        self.chunk_sink.as_ref()
    }

    pub(crate) fn attach_chunk_sink(&mut self, sink: ChunkSink) {
        self.chunk_sink = Some(sink);
    }

    /// Emit an intermediate result if a chunk sink is attached
    ///
    /// Non-streaming runs silently drop the chunk; the activity does not
    /// need to know the invocation mode to call this.
    pub fn emit_chunk(&self, result: FlowResult) -> Result<(), EngineError> {
        match &self.chunk_sink {
            Some(sink) => sink.emit(result),
            None => {
                tracing::trace!(mode = ?self.invoke_mode, "chunk dropped, no sink attached");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_derivation() {
        let request = Request::sse(Payload::new(json!({"q": "hi"})));
        let context = SystemContext::from_request(&request);

        assert_eq!(context.invoke_mode(), InvokeMode::Sse);
        assert_eq!(context.params(), request.params());
        assert!(context.chunk_sink().is_none());
    }

    #[tokio::test]
    async fn test_emit_chunk_publishes_to_channel() {
        let channel = Arc::new(ResultChannel::new());
        let request = Request::sse(Payload::null());
        let mut context = SystemContext::from_request(&request);
        context.attach_chunk_sink(ChunkSink::new(channel.clone()));

        let chunk = FlowResult::ok(Payload::new(json!("partial")));
        context.emit_chunk(chunk.clone()).unwrap();

        assert_eq!(channel.history(), vec![chunk]);
    }

    #[test]
    fn test_emit_chunk_without_sink_is_noop() {
        let request = Request::sync(Payload::null());
        let context = SystemContext::from_request(&request);

        context
            .emit_chunk(FlowResult::ok(Payload::null()))
            .unwrap();
    }
}
