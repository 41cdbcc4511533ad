//! Caller-created invocation requests and the duplex inbound event source.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{EngineError, Payload};

/// How results are delivered to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvokeMode {
    /// Run to completion, one terminal result
    Sync,
    /// Server-push streaming, intermediate chunks before the terminal result
    Sse,
    /// Bidirectional duplex, inbound events trigger nested runs
    Bidi,
}

impl InvokeMode {
    /// Whether this mode emits intermediate results through a chunk sink
    pub fn is_streaming(&self) -> bool {
        matches!(self, InvokeMode::Sse | InvokeMode::Bidi)
    }
}

/// One inbound duplex event: a payload or a source-side failure
pub type InboundEvent = Result<Payload, EngineError>;

/// Sending half handed to whatever feeds a duplex session
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<InboundEvent>,
}

impl EventSender {
    /// Push an event payload into the session
    pub async fn send(&self, payload: Payload) -> Result<(), EngineError> {
        self.tx
            .send(Ok(payload))
            .await
            .map_err(|_| EngineError::InboundSource("event source dropped".to_string()))
    }

    /// Push a source-side failure into the session; this terminates it
    pub async fn send_error(&self, error: EngineError) -> Result<(), EngineError> {
        self.tx
            .send(Err(error))
            .await
            .map_err(|_| EngineError::InboundSource("event source dropped".to_string()))
    }
}

/// Receiving half of the inbound event stream, owned by the router
#[derive(Debug)]
pub struct EventSource {
    rx: mpsc::Receiver<InboundEvent>,
}

impl EventSource {
    /// Create a connected sender/source pair with the given buffer size
    pub fn channel(buffer: usize) -> (EventSender, EventSource) {
        let (tx, rx) = mpsc::channel(buffer);
        (EventSender { tx }, EventSource { rx })
    }

    /// Receive the next inbound event; `None` once the source completes
    pub(crate) async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }
}

/// A single invocation request
///
/// Created by the caller and read-only to the engine. Only a `Bidi` request
/// carries an inbound event source; the router takes ownership of it before
/// any execution starts.
#[derive(Debug)]
pub struct Request {
    invoke_mode: InvokeMode,
    params: Payload,
    events: Option<EventSource>,
}

impl Request {
    /// Create a synchronous request
    pub fn sync(params: Payload) -> Self {
        Self {
            invoke_mode: InvokeMode::Sync,
            params,
            events: None,
        }
    }

    /// Create a streaming request
    pub fn sse(params: Payload) -> Self {
        Self {
            invoke_mode: InvokeMode::Sse,
            params,
            events: None,
        }
    }

    /// Create a duplex request with its inbound event source
    pub fn bidi(params: Payload, events: EventSource) -> Self {
        Self {
            invoke_mode: InvokeMode::Bidi,
            params,
            events: Some(events),
        }
    }

    /// Create the nested request for one inbound duplex event
    pub(crate) fn bidi_event(payload: Payload) -> Self {
        Self {
            invoke_mode: InvokeMode::Bidi,
            params: payload,
            events: None,
        }
    }

    /// The invocation mode tag
    pub fn invoke_mode(&self) -> InvokeMode {
        self.invoke_mode
    }

    /// The free-form parameter payload
    pub fn params(&self) -> &Payload {
        &self.params
    }

    /// Take the inbound event source, leaving the request without one
    pub(crate) fn take_event_source(&mut self) -> Option<EventSource> {
        self.events.take()
    }
}

// The inbound source is single-owner; clones carry the tag and params only.
impl Clone for Request {
    fn clone(&self) -> Self {
        Self {
            invoke_mode: self.invoke_mode,
            params: self.params.clone(),
            events: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_streaming() {
        assert!(!InvokeMode::Sync.is_streaming());
        assert!(InvokeMode::Sse.is_streaming());
        assert!(InvokeMode::Bidi.is_streaming());
    }

    #[tokio::test]
    async fn test_event_source_pair() {
        let (sender, mut source) = EventSource::channel(4);

        sender.send(Payload::new(json!("a"))).await.unwrap();
        drop(sender);

        let first = source.recv().await.unwrap().unwrap();
        assert_eq!(first.as_str(), Some("a"));
        assert!(source.recv().await.is_none());
    }

    #[test]
    fn test_clone_drops_event_source() {
        let (_sender, source) = EventSource::channel(1);
        let mut request = Request::bidi(Payload::null(), source);

        let mut clone = request.clone();
        assert!(clone.take_event_source().is_none());
        assert!(request.take_event_source().is_some());
    }
}
