//! Multicast, replayable result sink for one logical invocation.

use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, Notify};

use crate::domain::result::FlowResult;
use crate::EngineError;

struct ChannelState {
    buffer: Vec<FlowResult>,
    senders: Vec<mpsc::UnboundedSender<FlowResult>>,
    terminated: bool,
}

/// Append-only, replay-capable sequence of [`FlowResult`]s
///
/// A single logical invocation publishes into the channel; zero, one, or
/// many subscribers observe it. A subscriber attaching after some results
/// were already published still observes them, in original order, before
/// anything new. Once a terminal publish happens no further result is ever
/// accepted.
pub struct ResultChannel {
    state: Mutex<ChannelState>,
    closed: Notify,
}

impl ResultChannel {
    /// Create an open, empty channel
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                buffer: Vec::with_capacity(8),
                senders: Vec::new(),
                terminated: false,
            }),
            closed: Notify::new(),
        }
    }

    /// Publish an intermediate result; the channel stays open
    pub fn publish(&self, result: FlowResult) -> Result<(), EngineError> {
        let mut state = self.lock_state()?;
        if state.terminated {
            return Err(EngineError::ChannelClosed(
                "publish after terminal result".to_string(),
            ));
        }
        state.buffer.push(result.clone());
        state.senders.retain(|tx| tx.send(result.clone()).is_ok());
        Ok(())
    }

    /// Publish a terminal result and complete the channel
    pub fn finish(&self, result: FlowResult) -> Result<(), EngineError> {
        let mut state = self.lock_state()?;
        if state.terminated {
            return Err(EngineError::ChannelClosed(
                "finish after terminal result".to_string(),
            ));
        }
        state.buffer.push(result.clone());
        state.senders.retain(|tx| tx.send(result.clone()).is_ok());
        state.terminated = true;
        // Dropping the senders ends every live subscriber stream.
        state.senders.clear();
        drop(state);
        self.closed.notify_waiters();
        Ok(())
    }

    /// Complete the channel without a further result (duplex session end)
    pub fn complete(&self) -> Result<(), EngineError> {
        let mut state = self.lock_state()?;
        if state.terminated {
            return Err(EngineError::ChannelClosed(
                "complete after terminal result".to_string(),
            ));
        }
        state.terminated = true;
        state.senders.clear();
        drop(state);
        self.closed.notify_waiters();
        Ok(())
    }

    /// Cancel the channel: terminate it and detach every subscriber
    ///
    /// In duplex mode this also stops the inbound-event subscription; nested
    /// runs already started run to completion unobserved.
    pub fn dispose(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.terminated = true;
            state.senders.clear();
        }
        self.closed.notify_waiters();
    }

    /// Whether a terminal publish (or disposal) has happened
    pub fn is_terminated(&self) -> bool {
        self.state.lock().map(|s| s.terminated).unwrap_or(true)
    }

    /// Attach a subscriber, replaying the full history first
    pub fn subscribe(&self) -> ResultStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut state) = self.state.lock() {
            for result in &state.buffer {
                // A receiver created here cannot be gone yet.
                let _ = tx.send(result.clone());
            }
            if !state.terminated {
                state.senders.push(tx);
            }
        }
        ResultStream { rx }
    }

    /// Snapshot of everything published so far, in publish order
    pub fn history(&self) -> Vec<FlowResult> {
        self.state
            .lock()
            .map(|s| s.buffer.clone())
            .unwrap_or_default()
    }

    /// Resolve once the channel is terminated or disposed
    pub async fn closed(&self) {
        loop {
            let notified = self.closed.notified();
            if self.is_terminated() {
                return;
            }
            notified.await;
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, ChannelState>, EngineError> {
        self.state
            .lock()
            .map_err(|e| EngineError::Other(format!("channel lock poisoned: {}", e)))
    }
}

impl Default for ResultChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResultChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (len, terminated) = self
            .state
            .lock()
            .map(|s| (s.buffer.len(), s.terminated))
            .unwrap_or((0, true));
        f.debug_struct("ResultChannel")
            .field("published", &len)
            .field("terminated", &terminated)
            .finish()
    }
}

/// Subscriber view of a [`ResultChannel`]
///
/// Yields replayed history first, then live results, and ends when the
/// channel terminates.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::UnboundedReceiver<FlowResult>,
}

impl ResultStream {
    /// Receive the next result; `None` once the channel has terminated
    pub async fn recv(&mut self) -> Option<FlowResult> {
        self.rx.recv().await
    }

    /// Drain the stream to completion
    pub async fn collect_all(mut self) -> Vec<FlowResult> {
        let mut results = Vec::new();
        while let Some(result) = self.rx.recv().await {
            results.push(result);
        }
        results
    }
}

impl Stream for ResultStream {
    type Item = FlowResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
