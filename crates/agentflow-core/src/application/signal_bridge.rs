//! Suspend/resume bookkeeping: the bridge between external callbacks and
//! parked process instances.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::domain::channel::ResultChannel;
use crate::domain::process_engine::{ProcessEngine, StartOutcome};
use crate::domain::result::FlowResult;
use crate::domain::scope::ExecutionScope;
use crate::domain::task_instance::{TaskInstance, TaskKey};
use crate::{EngineError, Payload};

struct PendingSuspension {
    task: TaskInstance,
    channel: Arc<ResultChannel>,
}

/// The suspend/resume state machine
///
/// Records one [`TaskInstance`] per pending suspension, keyed by
/// `(process instance, activity)`, together with the channel the original
/// run publishes into. A signal resumes the parked instance through the
/// process engine using the captured request and context; its effect is
/// observed on that original channel, never as a return value.
pub struct SignalBridge {
    process_engine: Arc<dyn ProcessEngine>,
    pending: DashMap<TaskKey, PendingSuspension>,
}

impl SignalBridge {
    /// Create a bridge over the given process engine
    pub fn new(process_engine: Arc<dyn ProcessEngine>) -> Self {
        Self {
            process_engine,
            pending: DashMap::new(),
        }
    }

    /// Record a suspension together with the channel awaiting its outcome
    pub(crate) fn register(&self, task: TaskInstance, channel: Arc<ResultChannel>) {
        debug!(
            task_id = %task.id.0,
            instance_id = %task.process_instance_id.0,
            activity_id = %task.activity_id.0,
            "suspension registered"
        );
        self.pending
            .insert(task.key(), PendingSuspension { task, channel });
    }

    /// Keys of every suspension still awaiting a signal
    ///
    /// There is no built-in expiry for abandoned suspensions; operational
    /// layers can watch this set to implement one.
    pub fn pending_tasks(&self) -> Vec<TaskKey> {
        self.pending.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of pending suspensions
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Resume the suspension addressed by `key` with an external value
    ///
    /// Effective at most once per task instance: the pending record is
    /// removed before resuming, so a second call fails with
    /// [`EngineError::UnknownTaskInstance`] and cannot touch any other
    /// process instance. Engine-side failures (expired or unknown
    /// instance) are returned to the caller, published as a terminal
    /// failure on the original channel, and not retried.
    pub async fn signal(&self, key: &TaskKey, value: Payload) -> Result<(), EngineError> {
        let (_, pending) = self.pending.remove(key).ok_or_else(|| {
            EngineError::UnknownTaskInstance(format!("no pending suspension for {}", key))
        })?;
        let PendingSuspension { task, channel } = pending;

        let callback = FlowResult::ok(value);
        let mut scope = ExecutionScope::new(task.request.clone(), task.system_context.clone());
        scope.set_callback_result(callback.clone());

        let outcome = match self
            .process_engine
            .signal(&key.process_instance_id, &key.activity_id, scope, callback)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let error =
                    EngineError::SignalError(format!("resume failed for {}: {}", key, e));
                // The suspension record is gone; subscribers of the original
                // run learn about the dead end through a terminal failure.
                let _ = channel.finish(FlowResult::from_error(&error));
                return Err(error);
            }
        };

        match outcome {
            StartOutcome::Completed(result) => {
                info!(
                    task_id = %task.id.0,
                    instance_id = %key.process_instance_id.0,
                    success = result.is_success(),
                    "resumed run reached terminal state"
                );
                if let Err(e) = channel.finish(result) {
                    debug!(task_id = %task.id.0, error = %e, "terminal publish dropped");
                }
            }
            StartOutcome::Suspended {
                process_instance_id,
                activity_id,
            } => {
                // Parked again further along; same request, context, and channel.
                let next = TaskInstance::new(
                    process_instance_id,
                    activity_id,
                    task.request,
                    task.system_context,
                );
                self.register(next, channel);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::process_engine::memory::MemoryProcessEngine;
    use crate::domain::process_engine::{Canvas, ProcessEngine};
    use crate::domain::context::SystemContext;
    use crate::Request;
    use serde_json::json;

    async fn suspended_setup() -> (SignalBridge, TaskKey, Arc<ResultChannel>) {
        let engine = Arc::new(MemoryProcessEngine::new());
        let canvas = Canvas::new(
            "gate_flow",
            "1.0.0",
            json!({"activities": [{"id": "gate", "kind": "await_signal"}]}),
        );
        let definition = engine.deploy(&canvas).await.unwrap();

        let request = Request::sync(Payload::null());
        let context = SystemContext::from_request(&request);
        let scope = ExecutionScope::new(request.clone(), context.clone());
        let (process_instance_id, activity_id) =
            match engine.start(&definition, scope).await.unwrap() {
                StartOutcome::Suspended {
                    process_instance_id,
                    activity_id,
                } => (process_instance_id, activity_id),
                StartOutcome::Completed(_) => panic!("flow must suspend"),
            };

        let bridge = SignalBridge::new(engine);
        let channel = Arc::new(ResultChannel::new());
        let task = TaskInstance::new(process_instance_id, activity_id, request, context);
        let key = task.key();
        bridge.register(task, channel.clone());

        (bridge, key, channel)
    }

    #[tokio::test]
    async fn test_signal_publishes_on_original_channel() {
        let (bridge, key, channel) = suspended_setup().await;
        assert_eq!(bridge.pending_count(), 1);

        bridge
            .signal(&key, Payload::new(json!({"answer": "ok"})))
            .await
            .unwrap();

        assert_eq!(bridge.pending_count(), 0);
        assert!(channel.is_terminated());
        let history = channel.history();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].payload().unwrap().as_value()["answer"],
            "ok"
        );
    }

    #[tokio::test]
    async fn test_second_signal_is_rejected() {
        let (bridge, key, channel) = suspended_setup().await;

        bridge.signal(&key, Payload::null()).await.unwrap();
        let second = bridge.signal(&key, Payload::null()).await;

        assert!(matches!(second, Err(EngineError::UnknownTaskInstance(_))));
        // Exactly one terminal result, no double-applied side effects.
        assert_eq!(channel.history().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_rejected_resume_fails_the_channel() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let canvas = Canvas::new(
            "gate_flow",
            "1.0.0",
            json!({"activities": [{"id": "gate", "kind": "await_signal"}]}),
        );
        let definition = engine.deploy(&canvas).await.unwrap();

        let request = Request::sync(Payload::null());
        let context = SystemContext::from_request(&request);
        let scope = ExecutionScope::new(request.clone(), context.clone());
        let process_instance_id = match engine.start(&definition, scope).await.unwrap() {
            StartOutcome::Suspended {
                process_instance_id, ..
            } => process_instance_id,
            StartOutcome::Completed(_) => panic!("flow must suspend"),
        };

        // Registered against an activity the engine is not parked at.
        let bridge = SignalBridge::new(engine);
        let channel = Arc::new(ResultChannel::new());
        let task = TaskInstance::new(
            process_instance_id,
            crate::ActivityId("elsewhere".to_string()),
            request,
            context,
        );
        let key = task.key();
        bridge.register(task, channel.clone());

        let result = bridge.signal(&key, Payload::null()).await;
        assert!(matches!(result, Err(EngineError::SignalError(_))));
        assert!(channel.is_terminated());
        assert_eq!(channel.history()[0].error().unwrap().code, "SIGNAL_ERROR");
    }

    #[tokio::test]
    async fn test_signal_unknown_key() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let bridge = SignalBridge::new(engine);

        let key = TaskKey {
            process_instance_id: crate::ProcessInstanceId("ghost".to_string()),
            activity_id: crate::ActivityId("gate".to_string()),
        };
        assert!(matches!(
            bridge.signal(&key, Payload::null()).await,
            Err(EngineError::UnknownTaskInstance(_))
        ));
    }
}
