//! The external process-engine contract consumed by the engine services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::result::FlowResult;
use crate::domain::scope::ExecutionScope;
use crate::domain::task_instance::{ActivityId, ProcessInstanceId};
use crate::EngineError;

/// Source declarative description of an agent flow
///
/// Opaque to this component; only the process engine interprets the
/// content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canvas {
    /// Canvas name, used as the process-definition identity
    pub name: String,
    /// Canvas version string
    pub version: String,
    /// The flow description itself
    pub content: serde_json::Value,
}

impl Canvas {
    /// Create a canvas description
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            content,
        }
    }
}

/// Immutable handle to a deployed flow
///
/// Created at deploy time and reused for every subsequent run of the same
/// canvas; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Process-definition identifier inside the external engine
    pub definition_id: String,
    /// Deployed version string
    pub version: String,
}

/// Result of driving a process instance until it yields
#[derive(Debug)]
pub enum StartOutcome {
    /// The flow reached a terminal state
    Completed(FlowResult),
    /// The flow parked at an activity awaiting an external signal
    Suspended {
        /// The suspended process instance
        process_instance_id: ProcessInstanceId,
        /// The activity at which execution is parked
        activity_id: ActivityId,
    },
}

/// The deploy/start/signal contract of the external process engine
///
/// Implementations own activity scheduling, durable suspension, and the
/// guarantee that a blocked activity eventually fails rather than hanging
/// forever; none of that is re-implemented here.
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Register a canvas, returning the definition handle
    ///
    /// Repeated deploys of structurally identical canvases must be safe;
    /// deduplication is an engine property, not guaranteed here.
    async fn deploy(&self, canvas: &Canvas) -> Result<FlowDefinition, EngineError>;

    /// Start a process instance and drive it until terminal or suspended
    async fn start(
        &self,
        definition: &FlowDefinition,
        scope: ExecutionScope,
    ) -> Result<StartOutcome, EngineError>;

    /// Resume a suspended instance from the recorded activity
    ///
    /// `callback` is the externally produced value, injected into the
    /// instance's variable scope under the `CALLBACK_RESULT` key.
    async fn signal(
        &self,
        process_instance_id: &ProcessInstanceId,
        activity_id: &ActivityId,
        scope: ExecutionScope,
        callback: FlowResult,
    ) -> Result<StartOutcome, EngineError>;
}

/// Scripted in-memory engine for tests and local development
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use crate::Payload;
    use dashmap::DashMap;
    use std::sync::Arc;
    use uuid::Uuid;

    /// One interpreted activity of a scripted canvas
    #[derive(Debug, Clone)]
    struct ScriptedActivity {
        id: ActivityId,
        kind: ActivityKind,
        output: serde_json::Value,
        message: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ActivityKind {
        /// Emit an intermediate chunk through the context's sink
        Emit,
        /// Produce the original request parameters as output
        Echo,
        /// Park the instance until an external signal arrives
        AwaitSignal,
        /// Fail the flow
        Fail,
        /// Fail only when the request parameters carry `"fail": true`
        Guard,
        /// Record a fixed output
        Output,
    }

    #[derive(Debug, Clone)]
    struct ParkedInstance {
        definition_id: String,
        resume_index: usize,
        activity_id: ActivityId,
        last_output: serde_json::Value,
    }

    enum EngineStep {
        Done(FlowResult),
        Parked {
            resume_index: usize,
            activity_id: ActivityId,
            last_output: serde_json::Value,
        },
    }

    #[derive(serde::Deserialize)]
    struct CanvasScript {
        activities: Vec<RawActivity>,
    }

    #[derive(serde::Deserialize)]
    struct RawActivity {
        id: String,
        kind: String,
        #[serde(default)]
        output: serde_json::Value,
        #[serde(default)]
        message: String,
    }

    /// In-memory [`ProcessEngine`] interpreting a JSON activity list
    ///
    /// A canvas content looks like:
    ///
    /// ```json
    /// {"activities": [
    ///     {"id": "draft", "kind": "emit", "output": "thinking"},
    ///     {"id": "approval", "kind": "await_signal"},
    ///     {"id": "final", "kind": "echo"}
    /// ]}
    /// ```
    ///
    /// Suspended instances live in a concurrent map keyed by process
    /// instance id, so suspension outlives the starting task.
    pub struct MemoryProcessEngine {
        definitions: DashMap<String, Arc<Vec<ScriptedActivity>>>,
        instances: DashMap<String, ParkedInstance>,
    }

    impl MemoryProcessEngine {
        /// Create an empty engine
        pub fn new() -> Self {
            Self {
                definitions: DashMap::new(),
                instances: DashMap::new(),
            }
        }

        /// Number of currently suspended process instances
        pub fn suspended_count(&self) -> usize {
            self.instances.len()
        }

        fn parse_script(canvas: &Canvas) -> Result<Vec<ScriptedActivity>, EngineError> {
            let script: CanvasScript = serde_json::from_value(canvas.content.clone())
                .map_err(|e| {
                    EngineError::Compilation(format!("canvas {}: {}", canvas.name, e))
                })?;
            if script.activities.is_empty() {
                return Err(EngineError::Compilation(format!(
                    "canvas {}: no activities",
                    canvas.name
                )));
            }

            script
                .activities
                .into_iter()
                .map(|raw| {
                    let kind = match raw.kind.as_str() {
                        "emit" => ActivityKind::Emit,
                        "echo" => ActivityKind::Echo,
                        "await_signal" => ActivityKind::AwaitSignal,
                        "fail" => ActivityKind::Fail,
                        "guard" => ActivityKind::Guard,
                        "output" => ActivityKind::Output,
                        other => {
                            return Err(EngineError::Compilation(format!(
                                "canvas {}: unknown activity kind '{}'",
                                canvas.name, other
                            )))
                        }
                    };
                    Ok(ScriptedActivity {
                        id: ActivityId(raw.id),
                        kind,
                        output: raw.output,
                        message: raw.message,
                    })
                })
                .collect()
        }

        fn run_script(
            script: &[ScriptedActivity],
            start: usize,
            scope: &mut ExecutionScope,
            mut last_output: serde_json::Value,
        ) -> EngineStep {
            for (idx, activity) in script.iter().enumerate().skip(start) {
                match activity.kind {
                    ActivityKind::Emit => {
                        let chunk = FlowResult::ok(Payload::new(activity.output.clone()));
                        if let Err(e) = scope.system_context.emit_chunk(chunk.clone()) {
                            tracing::debug!(
                                activity_id = %activity.id.0,
                                error = %e,
                                "chunk emission failed"
                            );
                        }
                        scope.record_activity_output(&activity.id, &chunk);
                        last_output = activity.output.clone();
                    }
                    ActivityKind::Echo => {
                        last_output = scope.origin_request.params().as_value().clone();
                        let result = FlowResult::ok(Payload::new(last_output.clone()));
                        scope.record_activity_output(&activity.id, &result);
                    }
                    ActivityKind::AwaitSignal => {
                        return EngineStep::Parked {
                            resume_index: idx + 1,
                            activity_id: activity.id.clone(),
                            last_output,
                        };
                    }
                    ActivityKind::Fail => {
                        let message = if activity.message.is_empty() {
                            format!("activity {} failed", activity.id.0)
                        } else {
                            activity.message.clone()
                        };
                        return EngineStep::Done(FlowResult::fail("ACTIVITY_FAILURE", message));
                    }
                    ActivityKind::Guard => {
                        let flagged = scope
                            .origin_request
                            .params()
                            .as_value()
                            .get("fail")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(false);
                        if flagged {
                            let message = if activity.message.is_empty() {
                                format!("activity {} rejected the request", activity.id.0)
                            } else {
                                activity.message.clone()
                            };
                            return EngineStep::Done(FlowResult::fail(
                                "ACTIVITY_FAILURE",
                                message,
                            ));
                        }
                    }
                    ActivityKind::Output => {
                        last_output = activity.output.clone();
                        let result = FlowResult::ok(Payload::new(last_output.clone()));
                        scope.record_activity_output(&activity.id, &result);
                    }
                }
            }
            EngineStep::Done(FlowResult::ok(Payload::new(last_output)))
        }
    }

    impl Default for MemoryProcessEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessEngine for MemoryProcessEngine {
        async fn deploy(&self, canvas: &Canvas) -> Result<FlowDefinition, EngineError> {
            let script = Self::parse_script(canvas)?;
            self.definitions
                .insert(canvas.name.clone(), Arc::new(script));
            Ok(FlowDefinition {
                definition_id: canvas.name.clone(),
                version: canvas.version.clone(),
            })
        }

        async fn start(
            &self,
            definition: &FlowDefinition,
            mut scope: ExecutionScope,
        ) -> Result<StartOutcome, EngineError> {
            let script = self
                .definitions
                .get(&definition.definition_id)
                .map(|entry| entry.clone())
                .ok_or_else(|| {
                    EngineError::ProcessStart(format!(
                        "unknown definition: {}",
                        definition.definition_id
                    ))
                })?;

            match Self::run_script(&script, 0, &mut scope, serde_json::Value::Null) {
                EngineStep::Done(result) => Ok(StartOutcome::Completed(result)),
                EngineStep::Parked {
                    resume_index,
                    activity_id,
                    last_output,
                } => {
                    let process_instance_id = ProcessInstanceId(Uuid::new_v4().to_string());
                    self.instances.insert(
                        process_instance_id.0.clone(),
                        ParkedInstance {
                            definition_id: definition.definition_id.clone(),
                            resume_index,
                            activity_id: activity_id.clone(),
                            last_output,
                        },
                    );
                    Ok(StartOutcome::Suspended {
                        process_instance_id,
                        activity_id,
                    })
                }
            }
        }

        async fn signal(
            &self,
            process_instance_id: &ProcessInstanceId,
            activity_id: &ActivityId,
            mut scope: ExecutionScope,
            callback: FlowResult,
        ) -> Result<StartOutcome, EngineError> {
            let (_, parked) = self
                .instances
                .remove(&process_instance_id.0)
                .ok_or_else(|| {
                    EngineError::ProcessInstanceNotFound(process_instance_id.0.clone())
                })?;

            if parked.activity_id != *activity_id {
                // Not the parked activity; put the instance back untouched.
                self.instances
                    .insert(process_instance_id.0.clone(), parked.clone());
                return Err(EngineError::SignalError(format!(
                    "instance {} is parked at {}, not {}",
                    process_instance_id.0, parked.activity_id.0, activity_id.0
                )));
            }

            scope.record_activity_output(&parked.activity_id, &callback);
            let last_output = match &callback {
                FlowResult::Success(payload) => payload.as_value().clone(),
                FlowResult::Failure(_) => return Ok(StartOutcome::Completed(callback)),
            };

            let script = self
                .definitions
                .get(&parked.definition_id)
                .map(|entry| entry.clone())
                .ok_or_else(|| {
                    EngineError::ProcessStart(format!(
                        "unknown definition: {}",
                        parked.definition_id
                    ))
                })?;

            match Self::run_script(&script, parked.resume_index, &mut scope, last_output) {
                EngineStep::Done(result) => Ok(StartOutcome::Completed(result)),
                EngineStep::Parked {
                    resume_index,
                    activity_id,
                    last_output,
                } => {
                    // The same instance parks again at a later activity.
                    self.instances.insert(
                        process_instance_id.0.clone(),
                        ParkedInstance {
                            definition_id: parked.definition_id,
                            resume_index,
                            activity_id: activity_id.clone(),
                            last_output,
                        },
                    );
                    Ok(StartOutcome::Suspended {
                        process_instance_id: process_instance_id.clone(),
                        activity_id,
                    })
                }
            }
        }
    }

}
