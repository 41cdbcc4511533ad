//! Flow execution engine for agent flows.
//!
//! An agent flow is described by a [`Canvas`], deployed into an external
//! [`ProcessEngine`], and executed per caller [`Request`]. Every run
//! publishes into a multicast [`ResultChannel`]; runs that park at an
//! activity awaiting external input are resumed through the
//! [`SignalBridge`] using a `(process instance, activity)` key.
//!
//! [`FlowRuntime`] wires the services together:
//!
//! ```
//! use std::sync::Arc;
//! use agentflow_core::memory::MemoryProcessEngine;
//! use agentflow_core::{Canvas, FlowRuntime, Payload, Request};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let runtime = FlowRuntime::new(Arc::new(MemoryProcessEngine::new()));
//! let canvas = Canvas::new(
//!     "echo_flow",
//!     "1.0.0",
//!     json!({"activities": [{"id": "final", "kind": "echo"}]}),
//! );
//!
//! let channel = runtime
//!     .run(&canvas, Request::sync(Payload::new(json!({"q": "2+2"}))))
//!     .await
//!     .unwrap();
//! let results = channel.subscribe().collect_all().await;
//! assert!(results[0].is_success());
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod application;
pub mod domain;
pub mod error;
pub mod types;

pub use application::flow_compiler::FlowCompiler;
pub use application::invocation_router::InvocationRouter;
pub use application::pipeline_executor::PipelineExecutor;
pub use application::runtime::FlowRuntime;
pub use application::signal_bridge::SignalBridge;
pub use domain::channel::{ResultChannel, ResultStream};
pub use domain::context::{ChunkSink, SystemContext};
pub use domain::model::{ModelAdapter, ModelRequest, ModelResultStream};
pub use domain::process_engine::{Canvas, FlowDefinition, ProcessEngine, StartOutcome};
pub use domain::request::{EventSender, EventSource, InboundEvent, InvokeMode, Request};
pub use domain::result::{FlowError, FlowResult};
pub use domain::scope::ExecutionScope;
pub use domain::task_instance::{ActivityId, ProcessInstanceId, TaskId, TaskInstance, TaskKey};
pub use error::EngineError;
pub use types::Payload;

#[cfg(feature = "testing")]
pub use domain::process_engine::memory;
