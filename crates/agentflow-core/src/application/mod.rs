//! Application layer: the engine services that drive flow execution.

/// Canvas deployment
pub mod flow_compiler;

/// Invocation-mode routing and duplex fan-out
pub mod invocation_router;

/// Single-run execution
pub mod pipeline_executor;

/// Engine facade
pub mod runtime;

/// Suspend/resume bookkeeping
pub mod signal_bridge;
