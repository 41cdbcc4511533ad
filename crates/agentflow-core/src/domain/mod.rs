//! Domain layer: invocation data model and external contracts.

/// Multicast, replayable result channel
pub mod channel;

/// Per-invocation system context and chunk sink
pub mod context;

/// The LLM-adapter contract
pub mod model;

/// The external process-engine contract
pub mod process_engine;

/// Caller requests and the duplex inbound event source
pub mod request;

/// Success/failure result values
pub mod result;

/// Typed execution scope exchanged with the process engine
pub mod scope;

/// Suspend-point records
pub mod task_instance;
