//! The LLM-adapter contract consumed by model activities.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::context::SystemContext;
use crate::domain::result::FlowResult;
use crate::EngineError;

/// Request forwarded to a model adapter by a model activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Adapter identity to route to
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Adapter-specific options
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Stream of results produced by one model invocation
pub type ModelResultStream = BoxStream<'static, FlowResult>;

/// A provider adapter invoked by model activities
///
/// Whether the adapter streams partial responses or answers single-shot is
/// selected by the invocation mode carried in the [`SystemContext`], not by
/// the adapter's caller.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Stable adapter identity used for routing
    fn identity(&self) -> &str;

    /// Invoke the model, returning a stream of responses
    async fn invoke(
        &self,
        request: ModelRequest,
        context: &SystemContext,
    ) -> Result<ModelResultStream, EngineError>;
}
