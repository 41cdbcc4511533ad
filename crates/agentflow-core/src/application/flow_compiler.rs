//! Turns a canvas description into a deployed, runnable flow definition.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::process_engine::{Canvas, FlowDefinition, ProcessEngine};
use crate::EngineError;

/// Deploys canvases into the process engine
///
/// Deployment is the only step that interprets canvas content, and the
/// engine does that interpretation; failures here are caller-visible
/// errors, not channel events, because no run exists yet.
pub struct FlowCompiler {
    process_engine: Arc<dyn ProcessEngine>,
}

impl FlowCompiler {
    /// Create a compiler over the given process engine
    pub fn new(process_engine: Arc<dyn ProcessEngine>) -> Self {
        Self { process_engine }
    }

    /// Deploy a canvas, returning the reusable definition handle
    pub async fn deploy(&self, canvas: &Canvas) -> Result<FlowDefinition, EngineError> {
        match self.process_engine.deploy(canvas).await {
            Ok(definition) => {
                info!(
                    canvas = %canvas.name,
                    version = %canvas.version,
                    definition_id = %definition.definition_id,
                    "canvas deployed"
                );
                Ok(definition)
            }
            Err(e) => {
                warn!(canvas = %canvas.name, error = %e, "canvas deployment failed");
                Err(EngineError::Compilation(format!(
                    "canvas {}@{}: {}",
                    canvas.name, canvas.version, e
                )))
            }
        }
    }
}
