//! Facade wiring the engine services behind one entry point.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::application::flow_compiler::FlowCompiler;
use crate::application::invocation_router::InvocationRouter;
use crate::application::pipeline_executor::PipelineExecutor;
use crate::application::signal_bridge::SignalBridge;
use crate::domain::channel::ResultChannel;
use crate::domain::process_engine::{Canvas, FlowDefinition, ProcessEngine};
use crate::domain::request::Request;
use crate::domain::task_instance::TaskKey;
use crate::{EngineError, Payload};

/// The engine entry point: deploy-and-run plus resume
///
/// Owns the compiler, executor, bridge, and router, all sharing one
/// injected [`ProcessEngine`]. Deployed definitions are cached per
/// `name@version` so repeated runs of the same canvas skip deployment.
pub struct FlowRuntime {
    compiler: FlowCompiler,
    router: InvocationRouter,
    signal_bridge: Arc<SignalBridge>,
    definitions: DashMap<String, FlowDefinition>,
}

impl FlowRuntime {
    /// Wire a runtime over the given process engine
    pub fn new(process_engine: Arc<dyn ProcessEngine>) -> Self {
        let signal_bridge = Arc::new(SignalBridge::new(process_engine.clone()));
        let executor = Arc::new(PipelineExecutor::new(
            process_engine.clone(),
            signal_bridge.clone(),
        ));
        Self {
            compiler: FlowCompiler::new(process_engine),
            router: InvocationRouter::new(executor),
            signal_bridge,
            definitions: DashMap::new(),
        }
    }

    /// The suspend/resume bridge, for callers that deliver signals
    pub fn signal_bridge(&self) -> &Arc<SignalBridge> {
        &self.signal_bridge
    }

    /// Deploy a canvas (cached) and execute a request against it
    ///
    /// Deployment errors surface here synchronously; everything after the
    /// run starts is observed on the returned channel.
    pub async fn run(
        &self,
        canvas: &Canvas,
        request: Request,
    ) -> Result<Arc<ResultChannel>, EngineError> {
        let definition = self.definition_for(canvas).await?;
        Ok(self.router.route(&definition, request))
    }

    /// Resume the suspension addressed by `key` with an external value
    pub async fn signal(&self, key: &TaskKey, value: Payload) -> Result<(), EngineError> {
        self.signal_bridge.signal(key, value).await
    }

    async fn definition_for(&self, canvas: &Canvas) -> Result<FlowDefinition, EngineError> {
        let cache_key = format!("{}@{}", canvas.name, canvas.version);
        if let Some(cached) = self.definitions.get(&cache_key) {
            debug!(canvas = %cache_key, "using cached definition");
            return Ok(cached.clone());
        }
        let definition = self.compiler.deploy(canvas).await?;
        self.definitions.insert(cache_key, definition.clone());
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::process_engine::memory::MemoryProcessEngine;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_deploys_then_executes() {
        let runtime = FlowRuntime::new(Arc::new(MemoryProcessEngine::new()));
        let canvas = Canvas::new(
            "echo_flow",
            "1.0.0",
            json!({"activities": [{"id": "final", "kind": "echo"}]}),
        );

        let channel = runtime
            .run(&canvas, Request::sync(Payload::new(json!({"q": "2+2"}))))
            .await
            .unwrap();

        let results = channel.subscribe().collect_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload().unwrap().as_value()["q"], "2+2");
    }

    #[tokio::test]
    async fn test_deploy_error_is_synchronous() {
        let runtime = FlowRuntime::new(Arc::new(MemoryProcessEngine::new()));
        let broken = Canvas::new("broken", "1.0.0", json!({"activities": []}));

        let err = runtime
            .run(&broken, Request::sync(Payload::null()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Compilation(_)));
    }

    #[tokio::test]
    async fn test_definition_cache_reused_across_runs() {
        let engine = Arc::new(MemoryProcessEngine::new());
        let runtime = FlowRuntime::new(engine);
        let canvas = Canvas::new(
            "cached_flow",
            "1.0.0",
            json!({"activities": [{"id": "final", "kind": "echo"}]}),
        );

        for _ in 0..2 {
            let channel = runtime
                .run(&canvas, Request::sync(Payload::null()))
                .await
                .unwrap();
            let results = channel.subscribe().collect_all().await;
            assert!(results[0].is_success());
        }
        assert_eq!(runtime.definitions.len(), 1);
    }
}
