//! In-process prediction surface
//!
//! The boundary the serving shell calls into: single-model predict resolves
//! through the registry and executes under an unload guard; pipeline predict
//! instantiates a per-request graph from a registered definition. Version
//! `None` means "use the model's default".

use std::{sync::Arc, time::Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    core::{
        error::{ServingError, ServingResult},
        instance::ModelVersion,
        manager::ModelManager,
        tensor::{PredictRequest, PredictResponse},
    },
    observability::ServingMetrics,
    pipeline::PipelineFactory,
};

/// Facade tying the model registry and the pipeline registry together.
pub struct PredictionService {
    manager: Arc<ModelManager>,
    pipelines: Arc<PipelineFactory>,
}

impl PredictionService {
    pub fn new(manager: Arc<ModelManager>, pipelines: Arc<PipelineFactory>) -> Self {
        Self { manager, pipelines }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    pub fn pipelines(&self) -> &Arc<PipelineFactory> {
        &self.pipelines
    }

    /// Execute one model over the request.
    ///
    /// The unload guard is held across the execute call, so the instance
    /// cannot be retired while the prediction is in flight.
    pub async fn predict(
        &self,
        model_name: &str,
        version: Option<ModelVersion>,
        request: &PredictRequest,
        cancel: &CancellationToken,
    ) -> ServingResult<PredictResponse> {
        let started = Instant::now();
        let (instance, _guard) = self.manager.get_model_instance(model_name, version)?;

        if cancel.is_cancelled() {
            return Err(ServingError::RequestCancelled {
                context: format!("model {}", model_name),
            });
        }

        debug!(
            model = model_name,
            version = %instance.version(),
            inputs = request.inputs.len(),
            "executing predict"
        );
        let result = instance.execute(&request.inputs).await;
        ServingMetrics::record_predict(model_name, result.is_ok(), started.elapsed());

        let outputs = result?;
        Ok(PredictResponse { outputs })
    }

    /// Execute a registered pipeline over the request.
    pub async fn pipeline_predict(
        &self,
        pipeline_name: &str,
        request: PredictRequest,
        cancel: &CancellationToken,
    ) -> ServingResult<PredictResponse> {
        let started = Instant::now();
        let pipeline = self
            .pipelines
            .create(pipeline_name, request, &self.manager)?;
        debug!(
            pipeline = pipeline_name,
            nodes = pipeline.node_count(),
            "executing pipeline"
        );

        let result = pipeline.execute(cancel).await;
        ServingMetrics::record_pipeline(pipeline_name, result.is_ok(), started.elapsed());
        result
    }
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService").finish_non_exhaustive()
    }
}
