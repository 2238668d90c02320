//! Process-wide model registry
//!
//! Maps model name to [`Model`] and resolves (name, version) lookups with
//! guard acquisition. Lifecycle operations arrive from the configuration
//! collaborator; lookups arrive from the predict paths and the pipeline
//! subsystem.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    config::ModelConfig,
    core::{
        custom_loader::CustomLoader,
        error::{ServingError, ServingResult},
        instance::{
            ModelInstance, ModelInstanceFactory, ModelInstanceUnloadGuard, ModelVersion,
        },
        model::Model,
    },
    observability::ServingMetrics,
};

/// Registry of all models served by this process.
///
/// Initialized empty at startup; [`ModelManager::retire_all`] at shutdown
/// cascades retirement of every instance.
pub struct ModelManager {
    models: DashMap<String, Arc<Model>>,
    factory: Arc<dyn ModelInstanceFactory>,
}

impl ModelManager {
    pub fn new(factory: Arc<dyn ModelInstanceFactory>) -> Self {
        Self {
            models: DashMap::new(),
            factory,
        }
    }

    /// The Model registered under `name`, if any.
    pub fn get_model(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Names of all registered models.
    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|e| e.key().clone()).collect()
    }

    fn require_model(&self, name: &str) -> ServingResult<Arc<Model>> {
        self.get_model(name)
            .ok_or_else(|| ServingError::ModelNameMissing {
                name: name.to_string(),
            })
    }

    /// Load the listed versions of a model, creating the Model on first use.
    pub async fn load_versions(
        &self,
        name: &str,
        versions: &[ModelVersion],
        config: &ModelConfig,
    ) -> ServingResult<()> {
        let model = {
            let entry = self
                .models
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Model::new(name)));
            Arc::clone(entry.value())
        };
        info!(model = name, count = versions.len(), "loading model versions");
        let result = model.add_versions(versions, config, self.factory.as_ref()).await;
        if result.is_ok() {
            ServingMetrics::record_versions_loaded(name, versions.len());
        }
        result
    }

    /// Reload the listed versions under a new configuration.
    pub async fn reload_versions(
        &self,
        name: &str,
        versions: &[ModelVersion],
        config: &ModelConfig,
    ) -> ServingResult<()> {
        let model = self.require_model(name)?;
        info!(model = name, count = versions.len(), "reloading model versions");
        model.reload_versions(versions, config).await
    }

    /// Retire the listed versions. Once this returns, no later lookup
    /// resolves them; predicts whose guards predate the call finish first.
    pub async fn retire_versions(
        &self,
        name: &str,
        versions: &[ModelVersion],
    ) -> ServingResult<()> {
        let model = self.require_model(name)?;
        info!(model = name, count = versions.len(), "retiring model versions");
        model.retire_versions(versions).await?;
        ServingMetrics::record_versions_retired(name, versions.len());
        Ok(())
    }

    /// Retire every version of one model.
    pub async fn retire_all_versions(&self, name: &str) -> ServingResult<()> {
        let model = self.require_model(name)?;
        info!(model = name, "retiring all model versions");
        model.retire_all_versions().await
    }

    /// Shutdown cascade: retire every instance of every model.
    pub async fn retire_all(&self) {
        let models: Vec<Arc<Model>> =
            self.models.iter().map(|e| Arc::clone(e.value())).collect();
        for model in models {
            if let Err(e) = model.retire_all_versions().await {
                tracing::warn!(model = model.name(), error = %e, "retire-all failed for model");
            }
        }
        info!("all models retired");
    }

    /// Attach a custom loader capability to a model.
    pub fn set_custom_loader(
        &self,
        name: &str,
        loader: Arc<dyn CustomLoader>,
    ) -> ServingResult<()> {
        let model = self.require_model(name)?;
        debug!(model = name, loader = loader.loader_name(), "custom loader attached");
        model.set_custom_loader(loader);
        Ok(())
    }

    /// Resolve (name, version) to an instance plus an unload guard.
    ///
    /// `None` resolves the model's default version. The returned instance is
    /// AVAILABLE at the instant of return and stays retire-proof for the
    /// guard's lifetime; guard ownership transfers to the caller.
    pub fn get_model_instance(
        &self,
        name: &str,
        version: Option<ModelVersion>,
    ) -> ServingResult<(Arc<dyn ModelInstance>, ModelInstanceUnloadGuard)> {
        let model = self.models.get(name).map(|e| Arc::clone(e.value())).ok_or(
            ServingError::ModelNameMissing {
                name: name.to_string(),
            },
        )?;

        let tracked = match version {
            Some(v) => model.get_model_instance_by_version(v).ok_or(
                ServingError::ModelVersionMissing {
                    name: name.to_string(),
                    version: v.get(),
                },
            )?,
            None => model
                .get_default_model_instance()
                .ok_or(ServingError::ModelVersionMissing {
                    name: name.to_string(),
                    version: 0,
                })?,
        };

        let guard = tracked.acquire_guard()?;
        Ok((tracked.instance(), guard))
    }
}

impl std::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelManager")
            .field("models", &self.model_names())
            .finish()
    }
}
