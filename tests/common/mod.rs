//! Shared test fixtures: a controllable mock model instance and factory

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;

use model_serving_core::{
    config::{ModelConfig, ParameterMode, ShapeConfig},
    core::{
        DataType, ModelInstance, ModelInstanceFactory, ModelVersion, ServingError,
        ServingResult, Tensor, TensorMap, TensorSchema, TensorSpec,
    },
};

/// Per-model template the mock factory stamps instances from.
#[derive(Clone)]
pub struct MockModelTemplate {
    pub inputs: TensorSchema,
    pub outputs: TensorSchema,
    pub batching_mode: ParameterMode,
    pub shapes: HashMap<String, ShapeConfig>,
    pub fail_load: bool,
    pub execute_delay: Option<Duration>,
}

impl Default for MockModelTemplate {
    fn default() -> Self {
        let mut inputs = TensorSchema::new();
        inputs.insert(
            "input".to_string(),
            TensorSpec::new(vec![1, 3], DataType::F32),
        );
        let mut outputs = TensorSchema::new();
        outputs.insert(
            "out".to_string(),
            TensorSpec::new(vec![1, 3], DataType::F32),
        );
        Self {
            inputs,
            outputs,
            batching_mode: ParameterMode::Fixed,
            shapes: HashMap::new(),
            fail_load: false,
            execute_delay: None,
        }
    }
}

impl MockModelTemplate {
    pub fn with_io(inputs: &[&str], outputs: &[&str]) -> Self {
        let spec = || TensorSpec::new(vec![1, 3], DataType::F32);
        Self {
            inputs: inputs.iter().map(|n| (n.to_string(), spec())).collect(),
            outputs: outputs.iter().map(|n| (n.to_string(), spec())).collect(),
            ..Self::default()
        }
    }

    pub fn auto_batching(mut self) -> Self {
        self.batching_mode = ParameterMode::Auto;
        self
    }

    pub fn auto_shape(mut self, input: &str) -> Self {
        self.shapes.insert(input.to_string(), ShapeConfig::auto());
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }
}

/// Mock collaborator: produces zeroed output tensors matching its schema.
pub struct MockModelInstance {
    name: String,
    version: ModelVersion,
    template: MockModelTemplate,
    config: RwLock<ModelConfig>,
    pub executions: AtomicU32,
    pub reloads: AtomicU32,
    pub retired: AtomicU32,
}

#[async_trait]
impl ModelInstance for MockModelInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> ModelVersion {
        self.version
    }

    fn model_config(&self) -> ModelConfig {
        let mut config = self.config.read().clone();
        config.batching_mode = self.template.batching_mode;
        config.shapes = self.template.shapes.clone();
        config
    }

    fn inputs_info(&self) -> &TensorSchema {
        &self.template.inputs
    }

    fn outputs_info(&self) -> &TensorSchema {
        &self.template.outputs
    }

    async fn load(&self, config: &ModelConfig) -> ServingResult<()> {
        if self.template.fail_load {
            return Err(ServingError::ModelVersionNotLoaded {
                name: self.name.clone(),
                version: self.version.get(),
            });
        }
        *self.config.write() = config.clone();
        Ok(())
    }

    async fn reload(&self, config: &ModelConfig) -> ServingResult<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        *self.config.write() = config.clone();
        Ok(())
    }

    async fn retire(&self) {
        self.retired.fetch_add(1, Ordering::SeqCst);
    }

    async fn execute(&self, inputs: &TensorMap) -> ServingResult<TensorMap> {
        if let Some(delay) = self.template.execute_delay {
            tokio::time::sleep(delay).await;
        }
        for name in self.template.inputs.keys() {
            if !inputs.contains_key(name) {
                return Err(ServingError::InvalidMissingInput {
                    tensor: name.clone(),
                });
            }
        }
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .template
            .outputs
            .iter()
            .map(|(name, spec)| (name.clone(), Tensor::zeroed(spec.clone())))
            .collect())
    }
}

/// Factory stamping mock instances from per-model templates. Models without
/// a registered template get the default single-input/single-output schema.
#[derive(Default)]
pub struct MockFactory {
    templates: RwLock<HashMap<String, MockModelTemplate>>,
    pub created: AtomicU32,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_template(self: &Arc<Self>, model: &str, template: MockModelTemplate) -> Arc<Self> {
        self.templates.write().insert(model.to_string(), template);
        Arc::clone(self)
    }
}

impl ModelInstanceFactory for MockFactory {
    fn create(&self, name: &str, version: ModelVersion) -> Arc<dyn ModelInstance> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let template = self
            .templates
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default();
        Arc::new(MockModelInstance {
            name: name.to_string(),
            version,
            template,
            config: RwLock::new(ModelConfig::new(name, "/dev/null")),
            executions: AtomicU32::new(0),
            reloads: AtomicU32::new(0),
            retired: AtomicU32::new(0),
        })
    }
}

/// Install a test-writer tracing subscriber once per binary. Safe to call
/// from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Versions helper: `versions(&[1, 2])`.
pub fn versions(raw: &[u64]) -> Vec<ModelVersion> {
    raw.iter().map(|&v| ModelVersion::new(v)).collect()
}

/// A request carrying one zeroed F32 tensor under each given name.
pub fn request_with(names: &[&str]) -> model_serving_core::PredictRequest {
    let mut request = model_serving_core::PredictRequest::new();
    for name in names {
        request.inputs.insert(
            name.to_string(),
            Tensor::zeroed(TensorSpec::new(vec![1, 3], DataType::F32)),
        );
    }
    request
}
