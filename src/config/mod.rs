//! Typed model configuration surface
//!
//! Config files are parsed by the serving shell; the core only defines the
//! typed shapes the loader deserializes into and the registry consumes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Whether a parameter is fixed at load time or negotiated per request.
///
/// Pipelines require statically known tensor geometry, so models with any
/// `Auto` parameter are rejected at pipeline registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterMode {
    #[default]
    Fixed,
    Auto,
}

/// Shape configuration for one named model input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeConfig {
    #[serde(default)]
    pub mode: ParameterMode,
    #[serde(default)]
    pub dims: Vec<i64>,
}

impl ShapeConfig {
    pub fn fixed(dims: Vec<i64>) -> Self {
        Self {
            mode: ParameterMode::Fixed,
            dims,
        }
    }

    pub fn auto() -> Self {
        Self {
            mode: ParameterMode::Auto,
            dims: Vec::new(),
        }
    }
}

/// Configuration of one model family, applied per loaded version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub base_path: String,
    #[serde(default)]
    pub batching_mode: ParameterMode,
    /// Per-input shape overrides; inputs absent from the map keep the
    /// artifact's native shape in FIXED mode.
    #[serde(default)]
    pub shapes: HashMap<String, ShapeConfig>,
    /// Opaque backend plugin parameters, passed through to the instance.
    #[serde(default)]
    pub plugin_config: HashMap<String, serde_json::Value>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            batching_mode: ParameterMode::Fixed,
            shapes: HashMap::new(),
            plugin_config: HashMap::new(),
        }
    }

    pub fn with_batching_mode(mut self, mode: ParameterMode) -> Self {
        self.batching_mode = mode;
        self
    }

    pub fn with_shape(mut self, input: impl Into<String>, shape: ShapeConfig) -> Self {
        self.shapes.insert(input.into(), shape);
        self
    }

    /// True when batch size or any declared shape is runtime-negotiated.
    pub fn has_dynamic_parameters(&self) -> bool {
        self.batching_mode == ParameterMode::Auto
            || self.shapes.values().any(|s| s.mode == ParameterMode::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_fixed() {
        let config = ModelConfig::new("resnet", "/models/resnet");
        assert_eq!(config.batching_mode, ParameterMode::Fixed);
        assert!(!config.has_dynamic_parameters());
    }

    #[test]
    fn test_dynamic_detection() {
        let config = ModelConfig::new("resnet", "/models/resnet")
            .with_batching_mode(ParameterMode::Auto);
        assert!(config.has_dynamic_parameters());

        let config = ModelConfig::new("resnet", "/models/resnet")
            .with_shape("input", ShapeConfig::auto());
        assert!(config.has_dynamic_parameters());
    }

    #[test]
    fn test_deserialize_from_loader_json() {
        let raw = r#"{
            "name": "resnet",
            "base_path": "/models/resnet",
            "batching_mode": "auto",
            "shapes": {"input": {"mode": "fixed", "dims": [1, 3, 224, 224]}}
        }"#;
        let config: ModelConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.batching_mode, ParameterMode::Auto);
        assert_eq!(
            config.shapes.get("input").unwrap().dims,
            vec![1, 3, 224, 224]
        );
    }
}
