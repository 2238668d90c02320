//! Registry of named pipeline definitions
//!
//! The factory is the build-time validation gate: a definition enters the
//! registry only after both validation phases pass. Once inserted a
//! definition is immutable; concurrent pipeline creation traverses it
//! without synchronization.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    core::{
        error::{ServingError, ServingResult},
        manager::ModelManager,
        tensor::PredictRequest,
    },
    pipeline::{
        definition::{Connection, NodeInfo, PipelineDefinition},
        runner::Pipeline,
    },
};

/// Maps pipeline name to validated definition.
#[derive(Default)]
pub struct PipelineFactory {
    definitions: RwLock<HashMap<String, Arc<PipelineDefinition>>>,
}

impl PipelineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition_exists(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    pub fn definition_names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    /// Validate and register a new pipeline definition.
    ///
    /// Validation runs outside the registry lock; the duplicate check is
    /// repeated under the write lock so two racing registrations of one name
    /// cannot both succeed.
    pub fn create_definition(
        &self,
        name: &str,
        node_infos: Vec<NodeInfo>,
        connections: Vec<Connection>,
        manager: &ModelManager,
    ) -> ServingResult<()> {
        if self.definition_exists(name) {
            warn!(pipeline = name, "pipeline definition with this name already exists");
            return Err(ServingError::PipelineDefinitionAlreadyExists {
                name: name.to_string(),
            });
        }

        let definition = PipelineDefinition::new(name, node_infos, connections);
        definition.validate_nodes(manager)?;
        definition.validate_for_cycles()?;

        let mut definitions = self.definitions.write();
        if definitions.contains_key(name) {
            return Err(ServingError::PipelineDefinitionAlreadyExists {
                name: name.to_string(),
            });
        }
        definitions.insert(name.to_string(), Arc::new(definition));
        info!(pipeline = name, "pipeline definition registered");
        Ok(())
    }

    /// Build a per-request pipeline for the named definition.
    ///
    /// The registry lock is released before node construction; the definition
    /// itself is immutable so no further synchronization is needed.
    pub fn create(
        &self,
        name: &str,
        request: PredictRequest,
        manager: &ModelManager,
    ) -> ServingResult<Pipeline> {
        let definition = self
            .definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| {
                warn!(pipeline = name, "pipeline with requested name does not exist");
                ServingError::PipelineDefinitionNameMissing {
                    name: name.to_string(),
                }
            })?;
        definition.create(request, manager)
    }
}

impl std::fmt::Debug for PipelineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineFactory")
            .field("definitions", &self.definition_names())
            .finish()
    }
}
