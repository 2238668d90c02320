//! Error types for the serving core
//!
//! Every error is a value carrying a stable integer code and a human label,
//! so the serving shell can translate failures into client responses without
//! string matching.

/// Result type for serving core operations
pub type ServingResult<T> = Result<T, ServingError>;

/// Errors emitted by the model registry and pipeline subsystems.
///
/// `code()` and `label()` expose the stable wire-level identity of each
/// variant; `OK` is code 0 and is represented by the absence of an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServingError {
    #[error("Model with requested name is not found: {name}")]
    ModelNameMissing { name: String },

    #[error("Dependency model is not found: {name}")]
    ModelMissing { name: String },

    #[error("Model {name} with requested version {version} is not found")]
    ModelVersionMissing { name: String, version: u64 },

    #[error("Model {name} version {version} is retired or not loaded yet")]
    ModelVersionNotLoaded { name: String, version: u64 },

    #[error("Required input tensor is missing: {tensor}")]
    InvalidMissingInput { tensor: String },

    #[error("Required output tensor is missing: {tensor}")]
    InvalidMissingOutput { tensor: String },

    #[error("Model {model} uses dynamic batch size or shape which is forbidden in pipelines")]
    ForbiddenModelDynamicParameter { model: String },

    #[error("Pipeline with requested name is not found: {name}")]
    PipelineDefinitionNameMissing { name: String },

    #[error("Pipeline definition with this name already exists: {name}")]
    PipelineDefinitionAlreadyExists { name: String },

    #[error("Pipeline definition has duplicated node name: {node}")]
    PipelineNodeNameDuplicate { node: String },

    #[error("Pipeline node is configured with a wrong kind: {node}")]
    PipelineNodeWrongKindConfiguration { node: String },

    #[error("Pipeline definition is missing an entry or exit node")]
    PipelineMissingEntryOrExit,

    #[error("Pipeline definition has multiple entry nodes")]
    PipelineMultipleEntryNodes,

    #[error("Pipeline definition has multiple exit nodes")]
    PipelineMultipleExitNodes,

    #[error("Pipeline definition contains a cycle involving node: {node}")]
    PipelineCycleFound { node: String },

    #[error("Pipeline definition contains nodes not connected to the graph")]
    PipelineContainsUnconnectedNodes,

    #[error("Pipeline definition edge into node {node} has no dependency mapping")]
    PipelineDefinitionMissingDependencyMapping { node: String },

    #[error("Request cancelled: {context}")]
    RequestCancelled { context: String },
}

impl ServingError {
    /// Stable integer code of this error. Code 0 (`OK`) is the absence of an
    /// error and therefore has no variant.
    pub fn code(&self) -> u32 {
        match self {
            Self::ModelNameMissing { .. } => 1,
            Self::ModelMissing { .. } => 2,
            Self::ModelVersionMissing { .. } => 3,
            Self::ModelVersionNotLoaded { .. } => 4,
            Self::InvalidMissingInput { .. } => 5,
            Self::InvalidMissingOutput { .. } => 6,
            Self::ForbiddenModelDynamicParameter { .. } => 7,
            Self::PipelineDefinitionNameMissing { .. } => 8,
            Self::PipelineDefinitionAlreadyExists { .. } => 9,
            Self::PipelineNodeNameDuplicate { .. } => 10,
            Self::PipelineNodeWrongKindConfiguration { .. } => 11,
            Self::PipelineMissingEntryOrExit => 12,
            Self::PipelineMultipleEntryNodes => 13,
            Self::PipelineMultipleExitNodes => 14,
            Self::PipelineCycleFound { .. } => 15,
            Self::PipelineContainsUnconnectedNodes => 16,
            Self::PipelineDefinitionMissingDependencyMapping { .. } => 17,
            Self::RequestCancelled { .. } => 18,
        }
    }

    /// Stable human label of this error, matching the wire-level status table.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModelNameMissing { .. } => "MODEL_NAME_MISSING",
            Self::ModelMissing { .. } => "MODEL_MISSING",
            Self::ModelVersionMissing { .. } => "MODEL_VERSION_MISSING",
            Self::ModelVersionNotLoaded { .. } => "MODEL_VERSION_NOT_LOADED",
            Self::InvalidMissingInput { .. } => "INVALID_MISSING_INPUT",
            Self::InvalidMissingOutput { .. } => "INVALID_MISSING_OUTPUT",
            Self::ForbiddenModelDynamicParameter { .. } => "FORBIDDEN_MODEL_DYNAMIC_PARAMETER",
            Self::PipelineDefinitionNameMissing { .. } => "PIPELINE_DEFINITION_NAME_MISSING",
            Self::PipelineDefinitionAlreadyExists { .. } => "PIPELINE_DEFINITION_ALREADY_EXIST",
            Self::PipelineNodeNameDuplicate { .. } => "PIPELINE_NODE_NAME_DUPLICATE",
            Self::PipelineNodeWrongKindConfiguration { .. } => {
                "PIPELINE_NODE_WRONG_KIND_CONFIGURATION"
            }
            Self::PipelineMissingEntryOrExit => "PIPELINE_MISSING_ENTRY_OR_EXIT",
            Self::PipelineMultipleEntryNodes => "PIPELINE_MULTIPLE_ENTRY_NODES",
            Self::PipelineMultipleExitNodes => "PIPELINE_MULTIPLE_EXIT_NODES",
            Self::PipelineCycleFound { .. } => "PIPELINE_CYCLE_FOUND",
            Self::PipelineContainsUnconnectedNodes => "PIPELINE_CONTAINS_UNCONNECTED_NODES",
            Self::PipelineDefinitionMissingDependencyMapping { .. } => {
                "PIPELINE_DEFINITION_MISSING_DEPENDENCY_MAPPING"
            }
            Self::RequestCancelled { .. } => "REQUEST_CANCELLED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = ServingError::ModelNameMissing {
            name: "resnet".to_string(),
        };
        assert_eq!(err.code(), 1);
        assert_eq!(err.label(), "MODEL_NAME_MISSING");

        let err = ServingError::PipelineCycleFound {
            node: "a".to_string(),
        };
        assert_eq!(err.code(), 15);
        assert_eq!(err.label(), "PIPELINE_CYCLE_FOUND");
    }

    #[test]
    fn test_display_carries_context() {
        let err = ServingError::ModelVersionMissing {
            name: "resnet".to_string(),
            version: 3,
        };
        assert_eq!(
            err.to_string(),
            "Model resnet with requested version 3 is not found"
        );
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServingError>();
    }
}
