//! Core abstractions of the serving core
//!
//! - Model instance contract and lifecycle tracking (with unload guards)
//! - Versioned Model and the process-wide ModelManager registry
//! - Tensor descriptors and request/response binding
//! - Error taxonomy with stable status codes
//! - Custom loader capability attachment

pub mod custom_loader;
pub mod error;
pub mod instance;
pub mod manager;
pub mod model;
pub mod tensor;

pub use custom_loader::CustomLoader;
pub use error::{ServingError, ServingResult};
pub use instance::{
    ModelInstance, ModelInstanceFactory, ModelInstanceState, ModelInstanceUnloadGuard,
    ModelVersion, TrackedInstance,
};
pub use manager::ModelManager;
pub use model::Model;
pub use tensor::{
    DataType, PredictRequest, PredictResponse, Tensor, TensorMap, TensorSchema, TensorSpec,
};
