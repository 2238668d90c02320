//! Multi-model inference serving core
//!
//! This crate is the in-process heart of a model server: it loads versioned
//! model artifacts into a concurrent registry, resolves prediction lookups
//! against them, and orchestrates multi-stage inference pipelines that chain
//! several models under a single request.
//!
//! The two load-bearing contracts:
//!
//! - **Safe hot-swap**: model versions can be added, reloaded, and retired
//!   while predictions are in flight. Scoped unload guards pin an instance
//!   for the duration of its use; retirement drains outstanding guards before
//!   completing, and once it returns no new lookup resolves the version.
//! - **Validated DAGs**: pipeline definitions pass per-node schema checks and
//!   three-color cycle/connectivity analysis before they can produce
//!   per-request execution graphs.
//!
//! Artifact I/O and tensor compute live behind the [`core::ModelInstance`]
//! collaborator trait; the wire protocol, config parsing, and CLI live in the
//! serving shell around this crate.

pub mod config;
pub mod core;
pub mod observability;
pub mod pipeline;
pub mod service;

pub use crate::core::{
    ModelInstance, ModelInstanceFactory, ModelInstanceState, ModelInstanceUnloadGuard,
    ModelManager, ModelVersion, PredictRequest, PredictResponse, ServingError, ServingResult,
};
pub use crate::pipeline::{Connection, NodeInfo, NodeKind, PipelineFactory};
pub use crate::service::PredictionService;
