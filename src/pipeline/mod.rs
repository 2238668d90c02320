//! Multi-stage inference pipelines
//!
//! A pipeline chains several models under one request as a validated DAG:
//! definitions are registered through the [`PipelineFactory`] gate, and each
//! request instantiates a short-lived [`Pipeline`] whose DL nodes pin their
//! model instances for the duration of the run.

pub mod definition;
pub mod factory;
pub mod node;
pub mod runner;

pub use definition::{Connection, NodeInfo, NodeKind, PipelineDefinition};
pub use factory::PipelineFactory;
pub use node::{DlNode, EntryNode, ExitNode, Node};
pub use runner::Pipeline;
