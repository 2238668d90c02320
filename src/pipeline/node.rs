//! Pipeline node variants
//!
//! Three concrete stages: the entry sources request tensors, a DL node runs
//! one pinned model instance, the exit sinks into the response. A DL node
//! owns its unload guard for the whole pipeline lifetime, so the instance it
//! pins cannot be retired mid-run.

use std::collections::HashMap;

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    core::{
        error::ServingResult,
        instance::{ModelInstance, ModelInstanceUnloadGuard},
        tensor::{PredictRequest, PredictResponse, TensorMap},
    },
    pipeline::definition::NodeKind,
};

/// One executable stage of a per-request pipeline.
#[async_trait]
pub trait Node: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Translate an output alias advertised to downstream edges into the
    /// concrete tensor name this node produces. Identity by default.
    fn resolve_output_alias<'a>(&'a self, alias: &'a str) -> &'a str {
        alias
    }

    /// Consume the inputs gathered from incoming edges and produce the
    /// tensors this node advertises to outgoing edges.
    async fn execute(&mut self, inputs: TensorMap) -> ServingResult<TensorMap>;

    /// Take the response sink out of this node after execution. Only the
    /// exit node returns one.
    fn take_sink(&mut self) -> Option<PredictResponse> {
        None
    }
}

/// Sources every named request input as a downstream-available output.
pub struct EntryNode {
    name: String,
    request: PredictRequest,
}

impl EntryNode {
    pub fn new(name: impl Into<String>, request: PredictRequest) -> Self {
        Self {
            name: name.into(),
            request,
        }
    }
}

#[async_trait]
impl Node for EntryNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Entry
    }

    async fn execute(&mut self, _inputs: TensorMap) -> ServingResult<TensorMap> {
        // Payloads are Bytes, so exposing the whole request is a cheap clone.
        Ok(self.request.inputs.clone())
    }
}

/// Runs one pinned model instance over the inputs bound from incoming edges.
pub struct DlNode {
    name: String,
    instance: Arc<dyn ModelInstance>,
    output_aliases: HashMap<String, String>,
    _guard: ModelInstanceUnloadGuard,
}

impl DlNode {
    pub fn new(
        name: impl Into<String>,
        instance: Arc<dyn ModelInstance>,
        guard: ModelInstanceUnloadGuard,
        output_aliases: HashMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            instance,
            output_aliases,
            _guard: guard,
        }
    }
}

#[async_trait]
impl Node for DlNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Dl
    }

    fn resolve_output_alias<'a>(&'a self, alias: &'a str) -> &'a str {
        self.output_aliases
            .get(alias)
            .map(String::as_str)
            .unwrap_or(alias)
    }

    async fn execute(&mut self, inputs: TensorMap) -> ServingResult<TensorMap> {
        tracing::debug!(
            node = %self.name,
            model = self.instance.name(),
            version = %self.instance.version(),
            "executing model stage"
        );
        self.instance.execute(&inputs).await
    }
}

/// Sinks every bound input into the response object.
pub struct ExitNode {
    name: String,
    response: PredictResponse,
}

impl ExitNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: PredictResponse::new(),
        }
    }
}

#[async_trait]
impl Node for ExitNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Exit
    }

    async fn execute(&mut self, inputs: TensorMap) -> ServingResult<TensorMap> {
        self.response.outputs.extend(inputs);
        Ok(TensorMap::new())
    }

    fn take_sink(&mut self) -> Option<PredictResponse> {
        Some(std::mem::take(&mut self.response))
    }
}
