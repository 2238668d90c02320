//! Pipeline definitions and their validation
//!
//! A definition is the immutable blueprint: node infos plus the edge set.
//! Validation runs in two phases — per-node checks against the live model
//! registry, then cycle and connectivity analysis — before a definition may
//! produce per-request [`Pipeline`](crate::pipeline::Pipeline) instances.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error};

use crate::{
    core::{
        error::{ServingError, ServingResult},
        instance::ModelVersion,
        manager::ModelManager,
        tensor::{PredictRequest, TensorSchema},
    },
    pipeline::{
        node::{DlNode, EntryNode, ExitNode, Node},
        runner::{Edge, Pipeline},
    },
};

/// Role of a node within a pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Sources tensors from the request object.
    Entry,
    /// Executes one model instance.
    Dl,
    /// Sinks tensors into the response object.
    Exit,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Entry => write!(f, "entry"),
            NodeKind::Dl => write!(f, "DL"),
            NodeKind::Exit => write!(f, "exit"),
        }
    }
}

/// Definition-time description of one pipeline node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub kind: NodeKind,
    /// Referenced model; required for DL nodes, ignored otherwise.
    pub model_name: Option<String>,
    /// Pinned version; absent means "resolve the default at lookup time".
    pub model_version: Option<ModelVersion>,
    /// Alias visible to downstream edges mapped to the concrete output
    /// tensor name the model produces.
    pub output_aliases: HashMap<String, String>,
}

impl NodeInfo {
    pub fn entry(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Entry,
            model_name: None,
            model_version: None,
            output_aliases: HashMap::new(),
        }
    }

    pub fn dl(name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Dl,
            model_name: Some(model_name.into()),
            model_version: None,
            output_aliases: HashMap::new(),
        }
    }

    pub fn exit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Exit,
            model_name: None,
            model_version: None,
            output_aliases: HashMap::new(),
        }
    }

    pub fn with_version(mut self, version: ModelVersion) -> Self {
        self.model_version = Some(version);
        self
    }

    pub fn with_output_alias(
        mut self,
        alias: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.output_aliases.insert(alias.into(), output.into());
        self
    }
}

/// Oriented dependency edge: tensors flow from `from` to `to` under the
/// alias-to-input mapping.
#[derive(Debug, Clone)]
pub struct Connection {
    pub from: String,
    pub to: String,
    /// Producer output alias mapped to consumer input name. Must be
    /// non-empty; multiple pairs per edge are allowed.
    pub mapping: HashMap<String, String>,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            mapping: HashMap::new(),
        }
    }

    pub fn with_pair(mut self, alias: impl Into<String>, input: impl Into<String>) -> Self {
        self.mapping.insert(alias.into(), input.into());
        self
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    Gray,
    Black,
}

/// Validated, immutable blueprint producing per-request pipelines.
pub struct PipelineDefinition {
    name: String,
    node_infos: Vec<NodeInfo>,
    connections: Vec<Connection>,
}

impl PipelineDefinition {
    pub fn new(
        name: impl Into<String>,
        node_infos: Vec<NodeInfo>,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            name: name.into(),
            node_infos,
            connections,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_infos(&self) -> &[NodeInfo] {
        &self.node_infos
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Phase 1: per-node validation against the live registry.
    pub fn validate_nodes(&self, manager: &ModelManager) -> ServingResult<()> {
        debug!(pipeline = %self.name, "validating pipeline definition nodes");

        let mut seen = HashSet::new();
        for info in &self.node_infos {
            if !seen.insert(info.name.as_str()) {
                error!(pipeline = %self.name, node = %info.name, "duplicated node name");
                return Err(ServingError::PipelineNodeNameDuplicate {
                    node: info.name.clone(),
                });
            }
        }

        let entries = self
            .node_infos
            .iter()
            .filter(|n| n.kind == NodeKind::Entry)
            .count();
        let exits = self
            .node_infos
            .iter()
            .filter(|n| n.kind == NodeKind::Exit)
            .count();
        match entries {
            0 => return Err(ServingError::PipelineMissingEntryOrExit),
            1 => {}
            _ => return Err(ServingError::PipelineMultipleEntryNodes),
        }
        match exits {
            0 => return Err(ServingError::PipelineMissingEntryOrExit),
            1 => {}
            _ => return Err(ServingError::PipelineMultipleExitNodes),
        }

        for info in &self.node_infos {
            self.validate_node(manager, info)?;
        }
        Ok(())
    }

    fn validate_node(&self, manager: &ModelManager, node: &NodeInfo) -> ServingResult<()> {
        debug!(pipeline = %self.name, node = %node.name, kind = %node.kind, "validating node");

        // Resolve the node's own model; pipelines require statically known
        // tensor geometry, so dynamic batching or shapes are rejected here.
        let mut node_inputs: Option<TensorSchema> = None;
        if node.kind == NodeKind::Dl {
            let model_name = node.model_name.as_deref().ok_or_else(|| {
                ServingError::PipelineNodeWrongKindConfiguration {
                    node: node.name.clone(),
                }
            })?;
            let (instance, _guard) = manager
                .get_model_instance(model_name, node.model_version)
                .map_err(|e| {
                    error!(
                        pipeline = %self.name,
                        node = %node.name,
                        model = model_name,
                        error = %e,
                        "node references unresolvable model"
                    );
                    ServingError::ModelNameMissing {
                        name: model_name.to_string(),
                    }
                })?;

            let config = instance.model_config();
            if config.has_dynamic_parameters() {
                error!(
                    pipeline = %self.name,
                    node = %node.name,
                    model = model_name,
                    "model uses dynamic batch size or shape, forbidden in pipelines"
                );
                return Err(ServingError::ForbiddenModelDynamicParameter {
                    model: model_name.to_string(),
                });
            }
            node_inputs = Some(instance.inputs_info().clone());
        }

        // Check every incoming edge of this node.
        for connection in self.connections.iter().filter(|c| c.to == node.name) {
            let source = self
                .node_infos
                .iter()
                .find(|n| n.name == connection.from)
                .ok_or_else(|| {
                    error!(
                        pipeline = %self.name,
                        node = %node.name,
                        dependency = %connection.from,
                        "edge references unknown source node"
                    );
                    ServingError::ModelNameMissing {
                        name: connection.from.clone(),
                    }
                })?;

            if connection.mapping.is_empty() {
                error!(
                    pipeline = %self.name,
                    node = %node.name,
                    "edge carries no dependency mapping"
                );
                return Err(ServingError::PipelineDefinitionMissingDependencyMapping {
                    node: node.name.clone(),
                });
            }

            if source.kind == NodeKind::Dl {
                let source_model = source.model_name.as_deref().ok_or_else(|| {
                    ServingError::PipelineNodeWrongKindConfiguration {
                        node: source.name.clone(),
                    }
                })?;
                let (source_instance, _guard) = manager
                    .get_model_instance(source_model, source.model_version)
                    .map_err(|_| ServingError::ModelMissing {
                        name: source_model.to_string(),
                    })?;
                let outputs = source_instance.outputs_info();

                for alias in connection.mapping.keys() {
                    let produced = source.output_aliases.get(alias).unwrap_or(alias);
                    if !outputs.contains_key(produced) {
                        error!(
                            pipeline = %self.name,
                            node = %node.name,
                            model = source_model,
                            tensor = %produced,
                            "source model does not produce referenced output"
                        );
                        return Err(ServingError::InvalidMissingOutput {
                            tensor: produced.clone(),
                        });
                    }
                }
            }

            if let Some(inputs) = &node_inputs {
                for input in connection.mapping.values() {
                    if !inputs.contains_key(input) {
                        error!(
                            pipeline = %self.name,
                            node = %node.name,
                            tensor = %input,
                            "node's model does not accept referenced input"
                        );
                        return Err(ServingError::InvalidMissingInput {
                            tensor: input.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Phase 2: cycle and connectivity analysis.
    ///
    /// Walks the edge-reversed graph from the exit node with three-color
    /// marking; a gray re-encounter is a cycle, and a diamond (two edges
    /// into a shared black descendant) is not.
    pub fn validate_for_cycles(&self) -> ServingResult<()> {
        let exit = self
            .node_infos
            .iter()
            .find(|n| n.kind == NodeKind::Exit)
            .ok_or(ServingError::PipelineMissingEntryOrExit)?;

        let mut colors: HashMap<&str, Color> = HashMap::new();
        self.visit(&exit.name, &mut colors)?;

        if colors.len() < self.node_infos.len() {
            error!(pipeline = %self.name, "definition contains nodes not connected to the graph");
            return Err(ServingError::PipelineContainsUnconnectedNodes);
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        colors: &mut HashMap<&'a str, Color>,
    ) -> ServingResult<()> {
        colors.insert(node, Color::Gray);
        for connection in self.connections.iter().filter(|c| c.to == node) {
            let dependency = connection.from.as_str();
            if dependency == node {
                error!(pipeline = %self.name, node = %node, "node is connected to itself");
                return Err(ServingError::PipelineCycleFound {
                    node: node.to_string(),
                });
            }
            match colors.get(dependency) {
                Some(Color::Gray) => {
                    error!(pipeline = %self.name, node = %dependency, "cycle detected");
                    return Err(ServingError::PipelineCycleFound {
                        node: dependency.to_string(),
                    });
                }
                Some(Color::Black) => {}
                None => self.visit(dependency, colors)?,
            }
        }
        colors.insert(node, Color::Black);
        Ok(())
    }

    /// Instantiate a per-request pipeline from this validated definition.
    ///
    /// Each DL node resolves its model and acquires an unload guard here; if
    /// a model has been retired since validation the whole create fails and
    /// no partial pipeline is observable.
    pub fn create(
        &self,
        request: PredictRequest,
        manager: &ModelManager,
    ) -> ServingResult<Pipeline> {
        let mut nodes: Vec<Box<dyn Node>> = Vec::with_capacity(self.node_infos.len());
        let mut index_by_name: HashMap<&str, usize> = HashMap::new();
        let mut entry_index = None;
        let mut exit_index = None;
        let mut request = Some(request);

        for info in &self.node_infos {
            debug!(
                pipeline = %self.name,
                node = %info.name,
                kind = %info.kind,
                "adding pipeline node"
            );
            let node: Box<dyn Node> = match info.kind {
                NodeKind::Entry => {
                    entry_index = Some(nodes.len());
                    let request = request
                        .take()
                        .expect("single entry node enforced by validation");
                    Box::new(EntryNode::new(info.name.clone(), request))
                }
                NodeKind::Dl => {
                    let model_name = info.model_name.as_deref().ok_or_else(|| {
                        ServingError::PipelineNodeWrongKindConfiguration {
                            node: info.name.clone(),
                        }
                    })?;
                    let (instance, guard) = match manager
                        .get_model_instance(model_name, info.model_version)
                    {
                        Ok(resolved) => resolved,
                        // The version map never shrinks, so a version that
                        // resolved at registration and is missing now means
                        // every candidate has been retired since: a state
                        // error, not a resolution error.
                        Err(ServingError::ModelVersionMissing { name, version })
                            if manager
                                .get_model(model_name)
                                .is_some_and(|m| !m.version_states().is_empty()) =>
                        {
                            return Err(ServingError::ModelVersionNotLoaded { name, version });
                        }
                        Err(e) => return Err(e),
                    };
                    Box::new(DlNode::new(
                        info.name.clone(),
                        instance,
                        guard,
                        info.output_aliases.clone(),
                    ))
                }
                NodeKind::Exit => {
                    exit_index = Some(nodes.len());
                    Box::new(ExitNode::new(info.name.clone()))
                }
            };
            index_by_name.insert(info.name.as_str(), nodes.len());
            nodes.push(node);
        }

        let edges = self
            .connections
            .iter()
            .map(|c| Edge {
                from: *index_by_name
                    .get(c.from.as_str())
                    .expect("connection source validated at registration"),
                to: *index_by_name
                    .get(c.to.as_str())
                    .expect("connection destination validated at registration"),
                mapping: c.mapping.clone(),
            })
            .collect();

        Ok(Pipeline::new(
            self.name.clone(),
            nodes,
            edges,
            entry_index.expect("entry node enforced by validation"),
            exit_index.expect("exit node enforced by validation"),
        ))
    }
}

impl std::fmt::Debug for PipelineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDefinition")
            .field("name", &self.name)
            .field("nodes", &self.node_infos.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}
