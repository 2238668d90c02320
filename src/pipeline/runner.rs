//! Per-request pipeline execution
//!
//! A [`Pipeline`] owns its nodes exclusively and runs them in a topological
//! order consistent with the edge set: every edge establishes happens-before
//! from the producer's completion to the consumer's start. Execution is
//! single-threaded and cooperative; cancellation is checked between node
//! dispatches and never aborts an in-flight model execution.

use std::collections::{HashMap, VecDeque};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    core::{
        error::{ServingError, ServingResult},
        tensor::{PredictResponse, TensorMap},
    },
    pipeline::node::Node,
};

/// Wiring between two owned nodes, by index, with the alias-to-input
/// mapping the edge carries.
pub(crate) struct Edge {
    pub from: usize,
    pub to: usize,
    pub mapping: HashMap<String, String>,
}

/// A short-lived execution graph born from one validated definition and one
/// request. DL nodes inside hold their unload guards until the pipeline is
/// dropped, so no pinned model can be retired mid-run.
pub struct Pipeline {
    name: String,
    nodes: Vec<Box<dyn Node>>,
    edges: Vec<Edge>,
    entry: usize,
    exit: usize,
}

impl Pipeline {
    pub(crate) fn new(
        name: String,
        nodes: Vec<Box<dyn Node>>,
        edges: Vec<Edge>,
        entry: usize,
        exit: usize,
    ) -> Self {
        Self {
            name,
            nodes,
            edges,
            entry,
            exit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Name of the request-sourcing node.
    pub fn entry_name(&self) -> &str {
        self.nodes[self.entry].name()
    }

    /// Name of the response-sinking node.
    pub fn exit_name(&self) -> &str {
        self.nodes[self.exit].name()
    }

    /// Run the graph to completion and return the response collected by the
    /// exit node.
    pub async fn execute(
        mut self,
        cancel: &CancellationToken,
    ) -> ServingResult<PredictResponse> {
        let node_count = self.nodes.len();
        let mut indegree = vec![0usize; node_count];
        for edge in &self.edges {
            indegree[edge.to] += 1;
        }

        let mut bound_inputs: Vec<TensorMap> =
            (0..node_count).map(|_| TensorMap::new()).collect();
        let mut ready: VecDeque<usize> = (0..node_count)
            .filter(|&i| indegree[i] == 0)
            .collect();

        let mut executed = 0usize;
        while let Some(index) = ready.pop_front() {
            if cancel.is_cancelled() {
                debug!(pipeline = %self.name, "request cancelled between node dispatches");
                return Err(ServingError::RequestCancelled {
                    context: format!("pipeline {}", self.name),
                });
            }

            let inputs = std::mem::take(&mut bound_inputs[index]);
            debug!(
                pipeline = %self.name,
                node = self.nodes[index].name(),
                "dispatching pipeline node"
            );
            let outputs = self.nodes[index].execute(inputs).await?;
            executed += 1;

            for edge in self.edges.iter().filter(|e| e.from == index) {
                for (alias, input_name) in &edge.mapping {
                    let produced = self.nodes[index].resolve_output_alias(alias);
                    let tensor = outputs.get(produced).cloned().ok_or_else(|| {
                        ServingError::InvalidMissingInput {
                            tensor: input_name.clone(),
                        }
                    })?;
                    bound_inputs[edge.to].insert(input_name.clone(), tensor);
                }
                indegree[edge.to] -= 1;
                if indegree[edge.to] == 0 {
                    ready.push_back(edge.to);
                }
            }
        }

        debug_assert_eq!(
            executed, node_count,
            "validated pipeline graphs execute every node"
        );

        let response = self.nodes[self.exit]
            .take_sink()
            .expect("exit node produces the response sink");
        debug!(
            pipeline = %self.name,
            outputs = response.outputs.len(),
            "pipeline execution finished"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        core::tensor::{DataType, PredictResponse, Tensor, TensorSpec},
        pipeline::definition::NodeKind,
    };

    /// Records its dispatch position and forwards a constant tensor.
    struct ProbeNode {
        name: String,
        kind: NodeKind,
        order: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        sink: PredictResponse,
    }

    impl ProbeNode {
        fn boxed(
            name: &str,
            kind: NodeKind,
            order: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        ) -> Box<dyn Node> {
            Box::new(Self {
                name: name.to_string(),
                kind,
                order,
                sink: PredictResponse::new(),
            })
        }
    }

    #[async_trait]
    impl Node for ProbeNode {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> NodeKind {
            self.kind
        }

        async fn execute(&mut self, inputs: TensorMap) -> ServingResult<TensorMap> {
            self.order.lock().unwrap().push(self.name.clone());
            if self.kind == NodeKind::Exit {
                self.sink.outputs.extend(inputs);
                return Ok(TensorMap::new());
            }
            let mut outputs = TensorMap::new();
            outputs.insert(
                "out".to_string(),
                Tensor::zeroed(TensorSpec::new(vec![1], DataType::F32)),
            );
            Ok(outputs)
        }

        fn take_sink(&mut self) -> Option<PredictResponse> {
            (self.kind == NodeKind::Exit).then(|| std::mem::take(&mut self.sink))
        }
    }

    fn edge(from: usize, to: usize) -> Edge {
        Edge {
            from,
            to,
            mapping: HashMap::from([("out".to_string(), "in".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_diamond_respects_edge_order() {
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let nodes = vec![
            ProbeNode::boxed("entry", NodeKind::Entry, order.clone()),
            ProbeNode::boxed("left", NodeKind::Dl, order.clone()),
            ProbeNode::boxed("right", NodeKind::Dl, order.clone()),
            ProbeNode::boxed("join", NodeKind::Dl, order.clone()),
            ProbeNode::boxed("exit", NodeKind::Exit, order.clone()),
        ];
        let edges = vec![edge(0, 1), edge(0, 2), edge(1, 3), edge(2, 3), edge(3, 4)];
        let pipeline = Pipeline::new("diamond".to_string(), nodes, edges, 0, 4);

        let response = pipeline
            .execute(&CancellationToken::new())
            .await
            .unwrap();
        assert!(response.contains("in"));

        let order = order.lock().unwrap();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert_eq!(position("entry"), 0);
        assert!(position("join") > position("left"));
        assert!(position("join") > position("right"));
        assert_eq!(position("exit"), order.len() - 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_dispatch() {
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let nodes = vec![
            ProbeNode::boxed("entry", NodeKind::Entry, order.clone()),
            ProbeNode::boxed("exit", NodeKind::Exit, order.clone()),
        ];
        let pipeline = Pipeline::new("p".to_string(), nodes, vec![edge(0, 1)], 0, 1);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline.execute(&cancel).await.unwrap_err();
        assert_eq!(err.label(), "REQUEST_CANCELLED");
        assert!(order.lock().unwrap().is_empty());
    }
}
