//! DAG builder and layered topological sort for pipeline stages.

use kiln_core::pipeline::PipelineDescriptor;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    #[error("dependency cycle detected")]
    CycleDetected,
    #[error("pipeline has no stages")]
    EmptyPipeline,
}

/// Directed graph of stage names: edge `u -> v` means *u depends on v*.
/// Nodes may exist without metadata — a forward declaration created by a
/// dependency on a stage name not (yet) present in the descriptor.
#[derive(Debug, Default)]
pub struct PipelineDag {
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    has_metadata: HashSet<String>,
}

impl PartialEq for PipelineDag {
    fn eq(&self, other: &Self) -> bool {
        let node_weights = |g: &DiGraph<String, ()>| -> Vec<String> {
            g.node_indices().map(|i| g[i].clone()).collect()
        };
        let edge_pairs = |g: &DiGraph<String, ()>| -> HashSet<(NodeIndex, NodeIndex)> {
            g.edge_indices()
                .map(|e| g.edge_endpoints(e).unwrap())
                .collect()
        };
        self.name_to_index == other.name_to_index
            && self.has_metadata == other.has_metadata
            && node_weights(&self.graph) == node_weights(&other.graph)
            && edge_pairs(&self.graph) == edge_pairs(&other.graph)
    }
}

impl PipelineDag {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_index(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.name_to_index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.name_to_index.insert(name.to_string(), idx);
        idx
    }

    /// Mark that `name` has real stage metadata (as opposed to being a
    /// forward-declared node created only by being someone's dependency).
    pub fn declare(&mut self, name: &str) {
        self.node_index(name);
        self.has_metadata.insert(name.to_string());
    }

    /// Returns `true` if `name` was declared with metadata, `false` if it
    /// only exists as a forward declaration.
    pub fn has_metadata(&self, name: &str) -> bool {
        self.has_metadata.contains(name)
    }

    /// Declares *u depends on v*. Creates both nodes if absent. Fails with
    /// `CycleDetected` if adding the edge would create a cycle (including
    /// the self-edge `u -> u`). Idempotent.
    pub fn add_edge(&mut self, u: &str, v: &str) -> Result<(), DagError> {
        let u_idx = self.node_index(u);
        let v_idx = self.node_index(v);

        if u_idx == v_idx {
            return Err(DagError::CycleDetected);
        }
        if self.graph.contains_edge(u_idx, v_idx) {
            return Ok(());
        }
        // Adding u -> v creates a cycle iff v can already reach u.
        if has_path_connecting(&self.graph, v_idx, u_idx, None) {
            return Err(DagError::CycleDetected);
        }
        self.graph.add_edge(u_idx, v_idx, ());
        Ok(())
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.name_to_index.keys().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.name_to_index
            .get(name)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .filter_map(|n| self.graph.node_weight(n).map(|s| s.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a topological layering: layer 0 is every node with no
    /// unsatisfied dependency; layer i+1 is nodes whose dependencies are
    /// all in layers <= i. Ordering within a layer is unspecified.
    pub fn layers(&self) -> Vec<Vec<String>> {
        let mut remaining: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                let out_degree = self
                    .graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .count();
                (idx, out_degree)
            })
            .collect();

        let mut layers = Vec::new();
        let mut frontier: VecDeque<NodeIndex> = remaining
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&idx, _)| idx)
            .collect();

        while !frontier.is_empty() {
            let mut layer = Vec::new();
            let mut next_frontier = Vec::new();

            for idx in frontier.drain(..) {
                remaining.remove(&idx);
                layer.push(self.graph[idx].clone());
            }

            for &idx in remaining.keys() {
                let unmet = self
                    .graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .filter(|dep_idx| remaining.contains_key(dep_idx))
                    .count();
                if unmet == 0 {
                    next_frontier.push(idx);
                }
            }

            layers.push(layer);
            frontier = next_frontier.into_iter().collect();
        }

        layers
    }
}

/// Builds a [`PipelineDag`] from a submitted descriptor.
pub struct DagBuilder;

impl DagBuilder {
    pub fn build(descriptor: &PipelineDescriptor) -> Result<PipelineDag, DagError> {
        if descriptor.stages.is_empty() {
            return Err(DagError::EmptyPipeline);
        }

        let mut dag = PipelineDag::new();
        for name in descriptor.stages.keys() {
            dag.declare(name);
        }
        for (name, meta) in &descriptor.stages {
            for dep in &meta.depends_on {
                dag.add_edge(name, &dep.stage)?;
            }
        }
        Ok(dag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::pipeline::{DependencyRef, StageMetadata};
    use std::collections::HashMap;

    fn descriptor(stages: Vec<(&str, Vec<&str>)>) -> PipelineDescriptor {
        let mut map = HashMap::new();
        for (name, deps) in stages {
            map.insert(
                name.to_string(),
                StageMetadata {
                    script: vec!["echo hi".to_string()],
                    depends_on: deps
                        .into_iter()
                        .map(|d| DependencyRef {
                            stage: d.to_string(),
                            fetch_artifacts: false,
                        })
                        .collect(),
                    artifacts: vec![],
                },
            );
        }
        PipelineDescriptor {
            image: "alpine".to_string(),
            stages: map,
        }
    }

    #[test]
    fn rejects_empty_pipeline() {
        let descriptor = PipelineDescriptor {
            image: "alpine".to_string(),
            stages: HashMap::new(),
        };
        assert_eq!(DagBuilder::build(&descriptor), Err(DagError::EmptyPipeline));
    }

    #[test]
    fn single_stage_is_one_layer() {
        let descriptor = descriptor(vec![("a", vec![])]);
        let dag = DagBuilder::build(&descriptor).unwrap();
        let layers = dag.layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0], vec!["a".to_string()]);
    }

    #[test]
    fn linear_chain_layers_in_order() {
        let descriptor = descriptor(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);
        let dag = DagBuilder::build(&descriptor).unwrap();
        let layers = dag.layers();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["a".to_string()]);
        assert_eq!(layers[1], vec!["b".to_string()]);
        assert_eq!(layers[2], vec!["c".to_string()]);
    }

    #[test]
    fn diamond_layers_b_and_c_together() {
        let descriptor = descriptor(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["b", "c"]),
        ]);
        let dag = DagBuilder::build(&descriptor).unwrap();
        let layers = dag.layers();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["a".to_string()]);
        let mut middle = layers[1].clone();
        middle.sort();
        assert_eq!(middle, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(layers[2], vec!["d".to_string()]);
    }

    #[test]
    fn rejects_cycle() {
        let descriptor = descriptor(vec![("a", vec!["b"]), ("b", vec!["a"])]);
        assert_eq!(DagBuilder::build(&descriptor), Err(DagError::CycleDetected));
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let mut dag = PipelineDag::new();
        dag.declare("a");
        assert_eq!(dag.add_edge("a", "a"), Err(DagError::CycleDetected));
    }

    #[test]
    fn duplicate_edges_are_idempotent() {
        let mut dag = PipelineDag::new();
        dag.declare("a");
        dag.declare("b");
        assert!(dag.add_edge("a", "b").is_ok());
        assert!(dag.add_edge("a", "b").is_ok());
        assert_eq!(dag.dependencies_of("a"), vec!["b"]);
    }

    #[test]
    fn unknown_dependency_is_forward_declared() {
        let descriptor = descriptor(vec![("a", vec!["ghost"])]);
        let dag = DagBuilder::build(&descriptor).unwrap();
        assert!(!dag.has_metadata("ghost"));
        assert!(dag.has_metadata("a"));
    }
}
