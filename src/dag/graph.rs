// src/dag/graph.rs

use std::fmt;

use petgraph::dot::{Config, Dot};
use petgraph::graphmap::DiGraphMap;

use crate::dag::layers::BuildLayers;

/// Edge weight for parent -> child dependencies. Renders as an empty label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dependency;

impl fmt::Display for Dependency {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/// Build a petgraph view of the job graph (edge direction: parent -> child).
///
/// Works for cyclic graphs too, so the DOT output can show the offending
/// edges.
pub fn to_dependency_graph(layers: &BuildLayers) -> DiGraphMap<&str, Dependency> {
    let mut graph = DiGraphMap::new();
    for job in layers.jobs() {
        graph.add_node(job.id.as_str());
    }
    for job in layers.jobs() {
        for &child in &job.children {
            graph.add_edge(job.id.as_str(), layers.job(child).id.as_str(), Dependency);
        }
    }
    graph
}

/// Graphviz DOT rendering of the job graph.
pub fn render_dot(layers: &BuildLayers) -> String {
    let graph = to_dependency_graph(layers);
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}
