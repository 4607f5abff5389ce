use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::error::Rejection;
use crate::names::{NameAllocator, NamePool};
use crate::types::{AdjacencyGraph, EdgeAttributes, EdgeType, NodeName, OsmNodeId, RawWay};

/// Turns the sampled part of the way polylines into a named, typed graph.
pub struct AdjacencyBuilder<'a> {
    pool: &'a NamePool,
}

impl<'a> AdjacencyBuilder<'a> {
    pub fn new(pool: &'a NamePool) -> Self {
        AdjacencyBuilder { pool }
    }

    /// Every consecutive pair of a way with both ends in `sampled` becomes an
    /// edge with a random type. Running out of names drops the whole graph.
    pub fn build<R: Rng + ?Sized>(
        &self,
        ways: &[RawWay],
        sampled: &HashSet<OsmNodeId>,
        rng: &mut R,
    ) -> Result<AdjacencyGraph, Rejection> {
        let mut names = NameAllocator::new(self.pool);
        let mut graph = AdjacencyGraph::new();

        for way in ways {
            for pair in way.node_ids.windows(2) {
                let (first, second) = (pair[0], pair[1]);
                if first == second || !sampled.contains(&first) || !sampled.contains(&second) {
                    continue;
                }
                let first_name = names.allocate(first)?;
                let second_name = names.allocate(second)?;
                let edge_type = if rng.gen_range(1..=2) == 1 { EdgeType::Type1 } else { EdgeType::Type2 };
                graph.insert_edge(first_name, second_name, edge_type);
            }
        }

        log::debug!("Built graph with {} nodes from {} sampled ids", graph.node_count(), sampled.len());
        Ok(graph)
    }
}

/// A single component spanning every node. The empty graph is not connected.
pub fn is_connected(graph: &AdjacencyGraph) -> bool {
    if graph.is_empty() {
        return false;
    }
    let mut g: UnGraph<(), ()> = UnGraph::new_undirected();
    let indices: HashMap<&NodeName, NodeIndex> = graph.nodes().map(|name| (name, g.add_node(()))).collect();
    for (a, b, _) in graph.directed_edges() {
        if a < b {
            g.add_edge(indices[a], indices[b], ());
        }
    }
    connected_components(&g) == 1
}

/// Remembers which undirected edges were already emitted.
#[derive(Debug, Default)]
pub struct EdgeTraversalDeduplicator {
    visited: HashSet<(NodeName, NodeName)>,
}

impl EdgeTraversalDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time either `(a, b)` or `(b, a)` is seen.
    pub fn first_visit(&mut self, a: &NodeName, b: &NodeName) -> bool {
        let key = if a <= b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        self.visited.insert(key)
    }
}

/// Each undirected edge of `graph` exactly once, in graph order.
pub fn unique_edges(graph: &AdjacencyGraph) -> Vec<(&NodeName, &NodeName, &EdgeAttributes)> {
    let mut dedup = EdgeTraversalDeduplicator::new();
    graph
        .directed_edges()
        .filter(|(a, b, _)| dedup.first_visit(a, b))
        .collect()
}
