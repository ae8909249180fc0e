//! Fusion of per-dataset fragments into one global graph.
//!
//! Nodes are keyed by id and edges by `(from, to, type)`, both in insertion
//! order. A later fragment replaces a node wholesale (last write wins) while
//! keeping its first-seen position. Edges are checked against the final node
//! set once every fragment has been pushed, so an edge may reference a node
//! that only a later fragment provides. Cycles pass through untouched.

use crate::model::{Edge, EdgeKey, LineageGraph, Node};
use indexmap::IndexMap;
use serde::Serialize;

/// Counters describing what a merge collapsed or discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub fragments: usize,
    pub nodes: usize,
    pub edges: usize,
    pub overwritten_nodes: usize,
    pub duplicate_edges: usize,
    pub dangling_edges: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub graph: LineageGraph,
    pub stats: MergeStats,
}

/// Incremental merger; push fragments in order, then [`Merger::finish`].
#[derive(Debug, Default)]
pub struct Merger {
    nodes: IndexMap<String, Node>,
    edges: IndexMap<EdgeKey, Edge>,
    stats: MergeStats,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: LineageGraph) {
        self.stats.fragments += 1;
        for node in fragment.nodes {
            if self.nodes.insert(node.id.clone(), node).is_some() {
                self.stats.overwritten_nodes += 1;
            }
        }
        for edge in fragment.edges {
            let key = edge.key();
            if self.edges.contains_key(&key) {
                self.stats.duplicate_edges += 1;
                continue;
            }
            self.edges.insert(key, edge);
        }
    }

    pub fn finish(self) -> MergeOutcome {
        let Merger {
            nodes,
            edges,
            mut stats,
        } = self;

        let candidates = edges.len();
        let kept: Vec<Edge> = edges
            .into_values()
            .filter(|e| nodes.contains_key(&e.from) && nodes.contains_key(&e.to))
            .collect();

        stats.dangling_edges = candidates - kept.len();
        stats.nodes = nodes.len();
        stats.edges = kept.len();

        let graph = LineageGraph {
            nodes: nodes.into_values().collect(),
            edges: kept,
        };
        MergeOutcome { graph, stats }
    }
}

/// Merge fragments in order. See the module docs for the rules.
pub fn merge_fragments<I>(fragments: I) -> MergeOutcome
where
    I: IntoIterator<Item = LineageGraph>,
{
    let mut merger = Merger::new();
    for fragment in fragments {
        merger.push(fragment);
    }
    let outcome = merger.finish();
    tracing::debug!(
        fragments = outcome.stats.fragments,
        nodes = outcome.stats.nodes,
        edges = outcome.stats.edges,
        overwritten = outcome.stats.overwritten_nodes,
        duplicates = outcome.stats.duplicate_edges,
        dangling = outcome.stats.dangling_edges,
        "merged lineage fragments"
    );
    outcome
}
