//! Visible-set filtering: text query AND layer AND status.

use crate::model::{Layer, LineageGraph, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerFilter {
    #[default]
    All,
    Only(Layer),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl FromStr for LayerFilter {
    type Err = crate::GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(LayerFilter::All);
        }
        s.parse().map(LayerFilter::Only)
    }
}

impl FromStr for StatusFilter {
    type Err = crate::GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

/// Active filters of a graph view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphFilter {
    pub query: String,
    pub layer: LayerFilter,
    pub status: StatusFilter,
}

impl GraphFilter {
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
            || self.layer != LayerFilter::All
            || self.status != StatusFilter::All
    }

    /// Narrow `graph` to the visible nodes and the edges between them.
    ///
    /// Node order is preserved, which matters for grid row assignment.
    pub fn apply(&self, graph: &LineageGraph) -> LineageGraph {
        let query = self.query.trim().to_lowercase();

        let nodes: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| match self.layer {
                LayerFilter::All => true,
                LayerFilter::Only(l) => n.layer == l,
            })
            .filter(|n| match self.status {
                StatusFilter::All => true,
                StatusFilter::Only(s) => n.status() == s,
            })
            .filter(|n| query.is_empty() || n.search_text().contains(&query))
            .cloned()
            .collect();

        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = graph.edges_within(&ids).cloned().collect();

        LineageGraph { nodes, edges }
    }
}
