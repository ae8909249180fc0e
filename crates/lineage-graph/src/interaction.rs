//! Selection, traversal and hover highlighting.

use crate::model::{Edge, EdgeKey, LineageGraph};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// In/out edge index over a graph.
#[derive(Debug)]
pub struct Adjacency<'g> {
    graph: &'g LineageGraph,
    outgoing: HashMap<&'g str, Vec<&'g Edge>>,
    incoming: HashMap<&'g str, Vec<&'g Edge>>,
}

/// Nodes and edges to keep unfaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightSet {
    pub nodes: BTreeSet<String>,
    pub edges: BTreeSet<EdgeKey>,
}

impl HighlightSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(&edge.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

impl<'g> Adjacency<'g> {
    pub fn new(graph: &'g LineageGraph) -> Self {
        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        let mut incoming: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for e in &graph.edges {
            outgoing.entry(e.from.as_str()).or_default().push(e);
            incoming.entry(e.to.as_str()).or_default().push(e);
        }
        Self {
            graph,
            outgoing,
            incoming,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.graph.node(id).is_some()
    }

    /// Edges touching `id` in either direction.
    pub fn connected_edges(&self, id: &str) -> impl Iterator<Item = &'g Edge> + '_ {
        let out = self.outgoing.get(id).into_iter().flatten();
        let inc = self
            .incoming
            .get(id)
            .into_iter()
            .flatten()
            .filter(|e| e.from != e.to);
        out.chain(inc).copied()
    }

    /// The node, its direct neighbours and the edges between them.
    pub fn closed_neighborhood(&self, id: &str) -> HighlightSet {
        let mut set = HighlightSet::default();
        if !self.contains(id) {
            return set;
        }
        set.nodes.insert(id.to_string());
        for e in self.connected_edges(id) {
            set.nodes.insert(e.from.clone());
            set.nodes.insert(e.to.clone());
            set.edges.insert(e.key());
        }
        set
    }

    /// All transitive predecessors of `id` plus `id`, with the edges walked.
    pub fn upstream(&self, id: &str) -> HighlightSet {
        self.traverse(id, Direction::Upstream)
    }

    /// All transitive successors of `id` plus `id`, with the edges walked.
    pub fn downstream(&self, id: &str) -> HighlightSet {
        self.traverse(id, Direction::Downstream)
    }

    fn traverse(&self, start: &str, direction: Direction) -> HighlightSet {
        let mut set = HighlightSet::default();
        if !self.contains(start) {
            return set;
        }
        let index = match direction {
            Direction::Upstream => &self.incoming,
            Direction::Downstream => &self.outgoing,
        };

        let mut queue = VecDeque::from([start.to_string()]);
        set.nodes.insert(start.to_string());
        while let Some(current) = queue.pop_front() {
            let Some(edges) = index.get(current.as_str()) else {
                continue;
            };
            for e in edges {
                set.edges.insert(e.key());
                let next = match direction {
                    Direction::Upstream => &e.from,
                    Direction::Downstream => &e.to,
                };
                if set.nodes.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
        set
    }
}

/// Fade state of the advanced view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Highlight {
    active: Option<HighlightSet>,
}

impl Highlight {
    pub fn set(&mut self, set: HighlightSet) {
        self.active = Some(set);
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&HighlightSet> {
        self.active.as_ref()
    }

    pub fn is_node_faded(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|s| !s.contains_node(id))
    }

    pub fn is_edge_faded(&self, edge: &Edge) -> bool {
        self.active.as_ref().is_some_and(|s| !s.contains_edge(edge))
    }

    pub fn is_node_highlighted(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|s| s.contains_node(id))
    }
}

/// Hover state of the simple view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoverState {
    hovered: Option<String>,
}

impl HoverState {
    pub fn enter(&mut self, id: impl Into<String>) {
        self.hovered = Some(id.into());
    }

    pub fn leave(&mut self) {
        self.hovered = None;
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// The hovered node itself, or a node linked to it by a visible edge.
    pub fn is_active(&self, id: &str, visible_edges: &[Edge]) -> bool {
        let Some(h) = self.hovered.as_deref() else {
            return false;
        };
        id == h
            || visible_edges
                .iter()
                .any(|e| (e.from == h && e.to == id) || (e.to == h && e.from == id))
    }

    /// Edges not touching the hovered node are dimmed.
    pub fn is_dimmed(&self, edge: &Edge) -> bool {
        match self.hovered.as_deref() {
            Some(h) => !edge.touches(h),
            None => false,
        }
    }
}
