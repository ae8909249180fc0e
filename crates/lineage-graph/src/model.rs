//! Canonical node/edge model shared by every stage of the pipeline.

use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Pipeline stage of a node. Drives the horizontal column in grid layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Source,
    Staging,
    Dw,
    Mart,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Source, Layer::Staging, Layer::Dw, Layer::Mart];

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Source => "source",
            Layer::Staging => "staging",
            Layer::Dw => "dw",
            Layer::Mart => "mart",
        }
    }

    /// Column index, `0` for `source` up to `3` for `mart`.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Default for Layer {
    fn default() -> Self {
        Layer::Dw
    }
}

impl FromStr for Layer {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" | "src" => Ok(Layer::Source),
            "staging" | "stg" => Ok(Layer::Staging),
            "dw" => Ok(Layer::Dw),
            "mart" => Ok(Layer::Mart),
            other => Err(GraphError::Parse {
                what: "layer",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most recent execution outcome of the job feeding a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Running,
    Late,
    Failed,
    Unknown,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Ok,
        Status::Running,
        Status::Late,
        Status::Failed,
        Status::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Running => "RUNNING",
            Status::Late => "LATE",
            Status::Failed => "FAILED",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// `LATE` and `FAILED` start an impact wave.
    pub fn is_degraded(self) -> bool {
        matches!(self, Status::Late | Status::Failed)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Unknown
    }
}

impl FromStr for Status {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" | "SUCCESS" => Ok(Status::Ok),
            "RUNNING" => Ok(Status::Running),
            "LATE" => Ok(Status::Late),
            "FAILED" => Ok(Status::Failed),
            "UNKNOWN" => Ok(Status::Unknown),
            other => Err(GraphError::Parse {
                what: "status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of data flow; affects rendering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Transform,
    Copy,
    Join,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Transform => "transform",
            EdgeType::Copy => "copy",
            EdgeType::Join => "join",
        }
    }
}

impl FromStr for EdgeType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transform" => Ok(EdgeType::Transform),
            "copy" => Ok(EdgeType::Copy),
            "join" => Ok(EdgeType::Join),
            other => Err(GraphError::Parse {
                what: "edge type",
                value: other.to_string(),
            }),
        }
    }
}

/// A dataset, job or report in the lineage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub layer: Layer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, layer: Layer) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            layer,
            domain: None,
            owner: None,
            last_status: None,
            last_ended_at: None,
            table: None,
            columns: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.last_status = Some(status);
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.table = Some(table.to_string());
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Status used for colouring and filtering; absent means `UNKNOWN`.
    pub fn status(&self) -> Status {
        self.last_status.unwrap_or_default()
    }

    /// Lower-cased haystack searched by the text filter.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.label.as_str()];
        parts.extend(self.domain.as_deref());
        parts.extend(self.owner.as_deref());
        parts.extend(self.table.as_deref());
        parts.extend(self.columns.iter().map(String::as_str));
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Directed data-flow relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<EdgeType>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type: None,
        }
    }

    pub fn typed(from: impl Into<String>, to: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type: Some(edge_type),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from: self.from.clone(),
            to: self.to.clone(),
            edge_type: self.edge_type,
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }
}

/// Deduplication identity of an edge: `(from, to, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: String,
    pub to: String,
    pub edge_type: Option<EdgeType>,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.edge_type.map(EdgeType::as_str).unwrap_or("");
        write!(f, "{}->{}->{}", self.from, self.to, ty)
    }
}

/// A lineage fragment, or the merged graph built from several of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl LineageGraph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Edges whose endpoints both appear in `ids`.
    pub fn edges_within<'a>(&'a self, ids: &'a HashSet<&'a str>) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_parse_and_order() {
        assert_eq!("Staging".parse::<Layer>().unwrap(), Layer::Staging);
        assert!("lake".parse::<Layer>().is_err());
        assert!(Layer::Source < Layer::Staging && Layer::Dw < Layer::Mart);
        assert_eq!(Layer::default(), Layer::Dw);
    }

    #[test]
    fn node_status_defaults_to_unknown() {
        let n = Node::new("a", "A", Layer::Dw);
        assert_eq!(n.status(), Status::Unknown);
        assert_eq!(n.with_status(Status::Late).status(), Status::Late);
    }

    #[test]
    fn search_text_joins_descriptive_fields() {
        let n = Node::new("ds.orders", "Orders", Layer::Mart)
            .with_domain("Sales")
            .with_owner("Alice")
            .with_table("ORDERS", &["order_id", "email"]);
        assert_eq!(n.search_text(), "orders sales alice orders order_id email");
    }

    #[test]
    fn edge_serializes_type_field() {
        let e = Edge::typed("a", "b", EdgeType::Copy);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "copy");
        assert_eq!(e.key().to_string(), "a->b->copy");
    }

    #[test]
    fn node_round_trips_camel_case() {
        let json = serde_json::json!({
            "id": "x", "label": "X", "layer": "mart", "lastStatus": "FAILED"
        });
        let n: Node = serde_json::from_value(json).unwrap();
        assert_eq!(n.layer, Layer::Mart);
        assert_eq!(n.last_status, Some(Status::Failed));
    }
}
