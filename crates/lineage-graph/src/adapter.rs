//! Fragment normalization.
//!
//! Backends answer the per-dataset lineage call with one of two shapes:
//! `{nodes, edges}` or `{vertices, links}`. Field names inside the records
//! vary as well (`name` vs `label`, `source` vs `from`, `status` vs
//! `lastStatus`). Everything is coerced into [`LineageGraph`] here; an
//! unrecognized shape yields an empty fragment.

use crate::model::{Edge, EdgeType, Layer, LineageGraph, Node, Status};
use serde_json::Value;

/// Coerce a raw backend response into the canonical fragment shape.
pub fn normalize_fragment(raw: &Value) -> LineageGraph {
    let Some((nodes, edges)) = fragment_arrays(raw) else {
        tracing::debug!("unrecognized lineage fragment shape, using empty fragment");
        return LineageGraph::default();
    };

    let nodes: Vec<Node> = nodes.iter().filter_map(map_node).collect();
    let edges: Vec<Edge> = edges.iter().filter_map(map_edge).collect();
    LineageGraph { nodes, edges }
}

fn fragment_arrays(raw: &Value) -> Option<(&Vec<Value>, &Vec<Value>)> {
    let obj = raw.as_object()?;
    if let (Some(Value::Array(n)), Some(Value::Array(e))) = (obj.get("nodes"), obj.get("edges")) {
        return Some((n, e));
    }
    if let (Some(Value::Array(n)), Some(Value::Array(e))) = (obj.get("vertices"), obj.get("links")) {
        return Some((n, e));
    }
    None
}

/// Strings and numbers both count as identifiers.
fn scalar_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| scalar_string(obj.get(*k)))
}

fn map_node(raw: &Value) -> Option<Node> {
    let obj = raw.as_object()?;
    let Some(id) = scalar_string(obj.get("id")) else {
        tracing::debug!(record = %raw, "skipping lineage node without id");
        return None;
    };

    let label = first_string(obj, &["label", "name"]).unwrap_or_else(|| id.clone());
    let layer = first_string(obj, &["layer"])
        .and_then(|s| s.parse::<Layer>().ok())
        .unwrap_or_default();
    let owner = match obj.get("owner") {
        Some(Value::Object(o)) => scalar_string(o.get("name")),
        other => scalar_string(other),
    };
    let status = first_string(obj, &["lastStatus", "status"])
        .and_then(|s| s.parse::<Status>().ok())
        .unwrap_or(Status::Unknown);
    let columns = match obj.get("columns") {
        Some(Value::Array(cols)) => cols
            .iter()
            .filter_map(|c| c.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Some(Node {
        id,
        label,
        layer,
        domain: first_string(obj, &["domain"]),
        owner,
        last_status: Some(status),
        last_ended_at: first_string(obj, &["lastEndedAt", "endedAt"]),
        table: first_string(obj, &["table"]),
        columns,
    })
}

fn map_edge(raw: &Value) -> Option<Edge> {
    let obj = raw.as_object()?;
    let from = first_string(obj, &["from", "source"]);
    let to = first_string(obj, &["to", "target"]);
    let (Some(from), Some(to)) = (from, to) else {
        tracing::debug!(record = %raw, "skipping lineage edge without endpoints");
        return None;
    };
    let edge_type = first_string(obj, &["type"]).and_then(|t| t.parse::<EdgeType>().ok());
    Some(Edge { from, to, edge_type })
}
