//! Catalog-derived lineage.
//!
//! When no lineage endpoint is available a fragment can be reconstructed from
//! a dataset's declared dependencies: `src_*` and `stg_*` names are paired by
//! their base name into `source → staging → dataset` chains, anything else
//! becomes a staging table feeding the dataset directly.

use crate::model::{Edge, EdgeType, Layer, LineageGraph, Node, Status};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastLoad {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sla {
    pub frequency: String,
    pub expected_by: String,
    pub max_delay_min: u32,
}

/// A catalog entry as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    pub id: String,
    pub name: String,
    pub urn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_load: Option<LastLoad>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla: Option<Sla>,
}

/// Flat dataset row as served by the catalog backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDataset {
    pub id: String,
    #[serde(default)]
    pub urn: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub last_status: Option<String>,
    #[serde(default)]
    pub last_ended_at: Option<String>,
    #[serde(default)]
    pub last_duration_sec: Option<u64>,
    #[serde(default)]
    pub sla_frequency: Option<String>,
    #[serde(default)]
    pub sla_expected_by: Option<String>,
    #[serde(default)]
    pub sla_max_delay_min: Option<u32>,
}

impl From<BackendDataset> for DatasetRecord {
    fn from(b: BackendDataset) -> Self {
        let status = b
            .last_status
            .as_deref()
            .and_then(|s| s.parse::<Status>().ok())
            .unwrap_or(Status::Unknown);
        let has_load = b.last_status.is_some() || b.last_ended_at.is_some() || b.last_duration_sec.is_some();
        let last_load = has_load.then(|| LastLoad {
            status,
            ended_at: b.last_ended_at.clone(),
            duration_sec: Some(b.last_duration_sec.unwrap_or(0)),
        });
        let sla = Sla {
            frequency: b
                .sla_frequency
                .map(|f| f.to_lowercase())
                .unwrap_or_else(|| "daily".to_string()),
            expected_by: b.sla_expected_by.unwrap_or_default(),
            max_delay_min: b.sla_max_delay_min.unwrap_or(0),
        };
        DatasetRecord {
            urn: b.urn.unwrap_or_else(|| format!("urn:talend:{}", b.id)),
            id: b.id,
            name: b.name,
            domain: b.domain,
            owner: b.owner,
            dependencies: b.dependencies.unwrap_or_default(),
            last_load,
            sla: Some(sla),
        }
    }
}

/// Graph node id of a dataset's sink node.
pub fn sink_id(dataset_id: &str) -> String {
    format!("ds.{dataset_id}")
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

fn has_prefix_ci(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn base_name(dep: &str) -> String {
    let trimmed = strip_prefix_ci(strip_prefix_ci(dep, "src_"), "stg_");
    trimmed.strip_suffix("_raw").unwrap_or(trimmed).to_string()
}

fn pretty_label(dep: &str) -> String {
    let spaced = strip_prefix_ci(strip_prefix_ci(dep, "src_"), "stg_").replace('_', " ");
    let len = spaced.len();
    match spaced.get(len.saturating_sub(4)..) {
        // ` raw` is ASCII, so cutting four bytes lands on a char boundary.
        Some(tail) if len >= 4 && tail.eq_ignore_ascii_case(" raw") => spaced[..len - 4].to_string(),
        _ => spaced,
    }
}

/// Reconstruct a lineage fragment from a catalog record.
pub fn derive_fragment(d: &DatasetRecord) -> LineageGraph {
    let sink = sink_id(&d.id);
    let mut nodes = vec![Node {
        id: sink.clone(),
        label: if d.name.is_empty() { d.id.clone() } else { d.name.clone() },
        layer: Layer::Dw,
        domain: d.domain.clone(),
        owner: d.owner.as_ref().map(|o| o.name.clone()),
        last_status: d.last_load.as_ref().map(|l| l.status),
        last_ended_at: d.last_load.as_ref().and_then(|l| l.ended_at.clone()),
        table: None,
        columns: Vec::new(),
    }];
    let mut edges = Vec::new();

    fn ensure(nodes: &mut Vec<Node>, id: &str, label: String, layer: Layer) {
        if !nodes.iter().any(|n| n.id == id) {
            nodes.push(Node::new(id, label, layer));
        }
    }

    let src_deps: Vec<&str> = d
        .dependencies
        .iter()
        .map(String::as_str)
        .filter(|n| has_prefix_ci(n, "src_"))
        .collect();
    let stg_deps: Vec<&str> = d
        .dependencies
        .iter()
        .map(String::as_str)
        .filter(|n| has_prefix_ci(n, "stg_"))
        .collect();

    let mut bases: Vec<String> = Vec::new();
    for dep in src_deps.iter().chain(stg_deps.iter()) {
        let base = base_name(dep);
        if !bases.contains(&base) {
            bases.push(base);
        }
    }

    for base in &bases {
        let src_id = src_deps.iter().find(|n| n.contains(base.as_str())).map(|name| {
            let id = format!("src.{name}");
            ensure(&mut nodes, &id, format!("{} source", pretty_label(name)), Layer::Source);
            id
        });
        let stg_id = stg_deps.iter().find(|n| n.contains(base.as_str())).map(|name| {
            let id = format!("stg.{name}");
            ensure(&mut nodes, &id, pretty_label(name), Layer::Staging);
            id
        });

        match (src_id, stg_id) {
            (Some(src), Some(stg)) => {
                edges.push(Edge::typed(src, stg.clone(), EdgeType::Transform));
                edges.push(Edge::typed(stg, sink.clone(), EdgeType::Transform));
            }
            (Some(src), None) => edges.push(Edge::typed(src, sink.clone(), EdgeType::Transform)),
            (None, Some(stg)) => edges.push(Edge::typed(stg, sink.clone(), EdgeType::Transform)),
            (None, None) => {}
        }
    }

    for dep in d
        .dependencies
        .iter()
        .filter(|n| !has_prefix_ci(n, "src_") && !has_prefix_ci(n, "stg_"))
    {
        let id = format!("tbl.{dep}");
        ensure(&mut nodes, &id, dep.clone(), Layer::Staging);
        edges.push(Edge::typed(id, sink.clone(), EdgeType::Transform));
    }

    LineageGraph { nodes, edges }
}

/// Fragment for dataset `id` out of a catalog listing; unknown ids give an empty fragment.
pub fn derive_fragment_for(datasets: &[DatasetRecord], id: &str) -> LineageGraph {
    datasets
        .iter()
        .find(|d| d.id == id)
        .map(derive_fragment)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(deps: &[&str]) -> DatasetRecord {
        DatasetRecord {
            id: "ARTICLES".into(),
            name: "Articles".into(),
            urn: "urn:talend:ARTICLES".into(),
            domain: Some("Sales".into()),
            owner: Some(Owner {
                name: "Alice Martin".into(),
                email: String::new(),
            }),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            last_load: Some(LastLoad {
                status: Status::Late,
                ended_at: Some("2024-05-01T06:30:00Z".into()),
                duration_sec: Some(12),
            }),
            sla: None,
        }
    }

    #[test]
    fn sink_node_carries_catalog_metadata() {
        let g = derive_fragment(&record(&[]));
        assert_eq!(g.nodes.len(), 1);
        let sink = &g.nodes[0];
        assert_eq!(sink.id, "ds.ARTICLES");
        assert_eq!(sink.label, "Articles");
        assert_eq!(sink.owner.as_deref(), Some("Alice Martin"));
        assert_eq!(sink.status(), Status::Late);
    }

    #[test]
    fn src_and_stg_pair_into_a_chain() {
        let g = derive_fragment(&record(&["SRC_articles_raw", "stg_articles"]));
        let ids: Vec<&str> = g.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["ds.ARTICLES", "src.SRC_articles_raw", "stg.stg_articles"]);
        assert_eq!(g.nodes[1].label, "articles source");
        assert_eq!(g.nodes[1].layer, Layer::Source);
        assert_eq!(g.nodes[2].label, "articles");
        assert_eq!(
            g.edges,
            vec![
                Edge::typed("src.SRC_articles_raw", "stg.stg_articles", EdgeType::Transform),
                Edge::typed("stg.stg_articles", "ds.ARTICLES", EdgeType::Transform),
            ]
        );
    }

    #[test]
    fn accented_dependency_names_keep_their_labels() {
        let g = derive_fragment(&record(&["src_données_raw", "stg_commandes_été"]));
        assert_eq!(g.node("src.src_données_raw").unwrap().label, "données source");
        assert_eq!(g.node("stg.stg_commandes_été").unwrap().label, "commandes été");
        assert_eq!(pretty_label("stg_é"), "é");
    }

    #[test]
    fn lone_source_feeds_sink_directly() {
        let g = derive_fragment(&record(&["src_customers"]));
        assert_eq!(
            g.edges,
            vec![Edge::typed("src.src_customers", "ds.ARTICLES", EdgeType::Transform)]
        );
    }

    #[test]
    fn other_dependencies_become_staging_tables() {
        let g = derive_fragment(&record(&["dim_date"]));
        let tbl = g.node("tbl.dim_date").unwrap();
        assert_eq!(tbl.layer, Layer::Staging);
        assert_eq!(tbl.label, "dim_date");
        assert_eq!(g.edges.len(), 1);
    }

    #[test]
    fn unknown_dataset_gives_empty_fragment() {
        assert!(derive_fragment_for(&[record(&[])], "NOPE").is_empty());
        assert_eq!(derive_fragment_for(&[record(&[])], "ARTICLES").nodes.len(), 1);
    }

    #[test]
    fn backend_row_adapts_with_defaults() {
        let row: BackendDataset = serde_json::from_value(serde_json::json!({
            "id": "CLIENTS", "name": "Clients", "lastStatus": "FAILED", "slaFrequency": "HOURLY"
        }))
        .unwrap();
        let d = DatasetRecord::from(row);
        assert_eq!(d.urn, "urn:talend:CLIENTS");
        assert_eq!(d.last_load.unwrap().status, Status::Failed);
        assert_eq!(d.sla.unwrap().frequency, "hourly");
        assert!(d.dependencies.is_empty());
    }

    #[test]
    fn backend_row_without_load_info_has_no_last_load() {
        let row: BackendDataset =
            serde_json::from_value(serde_json::json!({"id": "X", "name": "X"})).unwrap();
        assert!(DatasetRecord::from(row).last_load.is_none());
    }
}
