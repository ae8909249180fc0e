//! Rendering a session loaded from the demo fixture.

use lineage_cli::{render, RenderFormat};
use lineage_client::{FixtureSource, LineageSession};
use lineage_graph::{GraphFilter, LayerFilter, LayoutMode, StatusFilter};
use proptest::prelude::*;
use std::sync::Arc;

const DEMO: &str = include_str!("../../../demos/lineage.json");

fn demo_source() -> Arc<FixtureSource> {
    Arc::new(FixtureSource::from_value(serde_json::from_str(DEMO).unwrap()).unwrap())
}

async fn loaded(mode: LayoutMode) -> LineageSession {
    let mut session = LineageSession::new(demo_source(), mode, 2);
    assert!(session.reload().await);
    session
}

#[tokio::test]
async fn fixture_file_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lineage.json");
    std::fs::write(&path, DEMO).unwrap();

    let source = FixtureSource::load(&path).await.unwrap();
    let mut session = LineageSession::new(Arc::new(source), LayoutMode::Grid, 2);
    assert!(session.reload().await);
    assert_eq!(session.view().graph().nodes.len(), 6);
    assert_eq!(session.view().graph().edges.len(), 5);
}

#[tokio::test]
async fn dot_output_covers_the_merged_graph() {
    let session = loaded(LayoutMode::Grid).await;
    let dot = render(session.view(), RenderFormat::Dot, None).unwrap();
    assert!(dot.starts_with("digraph lineage"));
    for cluster in ["cluster_source", "cluster_staging", "cluster_dw", "cluster_mart"] {
        assert!(dot.contains(cluster), "missing {cluster}");
    }
    assert!(dot.contains("\"ds.ORDERS\""));
    assert!(dot.contains("\"ds.CLIENTS\" -> \"mart.revenue\""));
}

#[tokio::test]
async fn upstream_highlight_reaches_both_sources() {
    let mut session = loaded(LayoutMode::Layered).await;
    session.view_mut().highlight_upstream("mart.revenue").unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&render(session.view(), RenderFormat::Json, None).unwrap()).unwrap();
    let nodes: Vec<&str> = json["highlight"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    for id in ["src.orders", "src.clients", "stg.orders", "ds.ORDERS", "ds.CLIENTS", "mart.revenue"] {
        assert!(nodes.contains(&id), "{id} not highlighted");
    }
    assert_eq!(json["phase"], "highlighted");
}

#[tokio::test]
async fn filters_shrink_the_svg() {
    let mut session = loaded(LayoutMode::Grid).await;
    session.view_mut().set_filter(GraphFilter {
        query: String::new(),
        layer: LayerFilter::All,
        status: StatusFilter::Only(lineage_graph::Status::Failed),
    });
    let svg = render(session.view(), RenderFormat::Svg, None).unwrap();
    assert_eq!(svg.matches("<rect").count(), 1);
    assert!(svg.contains("id=\"n:ds.ORDERS\""));
    assert_eq!(svg.matches("<path id=").count(), 0);
}

#[tokio::test]
async fn html_replays_the_failed_orders_wave_once() {
    let mut session = loaded(LayoutMode::Force).await;
    let wave = session.view_mut().take_impact_wave();
    let plan = wave.as_ref().unwrap();
    assert_eq!(plan.origin, "ds.ORDERS");
    assert!(plan.steps.iter().any(|s| s.nodes.iter().any(|n| n == "mart.revenue")));

    let html = render(session.view(), RenderFormat::Html, wave.as_ref()).unwrap();
    assert!(html.contains("6 nodes, 5 edges"));
    assert!(html.contains("\"origin\":\"ds.ORDERS\""));
    assert!(session.view_mut().take_impact_wave().is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever the query, the SVG draws exactly the visible nodes.
    #[test]
    fn svg_draws_every_visible_node(query in "[a-zA-Z. ]{0,8}", layer in 0usize..5) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let mut session = runtime.block_on(loaded(LayoutMode::Grid));
        let layer = ["all", "source", "staging", "dw", "mart"][layer];
        session.view_mut().set_filter(GraphFilter {
            query,
            layer: layer.parse().unwrap(),
            status: StatusFilter::All,
        });
        let visible = session.view().visible();
        let svg = render(session.view(), RenderFormat::Svg, None).unwrap();
        prop_assert_eq!(svg.matches("<rect").count(), visible.nodes.len());
    }
}
