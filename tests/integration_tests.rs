//! Integration tests for the complete lineage pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Fixture → fan-out load → merge → view → render
//! - Realtime events → store → view
//! - STOMP broker → realtime client → session reload
//!
//! Run with: cargo test --test integration_tests

use lineage_cli::{render, RenderFormat};
use lineage_client::stomp::{decode_frame, Frame};
use lineage_client::{load_merged, FixtureSource, FragmentSource, LineageSession, RealtimeClient};
use lineage_graph::{
    EventEffect, GraphFilter, LayoutMode, LayerFilter, RealtimeEvent, Status, StatusFilter, ViewPhase,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

const DEMO: &str = include_str!("../demos/lineage.json");

fn demo() -> Arc<dyn FragmentSource> {
    Arc::new(FixtureSource::from_value(serde_json::from_str(DEMO).unwrap()).unwrap())
}

// ============================================================================
// Load → merge → render
// ============================================================================

#[tokio::test]
async fn test_fixture_pipeline_end_to_end() {
    let dir = tempdir().unwrap();
    let fixture = dir.path().join("lineage.json");
    std::fs::write(&fixture, DEMO).unwrap();
    let source: Arc<dyn FragmentSource> = Arc::new(FixtureSource::load(&fixture).await.unwrap());

    let mut session = LineageSession::new(source, LayoutMode::Layered, 2);
    assert!(session.reload().await);
    assert_eq!(session.view().phase(), ViewPhase::Rendered);
    assert_eq!(session.store().datasets().len(), 2);

    let graph = session.view().graph();
    let ids = graph.node_ids();
    assert!(graph.edges.iter().all(|e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str())));

    let out = dir.path().join("lineage.html");
    let wave = session.view_mut().take_impact_wave();
    let html = render(session.view(), RenderFormat::Html, wave.as_ref()).unwrap();
    std::fs::write(&out, &html).unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("id=\"n:mart.revenue\""));
    assert!(written.contains("\"origin\":\"ds.ORDERS\""));
}

#[tokio::test]
async fn test_concurrent_loads_agree() {
    let source = demo();
    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let source = Arc::clone(&source);
        tasks.spawn(async move { load_merged(source, 2).await });
    }

    let mut graphs = Vec::new();
    while let Some(result) = tasks.join_next().await {
        graphs.push(result.unwrap().unwrap().merged.graph);
    }
    assert_eq!(graphs.len(), 8);
    assert!(graphs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_filters_compose_with_highlight() {
    let mut session = LineageSession::new(demo(), LayoutMode::Grid, 2);
    session.reload().await;

    let view = session.view_mut();
    view.set_filter(GraphFilter {
        query: "orders".into(),
        layer: LayerFilter::All,
        status: StatusFilter::All,
    });
    // mart.revenue no longer matches, so it cannot be highlighted.
    assert!(view.highlight_downstream("mart.revenue").is_err());
    view.highlight_downstream("src.orders").unwrap();

    let dot = render(session.view(), RenderFormat::Dot, None).unwrap();
    assert!(dot.contains("\"src.orders\" -> \"stg.orders\""));
    assert!(!dot.contains("ds.CLIENTS"));
}

// ============================================================================
// Realtime events
// ============================================================================

#[tokio::test]
async fn test_dataset_update_patches_rendered_node() {
    let mut session = LineageSession::new(demo(), LayoutMode::Grid, 2);
    session.reload().await;

    let event = RealtimeEvent::new(
        "DATASET_UPDATED",
        json!({"urn": "urn:talend:ORDERS", "status": "OK", "endedAt": "2024-05-02T07:05:00Z"}),
    );
    let effect = session.handle_event(&event).unwrap();
    assert_eq!(
        effect,
        EventEffect::Patched {
            dataset_id: "ORDERS".into(),
            node_id: Some("ds.ORDERS".into()),
        }
    );

    let node = session.view().graph().node("ds.ORDERS").unwrap();
    assert_eq!(node.status(), Status::Ok);
    assert_eq!(node.last_ended_at.as_deref(), Some("2024-05-02T07:05:00Z"));
    assert_eq!(session.store().history().count(), 1);

    // Nothing is degraded any more.
    session.view_mut().set_mode(LayoutMode::Force);
    assert!(session.view_mut().take_impact_wave().is_none());
}

#[tokio::test]
async fn test_auto_refresh_off_only_records_history() {
    let mut session = LineageSession::new(demo(), LayoutMode::Grid, 2);
    session.reload().await;
    session.store_mut().set_auto_refresh(false);

    let effect = session
        .handle_event(&RealtimeEvent::new("RUN_FAILED", json!({})))
        .unwrap();
    assert_eq!(effect, EventEffect::Ignored);
    assert_eq!(session.store().last_event().unwrap().kind, "RUN_FAILED");
}

#[tokio::test]
async fn test_broker_event_drives_reload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 512];
        let mut seen = 0;
        while seen < 2 {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            while let Some((_, used)) = decode_frame(&buf).unwrap() {
                buf.drain(..used);
                seen += 1;
            }
        }
        stream.write_all(&Frame::new("CONNECTED").encode()).await.unwrap();
        let message = Frame::new("MESSAGE")
            .header("destination", "/topic/events")
            .body(r#"{"type":"RUN_FINISHED","source":"talend"}"#)
            .encode();
        stream.write_all(&message).await.unwrap();
        let _ = stream.read(&mut chunk).await;
    });

    let mut session = LineageSession::new(demo(), LayoutMode::Grid, 2);
    session.reload().await;

    let (mut rx, _client) = RealtimeClient::new(addr).spawn(4);
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    match session.handle_event(&event).unwrap() {
        EventEffect::ReloadRequested(kind) => assert_eq!(kind, "RUN_FINISHED"),
        other => panic!("expected a reload, got {other:?}"),
    }
    let pending = session.begin_reload();
    assert!(session.view().is_loading());
    let fetched = tokio::spawn(pending.fetch()).await.unwrap();
    assert!(session.complete_reload(fetched));
    assert_eq!(session.view().phase(), ViewPhase::Rendered);
    assert_eq!(session.view().graph().nodes.len(), 6);
}
