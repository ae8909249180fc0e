//! Property-based tests for the lineage pipeline
//!
//! 1. Merged graphs never contain dangling edges
//! 2. Merging is idempotent on the edge set
//! 3. Node ids stay unique and the last fragment wins
//! 4. Filters never keep an edge whose endpoint was filtered out
//! 5. Every layout engine positions every node

use lineage_graph::*;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Strategies
// ============================================================================

fn node_id_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}".prop_map(|s| s)
}

fn layer_strategy() -> impl Strategy<Value = Layer> {
    prop_oneof![
        Just(Layer::Source),
        Just(Layer::Staging),
        Just(Layer::Dw),
        Just(Layer::Mart),
    ]
}

fn status_strategy() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

fn edge_type_strategy() -> impl Strategy<Value = Option<EdgeType>> {
    prop_oneof![
        Just(None),
        Just(Some(EdgeType::Transform)),
        Just(Some(EdgeType::Copy)),
        Just(Some(EdgeType::Join)),
    ]
}

fn node_strategy() -> impl Strategy<Value = Node> {
    (node_id_strategy(), "[A-Z][a-z]{1,6}", layer_strategy(), status_strategy())
        .prop_map(|(id, label, layer, status)| Node::new(id, label, layer).with_status(status))
}

fn edge_strategy() -> impl Strategy<Value = Edge> {
    (node_id_strategy(), node_id_strategy(), edge_type_strategy()).prop_map(|(from, to, ty)| Edge {
        from,
        to,
        edge_type: ty,
    })
}

fn fragment_strategy() -> impl Strategy<Value = LineageGraph> {
    (
        prop::collection::vec(node_strategy(), 0..8),
        prop::collection::vec(edge_strategy(), 0..12),
    )
        .prop_map(|(nodes, edges)| LineageGraph::new(nodes, edges))
}

fn fragments_strategy() -> impl Strategy<Value = Vec<LineageGraph>> {
    prop::collection::vec(fragment_strategy(), 0..5)
}

// ============================================================================
// Merge invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn merged_graph_has_no_dangling_edges(fragments in fragments_strategy()) {
        let merged = merge_fragments(fragments).graph;
        let ids = merged.node_ids();
        for e in &merged.edges {
            prop_assert!(ids.contains(e.from.as_str()));
            prop_assert!(ids.contains(e.to.as_str()));
        }
    }

    #[test]
    fn node_ids_are_unique(fragments in fragments_strategy()) {
        let merged = merge_fragments(fragments).graph;
        let ids: HashSet<&str> = merged.nodes.iter().map(|n| n.id.as_str()).collect();
        prop_assert_eq!(ids.len(), merged.nodes.len());
    }

    #[test]
    fn edge_keys_are_unique(fragments in fragments_strategy()) {
        let merged = merge_fragments(fragments).graph;
        let keys: HashSet<EdgeKey> = merged.edges.iter().map(Edge::key).collect();
        prop_assert_eq!(keys.len(), merged.edges.len());
    }

    #[test]
    fn merging_a_fragment_twice_adds_no_edges(fragment in fragment_strategy()) {
        let once = merge_fragments([fragment.clone()]).graph;
        let twice = merge_fragments([fragment.clone(), fragment]).graph;
        prop_assert_eq!(once.edges, twice.edges);
        prop_assert_eq!(once.nodes, twice.nodes);
    }

    #[test]
    fn last_fragment_wins_for_each_node(fragments in fragments_strategy()) {
        let merged = merge_fragments(fragments.clone()).graph;
        for node in &merged.nodes {
            let last = fragments
                .iter()
                .flat_map(|f| f.nodes.iter())
                .filter(|n| n.id == node.id)
                .last();
            prop_assert_eq!(Some(node), last);
        }
    }

    #[test]
    fn stats_account_for_every_edge(fragments in fragments_strategy()) {
        let pushed: usize = fragments.iter().map(|f| f.edges.len()).sum();
        let mut merger = Merger::new();
        for f in fragments {
            merger.push(f);
        }
        let MergeOutcome { graph, stats } = merger.finish();
        prop_assert_eq!(stats.edges, graph.edges.len());
        prop_assert_eq!(stats.edges + stats.duplicate_edges + stats.dangling_edges, pushed);
    }
}

// ============================================================================
// Filter + layout invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn filtered_edges_stay_within_visible_nodes(
        fragments in fragments_strategy(),
        layer in layer_strategy(),
        query in "[a-z]{0,2}",
    ) {
        let merged = merge_fragments(fragments).graph;
        let filter = GraphFilter {
            query,
            layer: LayerFilter::Only(layer),
            status: StatusFilter::All,
        };
        let visible = filter.apply(&merged);
        let ids = visible.node_ids();
        prop_assert!(visible.nodes.iter().all(|n| n.layer == layer));
        for e in &visible.edges {
            prop_assert!(ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()));
        }
    }

    #[test]
    fn every_engine_positions_every_node(fragments in fragments_strategy()) {
        let merged = merge_fragments(fragments).graph;
        for mode in [LayoutMode::Grid, LayoutMode::Layered, LayoutMode::Force] {
            let layout = mode.engine().layout(&merged, &LayoutOptions::default());
            prop_assert_eq!(layout.len(), merged.nodes.len());
            for n in &merged.nodes {
                let p = layout.position(&n.id);
                prop_assert!(p.x.is_finite() && p.y.is_finite());
            }
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn later_fragment_label_wins() {
    let f1 = LineageGraph::new(vec![Node::new("a", "A1", Layer::Dw)], vec![]);
    let f2 = LineageGraph::new(vec![Node::new("a", "A2", Layer::Dw)], vec![]);
    let merged = merge_fragments([f1, f2]).graph;
    assert_eq!(merged.nodes.len(), 1);
    assert_eq!(merged.nodes[0].label, "A2");
}

#[test]
fn edge_to_missing_node_is_dropped() {
    let f = LineageGraph::new(
        vec![Node::new("a", "A", Layer::Dw), Node::new("b", "B", Layer::Dw)],
        vec![Edge::new("a", "c")],
    );
    let merged = merge_fragments([f]).graph;
    assert_eq!(merged.nodes.len(), 2);
    assert!(merged.edges.is_empty());
}

#[test]
fn layer_filter_with_no_match_yields_no_edges() {
    let g = LineageGraph::new(
        vec![Node::new("a", "A", Layer::Dw), Node::new("b", "B", Layer::Dw)],
        vec![Edge::new("a", "b")],
    );
    let filter = GraphFilter {
        layer: LayerFilter::Only(Layer::Mart),
        ..GraphFilter::default()
    };
    let visible = filter.apply(&g);
    assert!(visible.nodes.is_empty());
    assert!(visible.edges.is_empty());
}
