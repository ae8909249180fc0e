//! Position assignment for rendering.
//!
//! Every engine implements [`LayoutEngine`] so the renderer never depends on a
//! particular algorithm:
//! - [`GridLayout`]: fixed column per layer, rows in filtered order (simple view)
//! - [`LayeredLayout`]: hierarchical left→right ranks with barycenter ordering
//! - [`ForceLayout`]: force-directed (spring/repulsion) placement
//!
//! Positions are node centers in a logical coordinate space; [`Layout::fit`]
//! maps them onto a concrete viewport.

use crate::error::GraphError;
use crate::model::{Layer, LineageGraph};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Scale + translation mapping layout space onto a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Viewport {
    pub const IDENTITY: Viewport = Viewport {
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.translate_x,
            p.y * self.scale + self.translate_y,
        )
    }
}

/// Node box dimensions shared by all engines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    pub node_width: f64,
    pub node_height: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            node_width: 210.0,
            node_height: 64.0,
        }
    }
}

/// Computed node centers, in graph node order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub engine: &'static str,
    pub positions: IndexMap<String, Point>,
    #[serde(skip)]
    pub options: LayoutOptions,
}

impl Layout {
    pub fn get(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }

    /// Center of `id`, or the origin for nodes that were not laid out.
    pub fn position(&self, id: &str) -> Point {
        self.get(id).unwrap_or(Point::ORIGIN)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Extent of all node boxes, `None` when nothing was laid out.
    pub fn bounds(&self) -> Option<Bounds> {
        let hw = self.options.node_width / 2.0;
        let hh = self.options.node_height / 2.0;
        let mut it = self.positions.values();
        let first = it.next()?;
        let mut b = Bounds {
            min_x: first.x - hw,
            min_y: first.y - hh,
            max_x: first.x + hw,
            max_y: first.y + hh,
        };
        for p in it {
            b.min_x = b.min_x.min(p.x - hw);
            b.min_y = b.min_y.min(p.y - hh);
            b.max_x = b.max_x.max(p.x + hw);
            b.max_y = b.max_y.max(p.y + hh);
        }
        Some(b)
    }

    /// Fit every node into a `width × height` viewport leaving `padding` on each side.
    pub fn fit(&self, width: f64, height: f64, padding: f64) -> Viewport {
        let Some(b) = self.bounds() else {
            return Viewport::IDENTITY;
        };
        let avail_w = (width - 2.0 * padding).max(1.0);
        let avail_h = (height - 2.0 * padding).max(1.0);
        let scale = (avail_w / b.width()).min(avail_h / b.height());
        Viewport {
            scale,
            translate_x: padding + (avail_w - b.width() * scale) / 2.0 - b.min_x * scale,
            translate_y: padding + (avail_h - b.height() * scale) / 2.0 - b.min_y * scale,
        }
    }
}

/// A swappable position engine.
pub trait LayoutEngine {
    fn name(&self) -> &'static str;
    fn layout(&self, graph: &LineageGraph, options: &LayoutOptions) -> Layout;
}

// ============================================================================
// Grid
// ============================================================================

/// Simple view: one column per layer, rows in node order.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub columns: [f64; 4],
    pub top: f64,
    pub row_height: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: [150.0, 450.0, 750.0, 1050.0],
            top: 80.0,
            row_height: 90.0,
        }
    }
}

impl GridLayout {
    pub fn column_x(&self, layer: Layer) -> f64 {
        self.columns[layer.index()]
    }
}

impl LayoutEngine for GridLayout {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn layout(&self, graph: &LineageGraph, options: &LayoutOptions) -> Layout {
        let mut rows = [0usize; 4];
        let mut positions = IndexMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let row = &mut rows[node.layer.index()];
            let y = self.top + *row as f64 * self.row_height;
            *row += 1;
            positions.insert(node.id.clone(), Point::new(self.column_x(node.layer), y));
        }
        Layout {
            engine: self.name(),
            positions,
            options: *options,
        }
    }
}

// ============================================================================
// Layered (hierarchical)
// ============================================================================

/// Hierarchical left→right layout.
///
/// 1. rank = longest path from a root (edges into a node on the current DFS
///    stack are ignored, so cycles terminate)
/// 2. ordering inside a rank by alternating barycenter sweeps
/// 3. coordinates: ranks spaced by `rank_sep`, nodes by `node_sep`, each rank
///    centered on the tallest one
#[derive(Debug, Clone)]
pub struct LayeredLayout {
    pub rank_sep: f64,
    pub node_sep: f64,
    pub sweeps: usize,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            rank_sep: 80.0,
            node_sep: 40.0,
            sweeps: 4,
        }
    }
}

fn compute_ranks(graph: &LineageGraph) -> HashMap<String, usize> {
    let ids: HashSet<&str> = graph.node_ids();
    let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
    for e in graph.edges_within(&ids) {
        if e.from != e.to {
            preds.entry(e.to.as_str()).or_default().push(e.from.as_str());
        }
    }

    // Longest path from the roots, walked with an explicit stack so long
    // chains cannot overflow. Back edges into the current path are skipped.
    let mut ranks: HashMap<String, usize> = HashMap::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    // (node, next predecessor to look at, rank so far)
    let mut stack: Vec<(&str, usize, usize)> = Vec::new();
    for n in &graph.nodes {
        let root = n.id.as_str();
        if ranks.contains_key(root) {
            continue;
        }
        visiting.insert(root);
        stack.push((root, 0, 0));
        while let Some(frame) = stack.last_mut() {
            let (id, next, rank) = *frame;
            let ps = preds.get(id).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&p) = ps.get(next) {
                frame.1 += 1;
                if visiting.contains(p) {
                    continue;
                }
                if let Some(&r) = ranks.get(p) {
                    frame.2 = rank.max(r + 1);
                    continue;
                }
                visiting.insert(p);
                stack.push((p, 0, 0));
            } else {
                stack.pop();
                visiting.remove(id);
                ranks.insert(id.to_string(), rank);
                if let Some(parent) = stack.last_mut() {
                    parent.2 = parent.2.max(rank + 1);
                }
            }
        }
    }
    ranks
}

fn barycenter(neighbors: Option<&Vec<&str>>, order: &HashMap<&str, f64>) -> Option<f64> {
    let vals: Vec<f64> = neighbors?
        .iter()
        .filter_map(|n| order.get(n).copied())
        .collect();
    if vals.is_empty() {
        None
    } else {
        Some(vals.iter().sum::<f64>() / vals.len() as f64)
    }
}

impl LayoutEngine for LayeredLayout {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn layout(&self, graph: &LineageGraph, options: &LayoutOptions) -> Layout {
        let ranks = compute_ranks(graph);
        let max_rank = ranks.values().copied().max().unwrap_or(0);
        let mut groups: Vec<Vec<&str>> = vec![Vec::new(); max_rank + 1];
        for n in &graph.nodes {
            if let Some(&r) = ranks.get(&n.id) {
                groups[r].push(n.id.as_str());
            }
        }

        let ids = graph.node_ids();
        let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut succs: HashMap<&str, Vec<&str>> = HashMap::new();
        for e in graph.edges_within(&ids) {
            preds.entry(e.to.as_str()).or_default().push(e.from.as_str());
            succs.entry(e.from.as_str()).or_default().push(e.to.as_str());
        }

        for sweep in 0..self.sweeps {
            let downward = sweep % 2 == 0;
            let mut order: HashMap<&str, f64> = HashMap::new();
            for group in &groups {
                for (i, id) in group.iter().enumerate() {
                    order.insert(*id, i as f64);
                }
            }
            let rank_indices: Vec<usize> = if downward {
                (1..groups.len()).collect()
            } else {
                (0..groups.len().saturating_sub(1)).rev().collect()
            };
            for r in rank_indices {
                let neighbors = if downward { &preds } else { &succs };
                let mut keyed: Vec<(f64, usize, &str)> = groups[r]
                    .iter()
                    .enumerate()
                    .map(|(i, id)| {
                        let key = barycenter(neighbors.get(id), &order).unwrap_or(i as f64);
                        (key, i, *id)
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                groups[r] = keyed.into_iter().map(|(_, _, id)| id).collect();
                for (i, id) in groups[r].iter().enumerate() {
                    order.insert(*id, i as f64);
                }
            }
        }

        let step_x = options.node_width + self.rank_sep;
        let step_y = options.node_height + self.node_sep;
        let tallest = groups.iter().map(Vec::len).max().unwrap_or(0);

        let mut centers: HashMap<&str, Point> = HashMap::new();
        for (r, group) in groups.iter().enumerate() {
            let offset = (tallest - group.len()) as f64 * step_y / 2.0;
            for (i, id) in group.iter().enumerate() {
                let x = options.node_width / 2.0 + r as f64 * step_x;
                let y = options.node_height / 2.0 + offset + i as f64 * step_y;
                centers.insert(*id, Point::new(x, y));
            }
        }

        let positions = graph
            .nodes
            .iter()
            .filter_map(|n| centers.get(n.id.as_str()).map(|p| (n.id.clone(), *p)))
            .collect();
        Layout {
            engine: self.name(),
            positions,
            options: *options,
        }
    }
}

// ============================================================================
// Force-directed
// ============================================================================

/// Fruchterman–Reingold placement with a gravity pull toward the centroid.
///
/// Nodes start evenly spaced on a circle, so the result only depends on the
/// input order.
#[derive(Debug, Clone)]
pub struct ForceLayout {
    pub iterations: usize,
    pub ideal_edge_length: f64,
    pub gravity: f64,
}

impl Default for ForceLayout {
    fn default() -> Self {
        Self {
            iterations: 300,
            ideal_edge_length: 160.0,
            gravity: 0.25,
        }
    }
}

impl LayoutEngine for ForceLayout {
    fn name(&self) -> &'static str {
        "force"
    }

    fn layout(&self, graph: &LineageGraph, options: &LayoutOptions) -> Layout {
        let n = graph.nodes.len();
        let index: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();
        let springs: Vec<(usize, usize)> = graph
            .edges
            .iter()
            .filter_map(|e| Some((*index.get(e.from.as_str())?, *index.get(e.to.as_str())?)))
            .filter(|(a, b)| a != b)
            .collect();

        let k = self.ideal_edge_length;
        let radius = k * (n as f64).sqrt();
        let mut pos: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / n.max(1) as f64;
                (radius * angle.cos(), radius * angle.sin())
            })
            .collect();

        let initial_temp = radius.max(k);
        for iter in 0..self.iterations {
            let temp = initial_temp * (1.0 - iter as f64 / self.iterations as f64);
            let mut disp = vec![(0.0f64, 0.0f64); n];

            for i in 0..n {
                for j in (i + 1)..n {
                    let (mut dx, mut dy) = (pos[i].0 - pos[j].0, pos[i].1 - pos[j].1);
                    let mut dist = (dx * dx + dy * dy).sqrt();
                    if dist < 1e-6 {
                        // Coincident nodes: push apart along a fixed direction.
                        dx = 1.0 + i as f64 * 1e-3;
                        dy = 1.0;
                        dist = (dx * dx + dy * dy).sqrt();
                    }
                    let force = k * k / dist;
                    let (fx, fy) = (dx / dist * force, dy / dist * force);
                    disp[i].0 += fx;
                    disp[i].1 += fy;
                    disp[j].0 -= fx;
                    disp[j].1 -= fy;
                }
            }

            for &(a, b) in &springs {
                let (dx, dy) = (pos[a].0 - pos[b].0, pos[a].1 - pos[b].1);
                let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                let force = dist * dist / k;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                disp[a].0 -= fx;
                disp[a].1 -= fy;
                disp[b].0 += fx;
                disp[b].1 += fy;
            }

            let (cx, cy) = centroid(&pos);
            for i in 0..n {
                disp[i].0 -= self.gravity * (pos[i].0 - cx);
                disp[i].1 -= self.gravity * (pos[i].1 - cy);
                let len = (disp[i].0 * disp[i].0 + disp[i].1 * disp[i].1).sqrt();
                if len > 0.0 {
                    let capped = len.min(temp);
                    pos[i].0 += disp[i].0 / len * capped;
                    pos[i].1 += disp[i].1 / len * capped;
                }
            }
        }

        let min_x = pos.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let min_y = pos.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let positions = graph
            .nodes
            .iter()
            .zip(pos)
            .map(|(node, (x, y))| {
                (
                    node.id.clone(),
                    Point::new(
                        x - min_x + options.node_width / 2.0,
                        y - min_y + options.node_height / 2.0,
                    ),
                )
            })
            .collect();
        Layout {
            engine: self.name(),
            positions,
            options: *options,
        }
    }
}

fn centroid(pos: &[(f64, f64)]) -> (f64, f64) {
    if pos.is_empty() {
        return (0.0, 0.0);
    }
    let n = pos.len() as f64;
    let (sx, sy) = pos.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    (sx / n, sy / n)
}

// ============================================================================
// Mode selection
// ============================================================================

/// Which engine a view uses. `Grid` is the simple view, the others the advanced one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Grid,
    Layered,
    Force,
}

impl LayoutMode {
    pub fn engine(self) -> Box<dyn LayoutEngine> {
        match self {
            LayoutMode::Grid => Box::new(GridLayout::default()),
            LayoutMode::Layered => Box::new(LayeredLayout::default()),
            LayoutMode::Force => Box::new(ForceLayout::default()),
        }
    }

    pub fn is_advanced(self) -> bool {
        !matches!(self, LayoutMode::Grid)
    }
}

impl FromStr for LayoutMode {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" | "simple" => Ok(LayoutMode::Grid),
            "layered" | "dagre" | "hierarchical" => Ok(LayoutMode::Layered),
            "force" | "cose" => Ok(LayoutMode::Force),
            other => Err(GraphError::Parse {
                what: "layout mode",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};
    use approx::assert_relative_eq;

    fn chain() -> LineageGraph {
        LineageGraph::new(
            vec![
                Node::new("ds", "DS", Layer::Dw),
                Node::new("src", "SRC", Layer::Source),
                Node::new("stg1", "STG1", Layer::Staging),
                Node::new("stg2", "STG2", Layer::Staging),
            ],
            vec![
                Edge::new("src", "stg1"),
                Edge::new("src", "stg2"),
                Edge::new("stg1", "ds"),
            ],
        )
    }

    #[test]
    fn grid_places_layers_in_columns_and_rows_in_order() {
        let l = GridLayout::default().layout(&chain(), &LayoutOptions::default());
        assert_eq!(l.position("src"), Point::new(150.0, 80.0));
        assert_eq!(l.position("stg1"), Point::new(450.0, 80.0));
        assert_eq!(l.position("stg2"), Point::new(450.0, 170.0));
        assert_eq!(l.position("ds"), Point::new(750.0, 80.0));
        assert_eq!(l.position("missing"), Point::ORIGIN);
    }

    #[test]
    fn grid_columns_strictly_increase() {
        let g = GridLayout::default();
        let xs: Vec<f64> = Layer::ALL.iter().map(|l| g.column_x(*l)).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn layered_ranks_follow_edges() {
        let l = LayeredLayout::default().layout(&chain(), &LayoutOptions::default());
        assert!(l.position("src").x < l.position("stg1").x);
        assert!(l.position("stg1").x < l.position("ds").x);
        assert_relative_eq!(l.position("stg1").x, l.position("stg2").x);
        assert_ne!(l.position("stg1").y, l.position("stg2").y);
    }

    #[test]
    fn layered_tolerates_cycles() {
        let g = LineageGraph::new(
            vec![Node::new("a", "A", Layer::Dw), Node::new("b", "B", Layer::Dw)],
            vec![Edge::new("a", "b"), Edge::new("b", "a")],
        );
        let l = LayeredLayout::default().layout(&g, &LayoutOptions::default());
        assert_eq!(l.len(), 2);
        assert_ne!(l.position("a"), l.position("b"));
    }

    #[test]
    fn ranks_of_a_very_long_chain() {
        let n = 200_000;
        // Listed sink first so the walk has to descend the whole chain at once.
        let nodes = (0..n).rev().map(|i| Node::new(format!("n{i}"), "N", Layer::Dw)).collect();
        let edges = (1..n).map(|i| Edge::new(format!("n{}", i - 1), format!("n{i}"))).collect();
        let ranks = compute_ranks(&LineageGraph::new(nodes, edges));
        assert_eq!(ranks.len(), n);
        assert_eq!(ranks["n0"], 0);
        assert_eq!(ranks[&format!("n{}", n - 1)], n - 1);
    }

    #[test]
    fn force_is_deterministic_and_separates_nodes() {
        let opts = LayoutOptions::default();
        let a = ForceLayout::default().layout(&chain(), &opts);
        let b = ForceLayout::default().layout(&chain(), &opts);
        assert_eq!(a, b);
        let pts: Vec<Point> = a.positions.values().copied().collect();
        for i in 0..pts.len() {
            for j in (i + 1)..pts.len() {
                let d = ((pts[i].x - pts[j].x).powi(2) + (pts[i].y - pts[j].y).powi(2)).sqrt();
                assert!(d > 1.0, "nodes {i} and {j} overlap");
            }
        }
        assert!(pts.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn fit_centers_layout_in_viewport() {
        let l = GridLayout::default().layout(&chain(), &LayoutOptions::default());
        let vp = l.fit(900.0, 600.0, 40.0);
        let b = l.bounds().unwrap();
        let tl = vp.apply(Point::new(b.min_x, b.min_y));
        let br = vp.apply(Point::new(b.max_x, b.max_y));
        assert!(tl.x >= 40.0 - 1e-9 && tl.y >= 40.0 - 1e-9);
        assert!(br.x <= 860.0 + 1e-9 && br.y <= 560.0 + 1e-9);
    }

    #[test]
    fn empty_graph_fits_to_identity() {
        let l = ForceLayout::default().layout(&LineageGraph::default(), &LayoutOptions::default());
        assert!(l.is_empty());
        assert_eq!(l.fit(100.0, 100.0, 10.0), Viewport::IDENTITY);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("dagre".parse::<LayoutMode>().unwrap(), LayoutMode::Layered);
        assert_eq!("cose".parse::<LayoutMode>().unwrap(), LayoutMode::Force);
        assert_eq!(LayoutMode::Grid.engine().name(), "grid");
        assert!("circle".parse::<LayoutMode>().is_err());
    }
}
