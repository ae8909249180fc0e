//! Impact wave: the one-shot animation that ripples out from a failing node.
//!
//! Purely cosmetic. The plan is computed here; replaying it against a clock
//! is up to the renderer.

use crate::interaction::Adjacency;
use crate::model::{EdgeKey, Layer, LineageGraph};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;

/// Delay added per hop of graph distance.
pub const STEP_DELAY: Duration = Duration::from_millis(120);
/// Time the last marks stay visible before everything is cleared.
pub const LINGER: Duration = Duration::from_millis(1200);

/// Marks applied at a given delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveStep {
    pub depth: usize,
    #[serde(with = "millis")]
    pub delay: Duration,
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub origin: String,
    pub steps: Vec<WaveStep>,
    /// When every mark is removed.
    #[serde(with = "millis")]
    pub clear_after: Duration,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

impl WavePlan {
    pub fn max_depth(&self) -> usize {
        self.steps.last().map(|s| s.depth).unwrap_or(0)
    }

    /// Nodes and edges marked at `elapsed` since the wave started.
    pub fn marks_at(&self, elapsed: Duration) -> (BTreeSet<&str>, BTreeSet<&EdgeKey>) {
        let mut nodes = BTreeSet::new();
        let mut edges = BTreeSet::new();
        if elapsed >= self.clear_after {
            return (nodes, edges);
        }
        for step in self.steps.iter().filter(|s| s.delay <= elapsed) {
            nodes.extend(step.nodes.iter().map(String::as_str));
            edges.extend(step.edges.iter());
        }
        (nodes, edges)
    }
}

/// Plan the wave for `graph`, or `None` when nothing is `FAILED`/`LATE`.
///
/// The origin is the first degraded node in the `dw` layer, else the first
/// degraded node overall. The walk is breadth-first over edges in both
/// directions; an edge is marked at the depth of the node it was reached from.
pub fn plan_impact_wave(graph: &LineageGraph) -> Option<WavePlan> {
    let degraded = || graph.nodes.iter().filter(|n| n.status().is_degraded());
    let origin = degraded()
        .find(|n| n.layer == Layer::Dw)
        .or_else(|| degraded().next())?;

    let adj = Adjacency::new(graph);
    let mut steps: Vec<WaveStep> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut marked_edges: HashSet<EdgeKey> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(origin.id.as_str(), 0)]);

    while let Some((id, depth)) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        if steps.len() <= depth {
            steps.push(WaveStep {
                depth,
                delay: STEP_DELAY * depth as u32,
                nodes: Vec::new(),
                edges: Vec::new(),
            });
        }
        let step = &mut steps[depth];
        step.nodes.push(id.to_string());
        for e in adj.connected_edges(id) {
            let key = e.key();
            if marked_edges.insert(key.clone()) {
                step.edges.push(key);
            }
            let other = if e.from == id { e.to.as_str() } else { e.from.as_str() };
            queue.push_back((other, depth + 1));
        }
    }

    let max_depth = steps.last().map(|s| s.depth).unwrap_or(0);
    Some(WavePlan {
        origin: origin.id.clone(),
        steps,
        clear_after: STEP_DELAY * max_depth as u32 + LINGER,
    })
}
