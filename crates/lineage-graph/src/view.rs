//! State of one lineage screen.
//!
//! ```text
//! Idle ──begin_reload──► Loading ──complete_reload──► Rendered
//!                                                     │  ▲
//!                                       set_filter ───┘  │ clear_highlights
//!                                        Filtered ──select──► Selected
//!                                                 ──highlight_*──► Highlighted
//! ```
//!
//! A reload can be started while another is in flight. Each call to
//! [`LineageView::begin_reload`] hands out a ticket; completing an outdated
//! ticket is a no-op so a slow response never replaces a newer graph.

use crate::error::{GraphError, Result};
use crate::filter::GraphFilter;
use crate::impact::{plan_impact_wave, WavePlan};
use crate::interaction::{Adjacency, Highlight, HoverState};
use crate::layout::{Layout, LayoutMode, LayoutOptions};
use crate::model::LineageGraph;
use serde::Serialize;

/// Banner shown when a reload fails.
pub const LOAD_ERROR: &str = "Impossible de charger le lineage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPhase {
    #[default]
    Idle,
    Loading,
    Rendered,
    Filtered,
    Selected,
    Highlighted,
}

/// Proof that a reload was started; see [`LineageView::complete_reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReloadTicket(u64);

#[derive(Debug, Clone, Default)]
pub struct LineageView {
    graph: LineageGraph,
    filter: GraphFilter,
    mode: LayoutMode,
    options: LayoutOptions,
    selected: Option<String>,
    highlight: Highlight,
    hover: HoverState,
    error: Option<String>,
    phase: ViewPhase,
    generation: u64,
    wave_played: bool,
}

impl LineageView {
    pub fn new(mode: LayoutMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    pub fn filter(&self) -> &GraphFilter {
        &self.filter
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        self.mode = mode;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn highlight(&self) -> &Highlight {
        &self.highlight
    }

    pub fn hover_state(&self) -> &HoverState {
        &self.hover
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ViewPhase::Loading
    }

    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        self.phase = ViewPhase::Loading;
        self.error = None;
        ReloadTicket(self.generation)
    }

    /// Install the outcome of a reload. Returns `false` when the ticket is stale.
    ///
    /// On failure the previous graph stays on screen under the error banner.
    pub fn complete_reload(
        &mut self,
        ticket: ReloadTicket,
        outcome: std::result::Result<LineageGraph, String>,
    ) -> bool {
        if ticket.0 != self.generation {
            tracing::debug!(ticket = ticket.0, latest = self.generation, "stale reload discarded");
            return false;
        }
        match outcome {
            Ok(graph) => {
                tracing::info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "lineage loaded");
                self.graph = graph;
                self.selected = None;
                self.highlight.clear();
                self.hover.leave();
                self.error = None;
                self.phase = self.resting_phase();
            }
            Err(reason) => {
                tracing::warn!(%reason, "lineage reload failed");
                self.error = Some(LOAD_ERROR.to_string());
                self.phase = if self.graph.is_empty() {
                    ViewPhase::Idle
                } else {
                    self.resting_phase()
                };
            }
        }
        true
    }

    /// Swap in a graph patched in place by a realtime event. Selection,
    /// highlight and phase are kept.
    pub fn sync_graph(&mut self, graph: LineageGraph) {
        self.graph = graph;
    }

    fn resting_phase(&self) -> ViewPhase {
        if self.filter.is_active() {
            ViewPhase::Filtered
        } else {
            ViewPhase::Rendered
        }
    }

    pub fn set_filter(&mut self, filter: GraphFilter) {
        self.filter = filter;
        if matches!(self.phase, ViewPhase::Rendered | ViewPhase::Filtered) {
            self.phase = self.resting_phase();
        }
    }

    /// Graph after filtering; what gets laid out and drawn.
    pub fn visible(&self) -> LineageGraph {
        self.filter.apply(&self.graph)
    }

    pub fn layout(&self) -> Layout {
        self.mode.engine().layout(&self.visible(), &self.options)
    }

    /// Select a node and fade everything outside its closed neighbourhood.
    pub fn select(&mut self, id: &str) -> Result<()> {
        let visible = self.visible();
        let adj = Adjacency::new(&visible);
        if !adj.contains(id) {
            return Err(GraphError::UnknownNode(id.to_string()));
        }
        self.highlight.set(adj.closed_neighborhood(id));
        self.selected = Some(id.to_string());
        self.phase = ViewPhase::Selected;
        Ok(())
    }

    pub fn highlight_upstream(&mut self, id: &str) -> Result<()> {
        self.highlight_with(id, |adj, id| adj.upstream(id))
    }

    pub fn highlight_downstream(&mut self, id: &str) -> Result<()> {
        self.highlight_with(id, |adj, id| adj.downstream(id))
    }

    fn highlight_with(
        &mut self,
        id: &str,
        walk: impl Fn(&Adjacency<'_>, &str) -> crate::interaction::HighlightSet,
    ) -> Result<()> {
        let visible = self.visible();
        let adj = Adjacency::new(&visible);
        if !adj.contains(id) {
            return Err(GraphError::UnknownNode(id.to_string()));
        }
        self.highlight.set(walk(&adj, id));
        self.selected = Some(id.to_string());
        self.phase = ViewPhase::Highlighted;
        Ok(())
    }

    pub fn clear_highlights(&mut self) {
        self.highlight.clear();
        self.selected = None;
        if matches!(self.phase, ViewPhase::Selected | ViewPhase::Highlighted) {
            self.phase = self.resting_phase();
        }
    }

    pub fn hover(&mut self, id: Option<&str>) {
        match id {
            Some(id) => self.hover.enter(id),
            None => self.hover.leave(),
        }
    }

    /// The impact wave for the current graph, handed out at most once per view
    /// and only in the advanced layouts.
    pub fn take_impact_wave(&mut self) -> Option<WavePlan> {
        if self.wave_played || !self.mode.is_advanced() {
            return None;
        }
        let plan = plan_impact_wave(&self.visible())?;
        self.wave_played = true;
        Some(plan)
    }
}
