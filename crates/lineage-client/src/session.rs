//! One explorer session: a source, the application store and a view, kept in
//! step across reloads and realtime events.

use crate::error::{ClientError, Result};
use crate::loader::{load_focused, load_merged, LoadedLineage};
use crate::source::FragmentSource;
use lineage_graph::{EventEffect, LayoutMode, LineageStore, LineageView, RealtimeEvent, ReloadTicket};
use std::sync::Arc;

/// A reload that was started but not yet applied.
///
/// Fetching owns everything it needs, so it can run on another task while
/// the session keeps handling events.
pub struct PendingReload {
    ticket: ReloadTicket,
    source: Arc<dyn FragmentSource>,
    focus: Option<String>,
    depth: u32,
}

/// Outcome of [`PendingReload::fetch`], to hand back to [`LineageSession::complete_reload`].
pub struct FetchedReload {
    ticket: ReloadTicket,
    outcome: Result<LoadedLineage>,
}

impl FetchedReload {
    pub fn ticket(&self) -> ReloadTicket {
        self.ticket
    }
}

impl PendingReload {
    pub fn ticket(&self) -> ReloadTicket {
        self.ticket
    }

    pub async fn fetch(self) -> FetchedReload {
        let outcome = match &self.focus {
            None => load_merged(Arc::clone(&self.source), self.depth).await,
            Some(id) => fetch_focused(self.source.as_ref(), id, self.depth).await,
        };
        FetchedReload {
            ticket: self.ticket,
            outcome,
        }
    }
}

async fn fetch_focused(source: &dyn FragmentSource, id: &str, depth: u32) -> Result<LoadedLineage> {
    let datasets = source.datasets().await?;
    if !datasets.iter().any(|d| d.id == id) {
        return Err(ClientError::UnknownDataset(id.to_string()));
    }
    let merged = load_focused(source, id, depth).await?;
    Ok(LoadedLineage { datasets, merged })
}

pub struct LineageSession {
    source: Arc<dyn FragmentSource>,
    store: LineageStore,
    view: LineageView,
    focus: Option<String>,
    depth: u32,
}

impl LineageSession {
    pub fn new(source: Arc<dyn FragmentSource>, mode: LayoutMode, depth: u32) -> Self {
        Self {
            source,
            store: LineageStore::new(),
            view: LineageView::new(mode),
            focus: None,
            depth,
        }
    }

    /// Restrict reloads to the fragment of one dataset.
    pub fn focus(mut self, dataset_id: Option<String>) -> Self {
        self.focus = dataset_id;
        self
    }

    pub fn store(&self) -> &LineageStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LineageStore {
        &mut self.store
    }

    pub fn view(&self) -> &LineageView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut LineageView {
        &mut self.view
    }

    pub fn begin_reload(&mut self) -> PendingReload {
        PendingReload {
            ticket: self.view.begin_reload(),
            source: Arc::clone(&self.source),
            focus: self.focus.clone(),
            depth: self.depth,
        }
    }

    /// Apply a fetched reload. Returns `false` when a newer reload superseded it.
    pub fn complete_reload(&mut self, fetched: FetchedReload) -> bool {
        let FetchedReload { ticket, outcome } = fetched;
        match outcome {
            Ok(loaded) => {
                let graph = loaded.merged.graph;
                let applied = self.view.complete_reload(ticket, Ok(graph.clone()));
                if applied {
                    self.store.replace_datasets(loaded.datasets);
                    self.store.replace_graph(graph);
                }
                applied
            }
            Err(e) => self.view.complete_reload(ticket, Err(e.to_string())),
        }
    }

    /// Reload in place; the error, if any, is left on the view's banner.
    pub async fn reload(&mut self) -> bool {
        let pending = self.begin_reload();
        let fetched = pending.fetch().await;
        self.complete_reload(fetched)
    }

    /// Feed one realtime event through the store and keep the view in step.
    pub fn handle_event(&mut self, event: &RealtimeEvent) -> lineage_graph::error::Result<EventEffect> {
        let effect = self.store.apply_event(event)?;
        if let EventEffect::Patched { node_id: Some(_), .. } = &effect {
            self.view.sync_graph(self.store.graph().clone());
        }
        Ok(effect)
    }
}
