//! Application store: the single owner of the live graph, the dataset
//! catalog and the realtime event history.
//!
//! Everything mutates through `&mut self`; readers get borrowed projections.

use crate::derive::{sink_id, DatasetRecord, LastLoad, Sla};
use crate::error::{GraphError, Result};
use crate::model::{LineageGraph, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Events kept in [`LineageStore::history`].
pub const HISTORY_LIMIT: usize = 200;

/// Settled mutations kept around for `mutation_state` lookups.
pub const SETTLED_LIMIT: usize = 64;

/// Event kinds that invalidate the whole graph.
pub const RELOAD_KINDS: [&str; 5] = [
    "RUN_STARTED",
    "RUN_FINISHED",
    "RUN_FAILED",
    "ALERT_CREATED",
    "ACCESS_CHANGED",
];

/// Envelope pushed on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl RealtimeEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            source: None,
            timestamp: None,
            payload,
        }
    }

    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlaPatch {
    frequency: Option<String>,
    expected_by: Option<String>,
    max_delay_min: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetUpdate {
    urn: Option<String>,
    status: Option<String>,
    ended_at: Option<String>,
    duration_sec: Option<u64>,
    sla: Option<SlaPatch>,
}

/// What the consumer should do after an event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// A dataset record (and its graph node, when present) changed in place.
    Patched {
        dataset_id: String,
        node_id: Option<String>,
    },
    /// The graph is stale; reload it in full.
    ReloadRequested(String),
    Ignored,
}

pub type MutationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Pending,
    Confirmed,
    RolledBack,
}

impl MutationState {
    fn as_str(self) -> &'static str {
        match self {
            MutationState::Pending => "pending",
            MutationState::Confirmed => "confirmed",
            MutationState::RolledBack => "rolled back",
        }
    }
}

#[derive(Debug, Clone)]
struct Mutation {
    node_id: String,
    previous: Option<Status>,
    state: MutationState,
}

#[derive(Debug, Clone)]
pub struct LineageStore {
    graph: LineageGraph,
    datasets: Vec<DatasetRecord>,
    history: VecDeque<RealtimeEvent>,
    auto_refresh: bool,
    mutations: HashMap<MutationId, Mutation>,
    /// Settled mutation ids, oldest first; bounded by `SETTLED_LIMIT`.
    settled: VecDeque<MutationId>,
}

impl Default for LineageStore {
    fn default() -> Self {
        Self {
            graph: LineageGraph::default(),
            datasets: Vec::new(),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            auto_refresh: true,
            mutations: HashMap::new(),
            settled: VecDeque::new(),
        }
    }
}

impl LineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    pub fn datasets(&self) -> &[DatasetRecord] {
        &self.datasets
    }

    /// Most recent event first.
    pub fn history(&self) -> impl Iterator<Item = &RealtimeEvent> {
        self.history.iter()
    }

    pub fn last_event(&self) -> Option<&RealtimeEvent> {
        self.history.front()
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn set_auto_refresh(&mut self, on: bool) {
        self.auto_refresh = on;
    }

    pub fn toggle_auto_refresh(&mut self) -> bool {
        self.auto_refresh = !self.auto_refresh;
        self.auto_refresh
    }

    pub fn replace_graph(&mut self, graph: LineageGraph) {
        self.graph = graph;
        self.mutations.clear();
        self.settled.clear();
    }

    pub fn replace_datasets(&mut self, datasets: Vec<DatasetRecord>) {
        self.datasets = datasets;
    }

    /// Record `event` and work out its consequence.
    pub fn apply_event(&mut self, event: &RealtimeEvent) -> Result<EventEffect> {
        self.history.push_front(event.clone());
        self.history.truncate(HISTORY_LIMIT);

        if !self.auto_refresh {
            return Ok(EventEffect::Ignored);
        }

        let kind = event.kind.as_str();
        if kind == "DATASET_UPDATED" {
            let update: DatasetUpdate = if event.payload.is_null() {
                DatasetUpdate::default()
            } else {
                serde_json::from_value(event.payload.clone())?
            };
            return Ok(self.patch_dataset(update));
        }
        if RELOAD_KINDS.contains(&kind) {
            tracing::debug!(kind, "event invalidates lineage graph");
            return Ok(EventEffect::ReloadRequested(kind.to_string()));
        }
        Ok(EventEffect::Ignored)
    }

    fn patch_dataset(&mut self, update: DatasetUpdate) -> EventEffect {
        let Some(urn) = update.urn.as_deref() else {
            return EventEffect::Ignored;
        };
        let Some(record) = self.datasets.iter_mut().find(|d| d.urn == urn) else {
            tracing::debug!(urn, "update for a dataset not in the catalog");
            return EventEffect::Ignored;
        };

        let prev = record.last_load.take();
        let status = update
            .status
            .as_deref()
            .and_then(|s| s.parse::<Status>().ok())
            .or(prev.as_ref().map(|p| p.status))
            .unwrap_or(Status::Ok);
        let ended_at = update
            .ended_at
            .or_else(|| prev.as_ref().and_then(|p| p.ended_at.clone()))
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        let duration_sec = update
            .duration_sec
            .or_else(|| prev.as_ref().and_then(|p| p.duration_sec));
        record.last_load = Some(LastLoad {
            status,
            ended_at: Some(ended_at.clone()),
            duration_sec,
        });

        if let Some(patch) = update.sla {
            let prev_sla = record.sla.take().unwrap_or_default();
            record.sla = Some(Sla {
                frequency: patch.frequency.unwrap_or(prev_sla.frequency),
                expected_by: patch.expected_by.unwrap_or(prev_sla.expected_by),
                max_delay_min: patch.max_delay_min.unwrap_or(prev_sla.max_delay_min),
            });
        }

        let dataset_id = record.id.clone();
        let sink = sink_id(&dataset_id);
        let node = self
            .graph
            .nodes
            .iter_mut()
            .find(|n| n.id == sink || n.id == urn);
        let node_id = node.map(|n| {
            n.last_status = Some(status);
            n.last_ended_at = Some(ended_at);
            n.id.clone()
        });

        tracing::debug!(%dataset_id, ?node_id, %status, "dataset patched");
        EventEffect::Patched {
            dataset_id,
            node_id,
        }
    }

    /// Apply a status change locally before the backend confirms it.
    pub fn begin_status_mutation(&mut self, node_id: &str, status: Status) -> Result<MutationId> {
        let node = self
            .graph
            .node_mut(node_id)
            .ok_or_else(|| GraphError::UnknownNode(node_id.to_string()))?;
        let previous = node.last_status.replace(status);
        let id = Uuid::new_v4();
        self.mutations.insert(
            id,
            Mutation {
                node_id: node_id.to_string(),
                previous,
                state: MutationState::Pending,
            },
        );
        Ok(id)
    }

    pub fn confirm(&mut self, id: MutationId) -> Result<()> {
        let m = self.pending_mut(id)?;
        m.state = MutationState::Confirmed;
        self.settle(id);
        Ok(())
    }

    /// Restore the status the node had before the mutation.
    pub fn rollback(&mut self, id: MutationId) -> Result<()> {
        let m = self.pending_mut(id)?;
        m.state = MutationState::RolledBack;
        let (node_id, previous) = (m.node_id.clone(), m.previous);
        if let Some(node) = self.graph.node_mut(&node_id) {
            node.last_status = previous;
        }
        tracing::warn!(%id, node = %node_id, "status mutation rolled back");
        self.settle(id);
        Ok(())
    }

    pub fn mutation_state(&self, id: MutationId) -> Option<MutationState> {
        self.mutations.get(&id).map(|m| m.state)
    }

    /// Remember a settled mutation, forgetting the oldest beyond the limit.
    fn settle(&mut self, id: MutationId) {
        self.settled.push_back(id);
        while self.settled.len() > SETTLED_LIMIT {
            if let Some(old) = self.settled.pop_front() {
                self.mutations.remove(&old);
            }
        }
    }

    fn pending_mut(&mut self, id: MutationId) -> Result<&mut Mutation> {
        let m = self
            .mutations
            .get_mut(&id)
            .ok_or(GraphError::UnknownMutation(id))?;
        if m.state != MutationState::Pending {
            return Err(GraphError::MutationSettled {
                id,
                state: m.state.as_str().to_string(),
            });
        }
        Ok(m)
    }
}
