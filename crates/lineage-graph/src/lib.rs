//! Lineage Graph: assembly, layout and interaction state for dataset lineage
//!
//! This crate is the pure core of the lineage explorer. It never performs I/O:
//! fetching fragments and listening to realtime events live in
//! `lineage-client`, rendering lives in `lineage-cli`.
//!
//! ## Pipeline
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐
//! │ raw JSON      │──►│   Adapter    │──►│      Merger        │──►│ Filter + Layout  │
//! │ nodes/edges   │   │ (normalize)  │   │ (id / (from,to,ty))│   │ grid|layered|    │
//! │ vertices/links│   └──────────────┘   └────────────────────┘   │ force            │
//! └───────────────┘                                               └────────┬─────────┘
//!                                                                          │
//!                       ┌──────────────────────────────┐                   ▼
//!  realtime events ────►│ LineageStore (patch in place)│        ┌──────────────────┐
//!                       └──────────────────────────────┘        │ Interaction      │
//!                                                               │ select / hover / │
//!                                                               │ up/downstream    │
//!                                                               └──────────────────┘
//! ```
//!
//! Graphs are rebuilt in full on every reload; only `DATASET_UPDATED` events
//! patch a single node in place.

pub mod adapter;
pub mod derive;
pub mod error;
pub mod filter;
pub mod impact;
pub mod interaction;
pub mod layout;
pub mod merge;
pub mod model;
pub mod store;
pub mod view;

pub use adapter::normalize_fragment;
pub use derive::{derive_fragment, derive_fragment_for, DatasetRecord, LastLoad, Sla};
pub use error::GraphError;
pub use filter::{GraphFilter, LayerFilter, StatusFilter};
pub use impact::{plan_impact_wave, WavePlan};
pub use interaction::{Adjacency, Highlight, HighlightSet, HoverState};
pub use layout::{Layout, LayoutEngine, LayoutMode, LayoutOptions, Point};
pub use merge::{merge_fragments, MergeOutcome, MergeStats, Merger};
pub use model::{Edge, EdgeKey, EdgeType, Layer, LineageGraph, Node, Status};
pub use store::{EventEffect, LineageStore, MutationId, MutationState, RealtimeEvent};
pub use view::{LineageView, ReloadTicket, ViewPhase};

/// Default hop count requested for a dataset's lineage fragment.
pub const DEFAULT_DEPTH: u32 = 2;
