//! Lineage Client: the I/O side of the lineage explorer
//!
//! - [`source`]: where fragments come from (backend API, catalog, fixture file)
//! - [`loader`]: concurrent fan-out over the catalog, fan-in through the merger
//! - [`stomp`] / [`realtime`]: the `/topic/events` subscription
//! - [`session`]: store + view + source wired together for an application
//!
//! ```text
//!   FragmentSource ──datasets()──► load_merged ──JoinSet──► fragment(id) × N
//!                                       │
//!                                       ▼
//!                              merge_fragments (catalog order)
//!                                       │
//!   RealtimeClient ──mpsc──► LineageSession ──► LineageStore / LineageView
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod realtime;
pub mod session;
pub mod source;
pub mod stomp;

pub use config::{ClientConfig, ConfigError, SourceKind};
pub use error::{ClientError, Result};
pub use loader::{load_focused, load_merged, LoadedLineage};
pub use realtime::RealtimeClient;
pub use session::{FetchedReload, LineageSession, PendingReload};
pub use source::{
    source_from_config, CatalogFragmentSource, FixtureSource, FragmentSource, HttpFragmentSource,
};
pub use stomp::{decode_frame, Frame, StompError};
