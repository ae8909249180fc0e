//! Fragment sources.
//!
//! A [`FragmentSource`] lists the catalog and serves one lineage fragment per
//! dataset. Every raw payload goes through
//! [`lineage_graph::normalize_fragment`] so callers only ever see the
//! canonical model.

use crate::config::{ClientConfig, SourceKind};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use lineage_graph::derive::BackendDataset;
use lineage_graph::{derive_fragment_for, normalize_fragment, DatasetRecord, LineageGraph};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The dataset catalog, in display order.
    async fn datasets(&self) -> Result<Vec<DatasetRecord>>;

    /// Lineage fragment around `dataset_id`, `depth` hops in each direction.
    async fn fragment(&self, dataset_id: &str, depth: u32) -> Result<LineageGraph>;
}

/// Build the source selected by `config`.
pub fn source_from_config(config: &ClientConfig) -> Result<Arc<dyn FragmentSource>> {
    let http = HttpFragmentSource::new(config)?;
    Ok(match config.source {
        SourceKind::Http => Arc::new(http),
        SourceKind::Catalog => Arc::new(CatalogFragmentSource::new(http)),
    })
}

// ============================================================================
// HTTP
// ============================================================================

/// Talks to the governance backend.
#[derive(Debug, Clone)]
pub struct HttpFragmentSource {
    client: Client,
    api_base: Url,
}

impl HttpFragmentSource {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidResponse {
                url: self.api_base.to_string(),
                reason: "api base cannot carry a path".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value> {
        tracing::debug!(%url, "GET");
        let response = self.client.get(url.clone()).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl FragmentSource for HttpFragmentSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn datasets(&self) -> Result<Vec<DatasetRecord>> {
        let url = self.endpoint(&["catalog", "datasets"])?;
        let raw = self.get_json(url.clone(), &[]).await?;
        parse_catalog(raw).map_err(|reason| ClientError::InvalidResponse {
            url: url.to_string(),
            reason,
        })
    }

    async fn fragment(&self, dataset_id: &str, depth: u32) -> Result<LineageGraph> {
        let url = self.endpoint(&["lineage", "datasets", dataset_id])?;
        let raw = self.get_json(url, &[("depth", depth.to_string())]).await?;
        Ok(normalize_fragment(&raw))
    }
}

fn parse_catalog(raw: Value) -> std::result::Result<Vec<DatasetRecord>, String> {
    let rows: Vec<BackendDataset> = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    Ok(rows.into_iter().map(DatasetRecord::from).collect())
}

// ============================================================================
// Catalog-derived
// ============================================================================

/// Rebuilds fragments from the dependencies declared in the catalog.
///
/// The catalog is fetched by [`FragmentSource::datasets`] and reused for
/// every fragment until the next listing.
pub struct CatalogFragmentSource<S> {
    catalog: S,
    cache: RwLock<Option<Vec<DatasetRecord>>>,
}

impl<S: FragmentSource> CatalogFragmentSource<S> {
    pub fn new(catalog: S) -> Self {
        Self {
            catalog,
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<S: FragmentSource> FragmentSource for CatalogFragmentSource<S> {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn datasets(&self) -> Result<Vec<DatasetRecord>> {
        let datasets = self.catalog.datasets().await?;
        *self.cache.write().await = Some(datasets.clone());
        Ok(datasets)
    }

    async fn fragment(&self, dataset_id: &str, _depth: u32) -> Result<LineageGraph> {
        if let Some(datasets) = self.cache.read().await.as_deref() {
            return Ok(derive_fragment_for(datasets, dataset_id));
        }
        let datasets = self.datasets().await?;
        Ok(derive_fragment_for(&datasets, dataset_id))
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// Offline source backed by a JSON document:
///
/// ```json
/// { "datasets": [ { "id": "ORDERS", "name": "Orders" } ],
///   "lineage":  { "ORDERS": { "nodes": [], "edges": [] } } }
/// ```
///
/// Catalog rows use the backend's flat shape; lineage payloads may use any
/// shape the adapter understands.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    datasets: Vec<DatasetRecord>,
    lineage: HashMap<String, Value>,
}

impl FixtureSource {
    pub fn from_value(doc: Value) -> Result<Self> {
        let datasets = match doc.get("datasets") {
            Some(rows) => parse_catalog(rows.clone()).map_err(ClientError::Fixture)?,
            None => Vec::new(),
        };
        let lineage = match doc.get("lineage") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(_) => return Err(ClientError::Fixture("`lineage` must be an object".into())),
            None => HashMap::new(),
        };
        Ok(Self { datasets, lineage })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let doc: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::Fixture(format!("{}: {e}", path.display())))?;
        Self::from_value(doc)
    }
}

#[async_trait]
impl FragmentSource for FixtureSource {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn datasets(&self) -> Result<Vec<DatasetRecord>> {
        Ok(self.datasets.clone())
    }

    async fn fragment(&self, dataset_id: &str, _depth: u32) -> Result<LineageGraph> {
        self.lineage
            .get(dataset_id)
            .map(normalize_fragment)
            .ok_or_else(|| ClientError::UnknownDataset(dataset_id.to_string()))
    }
}
