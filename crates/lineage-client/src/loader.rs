//! Fan-out/fan-in loading of the global graph.

use crate::error::Result;
use crate::source::FragmentSource;
use lineage_graph::{merge_fragments, DatasetRecord, LineageGraph, MergeOutcome};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Everything one reload produced.
#[derive(Debug, Clone, Default)]
pub struct LoadedLineage {
    pub datasets: Vec<DatasetRecord>,
    pub merged: MergeOutcome,
}

/// Fetch every dataset's fragment concurrently and merge them in catalog order.
///
/// One failing request fails the whole load and aborts the ones still running.
pub async fn load_merged(source: Arc<dyn FragmentSource>, depth: u32) -> Result<LoadedLineage> {
    let datasets = source.datasets().await?;
    if datasets.is_empty() {
        tracing::info!(source = source.name(), "catalog is empty");
        return Ok(LoadedLineage {
            datasets,
            merged: MergeOutcome::default(),
        });
    }

    let mut set = JoinSet::new();
    for (index, dataset) in datasets.iter().enumerate() {
        let source = Arc::clone(&source);
        let id = dataset.id.clone();
        set.spawn(async move {
            let fragment = source.fragment(&id, depth).await;
            (index, id, fragment)
        });
    }

    let mut fragments: Vec<Option<LineageGraph>> = vec![None; datasets.len()];
    while let Some(joined) = set.join_next().await {
        let (index, id, fragment) = match joined {
            Ok(done) => done,
            Err(e) => {
                set.abort_all();
                return Err(e.into());
            }
        };
        match fragment {
            Ok(g) => fragments[index] = Some(g),
            Err(e) => {
                tracing::warn!(dataset = %id, error = %e, "fragment request failed, aborting load");
                set.abort_all();
                return Err(e);
            }
        }
    }

    let merged = merge_fragments(fragments.into_iter().flatten());
    tracing::info!(
        source = source.name(),
        datasets = datasets.len(),
        nodes = merged.stats.nodes,
        edges = merged.stats.edges,
        "lineage merged"
    );
    Ok(LoadedLineage { datasets, merged })
}

/// Fragment of a single dataset, run through the merger on its own.
pub async fn load_focused(
    source: &dyn FragmentSource,
    dataset_id: &str,
    depth: u32,
) -> Result<MergeOutcome> {
    let fragment = source.fragment(dataset_id, depth).await?;
    Ok(merge_fragments([fragment]))
}
