//! Index maintenance: create-if-missing and drop-all
//!
//! Both helpers list what already exists before acting. Each index (or each
//! collection, for drop-all) is handled on its own; one failure is logged and
//! the rest still go through.

use tracing::{error, info, warn};

use crate::index::IndexSpec;
use crate::store::{DocumentStore, ID_INDEX_NAME};
use crate::Result;

/// What [`ensure_index`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureAction {
    Created,
    /// Already present and `reset` was off
    Skipped,
    /// Dropped and created again because `reset` was on
    Recreated,
}

/// Create `spec` on `collection` unless an index with its name exists.
/// With `reset`, an existing index of that name is dropped first.
pub async fn ensure_index<S>(
    store: &S,
    collection: &str,
    spec: &IndexSpec,
    reset: bool,
) -> Result<EnsureAction>
where
    S: DocumentStore + ?Sized,
{
    let name = spec.resolved_name();
    let exists = store
        .list_index_names(collection)
        .await?
        .iter()
        .any(|existing| *existing == name);

    if exists && !reset {
        info!(
            "ℹ️  Index '{}' already exists on collection '{}', skipping...",
            name, collection
        );
        return Ok(EnsureAction::Skipped);
    }

    if exists {
        store.drop_index(collection, &name).await?;
        warn!("🗑️  Deleted index '{}' on collection '{}'", name, collection);
    }

    store.create_index(collection, spec).await?;
    info!("✅ Created index '{}' on collection '{}'", name, collection);

    Ok(if exists {
        EnsureAction::Recreated
    } else {
        EnsureAction::Created
    })
}

/// Ensure every `(collection, spec)` pair. Failures are logged per index.
pub async fn ensure_indexes<S>(
    store: &S,
    indexes: &[(&str, IndexSpec)],
    reset: bool,
) -> Vec<Result<EnsureAction>>
where
    S: DocumentStore + ?Sized,
{
    let mut results = Vec::with_capacity(indexes.len());
    for (collection, spec) in indexes {
        let result = ensure_index(store, collection, spec, reset).await;
        if let Err(e) = &result {
            error!(
                "❌ Failed to ensure index '{}' on collection '{}': {}",
                spec.resolved_name(),
                collection,
                e
            );
        }
        results.push(result);
    }
    results
}

/// Counts from [`drop_all_indexes`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropSummary {
    pub dropped: Vec<(String, String)>,
    pub failed_collections: Vec<String>,
}

/// Drop every index except `_id_` in every collection of the database.
///
/// Only listing the collections can fail the whole call.
pub async fn drop_all_indexes<S>(store: &S) -> Result<DropSummary>
where
    S: DocumentStore + ?Sized,
{
    let mut summary = DropSummary::default();

    for collection in store.list_collection_names().await? {
        match drop_collection_indexes(store, &collection).await {
            Ok(dropped) => summary
                .dropped
                .extend(dropped.into_iter().map(|name| (collection.clone(), name))),
            Err(e) => {
                error!("❌ Failed to drop indexes on collection '{}': {}", collection, e);
                summary.failed_collections.push(collection);
            }
        }
    }

    Ok(summary)
}

async fn drop_collection_indexes<S>(store: &S, collection: &str) -> Result<Vec<String>>
where
    S: DocumentStore + ?Sized,
{
    let mut dropped = Vec::new();
    for name in store.list_index_names(collection).await? {
        if name == ID_INDEX_NAME {
            continue;
        }
        store.drop_index(collection, &name).await?;
        info!("🗑️  Deleted index '{}' from collection '{}'", name, collection);
        dropped.push(name);
    }
    Ok(dropped)
}
