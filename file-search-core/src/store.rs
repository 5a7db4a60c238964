//! Store resolution: find a store by display name, create it when missing.
//!
//! Listing failures are returned as errors rather than an empty list, so a
//! caller can tell "no stores" apart from "could not list". There is no
//! locking: two concurrent resolve-or-create runs may both create a store,
//! after which the first match in listing order wins.

use tracing::{error, info};

use crate::contract::{FileSearchApi, Store};
use crate::error::Result;

/// A store found by display name, and whether this call created it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStore {
    pub store: Store,
    pub created: bool,
}

pub async fn list_all_stores<A>(api: &A) -> Result<Vec<Store>>
where
    A: FileSearchApi + ?Sized,
{
    match api.list_stores().await {
        Ok(stores) => {
            info!(count = stores.len(), "Listed file search stores");
            Ok(stores)
        }
        Err(e) => {
            error!(error = ?e, "Failed to list file search stores");
            Err(e)
        }
    }
}

/// First store whose display name equals `display_name`.
pub async fn get_store<A>(api: &A, display_name: &str) -> Result<Option<Store>>
where
    A: FileSearchApi + ?Sized,
{
    let found = list_all_stores(api)
        .await?
        .into_iter()
        .find(|s| s.display_name.as_deref() == Some(display_name));
    match &found {
        Some(store) => info!(display_name, store = %store.name, "Resolved store by display name"),
        None => info!(display_name, "No store with this display name"),
    }
    Ok(found)
}

pub async fn resolve_or_create_store<A>(api: &A, display_name: &str) -> Result<ResolvedStore>
where
    A: FileSearchApi + ?Sized,
{
    if let Some(store) = get_store(api, display_name).await? {
        return Ok(ResolvedStore {
            store,
            created: false,
        });
    }

    info!(display_name, "Creating file search store");
    let store = api.create_store(display_name).await.map_err(|e| {
        error!(display_name, error = ?e, "Failed to create file search store");
        e
    })?;
    info!(display_name, store = %store.name, "Created file search store");
    Ok(ResolvedStore {
        store,
        created: true,
    })
}
