//! Remote listing with marker filtering.

use crate::error::SyncError;
use crate::store::ObjectStore;
use crate::types::{RemoteObjectRef, RemotePath};
use std::collections::HashSet;
use tracing::{debug, info};

/// Lists the payload objects directly under `remote`.
///
/// Marker objects (base name starting with `_`) are dropped. An empty listing
/// means the prefix does not exist and is reported as a connection error, as
/// is a listing where two objects share a base name.
///
/// # Arguments
///
/// * `store` - The store to list from
/// * `remote` - Bucket and prefix whose direct children are wanted
///
/// # Returns
///
/// The non-marker objects in listing order, or a connection error.
pub async fn list_objects(
    store: &dyn ObjectStore,
    remote: &RemotePath,
) -> Result<Vec<RemoteObjectRef>, SyncError> {
    info!("Listing {}", remote.store_uri());
    let listed = store.list(remote).await?;
    if listed.is_empty() {
        return Err(SyncError::Connection(format!(
            "{} does not exist",
            remote.store_uri()
        )));
    }

    let total = listed.len();
    let mut seen = HashSet::with_capacity(total);
    let mut objects = Vec::with_capacity(total);
    for object in listed {
        if object.is_marker() {
            debug!("Skipping marker object {}", object.key());
            continue;
        }
        if !seen.insert(object.base_name().to_string()) {
            return Err(SyncError::Connection(format!(
                "listing of {} holds {} more than once",
                remote.store_uri(),
                object.base_name()
            )));
        }
        objects.push(object);
    }

    info!(
        "Found {} object(s) under {} ({} marker(s) skipped)",
        objects.len(),
        remote,
        total - objects.len()
    );
    Ok(objects)
}
