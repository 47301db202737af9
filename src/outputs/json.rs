//! JSON file output and input.
//!
//! Both the scraper's collection (`feeds.json`) and the mapper's reduced
//! list (`feeds_mapped.json`) are written as pretty-printed JSON arrays.
//! Writes overwrite the target in place; there is no atomic rename, so an
//! interrupted write leaves a truncated file.

use crate::error::{FeedError, Result};
use crate::models::{Collection, FeedRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote JSON file");
    Ok(())
}

/// Write the scraped collection as a JSON array sorted by slug.
pub async fn write_collection(collection: &Collection, path: &Path) -> Result<()> {
    info!(records = collection.len(), path = %path.display(), "Writing collection");
    write_json(collection, path).await
}

async fn read_text(path: &Path) -> Result<String> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FeedError::MissingInput(path.to_path_buf()))
        }
        Err(e) => Err(FeedError::Input {
            path: path.to_path_buf(),
            source: Box::new(e),
        }),
    }
}

/// Read a collection file's records in file order.
///
/// # Errors
///
/// - [`FeedError::MissingInput`] if `path` does not exist
/// - [`FeedError::Input`] if it cannot be read or is not a collection
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_records(path: &Path) -> Result<Vec<FeedRecord>> {
    let text = read_text(path).await?;
    let records = Collection::records_from_json(&text).map_err(|e| FeedError::Input {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    info!(count = records.len(), "Read records");
    Ok(records)
}

/// Read a JSON array of `T`. Errors as for [`read_records`].
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = read_text(path).await?;
    let items: Vec<T> = serde_json::from_str(&text).map_err(|e| FeedError::Input {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    info!(count = items.len(), "Read list");
    Ok(items)
}
