//! Unique holder addresses across every snapshot of a project directory.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::allocator::SourceKind;
use crate::data::output::OutputError;
use crate::data::snapshot::{list_snapshots, load_snapshot, SnapshotError};
use crate::parallel::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Addresses in first-seen order (files sorted by name). Any snapshot that
/// cannot be read fails the whole collection.
pub fn collect_unique_addresses(dir: &Path, pool: &WorkerPool) -> Result<Vec<String>, SnapshotError> {
    let paths = list_snapshots(dir)?;
    if paths.is_empty() {
        return Err(SnapshotError::NoSnapshots {
            path: dir.to_path_buf(),
        });
    }

    // Quantity columns are optional for count snapshots, so any holder export parses.
    let sources = pool.map_paths(&paths, |path| load_snapshot(path, SourceKind::Count));

    let mut seen = HashSet::new();
    let mut addresses = Vec::new();
    for source in sources {
        for record in source?.records {
            if seen.insert(record.address.clone()) {
                addresses.push(record.address);
            }
        }
    }
    info!(
        dir = %dir.display(),
        files = paths.len(),
        addresses = addresses.len(),
        "collected unique addresses"
    );
    Ok(addresses)
}

/// Collect and write the addresses as a pretty JSON array.
pub fn write_unique_addresses(
    dir: &Path,
    output: &Path,
    pool: &WorkerPool,
) -> Result<usize, CollectError> {
    let addresses = collect_unique_addresses(dir, pool)?;
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let payload = serde_json::to_string_pretty(&addresses).map_err(|source| {
        OutputError::Serialize {
            path: output.to_path_buf(),
            source,
        }
    })?;
    fs::write(output, payload).map_err(|source| OutputError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(addresses.len())
}
