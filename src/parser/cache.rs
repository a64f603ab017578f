//! Persistent cache of the fully linked symbol graph.
//!
//! The cache sits next to the index file and is valid iff its mtime is
//! strictly newer than the index's. The snapshot carries a format version so
//! incompatible caches fail cleanly; any corrupt or stale cache is discarded
//! and the YAML is reparsed.

use crate::models::SymbolGraph;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CACHE_VERSION: u32 = 1;

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    graph: SymbolGraph,
}

/// Borrowing twin of [`Snapshot`], so writing the cache does not clone the
/// graph.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    graph: &'a SymbolGraph,
}

/// Cache file path derived from the index path.
pub fn cache_path(index_path: &Path) -> PathBuf {
    index_path.with_extension("symcache")
}

/// Load the cached graph, if fresh and readable.
pub fn load(index_path: &Path) -> Option<SymbolGraph> {
    let path = cache_path(index_path);
    let cache_mtime = std::fs::metadata(&path).ok()?.modified().ok()?;
    let index_mtime = std::fs::metadata(index_path).ok()?.modified().ok()?;
    if cache_mtime <= index_mtime {
        debug!("cache at {} is older than the index, ignoring", path.display());
        return None;
    }

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to read cache {}: {e}", path.display());
            return None;
        }
    };
    match bincode::deserialize::<Snapshot>(&bytes) {
        Ok(snapshot) if snapshot.version == CACHE_VERSION => {
            debug!(
                "loaded {} symbols from cache {}",
                snapshot.graph.len(),
                path.display()
            );
            Some(snapshot.graph)
        }
        Ok(snapshot) => {
            warn!(
                "cache {} has format version {} (expected {CACHE_VERSION}), discarding",
                path.display(),
                snapshot.version
            );
            None
        }
        Err(e) => {
            warn!("cache {} is corrupted ({e}), discarding", path.display());
            None
        }
    }
}

/// Write the linked graph next to the index. The cache is an optimisation:
/// a failed write is logged, not surfaced.
pub fn store(index_path: &Path, graph: &SymbolGraph) {
    let path = cache_path(index_path);
    let snapshot = SnapshotRef {
        version: CACHE_VERSION,
        graph,
    };
    let bytes = match bincode::serialize(&snapshot) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to serialise cache snapshot: {e}");
            return;
        }
    };
    if let Err(e) = std::fs::write(&path, bytes) {
        warn!("failed to write cache {}: {e}", path.display());
    } else {
        debug!("wrote cache {}", path.display());
    }
}
