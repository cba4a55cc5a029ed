use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{PedigreeError, Result};
use crate::pedigree::graph::PedigreeGraph;

/// Current snapshot format version. Bumped on any incompatible layout
/// change; a mismatch on load forces a rebuild from the registry files.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    built_at_secs: u64,
    graph: &'a PedigreeGraph,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    built_at_secs: u64,
    graph: PedigreeGraph,
}

/// A pedigree graph restored from disk, with its build timestamp.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub graph: PedigreeGraph,
    /// Unix timestamp (seconds) recorded when the snapshot was written.
    pub built_at_secs: u64,
}

/// Write a binary snapshot of the graph.
///
/// # Errors
/// Returns an error if serialization or the file write fails.
pub fn save_snapshot<P: AsRef<Path>>(graph: &PedigreeGraph, path: P) -> Result<()> {
    let built_at_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let envelope = EnvelopeRef {
        format_version: SNAPSHOT_FORMAT_VERSION,
        built_at_secs,
        graph,
    };
    let bytes = bincode::serialize(&envelope)
        .map_err(|e| PedigreeError::Snapshot(format!("serialize failed: {}", e)))?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

/// Load a snapshot written by [`save_snapshot`].
///
/// Returns `None` on any failure (missing file, unreadable file, decode
/// error, format-version mismatch) so the caller falls back to a rebuild
/// from the registry files. The reason is logged at warn level.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Option<Snapshot> {
    let path = path.as_ref();

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(
                "snapshot '{}' unreadable ({}); a rebuild is required",
                path.display(),
                e
            );
            return None;
        }
    };

    let envelope: Envelope = match bincode::deserialize(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::warn!(
                "snapshot '{}' corrupt ({}); a rebuild is required",
                path.display(),
                e
            );
            return None;
        }
    };

    if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
        log::warn!(
            "snapshot '{}' has format version {}, expected {}; a rebuild is required",
            path.display(),
            envelope.format_version,
            SNAPSHOT_FORMAT_VERSION
        );
        return None;
    }

    Some(Snapshot {
        graph: envelope.graph,
        built_at_secs: envelope.built_at_secs,
    })
}
