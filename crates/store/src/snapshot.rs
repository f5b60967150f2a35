//! JSON snapshot persistence for the in-memory store.
//!
//! The whole aggregate state serializes to one file, written atomically so
//! a crash mid-write never leaves a torn snapshot. Loaded once at startup;
//! written on shutdown and periodically by the snapshot worker.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use split_core::{Error, Result, Session, TrackingEvent};

use crate::stats::{ComponentStats, PageStats};

/// Serialized store state.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    pub sessions: HashMap<String, Session>,
    pub page_sessions: HashMap<String, HashSet<String>>,
    pub pages: HashMap<String, PageStats>,
    /// Component rows are stored flat; the map key is rebuilt on load.
    pub components: Vec<ComponentStats>,
    pub events: Vec<TrackingEvent>,
}

/// Load a snapshot if the file exists. A missing file is an empty store;
/// an unreadable one is an error the caller can choose to ignore.
pub fn load_snapshot(path: &Path) -> Result<Option<SnapshotData>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::internal(format!(
                "read snapshot {}: {}",
                path.display(),
                e
            )))
        }
    };

    let data = serde_json::from_slice(&bytes)?;
    Ok(Some(data))
}

/// Write a snapshot atomically.
pub fn write_snapshot(path: &Path, data: &SnapshotData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::internal(format!("snapshot dir: {}", e)))?;
    }

    let mut file = AtomicWriteFile::options()
        .open(path)
        .map_err(|e| Error::internal(format!("open {}: {}", path.display(), e)))?;

    let json = serde_json::to_string(data)?;
    writeln!(file, "{json}").map_err(|e| Error::internal(format!("write snapshot: {}", e)))?;
    file.commit()
        .map_err(|e| Error::internal(format!("commit snapshot: {}", e)))?;

    Ok(())
}
