//! Project document persistence
//!
//! Addons and drawables are stored as one ordered JSON document. Numbers
//! and partition fields round-trip exactly; loading state and details do
//! not, so a reopened project starts with every drawable unloaded.

use crate::allocation::{Addon, AllocationManager};
use crate::config::AllocatorConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

pub const PROJECT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub addons: Vec<Addon>,
}

#[derive(Serialize)]
struct ProjectDocumentRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    addons: &'a [Addon],
}

/// Write the project atomically (temp file, then rename)
pub fn save_project<P: AsRef<Path>>(manager: &AllocationManager, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Io(format!("Failed to create project directory: {}", e)))?;
    }

    let document = ProjectDocumentRef {
        version: PROJECT_FORMAT_VERSION,
        saved_at: Utc::now(),
        addons: manager.addons(),
    };

    let temp_path = path.with_extension("json.tmp");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::Io(format!("Failed to create {}: {}", temp_path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &document)
        .map_err(|e| Error::SerializationError(format!("Failed to serialize project: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Io(format!("Failed to write project: {}", e)))?;

    std::fs::rename(&temp_path, path)
        .map_err(|e| Error::Io(format!("Failed to replace {}: {}", path.display(), e)))?;

    info!(
        path = %path.display(),
        addons = manager.addons().len(),
        drawables = manager.total_count(),
        "Saved project"
    );
    Ok(())
}

/// Restore a manager from a project file
pub fn load_project<P: AsRef<Path>>(path: P, config: AllocatorConfig) -> Result<AllocationManager> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::Io(format!("Failed to open {}: {}", path.display(), e)))?;
    let document: ProjectDocument = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::SerializationError(format!("Failed to parse project: {}", e)))?;

    if document.version > PROJECT_FORMAT_VERSION {
        return Err(Error::SerializationError(format!(
            "Project version {} is newer than supported version {}",
            document.version, PROJECT_FORMAT_VERSION
        )));
    }

    let manager = AllocationManager::from_addons(document.addons, config);
    for violation in manager.validate() {
        warn!(%violation, "Project violates numbering invariants");
    }

    info!(
        path = %path.display(),
        addons = manager.addons().len(),
        drawables = manager.total_count(),
        saved_at = %document.saved_at,
        "Loaded project"
    );
    Ok(manager)
}
