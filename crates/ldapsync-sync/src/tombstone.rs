//! Flat-file tombstone store
//!
//! One fully-qualified account id per line. The whole file is read at pass
//! start and rewritten (never appended) when the set changes. A single
//! process owns the file; no locking is performed.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use ldapsync_core::{AccountId, Result, SyncError, TombstoneSet, TombstoneStore};

#[derive(Debug, Clone)]
pub struct FileTombstoneStore {
    path: PathBuf,
}

impl FileTombstoneStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Parse the file contents; blank lines are ignored and malformed ids are
/// dropped with a warning.
pub fn parse_tombstones(contents: &str) -> TombstoneSet {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match AccountId::parse(line) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Ignoring malformed tombstone entry: {}", e);
                None
            }
        })
        .collect()
}

pub fn render_tombstones(tombstones: &TombstoneSet) -> String {
    tombstones
        .iter()
        .map(|id| format!("{}\n", id))
        .collect()
}

#[async_trait]
impl TombstoneStore for FileTombstoneStore {
    async fn load(&self) -> Result<TombstoneSet> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let tombstones = parse_tombstones(&contents);
                debug!(
                    path = %self.path.display(),
                    "Loaded {} tombstones",
                    tombstones.len()
                );
                Ok(tombstones)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TombstoneSet::new()),
            Err(e) => Err(SyncError::tombstone(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, tombstones: &TombstoneSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    SyncError::tombstone(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, render_tombstones(tombstones))
            .await
            .map_err(|e| SyncError::tombstone(format!("Failed to write {}: {}", temp.display(), e)))?;

        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            SyncError::tombstone(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(
            path = %self.path.display(),
            "Deleted users list was updated ({} entries)",
            tombstones.len()
        );
        Ok(())
    }
}
