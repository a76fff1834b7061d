//! # Resource Store — Files Backing Descriptions, Changelogs and Artifacts
//!
//! Every stored blob has a row in `resources` (id + kind) and a file at
//! `<root>/<id>.<kind>`. Removal erases the file first, then the row. A file
//! that is already gone is logged and the row is still removed, so a crash
//! between the two steps can be repaired by simply removing again.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

use crate::db::Database;

/// Kind of a compiled build artifact.
pub const ARTIFACT_KIND: &str = "phar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// File was already missing; the row was removed anyway.
    FileMissing,
    /// No row exists for the id, so there was nothing to resolve.
    Unknown,
}

pub struct ResourceStore {
    root: PathBuf,
}

impl ResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResourceStore { root: root.into() }
    }

    pub fn path_for(&self, resource_id: i64, kind: &str) -> PathBuf {
        self.root.join(format!("{}.{}", resource_id, kind))
    }

    /// Resolve a resource id to its file path using the kind recorded in the database.
    pub async fn resolve(&self, db: &Database, resource_id: i64) -> Result<Option<PathBuf>> {
        let kind = db.get_resource_kind(resource_id).await?;
        Ok(kind.map(|k| self.path_for(resource_id, &k)))
    }

    /// Size in bytes of a build artifact. A missing file is an error: a build
    /// row whose artifact vanished means the store is corrupted.
    pub async fn artifact_size(&self, resource_id: i64) -> Result<u64> {
        let path = self.path_for(resource_id, ARTIFACT_KIND);
        let meta = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("artifact {} missing at {}", resource_id, path.display()))?;
        Ok(meta.len())
    }

    /// Remove the backing file, then the metadata row.
    pub async fn remove(&self, db: &Database, resource_id: i64) -> Result<RemoveOutcome> {
        let Some(path) = self.resolve(db, resource_id).await? else {
            warn!(resource_id, "resource row missing, nothing to remove");
            return Ok(RemoveOutcome::Unknown);
        };

        let outcome = match tokio::fs::remove_file(&path).await {
            Ok(()) => RemoveOutcome::Removed,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(resource_id, path = %path.display(), "resource file already missing");
                RemoveOutcome::FileMissing
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to remove resource file {}", path.display())
                })
            }
        };

        db.delete_resource_row(resource_id).await?;
        Ok(outcome)
    }
}
