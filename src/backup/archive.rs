// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Directory-backed archive
//!
//! Layout under the backup directory:
//! - resources/<group resource>/namespaces/<namespace>/<name>.json
//! - resources/<group resource>/cluster/<name>.json
//! - backup.json - request, status and errors of the run

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::identifier::ResourceIdentifier;
use super::item::Item;
use super::processor::BackupResult;
use super::request::BackupRequest;
use super::source::ArchiveWriter;

/// Atomically write content to a file using tempfile + rename
///
/// Readers see either the previous content or the new content, never a partial file.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use tempfile::NamedTempFile;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let temp_file = NamedTempFile::new_in(dir).context("Failed to create temp file")?;

    std::fs::write(temp_file.path(), content)
        .with_context(|| format!("Failed to write temp file {:?}", temp_file.path()))?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file to {:?}", path))?;

    Ok(())
}

#[derive(Serialize)]
struct BackupMetadata<'a> {
    request: &'a BackupRequest,
    #[serde(flatten)]
    result: &'a BackupResult,
}

/// Writes every archived item as a JSON file below a backup directory
pub struct DirectoryArchive {
    root: PathBuf,
    written: usize,
}

impl DirectoryArchive {
    /// Create the backup directory; refuses to reuse a non-empty one
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists()
            && std::fs::read_dir(&root)
                .with_context(|| format!("Failed to read {}", root.display()))?
                .next()
                .is_some()
        {
            anyhow::bail!("Backup directory {} is not empty", root.display());
        }
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create backup directory {}", root.display()))?;
        Ok(Self { root, written: 0 })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Location of an item inside the archive
    pub fn item_path(&self, id: &ResourceIdentifier) -> PathBuf {
        let base = self
            .root
            .join("resources")
            .join(id.group_resource.to_string());
        let dir = if id.is_cluster_scoped() {
            base.join("cluster")
        } else {
            base.join("namespaces").join(&id.namespace)
        };
        dir.join(format!("{}.json", id.name))
    }

    /// Write the run summary next to the archived resources
    pub fn finish(&self, request: &BackupRequest, result: &BackupResult) -> Result<PathBuf> {
        let path = self.root.join("backup.json");
        let content = serde_json::to_vec_pretty(&BackupMetadata { request, result })
            .context("Failed to serialize backup metadata")?;
        atomic_write(&path, &content)?;
        Ok(path)
    }
}

#[async_trait]
impl ArchiveWriter for DirectoryArchive {
    async fn write(&mut self, id: &ResourceIdentifier, item: &Item) -> Result<()> {
        let path = self.item_path(id);
        let content = serde_json::to_vec_pretty(item)
            .with_context(|| format!("Failed to serialize {}", id))?;
        atomic_write(&path, &content)?;
        self.written += 1;
        Ok(())
    }
}
