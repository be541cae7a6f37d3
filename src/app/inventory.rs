//! Local mirror inventory and stale-file reconciliation
//!
//! The inventory of a mirror directory is the set of regular files in it,
//! minus the manifest and minus `.tmp-download` leftovers. Reconciliation
//! compares that set with the manifest's keys: files the manifest no longer
//! lists are stale and get deleted unless the caller asks to keep them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::app::transfer::engine::remove_if_exists;
use crate::constants::{files, repo};
use crate::errors::{InventoryError, InventoryResult};

/// Snapshot of the mirror directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInventory {
    /// Completed files: name → size in bytes
    pub files: BTreeMap<String, u64>,
    /// Leftover temporary files from interrupted transfers
    pub temp_files: BTreeSet<String>,
}

impl LocalInventory {
    /// Scan `dir`, skipping the manifest, directories and symlinks
    pub async fn scan(dir: &Path) -> InventoryResult<Self> {
        let read_dir_error = |source| InventoryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut inventory = Self::default();
        let mut entries = fs::read_dir(dir).await.map_err(read_dir_error)?;

        while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(_) => continue, // removed while scanning
            };
            if !file_type.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!("Skipping non UTF-8 file name {:?}", entry.file_name());
                continue;
            };

            if name == repo::MANIFEST_FILE_NAME {
                continue;
            }

            if name.ends_with(files::TEMP_FILE_SUFFIX) {
                inventory.temp_files.insert(name);
                continue;
            }

            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            inventory.files.insert(name, size);
        }

        Ok(inventory)
    }

    /// Number of completed files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no completed file is present
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Result of reconciling the mirror against the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Temporary files deleted before the partition
    pub recovered_temp_files: Vec<String>,
    /// Temporary files kept for resumption
    pub resumable_temp_files: Vec<String>,
    /// Local files the manifest still lists
    pub retained: BTreeSet<String>,
    /// Local files the manifest no longer lists
    pub stale: BTreeSet<String>,
    /// Stale files actually removed
    pub deleted: Vec<String>,
    /// Bytes freed, or freeable when stale files are kept
    pub freed_bytes: u64,
    /// Whether stale files were kept
    pub kept: bool,
}

/// Diffs a mirror directory against the manifest keys
#[derive(Debug, Clone)]
pub struct InventoryReconciler {
    dir: PathBuf,
}

impl InventoryReconciler {
    /// Reconciler for the given mirror directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Mirror directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current inventory
    pub async fn scan(&self) -> InventoryResult<LocalInventory> {
        LocalInventory::scan(&self.dir).await
    }

    /// Clean up leftovers, then partition and optionally delete stale files
    ///
    /// Temporary files are deleted unless `resume` is set, their identifier
    /// is still in the manifest and no final file of that name exists. With `keep` the stale files stay on disk, but
    /// their size is counted in `freed_bytes` either way.
    pub async fn reconcile(
        &self,
        remote_keys: &BTreeSet<String>,
        keep: bool,
        resume: bool,
    ) -> InventoryResult<ReconcileSummary> {
        let mut summary = ReconcileSummary {
            kept: keep,
            ..Default::default()
        };

        let before = self.scan().await?;
        self.recover_temp_files(&before, remote_keys, resume, &mut summary)
            .await;

        // Rescan so the partition only sees committed files.
        let inventory = self.scan().await?;
        for name in inventory.files.keys() {
            if remote_keys.contains(name) {
                summary.retained.insert(name.clone());
            } else {
                summary.stale.insert(name.clone());
            }
        }

        info!(
            "Found {} local files in {}, {} are no longer in the manifest",
            inventory.len(),
            self.dir.display(),
            summary.stale.len()
        );

        for name in &summary.stale {
            let path = self.dir.join(name);
            let size = match fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(_) => {
                    warn!("File {} no longer exists locally", path.display());
                    continue;
                }
            };
            summary.freed_bytes += size;

            if keep {
                info!(
                    "File {} is no longer in the manifest, keeping it",
                    path.display()
                );
            } else if remove_if_exists(&path).await {
                info!("File {} deleted", path.display());
                summary.deleted.push(name.clone());
            } else {
                warn!("File {} could not be deleted", path.display());
            }
        }

        if keep {
            info!(
                "{} bytes of disk space can be freed by not keeping stale files",
                summary.freed_bytes
            );
        } else {
            info!("{} bytes of disk space were freed", summary.freed_bytes);
        }

        Ok(summary)
    }

    async fn recover_temp_files(
        &self,
        inventory: &LocalInventory,
        remote_keys: &BTreeSet<String>,
        resume: bool,
        summary: &mut ReconcileSummary,
    ) {
        if inventory.temp_files.is_empty() {
            return;
        }

        warn!(
            "Previous run was interrupted, found {} incomplete temporary files",
            inventory.temp_files.len()
        );

        for name in &inventory.temp_files {
            let identifier = name
                .strip_suffix(files::TEMP_FILE_SUFFIX)
                .unwrap_or(name.as_str());
            // A committed file wins over its partial.
            let committed = inventory.files.contains_key(identifier);
            if resume && !committed && remote_keys.contains(identifier) {
                info!("Keeping {} to resume the transfer", name);
                summary.resumable_temp_files.push(name.clone());
                continue;
            }

            let path = self.dir.join(name);
            remove_if_exists(&path).await;
            warn!("Deleted incomplete temporary file {}", path.display());
            summary.recovered_temp_files.push(name.clone());
        }
    }
}

/// Total size of all regular files below `dir`, recursively
pub async fn directory_size(dir: &Path) -> InventoryResult<u64> {
    let mut total = 0u64;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current)
            .await
            .map_err(|source| InventoryError::ReadDir {
                path: current.clone(),
                source,
            })?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            match entry.file_type().await {
                Ok(t) if t.is_dir() => pending.push(entry.path()),
                Ok(t) if t.is_file() => {
                    total += entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                }
                _ => {}
            }
        }
    }

    Ok(total)
}
