//! Manifest download
//!
//! The manifest goes through the same transfer loop as any package, with two
//! differences: it is fetched on every run even if a copy exists, and its
//! content is trusted as received.
// TODO: verify the manifest like any other resource once repodata carries a signature.

use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;

use crate::app::transfer::engine::{TransferTarget, Verification};
use crate::app::transfer::{TransferEngine, TransferOptions};
use crate::constants::repo;
use crate::errors::{ManifestError, ManifestResult};

/// Fetches `repodata.json` into the mirror directory
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    engine: TransferEngine,
}

impl ManifestFetcher {
    /// Create a fetcher sharing the engine's HTTP client
    pub fn new(engine: TransferEngine) -> Self {
        Self { engine }
    }

    /// Remote manifest location below `base_url`
    pub fn manifest_url(base_url: &Url) -> ManifestResult<Url> {
        base_url
            .join(repo::MANIFEST_FILE_NAME)
            .map_err(|e| ManifestError::InvalidUrl {
                identifier: repo::MANIFEST_FILE_NAME.to_string(),
                error: e.to_string(),
            })
    }

    /// Download the manifest, replacing any previous copy
    ///
    /// Returns the local path. Exhausting the retries is an error because no
    /// reconciliation is possible without a manifest.
    pub async fn fetch(
        &self,
        base_url: &Url,
        destination_dir: &Path,
        options: &TransferOptions,
    ) -> ManifestResult<PathBuf> {
        let url = Self::manifest_url(base_url)?;
        let final_path = destination_dir.join(repo::MANIFEST_FILE_NAME);
        let target = TransferTarget::new(
            repo::MANIFEST_FILE_NAME,
            url.clone(),
            final_path.clone(),
            Verification::TrustOnReceipt,
        );

        // A partial manifest may belong to an older revision.
        let options = TransferOptions {
            resume: false,
            ..options.clone()
        };

        info!("Fetching manifest {}", url);
        let record = self.engine.transfer(&target, &options).await;

        if record.outcome.ok() {
            Ok(final_path)
        } else {
            Err(ManifestError::Unreachable {
                url: url.to_string(),
                reason: record.outcome.to_string(),
            })
        }
    }
}
