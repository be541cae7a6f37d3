//! Repository manifest (`repodata.json`)
//!
//! The manifest maps package file names to their metadata. Only the fields the
//! transfer engine needs are interpreted (`md5` and `size`); everything else is
//! carried along untouched in [`PackageEntry::metadata`].
//!
//! ```json
//! {
//!   "info": { "subdir": "win-64" },
//!   "packages": {
//!     "_license-1.1-py27_0.tar.bz2": {
//!       "md5": "4ced1f80ffe9ed609d55da8dd52b63bd",
//!       "size": 50872,
//!       "name": "_license",
//!       "version": "1.1"
//!     }
//!   },
//!   "packages.conda": {}
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::hash::Md5Hash;
use crate::app::models::ResourceDescriptor;
use crate::errors::{ManifestError, ManifestResult};

pub mod fetcher;

pub use fetcher::ManifestFetcher;

/// Metadata of one manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Expected MD5 digest
    pub md5: Md5Hash,
    /// Expected size in bytes
    pub size: u64,
    /// Remaining fields, uninterpreted
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    packages: Option<BTreeMap<String, PackageEntry>>,
    #[serde(rename = "packages.conda")]
    packages_conda: Option<BTreeMap<String, PackageEntry>>,
}

/// Parsed manifest: identifier → entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: BTreeMap<String, PackageEntry>,
}

impl Manifest {
    /// Parse manifest JSON, merging the `packages` and `packages.conda` sections
    pub fn from_json(json: &str) -> ManifestResult<Self> {
        let raw: RawManifest = serde_json::from_str(json)?;

        if raw.packages.is_none() && raw.packages_conda.is_none() {
            return Err(ManifestError::MissingPackages);
        }

        let mut entries = raw.packages.unwrap_or_default();
        entries.extend(raw.packages_conda.unwrap_or_default());
        Ok(Self { entries })
    }

    /// Read and parse a manifest file
    pub async fn load(path: &Path) -> ManifestResult<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the manifest lists nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry
    pub fn get(&self, identifier: &str) -> Option<&PackageEntry> {
        self.entries.get(identifier)
    }

    /// All identifiers
    pub fn key_set(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Descriptors for every entry, resolved against `base_url`
    ///
    /// Fails on the first entry whose identifier cannot name a single file in
    /// the mirror directory.
    pub fn descriptors(&self, base_url: &Url) -> ManifestResult<Vec<ResourceDescriptor>> {
        self.entries
            .iter()
            .map(|(identifier, entry)| {
                ResourceDescriptor::new(identifier.as_str(), entry.size, entry.md5, base_url)
            })
            .collect()
    }
}
