//! Resource descriptors
//!
//! A [`ResourceDescriptor`] is one mirrorable file: its identifier, expected
//! size and checksum, and the URL it is fetched from. Descriptors are
//! validated once at construction so that the transfer engine can treat every
//! descriptor it receives as well formed.

use std::path::{Path, PathBuf};

use url::Url;

use crate::app::hash::Md5Hash;
use crate::constants::{files, repo};
use crate::errors::{ManifestError, ManifestResult};

/// One file of the remote repository and its expected metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    identifier: String,
    size: u64,
    checksum: Md5Hash,
    base_url: Url,
    url: Url,
}

impl ResourceDescriptor {
    /// Create a descriptor, rejecting identifiers that do not name exactly one
    /// file inside the mirror directory
    ///
    /// `base_url` should end with `/`; the identifier is joined onto it.
    pub fn new(
        identifier: impl Into<String>,
        size: u64,
        checksum: Md5Hash,
        base_url: &Url,
    ) -> ManifestResult<Self> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;

        let url = base_url
            .join(&identifier)
            .map_err(|e| ManifestError::InvalidUrl {
                identifier: identifier.clone(),
                error: e.to_string(),
            })?;

        Ok(Self {
            identifier,
            size,
            checksum,
            base_url: base_url.clone(),
            url,
        })
    }

    /// Identifier (file name) of the resource
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Expected size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Expected MD5 digest
    pub fn checksum(&self) -> &Md5Hash {
        &self.checksum
    }

    /// Repository URL the identifier is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Download URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Final location inside `dir`
    pub fn local_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.identifier)
    }

    /// In-flight location inside `dir`
    pub fn temp_path(&self, dir: &Path) -> PathBuf {
        temp_path_for(&self.local_path(dir))
    }
}

/// Temporary path used while `final_path` is being downloaded
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(files::TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

fn validate_identifier(identifier: &str) -> ManifestResult<()> {
    let reason = if identifier.is_empty() {
        Some("empty")
    } else if identifier == "." || identifier == ".." {
        Some("relative directory reference")
    } else if identifier.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if identifier.contains('\0') {
        Some("contains a NUL byte")
    } else if identifier.contains(['#', '?', ':']) {
        // Url::join would treat these as fragment, query or scheme.
        Some("contains a URL delimiter")
    } else if identifier.ends_with(files::TEMP_FILE_SUFFIX) {
        Some("collides with the temporary file suffix")
    } else if identifier == repo::MANIFEST_FILE_NAME {
        Some("collides with the manifest file")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ManifestError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
