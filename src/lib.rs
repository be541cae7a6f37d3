//! condarepo library
//!
//! Mirrors a conda package repository: fetches `repodata.json`, removes local
//! packages it no longer lists, and downloads the missing ones concurrently
//! with resumable, MD5-verified, retried transfers.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(MANIFEST_FILE_NAME, "repodata.json");
        assert_eq!(TEMP_FILE_SUFFIX, ".tmp-download");
        assert!(USER_AGENT.starts_with("condarepo/"));
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::Manifest(errors::ManifestError::MissingPackages);
        assert_eq!(app_error.category(), "manifest");
        assert_eq!(app_error.exit_code(), exit::MANIFEST_UNREACHABLE);
    }
}
