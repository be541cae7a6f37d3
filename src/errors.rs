//! Error types for condarepo
//!
//! Errors are grouped by the component that raises them. Attempt-level
//! transfer failures never leave the transfer engine as errors: they are folded
//! into a [`TransferOutcome`](crate::app::TransferOutcome). Everything else
//! propagates up to [`AppError`], which decides the process exit status.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::exit;

/// Failure of a single transfer attempt
#[derive(Error, Debug)]
pub enum TransferError {
    /// Transport-level failure (connect, reset, timeout, truncated body)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No response headers or body bytes arrived within the stall limit
    #[error("connection stalled, no data for {after:?}")]
    Stalled { after: Duration },

    /// Server answered with a status that cannot be streamed
    #[error("HTTP error {status}")]
    Status { status: u16 },

    /// Downloaded content does not match the expected digest
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Local file I/O failure
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Temporary file could not be moved into place
    #[error("could not rename {temp_path} to {final_path}: {source}")]
    AtomicRename {
        temp_path: PathBuf,
        final_path: PathBuf,
        source: std::io::Error,
    },
}

/// Manifest fetching and parsing errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest could not be downloaded
    #[error("manifest {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// JSON parsing error
    #[error("JSON parsing error in manifest")]
    JsonParse(#[from] serde_json::Error),

    /// I/O error reading manifest
    #[error("I/O error reading manifest")]
    Io(#[from] std::io::Error),

    /// Manifest has none of the package sections
    #[error("manifest has no package section")]
    MissingPackages,

    /// Invalid hash format
    #[error("invalid hash format: {hash}. Expected MD5 hex string")]
    InvalidHash { hash: String },

    /// Identifier cannot be mapped onto a single file in the mirror
    #[error("invalid resource identifier: {identifier:?} ({reason})")]
    InvalidIdentifier { identifier: String, reason: String },

    /// Identifier cannot be joined onto the base URL
    #[error("invalid URL for {identifier}: {error}")]
    InvalidUrl { identifier: String, error: String },
}

/// Local mirror directory errors
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Mirror directory cannot be listed
    #[error("cannot read mirror directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mirror directory cannot be created
    #[error("cannot create mirror directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Single-instance guard errors
#[derive(Error, Debug)]
pub enum LockError {
    /// Pid file left by another run
    #[error("found previous pid file {path}, something was wrong during the last run")]
    AlreadyRunning { path: PathBuf },

    /// Pid file could not be written or removed
    #[error("pid file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// HTTP client could not be built
    #[error("cannot build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Manifest(_) => "manifest",
            AppError::Inventory(_) => "inventory",
            AppError::Lock(_) => "lock",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Manifest(_) => exit::MANIFEST_UNREACHABLE,
            AppError::Lock(LockError::AlreadyRunning { .. }) => exit::ALREADY_RUNNING,
            _ => exit::GENERAL_FAILURE,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Transfer attempt result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Inventory result type alias
pub type InventoryResult<T> = std::result::Result<T, InventoryError>;

/// Lock result type alias
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
