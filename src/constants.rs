//! Application constants for condarepo
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Repository layout constants
pub mod repo {
    /// Default repository URL (architecture directories live below it)
    pub const DEFAULT_REPOSITORY_URL: &str = "https://repo.anaconda.com/pkgs/main/";

    /// Manifest file name, both remotely and in the mirror directory
    pub const MANIFEST_FILE_NAME: &str = "repodata.json";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("condarepo/", env!("CARGO_PKG_VERSION"));

    /// Default stall limit: longest silence while waiting for headers or data
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 32;
}

/// Retry configuration
pub mod limits {
    /// Maximum retry attempts after the first failed attempt
    pub const MAX_RETRIES: u32 = 4;

    /// Ceiling for the exponential backoff (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 60;
}

/// File operation constants
pub mod files {
    /// Suffix appended to a file name while its transfer is in flight
    pub const TEMP_FILE_SUFFIX: &str = ".tmp-download";

    /// Read buffer size for checksum computation
    pub const HASH_BUFFER_SIZE: usize = 64 * 1024;
}

/// Worker and concurrency configuration
pub mod workers {
    /// Upper bound on concurrent transfers
    pub const MAX_WORKER_COUNT: usize = 256;

    /// Channel buffer size for progress events
    pub const PROGRESS_BUFFER_SIZE: usize = 256;

    /// Default worker count: number of CPU cores plus one
    pub fn default_worker_count() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            + 1
    }
}

/// Process exit codes
pub mod exit {
    /// Configuration or other startup error
    pub const GENERAL_FAILURE: i32 = 1;

    /// Manifest could not be fetched or parsed; no work was attempted
    pub const MANIFEST_UNREACHABLE: i32 = 100;

    /// A pid file from another (or a crashed) run is present
    pub const ALREADY_RUNNING: i32 = 101;
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "condarepo.toml";

    /// Directory name under the user config dir
    pub const CONFIG_DIR_NAME: &str = "condarepo";
}

pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use repo::MANIFEST_FILE_NAME;
