//! Configuration file support
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, and command-line flags. The file is looked up at the `--config`
//! path when given (it must then exist), otherwise at `./condarepo.toml` and
//! then `<user config dir>/condarepo/config.toml`.
//!
//! ```toml
//! [mirror]
//! repository_url = "https://repo.anaconda.com/pkgs/main/"
//! keep_stale = false
//! pid_file = "/run/condarepo.pid"
//!
//! [transfer]
//! timeout = "60s"
//! max_retries = 4
//! max_backoff_secs = 60
//! resume = false
//!
//! [dispatch]
//! workers = 0   # 0 = CPU cores + 1
//!
//! [client]
//! connect_timeout = "30s"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::coordinator::parse_repository_url;
use crate::app::{ClientConfig, CoordinatorConfig, DispatchConfig, TransferOptions};
use crate::constants::{config, http, limits, repo, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mirror: MirrorConfigToml,
    pub transfer: TransferConfigToml,
    pub dispatch: DispatchConfigToml,
    pub client: ClientConfigToml,
    pub logging: LoggingConfig,
}

/// `[mirror]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfigToml {
    /// Repository root, architectures are directories below it
    pub repository_url: String,
    /// Keep local packages the manifest no longer lists
    pub keep_stale: bool,
    /// Single-instance pid file; none when unset
    pub pid_file: Option<PathBuf>,
}

impl Default for MirrorConfigToml {
    fn default() -> Self {
        Self {
            repository_url: repo::DEFAULT_REPOSITORY_URL.to_string(),
            keep_stale: false,
            pid_file: None,
        }
    }
}

/// `[transfer]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfigToml {
    /// Per-request timeout, e.g. `"90s"` or `"2m"`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Backoff ceiling in seconds
    pub max_backoff_secs: u64,
    /// Continue partial downloads with range requests
    pub resume: bool,
}

impl Default for TransferConfigToml {
    fn default() -> Self {
        Self {
            timeout: http::DEFAULT_TIMEOUT,
            max_retries: limits::MAX_RETRIES,
            max_backoff_secs: limits::MAX_BACKOFF_SECS,
            resume: false,
        }
    }
}

/// `[dispatch]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfigToml {
    /// Concurrent transfers; 0 means CPU cores + 1
    pub workers: usize,
}

/// `[client]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    pub user_agent: String,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// TCP keep-alive interval (unset = disabled)
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout (unset = never)
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_per_host: usize,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            user_agent: client.user_agent,
            connect_timeout: client.connect_timeout,
            tcp_keepalive: client.tcp_keepalive,
            tcp_nodelay: client.tcp_nodelay,
            pool_idle_timeout: client.pool_idle_timeout,
            pool_max_per_host: client.pool_max_per_host,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level: error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the first configuration file found, or defaults when none exists
    pub async fn load(config_file_override: Option<&Path>) -> ConfigResult<Self> {
        match Self::locate(config_file_override)? {
            Some(path) => Self::load_from_file(&path).await,
            None => Ok(Self::default()),
        }
    }

    /// Path of the configuration file to use, if any
    ///
    /// An explicit override must exist. This runs before logging is set up,
    /// so it reports nothing itself.
    pub fn locate(config_file_override: Option<&Path>) -> ConfigResult<Option<PathBuf>> {
        match config_file_override {
            Some(path) if !path.exists() => Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            }),
            Some(path) => Ok(Some(path.to_path_buf())),
            None => Ok(Self::find_config_file()),
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse one configuration file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content)
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(config::LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join(config::CONFIG_DIR_NAME).join("config.toml"));
        }

        search_paths.into_iter().find(|path| path.is_file())
    }

    /// Convert to the runtime configuration of one architecture
    pub fn to_runtime_config(
        &self,
        architecture: &str,
        download_dir: &Path,
    ) -> ConfigResult<CoordinatorConfig> {
        let repository_url = parse_repository_url(&self.mirror.repository_url)?;

        let config = CoordinatorConfig {
            repository_url,
            architecture: architecture.to_string(),
            download_dir: download_dir.to_path_buf(),
            keep_stale: self.mirror.keep_stale,
            transfer: self.transfer.to_runtime_config()?,
            dispatch: self.dispatch.to_runtime_config(),
            client: self.client.to_runtime_config(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl TransferConfigToml {
    pub fn to_runtime_config(&self) -> ConfigResult<TransferOptions> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "transfer.timeout".to_string(),
                value: "0s".to_string(),
                reason: "Timeout must be positive".to_string(),
            });
        }

        Ok(TransferOptions {
            timeout: self.timeout,
            max_retries: self.max_retries,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            resume: self.resume,
        })
    }
}

impl DispatchConfigToml {
    pub fn to_runtime_config(&self) -> DispatchConfig {
        if self.workers == 0 {
            DispatchConfig::with_worker_count(workers::default_worker_count())
        } else {
            DispatchConfig::with_worker_count(self.workers)
        }
    }
}

impl ClientConfigToml {
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            user_agent: self.user_agent.clone(),
            connect_timeout: self.connect_timeout,
            tcp_keepalive: self.tcp_keepalive,
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_per_host: self.pool_max_per_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.mirror.repository_url, repo::DEFAULT_REPOSITORY_URL);
        assert_eq!(config.transfer.max_retries, limits::MAX_RETRIES);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [mirror]
            repository_url = "https://conda.example.org/pkgs/free"
            keep_stale = true

            [transfer]
            timeout = "2m 30s"
            resume = true

            [client]
            tcp_keepalive = "15s"
            "#,
        )
        .unwrap();

        assert!(config.mirror.keep_stale);
        assert_eq!(config.transfer.timeout, Duration::from_secs(150));
        assert!(config.transfer.resume);
        assert_eq!(config.transfer.max_backoff_secs, limits::MAX_BACKOFF_SECS);
        assert_eq!(config.client.tcp_keepalive, Some(Duration::from_secs(15)));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = AppConfig::from_toml("[transfer]\ntimeout = \"soon\"");
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_to_runtime_config() {
        let mut config = AppConfig::default();
        config.dispatch.workers = 3;
        config.transfer.max_backoff_secs = 5;

        let runtime = config
            .to_runtime_config("osx-arm64", Path::new("/srv/conda"))
            .unwrap();
        assert_eq!(runtime.dispatch.worker_count, 3);
        assert_eq!(runtime.transfer.max_backoff, Duration::from_secs(5));
        assert_eq!(runtime.mirror_dir(), PathBuf::from("/srv/conda/osx-arm64"));
    }

    #[test]
    fn test_zero_workers_means_cpu_count_plus_one() {
        let runtime = AppConfig::default()
            .to_runtime_config("linux-64", Path::new("/m"))
            .unwrap();
        assert_eq!(runtime.dispatch.worker_count, workers::default_worker_count());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.transfer.timeout = Duration::ZERO;
        assert!(config.to_runtime_config("linux-64", Path::new("/m")).is_err());
    }

    #[tokio::test]
    async fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[dispatch]\nworkers = 7\n").unwrap();

        let config = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.dispatch.workers, 7);
    }

    #[test]
    fn test_locate_returns_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "").unwrap();

        assert_eq!(AppConfig::locate(Some(&path)).unwrap(), Some(path));
        assert!(matches!(
            AppConfig::locate(Some(&temp_dir.path().join("absent.toml"))),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(&temp_dir.path().join("absent.toml"))).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }
}
