//! Configuration of one mirror run

use std::path::PathBuf;

use url::Url;

use crate::app::client::ClientConfig;
use crate::app::transfer::TransferOptions;
use crate::app::worker::DispatchConfig;
use crate::constants::repo;
use crate::errors::{ConfigError, ConfigResult};

/// Everything the coordinator needs to mirror one architecture
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Repository root; architectures are directories below it
    pub repository_url: Url,
    /// Architecture (channel subdirectory), e.g. `linux-64`
    pub architecture: String,
    /// Mirror root; files land in `<download_dir>/<architecture>/`
    pub download_dir: PathBuf,
    /// Keep local files the manifest no longer lists
    pub keep_stale: bool,
    pub transfer: TransferOptions,
    pub dispatch: DispatchConfig,
    pub client: ClientConfig,
}

impl CoordinatorConfig {
    /// Configuration with defaults for everything but the two required inputs
    pub fn new(architecture: impl Into<String>, download_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let repository_url = parse_repository_url(repo::DEFAULT_REPOSITORY_URL)?;
        Ok(Self {
            repository_url,
            architecture: architecture.into(),
            download_dir: download_dir.into(),
            keep_stale: false,
            transfer: TransferOptions::default(),
            dispatch: DispatchConfig::default(),
            client: ClientConfig::default(),
        })
    }

    pub fn with_repository_url(mut self, repository_url: Url) -> Self {
        self.repository_url = repository_url;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.dispatch.worker_count = count;
        self
    }

    pub fn with_keep_stale(mut self, keep: bool) -> Self {
        self.keep_stale = keep;
        self
    }

    pub fn with_transfer_options(mut self, transfer: TransferOptions) -> Self {
        self.transfer = transfer;
        self
    }

    /// Base URL of the architecture directory
    pub fn base_url(&self) -> ConfigResult<Url> {
        self.repository_url
            .join(&format!("{}/", self.architecture))
            .map_err(|e| ConfigError::InvalidValue {
                field: "architecture".to_string(),
                value: self.architecture.clone(),
                reason: e.to_string(),
            })
    }

    /// Local directory of the architecture
    pub fn mirror_dir(&self) -> PathBuf {
        self.download_dir.join(&self.architecture)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let arch = self.architecture.as_str();
        if arch.is_empty() || arch == "." || arch == ".." || arch.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "architecture".to_string(),
                value: self.architecture.clone(),
                reason: "Must be a single directory name such as linux-64".to_string(),
            });
        }
        self.dispatch.validate()
    }
}

/// Parse a repository URL, making sure it ends with a slash so that joins
/// append rather than replace the last segment
pub fn parse_repository_url(raw: &str) -> ConfigResult<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    let url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidValue {
        field: "repository_url".to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidValue {
            field: "repository_url".to_string(),
            value: raw.to_string(),
            reason: format!("Unsupported scheme {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_and_mirror_dir() {
        let config = CoordinatorConfig::new("linux-64", "/srv/mirror").unwrap();
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://repo.anaconda.com/pkgs/main/linux-64/"
        );
        assert_eq!(config.mirror_dir(), PathBuf::from("/srv/mirror/linux-64"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_repository_url_gets_trailing_slash() {
        let url = parse_repository_url("https://conda.example.org/pkgs/free").unwrap();
        let config = CoordinatorConfig::new("win-64", "/m")
            .unwrap()
            .with_repository_url(url);
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://conda.example.org/pkgs/free/win-64/"
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(parse_repository_url("ftp://example.org/").is_err());
        assert!(parse_repository_url("not a url").is_err());

        let config = CoordinatorConfig::new("../etc", "/m").unwrap();
        assert!(config.validate().is_err());

        let config = CoordinatorConfig::new("linux-64", "/m")
            .unwrap()
            .with_worker_count(0);
        assert!(config.validate().is_err());
    }
}
