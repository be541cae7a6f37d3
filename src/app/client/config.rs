//! HTTP client configuration and building logic

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::http;
use crate::errors::{ConfigError, ConfigResult};

/// Connection-level settings shared by every request of a run
///
/// The stall limit of a transfer is part of
/// [`TransferOptions`](crate::app::TransferOptions), not of the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// User agent sent with every request
    pub user_agent: String,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// TCP keep-alive interval for idle mirror connections
    pub tcp_keepalive: Option<Duration>,
    /// Send small range requests without Nagle delay
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Idle connections kept to the repository host, roughly one per worker
    pub pool_max_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: http::USER_AGENT.to_string(),
            connect_timeout: http::CONNECT_TIMEOUT,
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

impl ClientConfig {
    /// Build the client shared by the manifest fetch and every transfer
    ///
    /// No overall request timeout is set here; a large file on a slow link
    /// must be able to take as long as it keeps receiving data.
    pub fn build_http_client(&self) -> ConfigResult<Client> {
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(self.tcp_nodelay)
            .tcp_keepalive(self.tcp_keepalive)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_per_host)
            .build()
            .map_err(ConfigError::HttpClient)
    }
}
