//! HTTP client construction
//!
//! One `reqwest::Client` is built per run and shared (it is an `Arc`
//! internally) by the manifest fetch and every transfer, so all of them reuse
//! the same connection pool.

pub mod config;

pub use config::ClientConfig;
