//! Concurrent transfer dispatch
//!
//! [`WorkDispatcher`] runs one [`TransferEngine`](crate::app::TransferEngine)
//! fetch per manifest entry on a bounded pool of tokio tasks. Workers share no
//! mutable state besides the queue they pull from; each returns its own
//! records and the dispatcher concatenates them after every worker is done.
//!
//! # Examples
//!
//! ```rust,no_run
//! use condarepo::app::{DispatchConfig, TransferEngine, TransferOptions, WorkDispatcher};
//! use std::path::Path;
//!
//! # async fn example(descriptors: Vec<condarepo::app::ResourceDescriptor>) {
//! let engine = TransferEngine::new(reqwest::Client::new());
//! let dispatcher = WorkDispatcher::new(DispatchConfig::with_worker_count(4));
//!
//! let records = dispatcher
//!     .dispatch(descriptors, engine, Path::new("mirror/linux-64"), &TransferOptions::default())
//!     .await;
//! println!("{} transfers finished", records.len());
//! # }
//! ```

pub mod config;
pub mod core;
pub mod pool;

pub use config::DispatchConfig;
pub use self::core::{SharedQueue, TransferWorker};
pub use pool::WorkDispatcher;
