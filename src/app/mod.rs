//! Core mirroring logic
//!
//! The components, in the order a run uses them:
//!
//! - [`manifest`] - `repodata.json` download and parsing
//! - [`inventory`] - local file set, leftover recovery and stale cleanup
//! - [`worker`] - bounded pool running one transfer per manifest entry
//! - [`transfer`] - resumable, checksum-verified, retried download of one file
//! - [`coordinator`] - drives a whole run and builds the [`RunReport`]
//!
//! [`checksum`], [`hash`] and [`models`] hold the shared building blocks,
//! [`client`] the HTTP client settings and [`lock`] the pid file guard.

pub mod checksum;
pub mod client;
pub mod coordinator;
pub mod hash;
pub mod inventory;
pub mod lock;
pub mod manifest;
pub mod models;
pub mod transfer;
pub mod worker;

// Re-export main public API
pub use checksum::ChecksumVerifier;
pub use client::ClientConfig;
pub use coordinator::{
    CoordinatorConfig, InventoryCounts, MirrorCoordinator, RunEvent, RunReport, TransferStats,
    Verdict,
};
pub use hash::Md5Hash;
pub use inventory::{directory_size, InventoryReconciler, LocalInventory, ReconcileSummary};
pub use lock::PidFile;
pub use manifest::{Manifest, ManifestFetcher, PackageEntry};
pub use models::ResourceDescriptor;
pub use transfer::{
    TransferAttempt, TransferEngine, TransferOptions, TransferOutcome, TransferRecord,
    Verification,
};
pub use worker::{DispatchConfig, WorkDispatcher};
