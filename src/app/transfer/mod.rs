//! Per-file transfer state machine
//!
//! A transfer either finds the final file already in place, or loops over
//! attempts until one produces a verified file or the retry budget runs out:
//!
//! - resume from `<name>.tmp-download` with `Range: bytes=N-` when enabled
//! - accept `200` and `206`, everything else is an HTTP failure
//! - verify the digest, then rename the temporary file into place
//! - sleep `min(2^k, max_backoff)` seconds between attempts
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use condarepo::app::{Md5Hash, ResourceDescriptor, TransferEngine, TransferOptions};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let base = Url::parse("https://repo.anaconda.com/pkgs/main/linux-64/")?;
//! let descriptor = ResourceDescriptor::new(
//!     "zlib-1.2.13-h5eee18b_0.conda",
//!     112_377,
//!     Md5Hash::from_hex("c5e8e1a5ad8e9a1f2b3c4d5e6f708192")?,
//!     &base,
//! )?;
//!
//! let engine = TransferEngine::new(reqwest::Client::new());
//! let record = engine
//!     .fetch(&descriptor, Path::new("/srv/mirror/linux-64"), &TransferOptions::default())
//!     .await;
//! println!("{}: {}", record.identifier, record.outcome);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod options;
pub mod outcome;

pub use engine::{TransferEngine, Verification};
pub use options::TransferOptions;
pub use outcome::{TransferAttempt, TransferOutcome, TransferRecord};
