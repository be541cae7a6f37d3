//! Resumable, verified, retried download of a single resource
//!
//! Every attempt streams into `<name>.tmp-download` next to the final file and
//! only a verified temporary file is renamed into place, so an interrupted run
//! never leaves a half-written final file behind.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::options::TransferOptions;
use super::outcome::{TransferAttempt, TransferOutcome, TransferRecord};
use crate::app::checksum::ChecksumVerifier;
use crate::app::hash::Md5Hash;
use crate::app::models::{temp_path_for, ResourceDescriptor};
use crate::errors::{TransferError, TransferResult};

/// How a finished temporary file is checked before it is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Digest must equal the expected MD5
    Checksum(Md5Hash),
    /// Content is accepted as received
    TrustOnReceipt,
}

/// Where one transfer reads from and writes to
#[derive(Debug, Clone)]
pub(crate) struct TransferTarget {
    pub identifier: String,
    pub url: Url,
    pub final_path: PathBuf,
    pub temp_path: PathBuf,
    pub verification: Verification,
}

impl TransferTarget {
    pub(crate) fn new(
        identifier: impl Into<String>,
        url: Url,
        final_path: PathBuf,
        verification: Verification,
    ) -> Self {
        let temp_path = temp_path_for(&final_path);
        Self {
            identifier: identifier.into(),
            url,
            final_path,
            temp_path,
            verification,
        }
    }
}

/// Downloads resources into a caller-supplied directory
///
/// The engine is cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    client: Client,
}

impl TransferEngine {
    /// Create an engine on top of a configured HTTP client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch one resource into `destination_dir`
    ///
    /// Never fails: every attempt-level problem is resolved into the returned
    /// record's [`TransferOutcome`].
    pub async fn fetch(
        &self,
        descriptor: &ResourceDescriptor,
        destination_dir: &Path,
        options: &TransferOptions,
    ) -> TransferRecord {
        let final_path = descriptor.local_path(destination_dir);

        // The final name only ever appears through a verified rename.
        if fs::metadata(&final_path).await.is_ok() {
            debug!("File {} exists locally", final_path.display());
            return TransferRecord::already_present(descriptor.identifier());
        }

        let target = TransferTarget::new(
            descriptor.identifier(),
            descriptor.url().clone(),
            final_path,
            Verification::Checksum(*descriptor.checksum()),
        );
        self.transfer(&target, options).await
    }

    /// Retry loop shared by resource and manifest transfers
    pub(crate) async fn transfer(
        &self,
        target: &TransferTarget,
        options: &TransferOptions,
    ) -> TransferRecord {
        retry_attempts(target, options, |number| self.attempt(number, target, options)).await
    }

    async fn attempt(
        &self,
        number: u32,
        target: &TransferTarget,
        options: &TransferOptions,
    ) -> TransferAttempt {
        let started = Instant::now();
        let mut bytes = 0u64;
        let result = self.download(target, options, &mut bytes).await;

        let outcome = match &result {
            Ok(()) => TransferOutcome::Success,
            Err(e) => TransferOutcome::from(e),
        };

        TransferAttempt {
            number,
            outcome,
            elapsed: started.elapsed(),
            bytes,
        }
    }

    async fn download(
        &self,
        target: &TransferTarget,
        options: &TransferOptions,
        bytes: &mut u64,
    ) -> TransferResult<()> {
        let resume_from = if options.resume {
            partial_length(&target.temp_path).await
        } else {
            None
        };

        let mut request = self.client.get(target.url.clone());
        if let Some(offset) = resume_from {
            debug!("Resuming {} from byte {}", target.url, offset);
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let response = within(options.timeout, request.send()).await?;
        let append = match response.status() {
            StatusCode::OK => false,
            StatusCode::PARTIAL_CONTENT => resume_from.is_some(),
            StatusCode::RANGE_NOT_SATISFIABLE if resume_from.is_some() => {
                // Partial data no longer lines up with the remote file.
                remove_if_exists(&target.temp_path).await;
                return Err(TransferError::Status {
                    status: StatusCode::RANGE_NOT_SATISFIABLE.as_u16(),
                });
            }
            status => {
                return Err(TransferError::Status {
                    status: status.as_u16(),
                })
            }
        };

        let mut file = if append {
            OpenOptions::new()
                .append(true)
                .open(&target.temp_path)
                .await?
        } else {
            File::create(&target.temp_path).await?
        };

        let streamed = stream_body(response, &mut file, options.timeout, bytes).await;
        file.flush().await?;
        drop(file);
        streamed?;

        if let Verification::Checksum(expected) = target.verification {
            if let Err(actual) = ChecksumVerifier::verify(&target.temp_path, &expected).await? {
                // Corrupt partial data must not be resumed.
                remove_if_exists(&target.temp_path).await;
                return Err(TransferError::ChecksumMismatch {
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                });
            }
        }

        fs::rename(&target.temp_path, &target.final_path)
            .await
            .map_err(|source| TransferError::AtomicRename {
                temp_path: target.temp_path.clone(),
                final_path: target.final_path.clone(),
                source,
            })
    }
}

/// Run attempts until one succeeds or the retry budget is spent
///
/// Sleeps `backoff_delay(k)` after the `k`-th failure (0-based), but never
/// after the last one.
async fn retry_attempts<F, Fut>(
    target: &TransferTarget,
    options: &TransferOptions,
    mut run_attempt: F,
) -> TransferRecord
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = TransferAttempt>,
{
    let mut number = 0u32;

    loop {
        number += 1;
        let attempt = run_attempt(number).await;

        if attempt.outcome.ok() {
            info!(
                "File {} downloaded, {} bytes in {:?}",
                target.final_path.display(),
                attempt.bytes,
                attempt.elapsed
            );
            return TransferRecord::from_attempt(&target.identifier, attempt);
        }

        debug!(
            "Attempt {}/{} for {} failed: {}",
            number,
            options.max_attempts(),
            target.url,
            attempt.outcome
        );

        if number > options.max_retries {
            warn!(
                "Giving up on {} after {} attempts: {}",
                target.url, number, attempt.outcome
            );
            if !options.resume {
                remove_if_exists(&target.temp_path).await;
            }
            let last = Box::new(attempt.outcome.clone());
            return TransferRecord::from_attempt(
                &target.identifier,
                TransferAttempt {
                    outcome: TransferOutcome::Exhausted {
                        attempts: number,
                        last,
                    },
                    ..attempt
                },
            );
        }

        let delay = options.backoff_delay(number - 1);
        debug!("Retrying {} in {:?}", target.url, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Await `future`, failing with [`TransferError::Stalled`] after `limit`
async fn within<T, E>(limit: Duration, future: impl Future<Output = Result<T, E>>) -> TransferResult<T>
where
    TransferError: From<E>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TransferError::Stalled { after: limit }),
    }
}

async fn stream_body(
    mut response: Response,
    file: &mut File,
    stall_limit: Duration,
    bytes: &mut u64,
) -> TransferResult<()> {
    while let Some(chunk) = within(stall_limit, response.chunk()).await? {
        file.write_all(&chunk).await?;
        *bytes += chunk.len() as u64;
    }
    Ok(())
}

/// Length of a non-empty partial file, if one exists
async fn partial_length(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Remove a file, treating "already gone" as success
pub(crate) async fn remove_if_exists(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not delete {}: {}", path.display(), e);
            false
        }
    }
}
