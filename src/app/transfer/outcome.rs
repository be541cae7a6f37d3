//! Transfer outcomes and per-resource result records

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::errors::TransferError;

/// Result of transferring one resource
///
/// The four failure variants describe a single attempt. Once the retry budget
/// is spent the engine wraps the last of them in [`TransferOutcome::Exhausted`],
/// which is always final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransferOutcome {
    /// Final file was already in the mirror; nothing was fetched
    AlreadyPresent,
    /// File was downloaded, verified and moved into place
    Success,
    /// Downloaded content did not match the expected checksum
    ChecksumMismatch,
    /// Server answered with a non-streamable status
    HttpError(u16),
    /// Transport-level failure
    NetworkError(String),
    /// Any other failure (local I/O, rename, panicked task)
    UnknownError(String),
    /// Retry budget spent; `last` is the final attempt's failure
    Exhausted {
        attempts: u32,
        last: Box<TransferOutcome>,
    },
}

impl TransferOutcome {
    /// True only for outcomes that leave a verified file in the mirror
    pub fn ok(&self) -> bool {
        matches!(self, Self::AlreadyPresent | Self::Success)
    }

    /// True when this run actually downloaded the file
    pub fn was_downloaded(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// True when the file was present before the run
    pub fn was_present(&self) -> bool {
        matches!(self, Self::AlreadyPresent)
    }

    /// The failure this outcome ultimately stands for
    ///
    /// `Exhausted` resolves to its last attempt; non-failures return `None`.
    pub fn failure(&self) -> Option<&TransferOutcome> {
        match self {
            Self::AlreadyPresent | Self::Success => None,
            Self::Exhausted { last, .. } => last.failure(),
            other => Some(other),
        }
    }

    /// Label used to group failures in reports, without per-error detail
    pub fn failure_kind(&self) -> Option<String> {
        self.failure().map(|failure| match failure {
            Self::ChecksumMismatch => "Bad checksum".to_string(),
            Self::HttpError(code) => format!("HTTP Error {}", code),
            Self::NetworkError(_) => "Network error".to_string(),
            _ => "Unknown error".to_string(),
        })
    }
}

impl From<&TransferError> for TransferOutcome {
    fn from(error: &TransferError) -> Self {
        match error {
            TransferError::Network(e) => Self::NetworkError(e.to_string()),
            TransferError::Stalled { .. } => Self::NetworkError(error.to_string()),
            TransferError::Status { status } => Self::HttpError(*status),
            TransferError::ChecksumMismatch { .. } => Self::ChecksumMismatch,
            other => Self::UnknownError(other.to_string()),
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPresent => write!(f, "File present"),
            Self::Success => write!(f, "OK"),
            Self::ChecksumMismatch => write!(f, "Bad checksum"),
            Self::HttpError(code) => write!(f, "HTTP Error {}", code),
            Self::NetworkError(cause) => write!(f, "Network error: {}", cause),
            Self::UnknownError(cause) => write!(f, "Unknown error: {}", cause),
            Self::Exhausted { attempts, last } => {
                write!(f, "Gave up after {} attempts: {}", attempts, last)
            }
        }
    }
}

/// One attempt of a transfer, kept only until the next attempt starts
#[derive(Debug, Clone)]
pub struct TransferAttempt {
    /// 1-based attempt number
    pub number: u32,
    /// How the attempt ended
    pub outcome: TransferOutcome,
    /// Wall time of the attempt
    pub elapsed: Duration,
    /// Body bytes received during the attempt
    pub bytes: u64,
}

/// Final, self-contained record of one resource's transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    /// Resource identifier
    pub identifier: String,
    /// Terminal outcome
    pub outcome: TransferOutcome,
    /// Number of attempts made (0 when the file was already present)
    pub attempts: u32,
    /// Body bytes received by the final attempt
    pub bytes_transferred: u64,
    /// Wall time of the final attempt
    pub elapsed: Duration,
}

impl TransferRecord {
    /// Record for a file that needed no transfer
    pub fn already_present(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: TransferOutcome::AlreadyPresent,
            attempts: 0,
            bytes_transferred: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Build the terminal record from the final attempt
    pub fn from_attempt(identifier: impl Into<String>, attempt: TransferAttempt) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: attempt.outcome,
            attempts: attempt.number,
            bytes_transferred: attempt.bytes,
            elapsed: attempt.elapsed,
        }
    }

    /// Record for a transfer task that died without producing a result
    pub fn aborted(identifier: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: TransferOutcome::UnknownError(cause.into()),
            attempts: 0,
            bytes_transferred: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Throughput of the final attempt in bytes per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_transferred as f64 / secs
        } else {
            0.0
        }
    }
}
