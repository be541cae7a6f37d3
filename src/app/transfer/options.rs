//! Per-run transfer settings and the retry backoff schedule

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{http, limits};

/// Settings applied to every transfer of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Stall limit: longest wait for the response headers or for the next
    /// body chunk. A slow transfer that keeps making progress never hits it.
    pub timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Ceiling of the exponential backoff
    pub max_backoff: Duration,
    /// Continue partial temporary files with range requests
    pub resume: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            timeout: http::DEFAULT_TIMEOUT,
            max_retries: limits::MAX_RETRIES,
            max_backoff: Duration::from_secs(limits::MAX_BACKOFF_SECS),
            resume: false,
        }
    }
}

impl TransferOptions {
    /// Total attempts a failing resource gets
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep after the `failures`-th failed attempt (0-based): `min(2^k s, max_backoff)`
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exponential = 1u64
            .checked_shl(failures)
            .map(Duration::from_secs)
            .unwrap_or(Duration::MAX);
        exponential.min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule_is_capped() {
        let options = TransferOptions {
            max_backoff: Duration::from_secs(10),
            ..Default::default()
        };

        let delays: Vec<u64> = (0..6).map(|k| options.backoff_delay(k).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_backoff_never_decreases() {
        let options = TransferOptions::default();
        let mut previous = Duration::ZERO;
        for k in 0..80 {
            let delay = options.backoff_delay(k);
            assert!(delay >= previous);
            assert!(delay <= options.max_backoff);
            previous = delay;
        }
    }

    #[test]
    fn test_zero_ceiling_disables_sleep() {
        let options = TransferOptions {
            max_backoff: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(options.backoff_delay(3), Duration::ZERO);
    }

    #[test]
    fn test_max_attempts() {
        let options = TransferOptions {
            max_retries: 2,
            ..Default::default()
        };
        assert_eq!(options.max_attempts(), 3);
    }
}
