//! Configuration for clients and transaction runs.

use crate::error::{Error, Result};
use docwire_codec::{DatabaseId, EncodeOptions, Timestamp};
use std::time::Duration;
use tracing::Dispatch;

/// Default number of attempts for a read-write transaction.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Client-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Database every request is addressed to.
    pub database: DatabaseId,
    /// Silently drop undefined values while encoding documents.
    pub ignore_undefined_properties: bool,
    /// Delay policy between transaction attempts.
    pub backoff: BackoffConfig,
    /// Sink for the engine's log events. `None` discards them.
    pub log_dispatch: Option<Dispatch>,
}

impl Settings {
    /// Creates settings for the given database.
    pub fn new(database: DatabaseId) -> Self {
        Self {
            database,
            ignore_undefined_properties: false,
            backoff: BackoffConfig::default(),
            log_dispatch: None,
        }
    }

    /// Sets whether undefined values are dropped instead of rejected.
    pub fn with_ignore_undefined_properties(mut self, ignore: bool) -> Self {
        self.ignore_undefined_properties = ignore;
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Routes the engine's log events to `dispatch`.
    pub fn with_log_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.log_dispatch = Some(dispatch);
        self
    }

    pub(crate) fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            ignore_undefined_properties: self.ignore_undefined_properties,
        }
    }
}

/// Exponential backoff between transaction attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay; also used after `RESOURCE_EXHAUSTED`.
    pub max_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Fraction of the delay randomized around its base value. `1.0` means
    /// anywhere from half to one and a half times the base delay.
    pub jitter: f64,
}

impl BackoffConfig {
    /// Creates a configuration with the given bounds.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 1.5,
            jitter: 1.0,
        }
    }

    /// No delay at all between attempts.
    pub fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Sets the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry` (1-indexed; 0 yields no delay).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self.multiplier.powi(retry.saturating_sub(1) as i32);
        let base = base.min(self.max_delay.as_secs_f64());

        let delay = if self.jitter > 0.0 {
            base + (rand::random::<f64>() - 0.5) * self.jitter * base
        } else {
            base
        };
        Duration::from_secs_f64(delay.clamp(0.0, self.max_delay.as_secs_f64().max(base)))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Options for one transaction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOptions {
    /// Reads and writes, retried on contention.
    ReadWrite {
        /// Total attempts allowed, including the first. At least 1.
        max_attempts: u32,
    },
    /// Reads only; a single attempt, no commit.
    ReadOnly {
        /// Pin every read to this time instead of opening a transaction.
        read_time: Option<Timestamp>,
    },
}

impl TransactionOptions {
    /// Read-write with the default attempt budget.
    pub fn read_write() -> Self {
        TransactionOptions::ReadWrite {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Read-write with an explicit attempt budget.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        TransactionOptions::ReadWrite { max_attempts }
    }

    /// Read-only, backed by a read-only transaction.
    pub fn read_only() -> Self {
        TransactionOptions::ReadOnly { read_time: None }
    }

    /// Read-only at a fixed time.
    pub fn read_only_at(read_time: Timestamp) -> Self {
        TransactionOptions::ReadOnly {
            read_time: Some(read_time),
        }
    }

    /// True for read-only runs.
    pub fn is_read_only(&self) -> bool {
        matches!(self, TransactionOptions::ReadOnly { .. })
    }

    /// Attempts allowed; always 1 for read-only runs.
    pub fn max_attempts(&self) -> u32 {
        match self {
            TransactionOptions::ReadWrite { max_attempts } => *max_attempts,
            TransactionOptions::ReadOnly { .. } => 1,
        }
    }

    /// Rejects option combinations that cannot run.
    pub fn validate(&self) -> Result<()> {
        match self {
            TransactionOptions::ReadWrite { max_attempts } if *max_attempts < 1 => {
                Err(Error::invalid_argument(format!(
                    "max_attempts must be at least 1, got {max_attempts}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self::read_write()
    }
}
