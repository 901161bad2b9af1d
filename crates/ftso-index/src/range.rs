//! Range completeness checks.
//!
//! A range query over `[start, end]` can only be trusted once the index has
//! moved past `end`. [`RangeWaiter`] polls an [`IndexReader`] until that
//! happens or a grace period runs out.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::reader::IndexReader;
use crate::{IndexError, Result};

/// Default interval between two range checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of a range check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeStatus {
    /// The range is fully indexed.
    Ok,
    /// The range is not (yet) fully indexed.
    NotOk,
    /// The grace period elapsed while the index was still behind. Data read
    /// now may be incomplete and must not be cached.
    TimeoutOk,
}

impl RangeStatus {
    /// Whether results read under this status may be cached.
    pub fn is_final(&self) -> bool {
        matches!(self, RangeStatus::Ok)
    }
}

/// Polling driver over an [`IndexReader`].
#[derive(Clone)]
pub struct RangeWaiter {
    reader: Arc<dyn IndexReader>,
    poll_interval: Duration,
}

impl RangeWaiter {
    /// Create a waiter with the default poll interval.
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        Self::with_poll_interval(reader, DEFAULT_POLL_INTERVAL)
    }

    /// Create a waiter with a custom poll interval.
    pub fn with_poll_interval(reader: Arc<dyn IndexReader>, poll_interval: Duration) -> Self {
        Self {
            reader,
            poll_interval,
        }
    }

    /// The reader being polled.
    pub fn reader(&self) -> &Arc<dyn IndexReader> {
        &self.reader
    }

    /// Single, non-blocking check of `[start, end]`.
    pub async fn check(&self, start: u64, end: u64) -> Result<RangeStatus> {
        let covered = self
            .reader
            .indexed_range()
            .await?
            .is_some_and(|range| range.covers(start, end));
        Ok(if covered {
            RangeStatus::Ok
        } else {
            RangeStatus::NotOk
        })
    }

    /// Check `[start, end]`, polling up to `timeout`.
    ///
    /// Without a timeout this is a single check returning `Ok` or `NotOk`.
    /// With a timeout it polls until the range is covered (`Ok`) or the
    /// timeout elapses (`TimeoutOk`).
    pub async fn ensure_range(
        &self,
        start: u64,
        end: u64,
        timeout: Option<Duration>,
    ) -> Result<RangeStatus> {
        let Some(timeout) = timeout else {
            return self.check(start, end).await;
        };

        let deadline = Instant::now() + timeout;
        loop {
            if self.check(start, end).await? == RangeStatus::Ok {
                return Ok(RangeStatus::Ok);
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(start, end, ?timeout, "index still behind after grace period");
                return Ok(RangeStatus::TimeoutOk);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Fail with [`IndexError::RangeNotIndexed`] unless `[start, end]` is
    /// fully indexed right now.
    pub async fn require_range(&self, start: u64, end: u64) -> Result<()> {
        match self.check(start, end).await? {
            RangeStatus::Ok => Ok(()),
            _ => Err(IndexError::RangeNotIndexed { start, end }),
        }
    }
}
