//! Hourly download quota
//!
//! The provider allows a fixed number of product downloads per trailing
//! hour. [`DownloadLedger`] persists accepted batches, [`BatchQuota`] is the
//! check injected into the download orchestrator, and the selection helpers
//! size a batch against what is left.

pub mod ledger;
pub mod selection;
pub mod settings;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

pub use ledger::{DownloadLedger, RateLedgerEntry};
pub use selection::{select_all, select_interval, select_named};
pub use settings::{DownloadDirStore, SearchLimitStore};

use crate::errors::{QuotaError, QuotaResult};

/// Consumption against the hourly cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub consumed: usize,
    pub cap: usize,
    /// `cap - consumed`, never negative
    pub remaining: usize,
}

impl QuotaStatus {
    pub fn new(consumed: usize, cap: usize) -> Self {
        Self {
            consumed,
            cap,
            remaining: cap.saturating_sub(consumed),
        }
    }
}

/// Admission check for a download batch
#[async_trait]
pub trait BatchQuota: Send + Sync {
    /// Admit and record a batch of `requested` downloads
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Exceeded` when the batch does not fit, in which
    /// case nothing is recorded.
    async fn reserve(&self, requested: usize) -> QuotaResult<QuotaStatus>;
}

/// Ledger-backed quota with a fixed hourly cap
#[derive(Debug, Clone)]
pub struct HourlyQuota {
    ledger: Arc<DownloadLedger>,
    cap: usize,
}

impl HourlyQuota {
    pub fn new(ledger: DownloadLedger, cap: usize) -> Self {
        Self {
            ledger: Arc::new(ledger),
            cap,
        }
    }

    /// Current consumption without reserving anything
    pub async fn status(&self) -> QuotaResult<QuotaStatus> {
        let ledger = Arc::clone(&self.ledger);
        let consumed = tokio::task::spawn_blocking(move || ledger.consumed_in_last_hour())
            .await
            .map_err(|e| QuotaError::TaskFailed {
                reason: e.to_string(),
            })??;
        Ok(QuotaStatus::new(consumed, self.cap))
    }
}

#[async_trait]
impl BatchQuota for HourlyQuota {
    async fn reserve(&self, requested: usize) -> QuotaResult<QuotaStatus> {
        let ledger = Arc::clone(&self.ledger);
        let cap = self.cap;
        tokio::task::spawn_blocking(move || ledger.reserve_at(Utc::now(), requested, cap))
            .await
            .map_err(|e| QuotaError::TaskFailed {
                reason: e.to_string(),
            })?
    }
}
