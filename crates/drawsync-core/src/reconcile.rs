//! Incremental reconciliation of one series against the remote source.
//!
//! # Algorithm
//!
//! 1. Lock and load the local document.
//! 2. Fetch the remote latest record; compare its contest number
//!    (`api_last`) with the local cursor (`local_last`).
//! 3. `api_last <= local_last`: bump `updated_at`, save, done.
//! 4. Otherwise fetch every contest in `local_last + 1 ..= api_last` in
//!    ascending order, one request each, appending to the in-memory
//!    document. Any failure aborts before anything is written.
//! 5. Advance the cursor, bump `updated_at`, apply the retention cap, save
//!    once.
//!
//! Because the cursor only moves in the single final save, a failed or
//! interrupted run leaves the file as it was, and the next run redoes the
//! same missing range.

use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ErrorCode;
use crate::fetch::{FetchError, Fetcher, RemoteApi, RemoteRequest};
use crate::model::{ContestNumber, Draw, HistoryDocument, MAX_KEEP, SeriesId};
use crate::normalize::{NormalizationError, normalize};
use crate::store::{DEFAULT_LOCK_TIMEOUT, HistoryStore, PersistenceError};

/// Failure of one series' reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("normalizing {request}: {source}")]
    Normalize {
        request: String,
        #[source]
        source: NormalizationError,
    },

    #[error(transparent)]
    Persist(#[from] PersistenceError),
}

impl SyncError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Fetch(err) => err.code(),
            Self::Normalize { source, .. } => source.code(),
            Self::Persist(err) => err.code(),
        }
    }
}

/// Source of "now" for `updated_at`.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `updated_at` text: RFC 3339 UTC with microseconds and a `Z` suffix.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// What a successful reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Remote had nothing newer; only `updated_at` moved.
    UpToDate {
        local_last: ContestNumber,
        api_last: ContestNumber,
    },
    /// Missing contests were fetched and merged.
    Backfilled {
        from: ContestNumber,
        to: ContestNumber,
        appended: usize,
        /// Oldest items removed by the retention cap.
        dropped: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub series: SeriesId,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
    pub last_contest: ContestNumber,
    pub items: usize,
}

/// Read-only comparison of local cursor and remote latest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub series: SeriesId,
    pub local_last: ContestNumber,
    pub api_last: ContestNumber,
}

impl SyncPlan {
    /// Contests a reconciliation would fetch, if any.
    #[must_use]
    pub fn pending(&self) -> Option<RangeInclusive<ContestNumber>> {
        (self.api_last > self.local_last).then(|| (self.local_last + 1)..=self.api_last)
    }

    #[must_use]
    pub fn pending_count(&self) -> u64 {
        self.api_last.saturating_sub(self.local_last)
    }
}

/// Brings local histories up to date; one instance serves every series.
pub struct Reconciler {
    api: RemoteApi,
    fetcher: Fetcher,
    store: HistoryStore,
    clock: Box<dyn Clock>,
    max_keep: usize,
    lock_timeout: Duration,
}

impl Reconciler {
    #[must_use]
    pub fn new(api: RemoteApi, fetcher: Fetcher, store: HistoryStore) -> Self {
        Self {
            api,
            fetcher,
            store,
            clock: Box::new(SystemClock),
            max_keep: MAX_KEEP,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retention cap; values below 1 behave as 1.
    #[must_use]
    pub fn with_max_keep(mut self, max_keep: usize) -> Self {
        self.max_keep = max_keep.max(1);
        self
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Compare the local cursor with the remote latest without writing.
    ///
    /// # Errors
    ///
    /// Propagates load, fetch, and normalization failures.
    pub fn plan(&self, series: &SeriesId) -> Result<SyncPlan, SyncError> {
        let doc = self.store.load(series)?;
        let latest = self.fetch_draw(&self.api.latest(series))?;
        Ok(SyncPlan {
            series: series.clone(),
            local_last: doc.last_contest,
            api_last: latest.contest_number,
        })
    }

    /// Reconcile one series; see the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the lock, load, any fetch, any
    /// normalization, or the final save fails. On error nothing from this
    /// run has been persisted, and a lock file or out dir created by this
    /// run is removed again.
    pub fn reconcile(&self, series: &SeriesId) -> Result<ReconcileReport, SyncError> {
        let lock = self.store.lock(series, self.lock_timeout)?;
        let result = self.reconcile_locked(series);
        if result.is_err() {
            lock.discard();
        }
        result
    }

    fn reconcile_locked(&self, series: &SeriesId) -> Result<ReconcileReport, SyncError> {
        let mut doc = self.store.load(series)?;

        let local_last = doc.last_contest;
        let api_last = self.fetch_draw(&self.api.latest(series))?.contest_number;

        if api_last <= local_last {
            doc.updated_at = format_timestamp(self.clock.now());
            self.store.save(&doc)?;
            info!(series = %series, local_last, api_last, "up to date");
            return Ok(report(
                &doc,
                ReconcileOutcome::UpToDate {
                    local_last,
                    api_last,
                },
            ));
        }

        let from = local_last + 1;
        info!(series = %series, from, to = api_last, "backfilling");

        let mut appended = 0;
        for contest in from..=api_last {
            let draw = self.fetch_draw(&self.api.contest(series, contest))?;
            debug!(series = %series, contest, fetched = draw.contest_number, "merged draw");
            doc.items.push(draw);
            appended += 1;
        }

        doc.last_contest = api_last;
        doc.updated_at = format_timestamp(self.clock.now());
        let dropped = doc.apply_retention(self.max_keep);
        self.store.save(&doc)?;

        info!(
            series = %series,
            last_contest = api_last,
            appended,
            dropped,
            "backfill complete"
        );
        Ok(report(
            &doc,
            ReconcileOutcome::Backfilled {
                from,
                to: api_last,
                appended,
                dropped,
            },
        ))
    }

    fn fetch_draw(&self, request: &RemoteRequest) -> Result<Draw, SyncError> {
        let payload = self.fetcher.fetch_json(request)?;
        normalize(&payload).map_err(|source| SyncError::Normalize {
            request: request.to_string(),
            source,
        })
    }
}

fn report(doc: &HistoryDocument, outcome: ReconcileOutcome) -> ReconcileReport {
    ReconcileReport {
        series: doc.key.clone(),
        outcome,
        last_contest: doc.last_contest,
        items: doc.items.len(),
    }
}
