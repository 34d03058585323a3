//! Runs the reconciler over a configured list of series.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::model::SeriesId;
use crate::reconcile::{ReconcileReport, Reconciler, SyncError, SyncPlan};

/// What to do after one series fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run; later series are skipped.
    #[default]
    StopOnFirst,
    /// Record the failure and continue with the next series.
    KeepGoing,
}

/// Result of one series within a run. `T` is the per-series success value:
/// a [`ReconcileReport`] for a sync, a [`SyncPlan`] for a dry run.
#[derive(Debug)]
pub enum SeriesOutcome<T = ReconcileReport> {
    Synced(T),
    Failed { series: SeriesId, error: SyncError },
}

impl<T> SeriesOutcome<T> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}

#[derive(Debug)]
pub struct RunSummary<T = ReconcileReport> {
    /// Series that were attempted, in run order.
    pub outcomes: Vec<SeriesOutcome<T>>,
    /// Series never attempted because an earlier one failed.
    pub skipped: Vec<SeriesId>,
}

impl<T> Default for RunSummary<T> {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> RunSummary<T> {
    pub fn succeeded(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SeriesOutcome::Synced(value) => Some(value),
            SeriesOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&SeriesId, &SyncError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SeriesOutcome::Failed { series, error } => Some((series, error)),
            SeriesOutcome::Synced(_) => None,
        })
    }

    /// True when every configured series succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.outcomes.iter().all(SeriesOutcome::is_success)
    }
}

/// Reconcile each series in order.
///
/// Series are independent: a failure in one never alters another's file.
/// Under [`FailurePolicy::StopOnFirst`] the remaining series are listed in
/// [`RunSummary::skipped`].
#[must_use]
pub fn run(reconciler: &Reconciler, series: &[SeriesId], policy: FailurePolicy) -> RunSummary {
    let summary = run_each(series, policy, |id| reconciler.reconcile(id));
    info!(
        ok = summary.succeeded().count(),
        failed = summary.failed().count(),
        skipped = summary.skipped.len(),
        "run finished"
    );
    summary
}

/// Plan each series in order without writing, under the same failure
/// policy as [`run`].
#[must_use]
pub fn plan(
    reconciler: &Reconciler,
    series: &[SeriesId],
    policy: FailurePolicy,
) -> RunSummary<SyncPlan> {
    run_each(series, policy, |id| reconciler.plan(id))
}

fn run_each<T>(
    series: &[SeriesId],
    policy: FailurePolicy,
    mut step: impl FnMut(&SeriesId) -> Result<T, SyncError>,
) -> RunSummary<T> {
    let mut summary = RunSummary::default();

    for (idx, id) in series.iter().enumerate() {
        match step(id) {
            Ok(value) => summary.outcomes.push(SeriesOutcome::Synced(value)),
            Err(err) => {
                error!(series = %id, code = err.code().code(), error = %err, "series failed");
                summary.outcomes.push(SeriesOutcome::Failed {
                    series: id.clone(),
                    error: err,
                });
                if policy == FailurePolicy::StopOnFirst {
                    summary.skipped = series[idx + 1..].to_vec();
                    if !summary.skipped.is_empty() {
                        warn!(skipped = summary.skipped.len(), "stopping after first failure");
                    }
                    break;
                }
            }
        }
    }
    summary
}
