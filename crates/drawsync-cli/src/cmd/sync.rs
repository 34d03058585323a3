//! `drawsync sync`: bring local histories up to date with the remote API.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use drawsync_core::config::{Overrides, resolve_credential};
use drawsync_core::driver::{self, FailurePolicy, RunSummary, SeriesOutcome};
use drawsync_core::reconcile::{ReconcileOutcome, SyncPlan};
use drawsync_core::{ContestNumber, SeriesId};
use serde::Serialize;

use super::{fail_config, load_settings};
use crate::output::{OutputMode, pretty_section, render, render_mode};

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Series to sync (default: the configured series).
    pub series: Vec<String>,

    /// Remote API base URL.
    #[arg(long)]
    pub base_url: Option<String>,

    /// API token (default: $LOT_TOKEN).
    #[arg(long)]
    pub token: Option<String>,

    /// Attempt every series even after one fails.
    #[arg(long)]
    pub keep_going: bool,

    /// Compare local and remote cursors only; fetch no backfill, write nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// One line of the sync report.
#[derive(Debug, Serialize)]
pub struct SeriesEntry {
    pub series: SeriesId,
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_contest: Option<ContestNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

/// One line of the dry-run report.
#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub series: SeriesId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_last: Option<ContestNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_last: Option<ContestNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct SyncReport<E = SeriesEntry> {
    pub out_dir: PathBuf,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
    pub series: Vec<E>,
}

impl<E> SyncReport<E> {
    const fn total(&self) -> usize {
        self.ok + self.failed + self.skipped
    }
}

impl SyncReport<PlanEntry> {
    fn from_plans(out_dir: PathBuf, summary: &RunSummary<SyncPlan>) -> Self {
        let mut series: Vec<PlanEntry> = summary
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                SeriesOutcome::Synced(plan) => PlanEntry {
                    series: plan.series.clone(),
                    status: "planned",
                    local_last: Some(plan.local_last),
                    api_last: Some(plan.api_last),
                    pending: Some(plan.pending_count()),
                    error: None,
                    error_code: None,
                },
                SeriesOutcome::Failed { series, error } => PlanEntry {
                    series: series.clone(),
                    status: "failed",
                    local_last: None,
                    api_last: None,
                    pending: None,
                    error: Some(error.to_string()),
                    error_code: Some(error.code().code()),
                },
            })
            .collect();
        series.extend(summary.skipped.iter().map(|id| PlanEntry {
            series: id.clone(),
            status: "skipped",
            local_last: None,
            api_last: None,
            pending: None,
            error: None,
            error_code: None,
        }));

        Self {
            out_dir,
            ok: summary.succeeded().count(),
            failed: summary.failed().count(),
            skipped: summary.skipped.len(),
            series,
        }
    }
}

impl SyncReport {
    fn from_summary(out_dir: PathBuf, summary: &RunSummary) -> Self {
        let mut series: Vec<SeriesEntry> = summary
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                SeriesOutcome::Synced(report) => SeriesEntry {
                    series: report.series.clone(),
                    status: "synced",
                    outcome: Some(report.outcome.clone()),
                    last_contest: Some(report.last_contest),
                    items: Some(report.items),
                    error: None,
                    error_code: None,
                },
                SeriesOutcome::Failed { series, error } => SeriesEntry {
                    series: series.clone(),
                    status: "failed",
                    outcome: None,
                    last_contest: None,
                    items: None,
                    error: Some(error.to_string()),
                    error_code: Some(error.code().code()),
                },
            })
            .collect();
        series.extend(summary.skipped.iter().map(|id| SeriesEntry {
            series: id.clone(),
            status: "skipped",
            outcome: None,
            last_contest: None,
            items: None,
            error: None,
            error_code: None,
        }));

        Self {
            out_dir,
            ok: summary.succeeded().count(),
            failed: summary.failed().count(),
            skipped: summary.skipped.len(),
            series,
        }
    }
}

/// Execute `drawsync sync`.
pub fn run_sync(
    args: &SyncArgs,
    out_dir: Option<PathBuf>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    // Checked before any config or network I/O.
    let credential = match resolve_credential(args.token.as_deref()) {
        Ok(credential) => credential,
        Err(err) => return fail_config(output, &err),
    };

    let settings = load_settings(
        project_root,
        Overrides {
            base_url: args.base_url.clone(),
            out_dir,
            series: args.series.clone(),
            keep_going: args.keep_going,
        },
        output,
    )?;
    let reconciler = settings.reconciler(credential);
    let policy = if settings.keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::StopOnFirst
    };

    if args.dry_run {
        let summary = driver::plan(&reconciler, &settings.series, policy);
        let report = SyncReport::<PlanEntry>::from_plans(settings.out_dir.clone(), &summary);
        render(output, &report, render_plans)?;
        if !summary.is_success() {
            anyhow::bail!("{} of {} series failed to plan", report.failed, report.total());
        }
        return Ok(());
    }

    let summary = driver::run(&reconciler, &settings.series, policy);
    let report = SyncReport::from_summary(settings.out_dir.clone(), &summary);

    render_mode(output, &report, render_text, render_pretty)?;

    if !summary.is_success() {
        anyhow::bail!("{} of {} series failed", report.failed, report.total());
    }
    Ok(())
}

fn describe(entry: &SeriesEntry) -> String {
    match (&entry.outcome, &entry.error) {
        (Some(ReconcileOutcome::UpToDate { local_last, .. }), _) => {
            format!("up to date at {local_last}")
        }
        (
            Some(ReconcileOutcome::Backfilled {
                from,
                to,
                appended,
                dropped,
            }),
            _,
        ) => {
            let mut text = format!("fetched {from}..={to} ({appended} new)");
            if *dropped > 0 {
                text.push_str(&format!(", dropped {dropped} old"));
            }
            text
        }
        (None, Some(error)) => error.clone(),
        (None, None) => "not attempted".to_string(),
    }
}

fn render_text(report: &SyncReport, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in &report.series {
        writeln!(w, "{}\t{}\t{}", entry.series, entry.status, describe(entry))?;
    }
    Ok(())
}

fn render_pretty(report: &SyncReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Sync into {}", report.out_dir.display()))?;
    for entry in &report.series {
        let mark = match entry.status {
            "synced" => "✓",
            "failed" => "✗",
            _ => "-",
        };
        writeln!(w, "{mark} {:<12} {}", entry.series.label(), describe(entry))?;
    }
    writeln!(
        w,
        "\n{} synced, {} failed, {} skipped",
        report.ok, report.failed, report.skipped
    )
}

fn render_plans(report: &SyncReport<PlanEntry>, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in &report.series {
        match (entry.local_last, entry.api_last, entry.pending) {
            (Some(local), Some(remote), Some(pending)) if pending > 0 => writeln!(
                w,
                "{}\tlocal {local}\tremote {remote}\twould fetch {}..={remote} ({pending})",
                entry.series,
                local + 1,
            )?,
            (Some(local), Some(remote), _) => writeln!(
                w,
                "{}\tlocal {local}\tremote {remote}\tup to date",
                entry.series
            )?,
            _ => writeln!(
                w,
                "{}\t{}\t{}",
                entry.series,
                entry.status,
                entry.error.as_deref().unwrap_or("not attempted")
            )?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: Option<ReconcileOutcome>, error: Option<&str>) -> SeriesEntry {
        SeriesEntry {
            series: SeriesId::new("megasena").expect("valid id"),
            status: "synced",
            outcome,
            last_contest: None,
            items: None,
            error: error.map(str::to_string),
            error_code: None,
        }
    }

    #[test]
    fn describe_outcomes() {
        let up = entry(
            Some(ReconcileOutcome::UpToDate {
                local_last: 9,
                api_last: 9,
            }),
            None,
        );
        assert_eq!(describe(&up), "up to date at 9");

        let filled = entry(
            Some(ReconcileOutcome::Backfilled {
                from: 3,
                to: 5,
                appended: 3,
                dropped: 1,
            }),
            None,
        );
        assert_eq!(describe(&filled), "fetched 3..=5 (3 new), dropped 1 old");

        assert_eq!(describe(&entry(None, Some("boom"))), "boom");
        assert_eq!(describe(&entry(None, None)), "not attempted");
    }

    #[test]
    fn plans_render_pending_ranges_and_failures() {
        let series = SeriesId::new("lotofacil").expect("valid id");
        let mut summary = RunSummary::<SyncPlan>::default();
        summary.outcomes.push(SeriesOutcome::Synced(SyncPlan {
            series: series.clone(),
            local_last: 3,
            api_last: 5,
        }));
        summary.outcomes.push(SeriesOutcome::Synced(SyncPlan {
            series,
            local_last: 5,
            api_last: 5,
        }));
        summary
            .skipped
            .push(SeriesId::new("quina").expect("valid id"));
        let report = SyncReport::<PlanEntry>::from_plans(PathBuf::from("data"), &summary);
        assert_eq!((report.ok, report.failed, report.skipped), (2, 0, 1));

        let mut buf = Vec::new();
        render_plans(&report, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("would fetch 4..=5 (2)"));
        assert!(text.contains("remote 5\tup to date"));
        assert!(text.contains("quina\tskipped\tnot attempted"));
    }
}
