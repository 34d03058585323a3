//! `drawsync stats`: how often and how recently each number was drawn.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use drawsync_core::SeriesId;
use drawsync_core::config::Overrides;
use drawsync_core::stats::{NumberFrequency, StatsOrder, frequency};
use serde::Serialize;

use super::{load_history, load_settings, parse_series};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Series key, e.g. `lotofacil`.
    pub series: String,

    /// Only count the newest N draws (default: all retained draws).
    #[arg(long)]
    pub last: Option<usize>,

    /// Row order.
    #[arg(long, value_enum, default_value_t = SortKey::Hits)]
    pub sort: SortKey,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    /// Most drawn first.
    Hits,
    /// Longest since last drawn first.
    Delay,
}

impl From<SortKey> for StatsOrder {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Hits => Self::Hits,
            SortKey::Delay => Self::Delay,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub series: SeriesId,
    pub draws: usize,
    pub frequency: Vec<NumberFrequency>,
}

pub fn run_stats(
    args: &StatsArgs,
    out_dir: Option<PathBuf>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let series = parse_series(&args.series, output)?;
    let settings = load_settings(
        project_root,
        Overrides {
            out_dir,
            ..Overrides::default()
        },
        output,
    )?;
    let doc = load_history(&settings, &series, output)?;

    let window = doc.latest(args.last.unwrap_or(doc.items.len()));
    let payload = StatsOutput {
        draws: window.len(),
        frequency: frequency(window, series.meta(), args.sort.into()),
        series,
    };
    render_mode(output, &payload, render_text, render_pretty)
}

fn delay_text(row: &NumberFrequency) -> String {
    row.delay.map_or_else(|| "-".to_string(), |delay| delay.to_string())
}

fn render_text(payload: &StatsOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for row in &payload.frequency {
        writeln!(w, "{:02}\t{}\t{}", row.number, row.hits, delay_text(row))?;
    }
    Ok(())
}

fn render_pretty(payload: &StatsOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(
        w,
        &format!("{}: frequency over {} draws", payload.series.label(), payload.draws),
    )?;
    writeln!(w, "no    hits  delay")?;
    for row in &payload.frequency {
        writeln!(w, "{:02}  {:>6}  {:>5}", row.number, row.hits, delay_text(row))?;
    }
    Ok(())
}
