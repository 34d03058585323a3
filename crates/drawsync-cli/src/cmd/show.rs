//! `drawsync show`: newest draws from the local history.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use drawsync_core::config::Overrides;
use drawsync_core::{ContestNumber, Draw, SeriesId};
use serde::Serialize;

use super::{format_numbers, load_history, load_settings, parse_series};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Series key, e.g. `megasena`.
    pub series: String,

    /// Number of newest draws to show.
    #[arg(long, default_value_t = 10)]
    pub last: usize,
}

#[derive(Debug, Serialize)]
pub struct ShowOutput {
    pub series: SeriesId,
    pub last_contest: ContestNumber,
    /// Newest first.
    pub draws: Vec<Draw>,
}

pub fn run_show(
    args: &ShowArgs,
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

    let payload = ShowOutput {
        last_contest: doc.last_contest,
        draws: doc.latest(args.last).iter().rev().cloned().collect(),
        series,
    };
    render_mode(output, &payload, render_text, render_pretty)
}

fn render_text(payload: &ShowOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for draw in &payload.draws {
        writeln!(
            w,
            "{}\t{}\t{}",
            draw.contest_number,
            draw.draw_date,
            format_numbers(&draw.numbers)
        )?;
    }
    Ok(())
}

fn render_pretty(payload: &ShowOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(
        w,
        &format!("{} (last contest {})", payload.series.label(), payload.last_contest),
    )?;
    if payload.draws.is_empty() {
        return writeln!(w, "no draws stored yet; run `drawsync sync {}`", payload.series);
    }
    for draw in &payload.draws {
        writeln!(
            w,
            "#{:<6} {:<10}  {}",
            draw.contest_number,
            draw.draw_date,
            format_numbers(&draw.numbers)
        )?;
    }
    Ok(())
}
