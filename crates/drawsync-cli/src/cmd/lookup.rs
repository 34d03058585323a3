//! `drawsync lookup`: one contest from the local history.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use drawsync_core::config::Overrides;
use drawsync_core::{ContestNumber, Draw, ErrorCode, SeriesId};
use serde::Serialize;

use super::{fail, format_numbers, load_history, load_settings, parse_series};
use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Series key, e.g. `megasena`.
    pub series: String,

    /// Contest number.
    pub contest: ContestNumber,
}

#[derive(Debug, Serialize)]
pub struct LookupOutput {
    pub series: SeriesId,
    #[serde(flatten)]
    pub draw: Draw,
}

pub fn run_lookup(
    args: &LookupArgs,
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

    let Some(draw) = doc.find(args.contest).cloned() else {
        return fail(
            output,
            format!("contest {} of {series} is not in the local history", args.contest),
            ErrorCode::ContestNotFound,
        );
    };

    render_mode(
        output,
        &LookupOutput { series, draw },
        |payload, w| {
            writeln!(
                w,
                "{}\t{}\t{}",
                payload.draw.contest_number,
                payload.draw.draw_date,
                format_numbers(&payload.draw.numbers)
            )
        },
        render_pretty,
    )
}

fn render_pretty(payload: &LookupOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "series", payload.series.label())?;
    pretty_kv(w, "contest", payload.draw.contest_number.to_string())?;
    pretty_kv(w, "date", &payload.draw.draw_date)?;
    pretty_kv(w, "numbers", format_numbers(&payload.draw.numbers))
}
