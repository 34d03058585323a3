//! `drawsync status`: local cursor per tracked series, no network.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use drawsync_core::config::Overrides;
use drawsync_core::{ContestNumber, SeriesId};
use serde::Serialize;

use super::{load_history, load_settings};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
pub struct SeriesStatus {
    pub series: SeriesId,
    pub label: String,
    pub path: PathBuf,
    /// False until the first successful sync writes the file.
    pub exists: bool,
    pub last_contest: ContestNumber,
    pub items: usize,
    pub updated_at: Option<String>,
}

pub fn run_status(
    _args: &StatusArgs,
    out_dir: Option<PathBuf>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let settings = load_settings(
        project_root,
        Overrides {
            out_dir,
            ..Overrides::default()
        },
        output,
    )?;
    let store = settings.store();

    let mut rows = Vec::with_capacity(settings.series.len());
    for id in &settings.series {
        let doc = load_history(&settings, id, output)?;
        let path = store.path_for(id);
        rows.push(SeriesStatus {
            label: id.label().to_string(),
            exists: path.exists(),
            path,
            last_contest: doc.last_contest,
            items: doc.items.len(),
            updated_at: (!doc.updated_at.is_empty()).then_some(doc.updated_at),
            series: id.clone(),
        });
    }

    render_mode(output, &rows, |rows, w| render_text(rows, w), |rows, w| render_pretty(rows, w))
}

fn render_text(rows: &[SeriesStatus], w: &mut dyn Write) -> std::io::Result<()> {
    for row in rows {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            row.series,
            row.last_contest,
            row.items,
            row.updated_at.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn render_pretty(rows: &[SeriesStatus], w: &mut dyn Write) -> std::io::Result<()> {
    for (idx, row) in rows.iter().enumerate() {
        if idx > 0 {
            writeln!(w)?;
        }
        pretty_section(w, &row.label)?;
        if !row.exists {
            pretty_kv(w, "file", format!("{} (not synced yet)", row.path.display()))?;
            continue;
        }
        pretty_kv(w, "file", row.path.display().to_string())?;
        pretty_kv(w, "last contest", row.last_contest.to_string())?;
        pretty_kv(w, "items", row.items.to_string())?;
        pretty_kv(w, "updated", row.updated_at.as_deref().unwrap_or("-"))?;
    }
    Ok(())
}
