pub mod completions;
pub mod lookup;
pub mod show;
pub mod stats;
pub mod status;
pub mod sync;

use std::path::Path;

use drawsync_core::config::{ConfigError, EnvOverrides, Overrides, Settings, load_config};
use drawsync_core::{ErrorCode, HistoryDocument, SeriesId};
use tracing::debug;

use crate::output::{CliError, OutputMode, render_error};

/// Render `message` as a coded error and fail the command.
pub fn fail<T>(output: OutputMode, message: impl Into<String>, code: ErrorCode) -> anyhow::Result<T> {
    let message = message.into();
    render_error(output, &CliError::coded(&message, code))?;
    anyhow::bail!("{message}")
}

pub fn fail_config<T>(output: OutputMode, err: &ConfigError) -> anyhow::Result<T> {
    fail(output, err.to_string(), err.code())
}

/// Layer command-line values over the environment and config file.
pub fn load_settings(
    project_root: &Path,
    overrides: Overrides,
    output: OutputMode,
) -> anyhow::Result<Settings> {
    let loaded = match load_config(project_root) {
        Ok(loaded) => loaded,
        Err(err) => return fail_config(output, &err),
    };
    if let Some(source) = &loaded.source {
        debug!(path = %source.display(), "loaded config");
    }

    match Settings::resolve(loaded.config, EnvOverrides::from_env(), overrides) {
        Ok(settings) => Ok(settings),
        Err(err) => fail_config(output, &err),
    }
}

pub fn parse_series(raw: &str, output: OutputMode) -> anyhow::Result<SeriesId> {
    SeriesId::new(raw).or_else(|err| fail(output, err.to_string(), err.code()))
}

/// Load one series' local history for the read-side commands.
pub fn load_history(
    settings: &Settings,
    series: &SeriesId,
    output: OutputMode,
) -> anyhow::Result<HistoryDocument> {
    settings
        .store()
        .load(series)
        .or_else(|err| fail(output, err.to_string(), err.code()))
}

/// Space-separated two-digit rendering used by lottery tickets.
pub fn format_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| format!("{n:02}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::format_numbers;

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_numbers(&[4, 8, 15, 16, 23, 42]), "04 08 15 16 23 42");
        assert_eq!(format_numbers(&[]), "");
    }
}
