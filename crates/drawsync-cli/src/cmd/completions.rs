use std::io::Write;

use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `drawsync completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be flushed.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let mut out = std::io::stdout().lock();
    generate(shell, command, "drawsync", &mut out);
    out.flush()?;
    Ok(())
}
