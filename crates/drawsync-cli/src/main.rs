#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::resolve_output_mode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "drawsync: incremental lottery results mirror",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (ignored when DRAWSYNC_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding history_<series>.json files.
    #[arg(long, global = true, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Sync",
        about = "Fetch new draws into the local histories",
        long_about = "Compare each series' local cursor with the remote latest draw and fetch \
                      every missing contest in order. A series' file is written once, only \
                      after all of its missing contests were fetched.",
        after_help = "EXAMPLES:\n    # Sync every configured series\n    LOT_TOKEN=... drawsync sync\n\n    # Sync one series, continuing past failures\n    drawsync sync megasena --keep-going\n\n    # Show what would be fetched\n    drawsync sync --dry-run --json"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the local cursor of each series",
        after_help = "EXAMPLES:\n    drawsync status\n    drawsync status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the newest stored draws",
        after_help = "EXAMPLES:\n    drawsync show megasena\n    drawsync show lotofacil --last 3 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Look up one stored contest",
        after_help = "EXAMPLES:\n    drawsync lookup megasena 2750"
    )]
    Lookup(cmd::lookup::LookupArgs),

    #[command(
        next_help_heading = "Read",
        about = "Count how often and how recently each number was drawn",
        after_help = "EXAMPLES:\n    drawsync stats lotofacil\n    drawsync stats megasena --last 100 --sort delay"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    drawsync completions bash > /etc/bash_completion.d/drawsync"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DRAWSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "drawsync=debug,info"
        } else {
            "drawsync=info,warn"
        })
    });

    let format = env::var("DRAWSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = env::current_dir()?;
    let output = resolve_output_mode(cli.json);
    debug!(root = %project_root.display(), ?output, "starting");

    match cli.command {
        Commands::Sync(ref args) => {
            cmd::sync::run_sync(args, cli.out_dir.clone(), output, &project_root)
        }
        Commands::Status(ref args) => {
            cmd::status::run_status(args, cli.out_dir.clone(), output, &project_root)
        }
        Commands::Show(ref args) => {
            cmd::show::run_show(args, cli.out_dir.clone(), output, &project_root)
        }
        Commands::Lookup(ref args) => {
            cmd::lookup::run_lookup(args, cli.out_dir.clone(), output, &project_root)
        }
        Commands::Stats(ref args) => {
            cmd::stats::run_stats(args, cli.out_dir.clone(), output, &project_root)
        }
        Commands::Completions(ref args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_parses_series_and_flags() {
        let cli = Cli::parse_from([
            "drawsync",
            "sync",
            "megasena",
            "lotofacil",
            "--keep-going",
            "--token",
            "abc",
            "--out-dir",
            "site/data",
        ]);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.series, ["megasena", "lotofacil"]);
        assert!(args.keep_going);
        assert!(!args.dry_run);
        assert_eq!(args.token.as_deref(), Some("abc"));
        assert_eq!(cli.out_dir, Some(PathBuf::from("site/data")));
    }

    #[test]
    fn sync_without_series_uses_config() {
        let cli = Cli::parse_from(["drawsync", "sync", "--dry-run"]);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert!(args.series.is_empty());
        assert!(args.dry_run);
    }

    #[test]
    fn show_defaults_to_ten_draws() {
        let cli = Cli::parse_from(["drawsync", "show", "megasena"]);
        let Commands::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.last, 10);
    }

    #[test]
    fn stats_sort_defaults_to_hits() {
        let cli = Cli::parse_from(["drawsync", "stats", "lotofacil"]);
        let Commands::Stats(args) = cli.command else {
            panic!("expected stats");
        };
        assert_eq!(args.sort, cmd::stats::SortKey::Hits);

        let cli = Cli::parse_from(["drawsync", "stats", "lotofacil", "--sort", "delay"]);
        let Commands::Stats(args) = cli.command else {
            panic!("expected stats");
        };
        assert_eq!(args.sort, cmd::stats::SortKey::Delay);
        assert!(Cli::try_parse_from(["drawsync", "stats", "lotofacil", "--sort", "age"]).is_err());
    }

    #[test]
    fn lookup_requires_numeric_contest() {
        assert!(Cli::try_parse_from(["drawsync", "lookup", "megasena", "2750"]).is_ok());
        assert!(Cli::try_parse_from(["drawsync", "lookup", "megasena", "latest"]).is_err());
    }

    #[test]
    fn global_flags_accepted_after_subcommand() {
        let cli = Cli::parse_from(["drawsync", "status", "--json", "-v"]);
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["drawsync", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }
}
