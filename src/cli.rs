//! CLI entry point: argument parsing, logging setup and exit codes.

use crate::config::LOG_ENV;
use crate::{Error, executor, interrupt};
use clap::{ArgAction, Parser as ClapParser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI arguments for wake.
#[derive(ClapParser, Debug)]
#[command(name = "wake")]
#[command(version = PKG_VERSION)]
#[command(about = "A minimal make alternative", long_about = None)]
struct Cli {
    /// Label to run (name or short alias), followed by its flags and params
    #[arg(
        value_name = "LABEL",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,

    /// Wakefile to use, or a directory containing one
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// List all labels with their aliases, docs and options
    #[arg(short, long)]
    list: bool,

    /// Print the parsed wakefile as JSON
    #[arg(long)]
    inspect: bool,

    /// Print the substituted command lines without running them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Kill a command line still running after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Log to stderr, filtered by `WAKE_LOG` unless `-v` was given.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    // A subscriber may already be set when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(cli: &Cli) -> Result<(), Error> {
    let file = cli.file.as_deref();
    if cli.list {
        return executor::list_labels(file);
    }
    if cli.inspect {
        return executor::inspect(file);
    }

    let (name, args) = cli.command.split_first().ok_or(Error::MissingLabel)?;
    let options = executor::RunOptions {
        file: cli.file.clone(),
        dry_run: cli.dry_run,
        timeout: cli.timeout.map(Duration::from_secs),
    };
    executor::run_label(name, args, &options)
}

/// Parse arguments, run, and return the process exit code.
#[must_use]
pub fn run_cli() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = interrupt::install() {
        warn!(error = %err, "could not install the Ctrl-C handler");
    }

    match dispatch(&cli) {
        Ok(()) => 0,
        Err(err) => {
            if err.is_rendered() {
                eprintln!("{err}");
            } else {
                eprintln!("error: {err}");
            }
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_label_args_keep_hyphens() {
        let cli = Cli::parse_from(["wake", "build", "--release", "-t", "x86"]);
        assert_eq!(cli.command, vec!["build", "--release", "-t", "x86"]);
    }

    #[test]
    fn test_options_before_label() {
        let cli = Cli::parse_from(["wake", "-f", "ci.wake", "-n", "-vv", "--timeout", "5", "test"]);
        assert_eq!(cli.file, Some(PathBuf::from("ci.wake")));
        assert!(cli.dry_run);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.timeout, Some(5));
        assert_eq!(cli.command, vec!["test"]);
    }
}
