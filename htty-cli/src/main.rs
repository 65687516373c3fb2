//! htty - run a command in a headless terminal
//!
//! Starts the command under the ht controller, performs the requested
//! steps in order, and prints terminal snapshots to stdout.

mod steps;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use colored::Colorize;
use htty_session::{with_session, SessionConfig, DEFAULT_COLS, DEFAULT_ROWS};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

use steps::{Step, StepRunner};

#[derive(Parser, Debug)]
#[command(name = "htty", version)]
#[command(about = "Run a command in a headless terminal, send keys, and print snapshots")]
#[command(after_help = "Examples:
  htty -- echo hello
  htty -k 'hello,Enter' --snapshot -- vim
  htty -r 30 -c 80 --snapshot -k 'ihello,Escape' --snapshot -- vim

Steps (-k, --snapshot, --expect, --expect-absent) may be repeated and run in order.
Without any --snapshot, one snapshot is printed once the command finishes.")]
pub(crate) struct Cli {
    /// Number of terminal rows
    #[arg(short, long, default_value_t = DEFAULT_ROWS)]
    rows: u16,

    /// Number of terminal columns
    #[arg(short, long, default_value_t = DEFAULT_COLS)]
    cols: u16,

    /// Delimiter between keys in a -k argument
    #[arg(short, long, default_value = ",")]
    delimiter: String,

    /// Log filter (e.g. "debug", "htty_session=trace")
    #[arg(long, env = "HTTY_LOG", default_value = "warn")]
    log_level: String,

    /// Path to the ht binary (found automatically if unset)
    #[arg(long = "ht", env = "HTTY_HT_BIN", value_name = "PATH")]
    ht_path: Option<PathBuf>,

    /// Seconds to wait in --expect, --expect-absent and for the command to finish
    #[arg(short, long, default_value = "5", value_parser = parse_seconds)]
    timeout: Duration,

    /// Send keys: key names (Enter, C-c, PAGE_UP) or literal text, split on the delimiter
    #[arg(short, long, value_name = "KEYS", action = ArgAction::Append)]
    keys: Vec<String>,

    /// Print a snapshot of the terminal
    #[arg(
        long,
        value_name = "FORMAT",
        action = ArgAction::Append,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "text",
        value_parser = ["text", "html", "raw"]
    )]
    snapshot: Vec<String>,

    /// Wait until REGEX appears on screen
    #[arg(long, value_name = "REGEX", action = ArgAction::Append)]
    expect: Vec<String>,

    /// Wait until REGEX is no longer on screen
    #[arg(long, value_name = "REGEX", action = ArgAction::Append)]
    expect_absent: Vec<String>,

    /// Command to run, after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration '{}': {}", s, e))
}

fn init_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config =
            SessionConfig::new(self.command.iter().cloned()).with_size(self.rows, self.cols);
        if let Some(path) = &self.ht_path {
            config = config.with_ht_path(path);
        }
        config.timing.expect_timeout = self.timeout;
        config
    }
}

async fn run(cli: Cli, steps: Vec<Step>) -> anyhow::Result<()> {
    let config = cli.session_config();
    info!("Running {:?} in a {}x{} terminal", cli.command, cli.cols, cli.rows);

    let runner = StepRunner {
        delimiter: cli.delimiter,
        expect_timeout: cli.timeout,
    };
    with_session(config, move |session| {
        Box::pin(async move { runner.run(session, &steps).await })
    })
    .await
    .with_context(|| format!("htty failed running {}", cli.command.join(" ")))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    init_tracing(&cli.log_level);
    let steps = steps::ordered(&matches);

    match run(cli, steps).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
