//! `faculty` command-line entry point.
//!
//! Exit codes: 0 success, 1 constrained (budget stopped some work),
//! 2 error (unreadable context, bad config, storage failure).

mod archive_cmd;
mod consult_cmd;
mod queue_cmd;

use clap::{ArgAction, Parser, Subcommand};
use faculty_engine::FacultyConfig;
use std::path::PathBuf;
use std::process::ExitCode;

const EXIT_ERROR: u8 = 2;

/// Budgeted repository consultations: audits, forecasts and deferred visions
#[derive(Debug, Parser)]
#[command(name = "faculty", version)]
struct Cli {
    /// Config file (default: $FACULTY_CONFIG, then ~/.config/faculty/faculty.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level (-vv for trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the advisor and/or oracle over a repository context
    Consult(consult_cmd::ConsultArgs),
    /// Drain queued visions into the archive
    Ritual(consult_cmd::RitualArgs),
    /// Inspect or feed the vision queue
    Queue(queue_cmd::QueueCli),
    /// Search and classify archived visions
    Archive(archive_cmd::ArchiveCli),
    /// Print the fingerprint of a repository context
    Fingerprint(consult_cmd::FingerprintArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    // Fingerprinting needs no configuration or stores
    if let Command::Fingerprint(args) = &cli.command {
        return consult_cmd::run_fingerprint(args);
    }

    let config = FacultyConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Consult(args) => consult_cmd::run_consult(args, config),
        Command::Ritual(args) => consult_cmd::run_ritual(args, config),
        Command::Queue(queue) => queue.run(config),
        Command::Archive(archive) => archive.run(config),
        Command::Fingerprint(args) => consult_cmd::run_fingerprint(&args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
