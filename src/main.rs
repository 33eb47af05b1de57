mod config;
mod error;
mod hasher;
mod logging;
mod output;
mod pool;
mod resolver;
mod run;
mod scanner;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use crate::config::{DEFAULT_DB_PATH, DEFAULT_EXTENSIONS, RunConfig};
use crate::hasher::Algorithm;
use crate::output::OutputFormat;

/// Find duplicate model files and replace every later copy with a symlink to
/// the first one found.
///
/// This DELETES files. Run with --dry_run first.
#[derive(Parser, Debug)]
#[command(name = "dupe-linker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Report what would be linked without touching any file
    #[arg(short = 'D', long = "dry_run", alias = "dry-run")]
    dry_run: bool,

    /// Directory to scan for duplicates
    #[arg(short = 'd', long)]
    dir: PathBuf,

    /// Comma-separated file extensions to consider
    #[arg(
        short = 'e',
        long,
        value_delimiter = ',',
        default_values = DEFAULT_EXTENSIONS
    )]
    extensions: Vec<String>,

    /// Number of hashing threads
    #[arg(
        short = 't',
        long,
        env = "DUPE_LINKER_THREADS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    threads: u16,

    /// Path to the hash database
    #[arg(
        short = 'b',
        long = "db_path",
        alias = "db-path",
        env = "DUPE_LINKER_DB",
        default_value = DEFAULT_DB_PATH
    )]
    db_path: PathBuf,

    /// Digest used to compare files
    #[arg(short = 'a', long, value_enum, default_value_t = Algorithm::Sha256)]
    algorithm: Algorithm,

    /// Minimum file size in bytes to consider (empty files are skipped by default)
    #[arg(short = 's', long, default_value_t = 1)]
    min_size: u64,

    /// Glob of file or directory names to skip (repeatable)
    #[arg(short = 'x', long)]
    exclude: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Hide the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// More log output; also lists every duplicate group
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    pub fn shows_progress(&self) -> bool {
        !self.no_progress && self.format == OutputFormat::Human
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let result = RunConfig::from_cli(&cli).and_then(|config| run::run(&config));
    match result {
        Ok(summary) => {
            summary.print(cli.format, cli.verbose > 0);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
