//! Logging setup: the `log` facade with an `env_logger` backend on stderr.
//!
//! `RUST_LOG` wins when set. Otherwise `--quiet` shows errors only, the
//! default shows warnings, and each `-v` goes one level further.

use std::env;
use std::io::Write;

use env_logger::{Builder, Target};
use log::LevelFilter;

pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    builder.target(Target::Stderr);

    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}: {}",
            record.level().to_string().to_lowercase(),
            record.args()
        )
    });

    // Keep whichever logger was installed first
    let _ = builder.try_init();
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
