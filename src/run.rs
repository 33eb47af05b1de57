use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::RunConfig;
use crate::hasher::{Hasher, StreamingHasher};
use crate::output::RunSummary;
use crate::pool;
use crate::resolver;
use crate::scanner::Scanner;
use crate::store::HashStore;

/// Open the store, run one full scan and release the store again.
pub fn run(config: &RunConfig) -> anyhow::Result<RunSummary> {
    let store = HashStore::open(&config.db_path)
        .with_context(|| format!("cannot open hash store {}", config.db_path.display()))?;
    let hasher = StreamingHasher::new(config.algorithm);

    run_with(config, &hasher, &store)
}

/// Scan, hash, group and link with an already opened store.
pub fn run_with(
    config: &RunConfig,
    hasher: &dyn Hasher,
    store: &HashStore,
) -> anyhow::Result<RunSummary> {
    log::info!(
        "scanning {} for {}",
        config.root.display(),
        config.extensions.join(", ")
    );

    let progress = progress_bar(config.show_progress);
    let mut scanner = Scanner::new(config);
    let hashed = pool::hash_all(
        scanner.by_ref(),
        hasher,
        store,
        config.threads,
        &progress,
    )
    .context("hashing failed")?;
    progress.finish_and_clear();

    let scan_stats = scanner.stats();
    log::info!(
        "{} files matched ({} filtered out), {} hashed, {} unchanged",
        scan_stats.scanned,
        scan_stats.filtered,
        hashed.stats.hashed,
        hashed.stats.cached
    );
    log::debug!("hash store holds {} records", store.len()?);

    let groups = resolver::build_groups(store, &hashed.entries)
        .context("cannot group files by hash")?;
    let resolution = resolver::resolve(&groups, config.dry_run);

    Ok(RunSummary::new(
        config.dry_run,
        scan_stats,
        hashed.stats,
        &groups,
        &resolution,
    ))
}

fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    let template = "{spinner:.green} hashed {pos} files [{elapsed}]";
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
