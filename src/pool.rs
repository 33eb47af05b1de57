use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::ProgressBar;
use thiserror::Error;

use crate::error::{HashError, StoreError};
use crate::hasher::{Digest, Fingerprint, Hasher};
use crate::scanner::FileEntry;
use crate::store::{FileRecord, HashStore};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot start hashing workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A file with its final digest for this run
#[derive(Debug, Clone, PartialEq)]
pub struct HashedEntry {
    pub entry: FileEntry,
    pub digest: Digest,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hashed: usize,
    pub cached: usize,
    pub errors: usize,
}

#[derive(Debug, Default)]
pub struct PoolReport {
    /// Successfully hashed files in discovery order
    pub entries: Vec<HashedEntry>,
    pub stats: PoolStats,
}

enum Outcome {
    Hashed(Digest, u64),
    Cached(Digest, u64),
    Failed,
    Fatal(StoreError),
}

/// Hash every file from `files` on `threads` workers.
///
/// Files are handed out through a queue holding at most `threads` pending
/// entries, so a slow disk never lets the walk run far ahead. Each result is
/// written to the store as soon as it is known. A file whose stored size and
/// mtime still match is not read again. Per-file failures are logged and
/// counted; a store failure stops the run.
pub fn hash_all<I>(
    files: I,
    hasher: &dyn Hasher,
    store: &HashStore,
    threads: usize,
    progress: &ProgressBar,
) -> Result<PoolReport, PoolError>
where
    I: IntoIterator<Item = FileEntry>,
{
    let threads = threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("hash-worker-{i}"))
        .build()?;

    let (job_tx, job_rx) = crossbeam_channel::bounded::<FileEntry>(threads);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(FileEntry, Outcome)>();
    let abort = AtomicBool::new(false);

    pool.in_place_scope(|scope| {
        let abort = &abort;
        for _ in 0..threads {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            scope.spawn(move |_| {
                for entry in jobs.iter() {
                    // Keep draining so the feeder never blocks after a fatal error
                    if abort.load(Ordering::Relaxed) {
                        continue;
                    }
                    let outcome = hash_one(&entry, hasher, store);
                    if matches!(outcome, Outcome::Fatal(_)) {
                        abort.store(true, Ordering::Relaxed);
                    }
                    progress.inc(1);
                    if results.send((entry, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);

        for entry in files {
            if abort.load(Ordering::Relaxed) {
                break;
            }
            if job_tx.send(entry).is_err() {
                break;
            }
        }
        drop(job_tx);
    });
    drop(result_tx);

    let mut results: Vec<(FileEntry, Outcome)> = result_rx.iter().collect();
    // Discovery order, not completion order
    results.sort_by_key(|(entry, _)| entry.index);

    let mut report = PoolReport::default();
    for (entry, outcome) in results {
        match outcome {
            Outcome::Hashed(digest, size) => {
                report.stats.hashed += 1;
                report.entries.push(HashedEntry {
                    entry,
                    digest,
                    size,
                });
            }
            Outcome::Cached(digest, size) => {
                report.stats.cached += 1;
                report.entries.push(HashedEntry {
                    entry,
                    digest,
                    size,
                });
            }
            Outcome::Failed => report.stats.errors += 1,
            Outcome::Fatal(e) => return Err(e.into()),
        }
    }

    Ok(report)
}

fn hash_one(entry: &FileEntry, hasher: &dyn Hasher, store: &HashStore) -> Outcome {
    let current = match Fingerprint::of(&entry.path) {
        Ok(fp) => fp,
        Err(e) => return failed(e),
    };

    match store.get(&entry.path) {
        Ok(Some(record))
            if record.is_fresh(&current) && record.digest.algorithm == hasher.algorithm() =>
        {
            log::debug!("unchanged since last run: {}", entry.path.display());
            return Outcome::Cached(record.digest, current.size);
        }
        Ok(_) => {}
        Err(e) => return Outcome::Fatal(e),
    }

    let hashed = match hasher.hash_file(&entry.path) {
        Ok(h) => h,
        Err(e) => return failed(e),
    };

    let record = FileRecord {
        path: entry.path.clone(),
        digest: hashed.digest,
        fingerprint: hashed.fingerprint,
    };
    if let Err(e) = store.upsert(&record) {
        return Outcome::Fatal(e);
    }

    Outcome::Hashed(record.digest, record.fingerprint.size)
}

fn failed(error: HashError) -> Outcome {
    log::warn!("{error}");
    Outcome::Failed
}
