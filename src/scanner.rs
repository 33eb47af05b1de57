use std::fs;
use std::path::PathBuf;

use jwalk::{DirEntry, WalkDir};

use crate::config::RunConfig;
use crate::error::ScanError;

type WalkItem = Result<DirEntry<((), ())>, jwalk::Error>;

/// A candidate file found during scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Position in walk order, starting at 0. Decides which copy is kept.
    pub index: usize,
    pub path: PathBuf,
    pub is_symlink: bool,
}

/// Counters filled in while the scanner is being consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Files yielded
    pub scanned: usize,
    /// Files seen but rejected by the extension or size filter
    pub filtered: usize,
    pub errors: usize,
}

/// Lazy walk over the root yielding files that pass the configured filters.
///
/// Entries are sorted by name inside every directory, so the order is the
/// same on every run over the same tree. Symlinked directories are never
/// entered. Symlinks to regular files are yielded with `is_symlink` set.
/// Unreadable entries are logged and counted, never fatal.
pub struct Scanner<'a> {
    config: &'a RunConfig,
    walk: Box<dyn Iterator<Item = WalkItem>>,
    stats: ScanStats,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        let exclude = config.exclude.clone();
        let walk = WalkDir::new(&config.root)
            .skip_hidden(false)
            .follow_links(false) // Don't follow symlinks to avoid infinite loops
            .sort(true)
            .process_read_dir(move |_depth, _path, _state, children| {
                if exclude.is_empty() {
                    return;
                }
                // Dropping a directory here prunes its whole subtree
                children.retain(|child| match child {
                    Ok(entry) => !exclude.is_match(entry.file_name()),
                    Err(_) => true,
                });
            });

        Self {
            config,
            walk: Box::new(walk.into_iter()),
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn accept(&mut self, mut entry: DirEntry<((), ())>) -> Option<FileEntry> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            // jwalk reports a directory it could not list on the entry itself
            if let Some(e) = entry.read_children_error.take() {
                self.report(ScanError {
                    path: entry.path(),
                    message: e.to_string(),
                });
            }
            return None;
        }

        let path = entry.path();
        let is_symlink = file_type.is_symlink();
        // For symlinks this resolves the target, dangling links are skipped
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if is_symlink => {
                log::debug!("skipping dangling symlink {}: {e}", path.display());
                return None;
            }
            Err(e) => {
                self.report(ScanError {
                    path,
                    message: e.to_string(),
                });
                return None;
            }
        };

        if !metadata.is_file() {
            return None;
        }

        if !self.config.matches_extension(&path) || metadata.len() < self.config.min_size {
            self.stats.filtered += 1;
            return None;
        }

        let index = self.stats.scanned;
        self.stats.scanned += 1;
        Some(FileEntry {
            index,
            path,
            is_symlink,
        })
    }

    fn report(&mut self, error: ScanError) {
        log::warn!("{error}");
        self.stats.errors += 1;
    }
}

impl Iterator for Scanner<'_> {
    type Item = FileEntry;

    fn next(&mut self) -> Option<FileEntry> {
        loop {
            match self.walk.next()? {
                Ok(entry) => {
                    if let Some(found) = self.accept(entry) {
                        return Some(found);
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| self.config.root.clone());
                    self.report(ScanError {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
