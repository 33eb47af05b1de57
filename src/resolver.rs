use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{LinkError, StoreError};
use crate::hasher::Digest;
use crate::pool::HashedEntry;
use crate::store::HashStore;

/// Files of this run sharing one digest, in discovery order
#[derive(Debug, Clone, PartialEq)]
pub struct HashGroup {
    pub digest: Digest,
    pub members: Vec<HashedEntry>,
}

impl HashGroup {
    /// The copy that is kept: the first member that is a regular file.
    /// `None` when every member is already a symlink.
    pub fn canonical(&self) -> Option<&HashedEntry> {
        self.members.iter().find(|m| !m.entry.is_symlink)
    }

    pub fn size(&self) -> u64 {
        self.members.first().map(|m| m.size).unwrap_or(0)
    }
}

/// What happened to one duplicate candidate
#[derive(Debug)]
pub enum CandidateOutcome {
    /// Dry run: would be replaced
    WouldLink,
    Linked,
    /// Already a symlink resolving to the canonical file
    AlreadyLinked,
    /// A symlink pointing somewhere else; left alone
    SkippedSymlink { target: PathBuf },
    Failed(LinkError),
}

#[derive(Debug)]
pub struct CandidateAction {
    pub candidate: PathBuf,
    pub canonical: PathBuf,
    pub size: u64,
    pub outcome: CandidateOutcome,
}

/// Result of resolving every group of a run
#[derive(Debug, Default)]
pub struct Resolution {
    pub actions: Vec<CandidateAction>,
    /// Groups skipped because their canonical file was gone
    pub skipped_groups: usize,
}

impl Resolution {
    pub fn count(&self, pred: impl Fn(&CandidateOutcome) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(&a.outcome)).count()
    }

    pub fn link_errors(&self) -> usize {
        self.skipped_groups + self.count(|o| matches!(o, CandidateOutcome::Failed(_)))
    }

    /// Bytes freed (or freeable, in a dry run) by the replacements
    pub fn bytes_reclaimed(&self) -> u64 {
        self.actions
            .iter()
            .filter(|a| {
                matches!(
                    a.outcome,
                    CandidateOutcome::Linked | CandidateOutcome::WouldLink
                )
            })
            .map(|a| a.size)
            .sum()
    }
}

/// Group this run's files by digest using the store's duplicate query.
///
/// Store records that this run did not produce (outside the root, or failed
/// to hash this time) are ignored. Members are ordered by discovery index and
/// groups by their first member.
pub fn build_groups(
    store: &HashStore,
    hashed: &[HashedEntry],
) -> Result<Vec<HashGroup>, StoreError> {
    let by_path: HashMap<&Path, &HashedEntry> =
        hashed.iter().map(|h| (h.entry.path.as_path(), h)).collect();

    let mut groups: Vec<HashGroup> = store
        .duplicate_groups()?
        .into_iter()
        .filter_map(|stored| {
            let mut members: Vec<HashedEntry> = stored
                .paths
                .iter()
                .filter_map(|p| by_path.get(p.as_path()))
                .filter(|h| h.digest == stored.digest)
                .map(|h| (*h).clone())
                .collect();
            if members.len() < 2 {
                return None;
            }
            members.sort_by_key(|m| m.entry.index);
            Some(HashGroup {
                digest: stored.digest,
                members,
            })
        })
        .collect();

    groups.sort_by_key(|g| g.members[0].entry.index);
    Ok(groups)
}

/// Replace every non-canonical member of each group with a symlink to the
/// group's canonical file, or only report it when `dry_run` is set.
///
/// Existing symlinks are never touched. A failure affects one candidate only.
pub fn resolve(groups: &[HashGroup], dry_run: bool) -> Resolution {
    let mut resolution = Resolution::default();

    for group in groups {
        let Some(canonical) = group.canonical() else {
            log::debug!("every copy of {} is already a symlink", group.digest);
            continue;
        };
        let canonical_path = &canonical.entry.path;

        match fs::symlink_metadata(canonical_path) {
            Ok(meta) if meta.is_file() => {}
            _ => {
                let err = LinkError::CanonicalMissing {
                    path: canonical_path.clone(),
                };
                log::warn!("skipping group {}: {err}", group.digest);
                resolution.skipped_groups += 1;
                continue;
            }
        }

        for member in &group.members {
            if member.entry.index == canonical.entry.index {
                continue;
            }
            let outcome = resolve_candidate(&member.entry.path, canonical_path, dry_run);
            if let CandidateOutcome::Failed(e) = &outcome {
                log::warn!("{e}");
            }
            resolution.actions.push(CandidateAction {
                candidate: member.entry.path.clone(),
                canonical: canonical_path.clone(),
                size: member.size,
                outcome,
            });
        }
    }

    resolution
}

fn resolve_candidate(path: &Path, canonical: &Path, dry_run: bool) -> CandidateOutcome {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(source) => {
            return CandidateOutcome::Failed(LinkError::Inspect {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if meta.file_type().is_symlink() {
        if points_to(path, canonical) {
            return CandidateOutcome::AlreadyLinked;
        }
        let target = fs::read_link(path).unwrap_or_default();
        return CandidateOutcome::SkippedSymlink { target };
    }

    if !meta.is_file() {
        return CandidateOutcome::Failed(LinkError::NotRegularFile {
            path: path.to_path_buf(),
        });
    }

    if dry_run {
        return CandidateOutcome::WouldLink;
    }

    match replace_with_symlink(path, canonical) {
        Ok(()) => CandidateOutcome::Linked,
        Err(e) => CandidateOutcome::Failed(e),
    }
}

fn points_to(link: &Path, target: &Path) -> bool {
    match (fs::canonicalize(link), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Replace a file with a symlink to another file.
fn replace_with_symlink(path: &Path, target: &Path) -> Result<(), LinkError> {
    // Create the link under a temporary name in the same directory, then
    // rename it over the duplicate so the path is never left missing.
    let temp_path = path.with_extension(format!(
        "{}.dupe_link_tmp",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    // Linking fails if temp_path survived an interrupted previous run.
    match fs::remove_file(&temp_path) {
        Ok(()) => (),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(source) => {
            return Err(LinkError::Replace {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    symlink_file(target, &temp_path).map_err(|source| LinkError::Symlink {
        path: path.to_path_buf(),
        target: target.to_path_buf(),
        source,
    })?;

    if let Err(source) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(LinkError::Replace {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
