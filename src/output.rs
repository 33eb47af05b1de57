use std::path::PathBuf;

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::error::ErrorCounts;
use crate::pool::PoolStats;
use crate::resolver::{CandidateAction, CandidateOutcome, HashGroup, Resolution};
use crate::scanner::ScanStats;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
    /// No output, only the exit code
    Quiet,
}

/// A duplicate group for output
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub hash: String,
    /// Size of each file in this group
    pub size: u64,
    /// The copy that is kept, if any member is a regular file
    pub canonical: Option<PathBuf>,
    /// All members in discovery order
    pub files: Vec<PathBuf>,
}

/// What happened to a candidate, as shown in the action log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    WouldLink,
    Linked,
    AlreadyLinked,
    SkippedSymlink,
    Failed,
}

impl From<&CandidateOutcome> for ActionStatus {
    fn from(outcome: &CandidateOutcome) -> Self {
        match outcome {
            CandidateOutcome::WouldLink => ActionStatus::WouldLink,
            CandidateOutcome::Linked => ActionStatus::Linked,
            CandidateOutcome::AlreadyLinked => ActionStatus::AlreadyLinked,
            CandidateOutcome::SkippedSymlink { .. } => ActionStatus::SkippedSymlink,
            CandidateOutcome::Failed(_) => ActionStatus::Failed,
        }
    }
}

/// One line of the action log
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub candidate: PathBuf,
    pub canonical: PathBuf,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&CandidateAction> for ActionReport {
    fn from(action: &CandidateAction) -> Self {
        let detail = match &action.outcome {
            CandidateOutcome::SkippedSymlink { target } => {
                Some(format!("links to {}", target.display()))
            }
            CandidateOutcome::Failed(e) => Some(e.to_string()),
            _ => None,
        };
        Self {
            candidate: action.candidate.clone(),
            canonical: action.canonical.clone(),
            status: ActionStatus::from(&action.outcome),
            detail,
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    /// Files matching the filters
    pub scanned: usize,
    /// Files read and hashed this run
    pub hashed: usize,
    /// Files whose stored hash was reused
    pub cached: usize,
    /// Non-canonical members over all groups
    pub duplicates: usize,
    /// Replaced with a symlink (or would be, in a dry run)
    pub linked: usize,
    /// Existing symlinks left alone
    pub skipped: usize,
    pub bytes_reclaimed: u64,
    pub errors: ErrorCounts,
}

/// Complete report of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub stats: SummaryStats,
    pub groups: Vec<GroupReport>,
    pub actions: Vec<ActionReport>,
}

impl RunSummary {
    pub fn new(
        dry_run: bool,
        scan: ScanStats,
        pool: PoolStats,
        groups: &[HashGroup],
        resolution: &Resolution,
    ) -> Self {
        let duplicates = groups.iter().map(|g| g.members.len() - 1).sum();
        let linked = resolution.count(|o| {
            matches!(o, CandidateOutcome::Linked | CandidateOutcome::WouldLink)
        });
        let skipped = resolution.count(|o| {
            matches!(
                o,
                CandidateOutcome::AlreadyLinked | CandidateOutcome::SkippedSymlink { .. }
            )
        });

        let stats = SummaryStats {
            scanned: scan.scanned,
            hashed: pool.hashed,
            cached: pool.cached,
            duplicates,
            linked,
            skipped,
            bytes_reclaimed: resolution.bytes_reclaimed(),
            errors: ErrorCounts {
                scan: scan.errors,
                hash: pool.errors,
                link: resolution.link_errors(),
            },
        };

        let groups = groups
            .iter()
            .map(|g| GroupReport {
                hash: g.digest.to_string(),
                size: g.size(),
                canonical: g.canonical().map(|c| c.entry.path.clone()),
                files: g.members.iter().map(|m| m.entry.path.clone()).collect(),
            })
            .collect();

        Self {
            dry_run,
            stats,
            groups,
            actions: resolution.actions.iter().map(ActionReport::from).collect(),
        }
    }

    pub fn print(&self, format: OutputFormat, verbose: bool) {
        match format {
            OutputFormat::Human => self.print_human(verbose),
            OutputFormat::Json => self.print_json(),
            OutputFormat::Quiet => {}
        }
    }

    /// Output as human-readable colored text
    pub fn print_human(&self, verbose: bool) {
        for action in &self.actions {
            print_action(action);
        }

        if verbose {
            for (i, group) in self.groups.iter().enumerate() {
                println!(
                    "\n{} {} ({} bytes each)",
                    format!("Group {}:", i + 1).bold(),
                    format!("{} files", group.files.len()).cyan(),
                    group.size.to_string().yellow()
                );
                for path in &group.files {
                    let keep = group.canonical.as_ref() == Some(path);
                    let marker = if keep { "*" } else { " " };
                    println!(" {marker} {}", path.display());
                }
            }
        }

        let s = &self.stats;
        println!("\n{}", "Dedup Summary".bold().underline());
        println!("  Scanned: {} files", s.scanned.to_string().cyan());
        println!(
            "  Hashed: {} ({} reused from store)",
            s.hashed.to_string().cyan(),
            s.cached.to_string().cyan()
        );
        println!("  Duplicates: {}", s.duplicates.to_string().cyan());
        if self.dry_run {
            let line = format!(
                "  Would link {} files, reclaiming {} bytes",
                s.linked, s.bytes_reclaimed
            );
            println!("{}", line.yellow());
        } else {
            let line = format!(
                "  Linked {} files, saved {} bytes",
                s.linked, s.bytes_reclaimed
            );
            println!("{}", line.green());
        }
        println!("  Skipped symlinks: {}", s.skipped);
        let errors = format!(
            "  Errors: {} (scan {}, hash {}, link {})",
            s.errors.total(),
            s.errors.scan,
            s.errors.hash,
            s.errors.link
        );
        if s.errors.total() > 0 {
            println!("{}", errors.red());
        } else {
            println!("{errors}");
        }

        if self.groups.is_empty() {
            println!("\n{}", "No duplicates found.".green());
        }
    }

    /// Output as JSON
    pub fn print_json(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing to JSON: {}", e),
        }
    }
}

fn print_action(action: &ActionReport) {
    let candidate = action.candidate.display();
    let canonical = action.canonical.display();
    match action.status {
        ActionStatus::WouldLink => println!(
            "{} {candidate} would be replaced with a link to {canonical}",
            "[dry-run]".yellow()
        ),
        ActionStatus::Linked => println!("{} {candidate} -> {canonical}", "[linked]".green()),
        ActionStatus::AlreadyLinked => println!(
            "{} {candidate} is already linked to {canonical}",
            "[skipped]".blue()
        ),
        ActionStatus::SkippedSymlink => println!(
            "{} {candidate} is a symlink ({}), leaving it alone",
            "[skipped]".blue(),
            action.detail.as_deref().unwrap_or("unknown target")
        ),
        ActionStatus::Failed => println!(
            "{} {candidate}: {}",
            "[error]".red(),
            action.detail.as_deref().unwrap_or("unknown error")
        ),
    }
}
