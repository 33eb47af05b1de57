use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::Cli;
use crate::hasher::Algorithm;

/// Extensions considered when none are given on the command line
pub const DEFAULT_EXTENSIONS: [&str; 4] = [".bin", ".safetensors", ".pth", ".pt"];

/// Database file used when none is given
pub const DEFAULT_DB_PATH: &str = "./model-data.sqlite3";

/// Everything one invocation needs to know. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Absolute, canonical root of the scan
    pub root: PathBuf,
    /// Lowercase suffixes with a leading dot
    pub extensions: Vec<String>,
    pub threads: usize,
    pub db_path: PathBuf,
    pub dry_run: bool,
    pub algorithm: Algorithm,
    pub min_size: u64,
    pub exclude: GlobSet,
    pub show_progress: bool,
}

impl RunConfig {
    /// Config with default settings for an already validated root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: normalize_extensions(DEFAULT_EXTENSIONS),
            threads: 4,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            dry_run: false,
            algorithm: Algorithm::Sha256,
            min_size: 1,
            exclude: GlobSet::empty(),
            show_progress: false,
        }
    }

    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let root = validate_root(&cli.dir)?;
        let extensions = normalize_extensions(cli.extensions.iter().map(String::as_str));
        if extensions.is_empty() {
            bail!("no usable extensions given");
        }
        let exclude = build_exclude_set(&cli.exclude)?;

        Ok(Self {
            extensions,
            threads: usize::from(cli.threads),
            db_path: cli.db_path.clone(),
            dry_run: cli.dry_run,
            algorithm: cli.algorithm,
            min_size: cli.min_size,
            exclude,
            show_progress: cli.shows_progress(),
            ..Self::new(root)
        })
    }

    /// Case-insensitive suffix match of the file name against the allow-list.
    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// Lowercase, trim, prefix with a dot and drop empty or repeated entries.
pub fn normalize_extensions<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for ext in raw {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            continue;
        }
        let ext = format!(".{ext}");
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

fn validate_root(dir: &Path) -> anyhow::Result<PathBuf> {
    let root = fs::canonicalize(dir)
        .with_context(|| format!("cannot access directory {}", dir.display()))?;
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    fs::read_dir(&root).with_context(|| format!("cannot read directory {}", root.display()))?;
    Ok(root)
}

pub fn build_exclude_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern {pattern:?}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
