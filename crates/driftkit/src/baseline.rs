//! Baseline index.
//!
//! Scans the `modules/` and `existing/` namespaces of a baseline store and
//! indexes every declaration found there. The scan is a pure function of the
//! filesystem content: entries are visited in sorted order and generated
//! annotation files are never read.

use crate::error::{Error, Result};
use crate::identity::{MatchMode, ResourceKey};
use crate::splitter;
use crate::types::{BaselineEntry, Category, DRIFT_SUFFIX, SOURCE_EXTENSION};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Two declarations that resolved to the same key.
///
/// Policy is last-wins in scan order: `modules/` before `existing/`, files
/// sorted by name within each namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConflict {
    pub key: ResourceKey,
    /// File whose declaration was dropped
    pub shadowed: PathBuf,
    /// File whose declaration was kept
    pub kept: PathBuf,
}

/// Index of locally declared resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineIndex {
    mode: MatchMode,
    entries: BTreeMap<ResourceKey, BaselineEntry>,
    pub conflicts: Vec<IdentityConflict>,
    /// Baseline files that contain no recognizable declaration
    pub skipped_files: Vec<PathBuf>,
}

impl BaselineIndex {
    /// Empty index for the given match mode.
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Scan a baseline store.
    ///
    /// The root must exist; either namespace directory may be absent.
    pub fn scan(root: &Path, mode: MatchMode) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::BaselineNotFound(root.to_path_buf()));
        }

        let mut index = Self::new(mode);
        for category in Category::all() {
            let dir = root.join(category.dir_name());
            if !dir.is_dir() {
                log::debug!("No {} directory at {}", category, dir.display());
                continue;
            }
            for path in baseline_files(&dir)? {
                let content = fs::read_to_string(&path)?;
                index.add_file(&path, &content, category);
            }
        }

        log::info!(
            "Indexed {} baseline declarations from {}",
            index.len(),
            root.display()
        );
        Ok(index)
    }

    /// Index every declaration in one file's content.
    pub fn add_file(&mut self, path: &Path, content: &str, category: Category) {
        let split = splitter::split_declarations(content);
        if split.is_empty() {
            log::warn!("No declaration found in {}", path.display());
            self.skipped_files.push(path.to_path_buf());
            return;
        }

        for declaration in split.iter() {
            self.insert(BaselineEntry {
                identity: declaration.identity(),
                file_path: path.to_path_buf(),
                raw_text: declaration.text.clone(),
                category,
            });
        }
    }

    /// Insert an entry, replacing any previous entry with the same key.
    pub fn insert(&mut self, entry: BaselineEntry) {
        let key = entry.identity.key(self.mode);
        let kept = entry.file_path.clone();
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            log::warn!(
                "'{}' declared in both {} and {}, using the latter",
                key,
                previous.file_path.display(),
                kept.display()
            );
            self.conflicts.push(IdentityConflict {
                key,
                shadowed: previous.file_path,
                kept,
            });
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&BaselineEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &BaselineEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a path is a generated drift annotation.
pub fn is_drift_annotation(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(DRIFT_SUFFIX))
}

/// Whether a path is a baseline declaration file.
pub fn is_baseline_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == SOURCE_EXTENSION) && !is_drift_annotation(path)
}

/// Baseline files under a namespace directory, in sorted order.
fn baseline_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_baseline_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
