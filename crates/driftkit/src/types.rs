//! Core types for drift detection

use crate::error::ErrorCategory;
use crate::identity::{MatchMode, ResourceIdentity, ResourceKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Reserved suffix of generated drift annotation files.
///
/// Files ending with this suffix are never read back as baseline.
pub const DRIFT_SUFFIX: &str = ".drift.bicep";

/// Extension of baseline declaration files.
pub const SOURCE_EXTENSION: &str = "bicep";

/// Where a descriptor's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Exported and decompiled from the live environment
    Exported,
    /// Placeholder synthesized for an unsupported type
    Synthesized,
}

/// A live resource's isolated declaration text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub identity: ResourceIdentity,
    pub raw_text: String,
    pub source_kind: SourceKind,
    /// Provider id, when the listing could supply one
    pub resource_id: Option<String>,
}

impl ResourceDescriptor {
    pub fn exported(identity: ResourceIdentity, raw_text: impl Into<String>) -> Self {
        Self {
            identity,
            raw_text: raw_text.into(),
            source_kind: SourceKind::Exported,
            resource_id: None,
        }
    }

    pub fn synthesized(identity: ResourceIdentity, raw_text: impl Into<String>) -> Self {
        Self {
            identity,
            raw_text: raw_text.into(),
            source_kind: SourceKind::Synthesized,
            resource_id: None,
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn key(&self, mode: MatchMode) -> ResourceKey {
        self.identity.key(mode)
    }
}

/// Baseline namespace a declaration was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Managed module under `modules/`
    Module,
    /// Imported resource under `existing/`
    Existing,
}

impl Category {
    /// Directory name of this namespace inside the baseline root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Module => "modules",
            Category::Existing => "existing",
        }
    }

    /// Namespaces in scan order.
    pub fn all() -> [Category; 2] {
        [Category::Module, Category::Existing]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// A locally declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub identity: ResourceIdentity,
    pub file_path: PathBuf,
    pub raw_text: String,
    pub category: Category,
}

/// Identity-level record of something the exporter says exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResourceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl LiveResourceSummary {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            id: id.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(&self.name, &self.resource_type)
    }
}

/// Primary drift verdict; exactly one per resource key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Live body matches the baseline after normalization
    Unchanged,
    /// Live, but not declared locally
    Added,
    /// Declared and live, bodies differ
    Changed,
    /// Declared, but no longer live
    Removed,
    /// Known to exist, but no comparable body could be produced
    NotExported,
}

impl Verdict {
    /// Report section title.
    pub fn title(&self) -> &'static str {
        match self {
            Verdict::Unchanged => "Unchanged",
            Verdict::Added => "Added",
            Verdict::Changed => "Changed",
            Verdict::Removed => "Removed",
            Verdict::NotExported => "NotExported",
        }
    }

    /// Whether this verdict represents drift.
    pub fn is_drift(&self) -> bool {
        !matches!(self, Verdict::Unchanged)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Options for one classification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftOptions {
    /// Require type equality in addition to name equality
    pub match_by_type: bool,
    /// Resolve and tag unsupported resource types
    pub include_unsupported: bool,
    /// Report baseline entries missing from the live environment
    pub include_removed: bool,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            match_by_type: false,
            include_unsupported: true,
            include_removed: true,
        }
    }
}

impl DriftOptions {
    pub fn match_mode(&self) -> MatchMode {
        MatchMode::from_flag(self.match_by_type)
    }
}

/// What kind of absorbed failure a diagnostic records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    PartialExportFailure,
    CompileFailure,
    IdentityConflict,
    MalformedDescriptor,
    ListingFailure,
}

impl DiagnosticKind {
    pub fn from_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Compile => DiagnosticKind::CompileFailure,
            ErrorCategory::IdentityConflict => DiagnosticKind::IdentityConflict,
            _ => DiagnosticKind::PartialExportFailure,
        }
    }
}

/// A per-resource or per-type failure that did not abort the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Resource name, type or file the failure is about
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} [{}]: {}", self.kind, self.subject, self.message)
    }
}
