//! Drift report assembly.
//!
//! Turns a [`ClassificationResult`] into a human summary, per-resource
//! annotation bodies, remediation commands and a JSON document. Annotation
//! files are the only thing this crate ever writes next to the baseline, and
//! only under the reserved `.drift.bicep` suffix.

use crate::baseline::is_drift_annotation;
use crate::classifier::{Classification, ClassificationResult};
use crate::error::{Error, Result};
use crate::header::{self, symbolic_name_for};
use crate::identity::MatchMode;
use crate::types::{Category, DRIFT_SUFFIX, Diagnostic, SourceKind, Verdict};
use crate::unsupported::{PLACEHOLDER_API_VERSION, inspect_resource_command, inspect_type_command};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// File name of the aggregated annotation file.
pub const AGGREGATED_FILE_NAME: &str = "resources.drift.bicep";

/// File name of the markdown summary.
pub const SUMMARY_FILE_NAME: &str = "drift-summary.md";

/// File name of the JSON report.
pub const JSON_FILE_NAME: &str = "drift-report.json";

/// How annotation files are laid out on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportLayout {
    /// One `resources.drift.bicep` under the output directory
    #[default]
    Aggregated,
    /// One `<stem>.drift.bicep` per baseline file
    PerResource,
}

impl FromStr for ReportLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggregated" => Ok(Self::Aggregated),
            "per-resource" | "per_resource" => Ok(Self::PerResource),
            other => Err(format!(
                "unknown layout '{other}' (expected 'aggregated' or 'per-resource')"
            )),
        }
    }
}

/// Run-level facts the classifier does not know about.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    /// Environment (resource group) that was inspected
    pub environment: String,
    /// Timestamp supplied by the caller
    pub generated_at: Option<String>,
    /// Failures absorbed while building the live side
    pub diagnostics: Vec<Diagnostic>,
}

/// One resource line in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportItem {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub baseline_file: Option<PathBuf>,
}

impl ReportItem {
    fn from_classification(c: &Classification) -> Self {
        Self {
            name: c.identity.name.clone(),
            resource_type: c.resource_type().map(str::to_string),
            resource_id: c.resource_id().map(str::to_string),
            baseline_file: c.baseline.as_ref().map(|b| b.file_path.clone()),
        }
    }

    fn summary_line(&self) -> String {
        format!(
            "- {} ({})",
            self.name,
            self.resource_type.as_deref().unwrap_or("unknown")
        )
    }
}

/// Annotation body for one drifted resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub verdict: Verdict,
    pub unsupported: bool,
    /// Baseline file the resource is declared in, if any
    pub baseline_file: Option<PathBuf>,
    pub body: String,
}

/// A file the report wants written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Structured drift report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub environment: String,
    pub generated_at: Option<String>,
    pub match_mode: MatchMode,
    pub added: Vec<ReportItem>,
    pub changed: Vec<ReportItem>,
    pub removed: Vec<ReportItem>,
    pub unsupported: Vec<ReportItem>,
    pub not_exported: Vec<ReportItem>,
    pub unchanged_count: usize,
    pub annotations: Vec<Annotation>,
    /// Commands a human can run to inspect what could not be compared
    pub commands: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DriftReport {
    /// Build the report for one classification result.
    pub fn assemble(result: &ClassificationResult, context: &ReportContext) -> Self {
        let items = |verdict: Verdict| -> Vec<ReportItem> {
            result
                .with_verdict(verdict)
                .into_iter()
                .map(ReportItem::from_classification)
                .collect()
        };
        let env = context.environment.as_str();

        let annotations = result
            .iter()
            .filter_map(|c| annotate(c, env))
            .collect();

        Self {
            environment: context.environment.clone(),
            generated_at: context.generated_at.clone(),
            match_mode: result.mode,
            added: items(Verdict::Added),
            changed: items(Verdict::Changed),
            removed: items(Verdict::Removed),
            unsupported: result
                .unsupported()
                .into_iter()
                .map(ReportItem::from_classification)
                .collect(),
            not_exported: items(Verdict::NotExported),
            unchanged_count: result.count(Verdict::Unchanged),
            annotations,
            commands: remediation_commands(result, env),
            diagnostics: context
                .diagnostics
                .iter()
                .chain(&result.collisions)
                .cloned()
                .collect(),
        }
    }

    /// Whether anything needs attention.
    pub fn has_drift(&self) -> bool {
        !(self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
            && self.unsupported.is_empty()
            && self.not_exported.is_empty())
    }

    /// Sections in display order.
    pub fn sections(&self) -> [(&'static str, &[ReportItem]); 5] {
        [
            ("Added", self.added.as_slice()),
            ("Changed", self.changed.as_slice()),
            ("Removed", self.removed.as_slice()),
            ("Unsupported", self.unsupported.as_slice()),
            ("NotExported", self.not_exported.as_slice()),
        ]
    }

    /// Markdown summary.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Drift report: {}", self.environment);
        if let Some(generated_at) = &self.generated_at {
            let _ = writeln!(out, "Generated: {generated_at}");
        }

        for (title, items) in self.sections() {
            let _ = writeln!(out, "\n## {title} ({})", items.len());
            if items.is_empty() {
                out.push_str("None\n");
            }
            for item in items {
                out.push_str(&item.summary_line());
                out.push('\n');
            }
        }

        let _ = writeln!(out, "\nUnchanged: {}", self.unchanged_count);

        if !self.commands.is_empty() {
            out.push_str("\n## Commands\n");
            for command in &self.commands {
                let _ = writeln!(out, "    {command}");
            }
        }

        if !self.diagnostics.is_empty() {
            let _ = writeln!(out, "\n## Diagnostics ({})", self.diagnostics.len());
            for diagnostic in &self.diagnostics {
                let _ = writeln!(out, "- {diagnostic}");
            }
        }

        out
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decide where each annotation goes.
    ///
    /// Every planned path ends with `.drift.bicep`. Annotations sharing a
    /// target are concatenated in key order.
    pub fn plan_files(&self, layout: ReportLayout, output_dir: &Path) -> Vec<PlannedFile> {
        if self.annotations.is_empty() {
            return Vec::new();
        }

        match layout {
            ReportLayout::Aggregated => vec![PlannedFile {
                path: output_dir.join(AGGREGATED_FILE_NAME),
                content: self.join_annotations(self.annotations.iter()),
            }],
            ReportLayout::PerResource => {
                let mut grouped: BTreeMap<PathBuf, Vec<&Annotation>> = BTreeMap::new();
                for annotation in &self.annotations {
                    let path = match &annotation.baseline_file {
                        Some(file) => annotation_path_for(file),
                        None => output_dir
                            .join(format!("{}{DRIFT_SUFFIX}", symbolic_name_for(&annotation.name))),
                    };
                    grouped.entry(path).or_default().push(annotation);
                }
                grouped
                    .into_iter()
                    .map(|(path, annotations)| PlannedFile {
                        path,
                        content: self.join_annotations(annotations.into_iter()),
                    })
                    .collect()
            }
        }
    }

    fn join_annotations<'a>(&self, annotations: impl Iterator<Item = &'a Annotation>) -> String {
        let mut out = format!(
            "// Generated by driftscan for {}. Review and merge by hand.\n",
            self.environment
        );
        for annotation in annotations {
            out.push('\n');
            out.push_str(&annotation.body);
            out.push('\n');
        }
        out
    }

    /// Write the summary and JSON report under `output_dir`.
    pub fn write_summary(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;
        let summary = output_dir.join(SUMMARY_FILE_NAME);
        let json = output_dir.join(JSON_FILE_NAME);
        fs::write(&summary, self.summary_text())?;
        fs::write(&json, self.to_json()?)?;
        Ok(vec![summary, json])
    }
}

/// `<dir>/<stem>.drift.bicep` for a baseline file.
pub fn annotation_path_for(baseline_file: &Path) -> PathBuf {
    let stem = baseline_file
        .file_stem()
        .map_or_else(|| "resources".into(), |s| s.to_string_lossy());
    baseline_file.with_file_name(format!("{stem}{DRIFT_SUFFIX}"))
}

/// Write planned annotation files.
///
/// Nothing is written if any path lacks the reserved suffix.
pub fn write_files(files: &[PlannedFile]) -> Result<Vec<PathBuf>> {
    if let Some(bad) = files.iter().find(|f| !is_drift_annotation(&f.path)) {
        return Err(Error::ProtectedPath(bad.path.clone()));
    }

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        if let Some(parent) = file.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file.path, &file.content)?;
        log::debug!("Wrote {}", file.path.display());
        written.push(file.path.clone());
    }
    Ok(written)
}

/// Delete annotations left by an earlier run that `planned` does not rewrite.
///
/// Looks at the top level of `output_dir` and through the baseline's
/// `modules/` and `existing/` trees. Only `.drift.bicep` files are removed.
pub fn remove_stale(
    planned: &[PlannedFile],
    output_dir: &Path,
    baseline_root: &Path,
) -> Result<Vec<PathBuf>> {
    let keep: BTreeSet<&Path> = planned.iter().map(|f| f.path.as_path()).collect();
    let roots = std::iter::once((output_dir.to_path_buf(), 1)).chain(
        Category::all()
            .into_iter()
            .map(|c| (baseline_root.join(c.dir_name()), usize::MAX)),
    );

    let mut removed = Vec::new();
    for (dir, depth) in roots {
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).max_depth(depth).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && is_drift_annotation(path)
                && !keep.contains(path)
                && !removed.iter().any(|r: &PathBuf| r == path)
            {
                fs::remove_file(path)?;
                log::debug!("Removed stale {}", path.display());
                removed.push(path.to_path_buf());
            }
        }
    }
    Ok(removed)
}

fn annotate(c: &Classification, env: &str) -> Option<Annotation> {
    let body = match c.verdict {
        Verdict::Changed => changed_body(c),
        Verdict::Removed => removed_body(c, env),
        Verdict::Added => added_body(c, env),
        Verdict::Unchanged | Verdict::NotExported => return None,
    };
    Some(Annotation {
        name: c.identity.name.clone(),
        verdict: c.verdict,
        unsupported: c.unsupported,
        baseline_file: c.baseline.as_ref().map(|b| b.file_path.clone()),
        body,
    })
}

fn changed_body(c: &Classification) -> String {
    let mut out = format!("// CHANGED: '{}' differs from the baseline", c.identity.name);
    if let Some(baseline) = &c.baseline {
        let _ = write!(out, " in {}", baseline.file_path.display());
    }
    out.push('\n');
    if let Some(diff) = &c.diff {
        out.push_str("// Diff (baseline -> live):\n");
        for line in diff.lines() {
            let _ = writeln!(out, "//   {line}");
        }
    }
    if let Some(descriptor) = &c.descriptor {
        out.push_str(&descriptor.raw_text);
    }
    out
}

fn removed_body(c: &Classification, env: &str) -> String {
    let mut out = format!(
        "// REMOVED: '{}' ({}) no longer exists in {env}",
        c.identity.name,
        c.identity.type_or_unknown()
    );
    if let Some(baseline) = &c.baseline {
        let _ = write!(
            out,
            "\n// Declared in {}; delete the declaration once confirmed.",
            baseline.file_path.display()
        );
    }
    out
}

fn added_body(c: &Classification, env: &str) -> String {
    if let Some(descriptor) = &c.descriptor
        && descriptor.source_kind == SourceKind::Synthesized
    {
        return descriptor.raw_text.clone();
    }

    let name = &c.identity.name;
    let resource_type = c.resource_type().unwrap_or("Unknown.Provider/unknown");
    let api_version = c
        .descriptor
        .as_ref()
        .and_then(|d| d.raw_text.lines().find_map(header::parse_header))
        .map_or_else(|| PLACEHOLDER_API_VERSION.to_string(), |h| h.api_version);
    let location = c
        .live
        .as_ref()
        .and_then(|l| l.location.as_deref())
        .unwrap_or("<location>");
    let fetch = c.resource_id().map_or_else(
        || format!("az resource list --resource-group {env} --name {name} --output json"),
        inspect_resource_command,
    );

    format!(
        "// ADDED: '{name}' exists in {env} but is not declared locally.\n\
         // Fetch with: {fetch}\n\
         resource {symbol} '{resource_type}@{api_version}' = {{\n  \
         name: '{name}'\n  \
         location: '{location}'\n  \
         properties: {{}}\n\
         }}",
        symbol = symbolic_name_for(name),
    )
}

fn remediation_commands(result: &ClassificationResult, env: &str) -> Vec<String> {
    let unsupported_types: BTreeSet<&str> = result
        .unsupported()
        .into_iter()
        .filter_map(Classification::resource_type)
        .collect();

    let mut commands: Vec<String> = unsupported_types
        .into_iter()
        .map(|t| inspect_type_command(env, t))
        .collect();

    for c in result.with_verdict(Verdict::NotExported) {
        if let Some(id) = c.resource_id() {
            let command = inspect_resource_command(id);
            if !commands.contains(&command) {
                commands.push(command);
            }
        }
    }
    commands
}
