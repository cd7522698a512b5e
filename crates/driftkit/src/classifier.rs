//! Drift classification.
//!
//! Reconciles the baseline index against the live environment. Every key in
//! the union of baseline and live identities receives exactly one primary
//! [`Verdict`]:
//!
//! 1. **Removed**: declared locally, absent from both the live listing and the
//!    descriptor set. Without a listing absence cannot be proven, and such
//!    entries are NotExported instead.
//! 2. **Added / Changed / Unchanged**: one per descriptor, by normalized text
//!    comparison against the baseline entry with the same key.
//! 3. **NotExported**: listed as live, but no descriptor was ever produced.
//!
//! Unsupported types are then tagged on top of the primary verdict.
//!
//! Several live resources (or declarations) may share a key, most often in
//! name-only mode. One of them is compared, picked by declared type first and
//! then by type and id, and the rest are reported as identity conflicts.
//!
//! The classifier performs no I/O. All collections are ordered maps, so the
//! result does not depend on input order and repeated runs are identical.

use crate::baseline::BaselineIndex;
use crate::diff;
use crate::identity::{self, MatchMode, ResourceIdentity, ResourceKey};
use crate::types::{
    BaselineEntry, Diagnostic, DiagnosticKind, DriftOptions, LiveResourceSummary,
    ResourceDescriptor, SourceKind, Verdict,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Verdict and supporting evidence for one resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub identity: ResourceIdentity,
    pub verdict: Verdict,
    /// Type is one the toolchain cannot represent
    pub unsupported: bool,
    pub baseline: Option<BaselineEntry>,
    pub descriptor: Option<ResourceDescriptor>,
    pub live: Option<LiveResourceSummary>,
    /// Unified diff from baseline to live text, for Changed
    pub diff: Option<String>,
}

impl Classification {
    fn new(identity: ResourceIdentity, verdict: Verdict) -> Self {
        Self {
            identity,
            verdict,
            unsupported: false,
            baseline: None,
            descriptor: None,
            live: None,
            diff: None,
        }
    }

    /// Provider id, from the live listing or the descriptor.
    pub fn resource_id(&self) -> Option<&str> {
        self.live
            .as_ref()
            .map(|l| l.id.as_str())
            .or_else(|| self.descriptor.as_ref()?.resource_id.as_deref())
    }

    /// Best known resource type.
    pub fn resource_type(&self) -> Option<&str> {
        self.identity
            .resource_type
            .as_deref()
            .or_else(|| self.live.as_ref().map(|l| l.resource_type.as_str()))
    }
}

/// One verdict per resource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub mode: MatchMode,
    pub entries: BTreeMap<ResourceKey, Classification>,
    /// Keys claimed by more than one live resource or declaration, in key order
    pub collisions: Vec<Diagnostic>,
}

impl ClassificationResult {
    pub fn get(&self, key: &ResourceKey) -> Option<&Classification> {
        self.entries.get(key)
    }

    /// Look up by name, whatever the match mode.
    pub fn find_by_name(&self, name: &str) -> Option<&Classification> {
        self.entries.values().find(|c| c.identity.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Classification> {
        self.entries.values()
    }

    /// Entries with the given primary verdict, in key order.
    pub fn with_verdict(&self, verdict: Verdict) -> Vec<&Classification> {
        self.iter().filter(|c| c.verdict == verdict).collect()
    }

    /// Entries tagged unsupported, in key order.
    pub fn unsupported(&self) -> Vec<&Classification> {
        self.iter().filter(|c| c.unsupported).collect()
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.iter().filter(|c| c.verdict == verdict).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether anything differs from the baseline.
    pub fn has_drift(&self) -> bool {
        self.iter().any(|c| c.verdict.is_drift() || c.unsupported)
    }
}

/// Configurable drift classifier.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    options: DriftOptions,
    listing_available: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DriftOptions::default())
    }
}

impl Classifier {
    pub fn new(options: DriftOptions) -> Self {
        Self {
            options,
            listing_available: true,
        }
    }

    /// Whether the live listing could be fetched.
    ///
    /// When it could not, baseline entries with no descriptor are reported
    /// as NotExported rather than Removed.
    pub fn with_listing_available(mut self, available: bool) -> Self {
        self.listing_available = available;
        self
    }

    pub fn options(&self) -> DriftOptions {
        self.options
    }

    /// Classify every baseline and live resource.
    ///
    /// # Panics
    ///
    /// Panics if the index was built with a different match mode than the
    /// classifier's options; that is a caller bug, not a runtime condition.
    pub fn classify(
        &self,
        index: &BaselineIndex,
        descriptors: &[ResourceDescriptor],
        live: &[LiveResourceSummary],
        unsupported_types: &BTreeSet<String>,
    ) -> ClassificationResult {
        let mode = self.options.match_mode();
        assert_eq!(
            index.mode(),
            mode,
            "baseline index and classifier disagree on match mode"
        );

        let live_groups = group_live(live, index, mode);
        let descriptor_groups = group_descriptors(descriptors, index, mode);

        let mut collisions: Vec<Diagnostic> = live_groups
            .iter()
            .filter_map(|(key, group)| live_collision(key, group))
            .collect();
        collisions.extend(
            descriptor_groups
                .iter()
                .filter_map(|(key, group)| descriptor_collision(key, group)),
        );
        for collision in &collisions {
            log::warn!("{collision}");
        }

        let live_by_key = winners(&live_groups);
        let descriptors_by_key = winners(&descriptor_groups);

        let mut entries = BTreeMap::new();

        if self.options.include_removed {
            removed_pass(
                index,
                &live_by_key,
                &descriptors_by_key,
                self.listing_available,
                &mut entries,
            );
        }
        descriptor_pass(index, &live_by_key, &descriptors_by_key, &mut entries);
        not_exported_pass(index, &live_by_key, &descriptors_by_key, &mut entries);

        if self.options.include_unsupported && !unsupported_types.is_empty() {
            for (key, classification) in &mut entries {
                let flagged = live_groups
                    .get(key)
                    .into_iter()
                    .flatten()
                    .map(|l| l.resource_type.as_str())
                    .chain(
                        descriptor_groups
                            .get(key)
                            .into_iter()
                            .flatten()
                            .filter_map(|d| d.identity.resource_type.as_deref()),
                    )
                    .chain(classification.resource_type())
                    .any(|t| identity::type_in(t, unsupported_types));
                if flagged {
                    classification.unsupported = true;
                }
            }
        }

        log::info!(
            "Classified {} resources: {} added, {} changed, {} removed, {} not exported",
            entries.len(),
            entries.values().filter(|c| c.verdict == Verdict::Added).count(),
            entries.values().filter(|c| c.verdict == Verdict::Changed).count(),
            entries.values().filter(|c| c.verdict == Verdict::Removed).count(),
            entries.values().filter(|c| c.verdict == Verdict::NotExported).count(),
        );

        ClassificationResult {
            mode,
            entries,
            collisions,
        }
    }
}

fn declared_type<'a>(index: &'a BaselineIndex, key: &ResourceKey) -> Option<&'a str> {
    index.get(key)?.identity.resource_type.as_deref()
}

fn same_type(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.eq_ignore_ascii_case(b))
}

/// Live entries by key, best match first: declared type, then type and id.
fn group_live<'a>(
    live: &'a [LiveResourceSummary],
    index: &BaselineIndex,
    mode: MatchMode,
) -> BTreeMap<ResourceKey, Vec<&'a LiveResourceSummary>> {
    let mut groups: BTreeMap<ResourceKey, Vec<&LiveResourceSummary>> = BTreeMap::new();
    for summary in live {
        groups
            .entry(summary.identity().key(mode))
            .or_default()
            .push(summary);
    }
    for (key, group) in &mut groups {
        let declared = declared_type(index, key);
        group.sort_by_cached_key(|l| {
            (
                !same_type(declared, Some(l.resource_type.as_str())),
                l.resource_type.to_ascii_lowercase(),
                l.id.clone(),
            )
        });
        group.dedup_by(|a, b| a == b);
    }
    groups
}

/// Descriptors by key, best match first: a real exported body before a
/// placeholder, then declared type, then type and text.
fn group_descriptors<'a>(
    descriptors: &'a [ResourceDescriptor],
    index: &BaselineIndex,
    mode: MatchMode,
) -> BTreeMap<ResourceKey, Vec<&'a ResourceDescriptor>> {
    let mut groups: BTreeMap<ResourceKey, Vec<&ResourceDescriptor>> = BTreeMap::new();
    for descriptor in descriptors {
        groups
            .entry(descriptor.key(mode))
            .or_default()
            .push(descriptor);
    }
    for (key, group) in &mut groups {
        let declared = declared_type(index, key);
        group.sort_by_cached_key(|d| {
            (
                d.source_kind != SourceKind::Exported,
                !same_type(declared, d.identity.resource_type.as_deref()),
                d.identity.type_or_unknown().to_ascii_lowercase(),
                d.raw_text.clone(),
            )
        });
        group.dedup_by(|a, b| a == b);
    }
    groups
}

fn winners<'a, T>(groups: &BTreeMap<ResourceKey, Vec<&'a T>>) -> BTreeMap<ResourceKey, &'a T> {
    groups
        .iter()
        .filter_map(|(key, group)| group.first().map(|winner| (key.clone(), *winner)))
        .collect()
}

fn live_collision(key: &ResourceKey, group: &[&LiveResourceSummary]) -> Option<Diagnostic> {
    let (winner, rest) = group.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let types: Vec<&str> = group.iter().map(|l| l.resource_type.as_str()).collect();
    Some(Diagnostic::new(
        DiagnosticKind::IdentityConflict,
        key.to_string(),
        format!(
            "{} live resources share this key ({}), comparing {}",
            group.len(),
            types.join(", "),
            winner.id
        ),
    ))
}

/// A placeholder shadowed by an export of the same type is expected and
/// not a conflict.
fn descriptor_collision(key: &ResourceKey, group: &[&ResourceDescriptor]) -> Option<Diagnostic> {
    let (winner, rest) = group.split_first()?;
    let rivals: Vec<&&ResourceDescriptor> = rest
        .iter()
        .filter(|d| {
            !(d.source_kind == SourceKind::Synthesized
                && same_type(
                    d.identity.resource_type.as_deref(),
                    winner.identity.resource_type.as_deref(),
                ))
        })
        .collect();
    if rivals.is_empty() {
        return None;
    }
    let types: Vec<&str> = std::iter::once(winner)
        .chain(rivals)
        .map(|d| d.identity.type_or_unknown())
        .collect();
    Some(Diagnostic::new(
        DiagnosticKind::IdentityConflict,
        key.to_string(),
        format!(
            "{} declarations share this key ({}), comparing the {} one",
            types.len(),
            types.join(", "),
            winner.identity.type_or_unknown()
        ),
    ))
}

fn removed_pass(
    index: &BaselineIndex,
    live: &BTreeMap<ResourceKey, &LiveResourceSummary>,
    descriptors: &BTreeMap<ResourceKey, &ResourceDescriptor>,
    listing_available: bool,
    entries: &mut BTreeMap<ResourceKey, Classification>,
) {
    let verdict = if listing_available {
        Verdict::Removed
    } else {
        Verdict::NotExported
    };
    for (key, baseline) in index.iter() {
        if live.contains_key(key) || descriptors.contains_key(key) {
            continue;
        }
        log::debug!("{key}: {verdict}");
        let mut classification = Classification::new(baseline.identity.clone(), verdict);
        classification.baseline = Some(baseline.clone());
        entries.insert(key.clone(), classification);
    }
}

fn descriptor_pass(
    index: &BaselineIndex,
    live: &BTreeMap<ResourceKey, &LiveResourceSummary>,
    descriptors: &BTreeMap<ResourceKey, &ResourceDescriptor>,
    entries: &mut BTreeMap<ResourceKey, Classification>,
) {
    for (key, descriptor) in descriptors {
        let baseline = index.get(key);
        let mut classification = match baseline {
            None => Classification::new(descriptor.identity.clone(), Verdict::Added),
            Some(entry) if diff::equivalent(&entry.raw_text, &descriptor.raw_text) => {
                Classification::new(descriptor.identity.clone(), Verdict::Unchanged)
            }
            Some(entry) => {
                let mut changed =
                    Classification::new(descriptor.identity.clone(), Verdict::Changed);
                changed.diff = Some(diff::unified_diff(
                    &entry.raw_text,
                    &descriptor.raw_text,
                    &entry.file_path.display().to_string(),
                    "live",
                ));
                changed
            }
        };
        log::debug!("{key}: {}", classification.verdict);
        classification.baseline = baseline.cloned();
        classification.descriptor = Some((*descriptor).clone());
        classification.live = live.get(key).map(|l| (*l).clone());
        entries.insert(key.clone(), classification);
    }
}

fn not_exported_pass(
    index: &BaselineIndex,
    live: &BTreeMap<ResourceKey, &LiveResourceSummary>,
    descriptors: &BTreeMap<ResourceKey, &ResourceDescriptor>,
    entries: &mut BTreeMap<ResourceKey, Classification>,
) {
    for (key, summary) in live {
        if descriptors.contains_key(key) {
            continue;
        }
        log::debug!("{key}: listed but not exported");
        let mut classification = Classification::new(summary.identity(), Verdict::NotExported);
        classification.baseline = index.get(key).cloned();
        classification.live = Some((*summary).clone());
        entries.insert(key.clone(), classification);
    }
}
