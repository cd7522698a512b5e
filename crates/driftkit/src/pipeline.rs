//! End-to-end drift detection.
//!
//! Drives the backends in a fixed order:
//!
//! ```text
//! list -> export -> compile -> split -> resolve unsupported -> recover -> classify -> assemble
//! ```
//!
//! Every external call that fails is recorded as a [`Diagnostic`] and the run
//! continues with what it has. Only a missing baseline root stops a run.

use crate::backend::{DefinitionCompiler, RemoteExporter};
use crate::baseline::BaselineIndex;
use crate::classifier::{ClassificationResult, Classifier};
use crate::error::{Error, Result};
use crate::identity::{self, ResourceKey};
use crate::report::{DriftReport, ReportContext};
use crate::splitter::split_declarations;
use crate::types::{
    Diagnostic, DiagnosticKind, DriftOptions, LiveResourceSummary, ResourceDescriptor,
};
use crate::unsupported;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Indexing,
    Listing,
    Exporting,
    Compiling,
    Resolving,
    Recovering,
    Classifying,
}

impl Phase {
    /// Short progress message.
    pub fn description(&self) -> &'static str {
        match self {
            Phase::Indexing => "Indexing baseline",
            Phase::Listing => "Listing live resources",
            Phase::Exporting => "Exporting environment",
            Phase::Compiling => "Decompiling export",
            Phase::Resolving => "Resolving unsupported types",
            Phase::Recovering => "Recovering resources individually",
            Phase::Classifying => "Classifying drift",
        }
    }
}

/// Progress notifications from a pipeline run.
pub trait PhaseCallback {
    /// Called when a phase starts.
    fn on_phase(&self, phase: Phase);
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub index: BaselineIndex,
    pub result: ClassificationResult,
    pub report: DriftReport,
}

impl PipelineOutcome {
    /// Failures absorbed along the way.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.report.diagnostics
    }
}

/// Configured drift detection run.
pub struct Pipeline {
    exporter: Box<dyn RemoteExporter>,
    compiler: Box<dyn DefinitionCompiler>,
    options: DriftOptions,
    recover_individually: bool,
}

impl Pipeline {
    pub fn new(
        exporter: Box<dyn RemoteExporter>,
        compiler: Box<dyn DefinitionCompiler>,
        options: DriftOptions,
    ) -> Self {
        Self {
            exporter,
            compiler,
            options,
            recover_individually: false,
        }
    }

    /// Retry listed resources missing from the bulk export one at a time.
    pub fn with_recovery(mut self, recover_individually: bool) -> Self {
        self.recover_individually = recover_individually;
        self
    }

    pub fn options(&self) -> DriftOptions {
        self.options
    }

    /// Run against one environment and baseline.
    pub fn run(&self, env: &str, baseline_root: &Path) -> Result<PipelineOutcome> {
        self.run_with_callback(env, baseline_root, None)
    }

    /// Run with progress notifications.
    pub fn run_with_callback(
        &self,
        env: &str,
        baseline_root: &Path,
        callback: Option<&dyn PhaseCallback>,
    ) -> Result<PipelineOutcome> {
        let notify = |phase: Phase| {
            log::info!("{}", phase.description());
            if let Some(cb) = callback {
                cb.on_phase(phase);
            }
        };
        let mode = self.options.match_mode();
        let mut diagnostics = Vec::new();

        // Checked first so a bad path fails before any remote call
        notify(Phase::Indexing);
        let index = BaselineIndex::scan(baseline_root, mode)?;
        diagnostics.extend(index.conflicts.iter().map(|c| {
            Diagnostic::new(
                DiagnosticKind::IdentityConflict,
                c.key.to_string(),
                format!(
                    "declared in {} and {}, using the latter",
                    c.shadowed.display(),
                    c.kept.display()
                ),
            )
        }));

        notify(Phase::Listing);
        let (listing, listing_available) = match self.exporter.list_resources(env) {
            Ok(listing) => (listing, true),
            Err(e) => {
                log::warn!("Could not list resources in {env}: {e}");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ListingFailure,
                    env,
                    format!("{e}; undescribed baseline resources are reported as not exported"),
                ));
                (Vec::new(), false)
            }
        };

        notify(Phase::Exporting);
        let mut tool_diagnostics = String::new();
        let template = match self.exporter.export_all(env) {
            Ok(export) => {
                tool_diagnostics.push_str(&export.diagnostics);
                export.template
            }
            Err(e) => {
                log::warn!("Export of {env} failed: {e}");
                diagnostics.push(failure(&e, env));
                String::new()
            }
        };

        notify(Phase::Compiling);
        let source = match self.compiler.compile(&template) {
            Ok(compiled) => {
                tool_diagnostics.push('\n');
                tool_diagnostics.push_str(&compiled.diagnostics);
                compiled.source
            }
            Err(e) => {
                log::warn!("Decompiling the export failed: {e}");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::CompileFailure,
                    env,
                    e.to_string(),
                ));
                String::new()
            }
        };

        let unsupported_types = unsupported::harvest_unsupported_types(&tool_diagnostics);
        if !unsupported_types.is_empty() {
            log::info!("{} unsupported resource type(s) reported", unsupported_types.len());
        }

        let split = split_declarations(&source);
        diagnostics.extend(split.duplicates.iter().map(|symbol| {
            Diagnostic::new(
                DiagnosticKind::MalformedDescriptor,
                symbol,
                "declared more than once in the export, keeping the last",
            )
        }));
        let mut descriptors: Vec<ResourceDescriptor> = split
            .iter()
            .map(|declaration| {
                let identity = declaration.identity();
                let descriptor = ResourceDescriptor::exported(identity, &declaration.text);
                match find_listed(&listing, &descriptor) {
                    Some(live) => descriptor.with_resource_id(&live.id),
                    None => descriptor,
                }
            })
            .collect();
        log::debug!("{} declarations in the export", descriptors.len());

        if self.options.include_unsupported && !unsupported_types.is_empty() {
            notify(Phase::Resolving);
            let resolution = unsupported::resolve(self.exporter.as_ref(), env, &unsupported_types);
            descriptors.extend(resolution.descriptors);
            diagnostics.extend(resolution.failures);
        }

        if self.recover_individually {
            notify(Phase::Recovering);
            let recovered =
                self.recover(&listing, &descriptors, &unsupported_types, &mut diagnostics);
            descriptors.extend(recovered);
        }

        notify(Phase::Classifying);
        let result = Classifier::new(self.options)
            .with_listing_available(listing_available)
            .classify(&index, &descriptors, &listing, &unsupported_types);

        let report = DriftReport::assemble(
            &result,
            &ReportContext {
                environment: env.to_string(),
                generated_at: None,
                diagnostics,
            },
        );

        Ok(PipelineOutcome {
            index,
            result,
            report,
        })
    }

    /// Export and compile listed resources the bulk export skipped.
    fn recover(
        &self,
        listing: &[LiveResourceSummary],
        descriptors: &[ResourceDescriptor],
        unsupported_types: &BTreeSet<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<ResourceDescriptor> {
        let mode = self.options.match_mode();
        let described: HashSet<ResourceKey> = descriptors.iter().map(|d| d.key(mode)).collect();

        let mut recovered = Vec::new();
        for live in listing {
            if described.contains(&live.identity().key(mode))
                || identity::type_in(&live.resource_type, unsupported_types)
            {
                continue;
            }
            log::debug!("Recovering {} individually", live.name);
            match self.export_single(live) {
                Ok(descriptor) => recovered.push(descriptor),
                Err(e) => {
                    log::warn!("Could not recover {}: {e}", live.name);
                    diagnostics.push(failure(&e, &live.name));
                }
            }
        }
        recovered
    }

    fn export_single(&self, live: &LiveResourceSummary) -> Result<ResourceDescriptor> {
        let raw = self.exporter.export_one(&live.id)?;
        let compiled = self.compiler.compile(&raw)?;
        let split = split_declarations(&compiled.source);
        let declaration = split
            .iter()
            .find(|d| d.identity().name == live.name)
            .or_else(|| split.iter().next())
            .ok_or_else(|| Error::Compile {
                message: format!("no declaration produced for {}", live.name),
            })?;
        Ok(
            ResourceDescriptor::exported(live.identity(), &declaration.text)
                .with_resource_id(&live.id),
        )
    }
}

fn failure(error: &Error, subject: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::from_category(error.category()),
        subject,
        error.to_string(),
    )
}

/// Listing entry for a descriptor; when names repeat, the same type wins,
/// then the lowest type and id.
fn find_listed<'a>(
    listing: &'a [LiveResourceSummary],
    descriptor: &ResourceDescriptor,
) -> Option<&'a LiveResourceSummary> {
    let wanted = descriptor.identity.resource_type.as_deref();
    listing
        .iter()
        .filter(|l| l.name == descriptor.identity.name)
        .min_by_key(|l| {
            (
                !wanted.is_some_and(|t| t.eq_ignore_ascii_case(&l.resource_type)),
                l.resource_type.to_ascii_lowercase(),
                l.id.clone(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompileOutput, ExportOutput, PassthroughCompiler};
    use crate::types::Verdict;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    const VNET_T: &str = "Microsoft.Network/virtualNetworks";
    const SQL_T: &str = "Microsoft.Sql/servers";
    const VM_T: &str = "Microsoft.Compute/virtualMachines";
    const EXOTIC_T: &str = "Microsoft.Something/exotic";

    fn body(name: &str, resource_type: &str, extra: &str) -> String {
        format!("resource {name} '{resource_type}@2023-01-01' = {{\n  name: '{name}'{extra}\n}}\n")
    }

    #[derive(Default)]
    struct MockExporter {
        listing: Vec<LiveResourceSummary>,
        template: String,
        diagnostics: String,
        single: BTreeMap<String, String>,
        fail_listing: bool,
        fail_export: bool,
    }

    impl RemoteExporter for MockExporter {
        fn list_resources(&self, _env: &str) -> Result<Vec<LiveResourceSummary>> {
            if self.fail_listing {
                return Err(Error::Timeout {
                    program: "az".to_string(),
                    timeout: std::time::Duration::from_secs(1),
                });
            }
            Ok(self.listing.clone())
        }

        fn export_all(&self, _env: &str) -> Result<ExportOutput> {
            if self.fail_export {
                return Err(Error::PartialExport {
                    message: "export refused".to_string(),
                });
            }
            Ok(ExportOutput {
                template: self.template.clone(),
                diagnostics: self.diagnostics.clone(),
            })
        }

        fn export_one(&self, resource_id: &str) -> Result<String> {
            self.single.get(resource_id).cloned().ok_or_else(|| Error::NotFound {
                name: resource_id.to_string(),
            })
        }
    }

    struct FailingCompiler;

    impl DefinitionCompiler for FailingCompiler {
        fn compile(&self, _raw: &str) -> Result<CompileOutput> {
            Err(Error::Compile {
                message: "Error BCP000".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingCallback(RefCell<Vec<Phase>>);

    impl PhaseCallback for RecordingCallback {
        fn on_phase(&self, phase: Phase) {
            self.0.borrow_mut().push(phase);
        }
    }

    fn live(name: &str, resource_type: &str) -> LiveResourceSummary {
        LiveResourceSummary::new(name, resource_type, format!("/rg/{name}"))
    }

    fn baseline() -> TempDir {
        let temp = TempDir::new().unwrap();
        let modules = temp.path().join("modules");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("network.bicep"), body("vnetA", VNET_T, "")).unwrap();
        fs::write(
            modules.join("data.bicep"),
            body("sqlX", SQL_T, "\n  sku: 'Basic'"),
        )
        .unwrap();
        fs::write(modules.join("compute.bicep"), body("vmOld", VM_T, "")).unwrap();
        temp
    }

    fn environment() -> MockExporter {
        MockExporter {
            listing: vec![
                live("vnetA", VNET_T),
                live("sqlX", SQL_T),
                live("e1", EXOTIC_T),
                live("hidden", VM_T),
            ],
            template: format!(
                "param location string\n{}{}",
                body("vnetA", VNET_T, ""),
                body("sqlX", SQL_T, "\n  sku: 'Standard'")
            ),
            diagnostics: format!(
                "WARNING: Could not get resources of the type '{EXOTIC_T}'. Resources of this type will not be exported."
            ),
            ..Default::default()
        }
    }

    fn verdict(outcome: &PipelineOutcome, name: &str) -> Verdict {
        outcome.result.find_by_name(name).unwrap().verdict
    }

    #[test]
    fn test_end_to_end() {
        let temp = baseline();
        let pipeline = Pipeline::new(
            Box::new(environment()),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        );
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        assert_eq!(verdict(&outcome, "vnetA"), Verdict::Unchanged);
        assert_eq!(verdict(&outcome, "sqlX"), Verdict::Changed);
        assert_eq!(verdict(&outcome, "vmOld"), Verdict::Removed);
        assert_eq!(verdict(&outcome, "e1"), Verdict::Added);
        assert_eq!(verdict(&outcome, "hidden"), Verdict::NotExported);
        assert!(outcome.result.find_by_name("e1").unwrap().unsupported);
        assert!(outcome.diagnostics().is_empty());

        let sql = outcome.result.find_by_name("sqlX").unwrap();
        assert_eq!(sql.descriptor.as_ref().unwrap().resource_id.as_deref(), Some("/rg/sqlX"));
        assert_eq!(outcome.report.unsupported.len(), 1);
    }

    #[test]
    fn test_unsupported_disabled() {
        let temp = baseline();
        let options = DriftOptions {
            include_unsupported: false,
            ..Default::default()
        };
        let pipeline = Pipeline::new(Box::new(environment()), Box::new(PassthroughCompiler), options);
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        assert_eq!(verdict(&outcome, "e1"), Verdict::NotExported);
        assert!(outcome.report.unsupported.is_empty());
    }

    #[test]
    fn test_missing_baseline_is_fatal() {
        let temp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            Box::new(environment()),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        );
        let err = pipeline.run("rg", &temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::BaselineNotFound(_)));
    }

    #[test]
    fn test_compile_failure_is_absorbed() {
        let temp = baseline();
        let pipeline = Pipeline::new(
            Box::new(environment()),
            Box::new(FailingCompiler),
            DriftOptions::default(),
        );
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        assert_eq!(outcome.diagnostics().len(), 1);
        assert_eq!(outcome.diagnostics()[0].kind, DiagnosticKind::CompileFailure);
        // listed resources are never reported removed
        assert_eq!(verdict(&outcome, "vnetA"), Verdict::NotExported);
        assert_eq!(verdict(&outcome, "sqlX"), Verdict::NotExported);
        assert_eq!(verdict(&outcome, "vmOld"), Verdict::Removed);
    }

    #[test]
    fn test_listing_and_export_failures_are_absorbed() {
        let temp = baseline();
        let exporter = MockExporter {
            fail_listing: true,
            fail_export: true,
            ..environment()
        };
        let pipeline = Pipeline::new(
            Box::new(exporter),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        );
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        let kinds: Vec<_> = outcome.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::ListingFailure, DiagnosticKind::PartialExportFailure]
        );
        assert!(outcome.report.removed.is_empty());
        assert_eq!(outcome.report.not_exported.len(), 3);
    }

    #[test]
    fn test_failed_listing_never_reports_removed() {
        let temp = baseline();
        let exporter = MockExporter {
            fail_listing: true,
            ..environment()
        };
        let pipeline = Pipeline::new(
            Box::new(exporter),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        );
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        assert_eq!(verdict(&outcome, "vnetA"), Verdict::Unchanged);
        assert_eq!(verdict(&outcome, "sqlX"), Verdict::Changed);
        assert_eq!(verdict(&outcome, "vmOld"), Verdict::NotExported);
        assert!(outcome.report.removed.is_empty());
        assert_eq!(outcome.diagnostics()[0].kind, DiagnosticKind::ListingFailure);
    }

    #[test]
    fn test_shared_names_are_reported() {
        let temp = baseline();
        let mut exporter = environment();
        exporter.listing.push(LiveResourceSummary::new(
            "sqlX",
            "Microsoft.Web/sites",
            "/rg/sites/sqlX",
        ));
        let pipeline = Pipeline::new(
            Box::new(exporter),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        );
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        let sql = outcome.result.find_by_name("sqlX").unwrap();
        assert_eq!(sql.live.as_ref().unwrap().resource_type, SQL_T);
        assert_eq!(sql.descriptor.as_ref().unwrap().resource_id.as_deref(), Some("/rg/sqlX"));
        let conflicts: Vec<_> = outcome
            .diagnostics()
            .iter()
            .filter(|d| d.kind == DiagnosticKind::IdentityConflict)
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].subject, "sqlX");
    }

    #[test]
    fn test_recovery_fills_gaps() {
        let temp = baseline();
        let mut exporter = environment();
        exporter
            .single
            .insert("/rg/hidden".to_string(), body("hidden", VM_T, ""));
        let pipeline = Pipeline::new(
            Box::new(exporter),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        )
        .with_recovery(true);
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        assert_eq!(verdict(&outcome, "hidden"), Verdict::Added);
        // unsupported types are not retried
        assert!(outcome.diagnostics().is_empty());
    }

    #[test]
    fn test_recovery_failure_is_recorded() {
        let temp = baseline();
        let pipeline = Pipeline::new(
            Box::new(environment()),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        )
        .with_recovery(true);
        let outcome = pipeline.run("rg", temp.path()).unwrap();

        assert_eq!(verdict(&outcome, "hidden"), Verdict::NotExported);
        assert_eq!(outcome.diagnostics().len(), 1);
        assert_eq!(outcome.diagnostics()[0].subject, "hidden");
    }

    #[test]
    fn test_phases_are_reported_in_order() {
        let temp = baseline();
        let pipeline = Pipeline::new(
            Box::new(environment()),
            Box::new(PassthroughCompiler),
            DriftOptions::default(),
        );
        let callback = RecordingCallback::default();
        pipeline
            .run_with_callback("rg", temp.path(), Some(&callback))
            .unwrap();

        assert_eq!(
            *callback.0.borrow(),
            vec![
                Phase::Indexing,
                Phase::Listing,
                Phase::Exporting,
                Phase::Compiling,
                Phase::Resolving,
                Phase::Classifying,
            ]
        );
    }

    #[test]
    fn test_strict_mode_end_to_end() {
        let temp = baseline();
        let options = DriftOptions {
            match_by_type: true,
            ..Default::default()
        };
        let pipeline = Pipeline::new(Box::new(environment()), Box::new(PassthroughCompiler), options);
        let outcome = pipeline.run("rg", temp.path()).unwrap();
        assert_eq!(verdict(&outcome, "vnetA"), Verdict::Unchanged);
        assert_eq!(verdict(&outcome, "sqlX"), Verdict::Changed);
    }
}
