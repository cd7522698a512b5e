//! `driftscan scan`: compare a live resource group against the baseline.

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use driftkit::backend::az::AzCliExporter;
use driftkit::backend::bicep::BicepCliCompiler;
use driftkit::backend::file::FileExporter;
use driftkit::backend::{DefinitionCompiler, PassthroughCompiler, RemoteExporter};
use driftkit::backend::process::DEFAULT_TIMEOUT;
use driftkit::report::{self, DriftReport};
use driftkit::{DriftOptions, Pipeline, ReportLayout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Context;
use crate::cli::{ScanArgs, flag_pair};
use crate::config::Config;
use crate::progress::PhaseSpinner;
use crate::ui;

/// Directory under the baseline used when no output dir is configured.
const DEFAULT_OUTPUT_DIR: &str = "drift";

/// Scan settings after merging flags, config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub env: String,
    pub baseline: PathBuf,
    pub output: PathBuf,
    pub layout: ReportLayout,
    pub options: DriftOptions,
    pub recover_individually: bool,
    pub timeout: Duration,
    pub az_path: Option<String>,
    pub bicep_path: Option<String>,
    pub offline: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(args: &ScanArgs, config: &Config) -> Result<Self> {
        let env = args
            .env
            .clone()
            .or_else(|| config.environment.clone())
            .filter(|e| !e.trim().is_empty())
            .context("No environment given; pass --env or set `environment` in driftscan.toml")?;

        let baseline = args
            .baseline
            .clone()
            .or_else(|| config.baseline_path())
            .unwrap_or_else(|| PathBuf::from("."));
        let output = args
            .output
            .clone()
            .or_else(|| config.output_path())
            .unwrap_or_else(|| baseline.join(DEFAULT_OUTPUT_DIR));

        let defaults = DriftOptions::default();
        let options = DriftOptions {
            match_by_type: flag_pair(args.match_by_type, args.no_match_by_type)
                .or(config.match_by_type)
                .unwrap_or(defaults.match_by_type),
            include_unsupported: flag_pair(args.unsupported, args.no_unsupported)
                .or(config.include_unsupported)
                .unwrap_or(defaults.include_unsupported),
            include_removed: flag_pair(args.removed, args.no_removed)
                .or(config.include_removed)
                .unwrap_or(defaults.include_removed),
        };

        Ok(Self {
            env,
            baseline,
            output,
            layout: args.layout.or(config.layout).unwrap_or_default(),
            options,
            recover_individually: flag_pair(args.recover, args.no_recover)
                .or(config.recover_individually)
                .unwrap_or(false),
            timeout: args
                .timeout
                .or(config.timeout_secs)
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
            az_path: config.az_path.clone(),
            bicep_path: config.bicep_path.clone(),
            offline: args.offline.clone(),
        })
    }
}

pub fn run(ctx: &Context, args: ScanArgs) -> Result<bool> {
    let baseline_hint = args.baseline.clone().unwrap_or_else(|| PathBuf::from("."));
    let (config, _) = Config::discover(ctx.config.as_deref(), Some(&baseline_hint))?;
    let settings = Settings::resolve(&args, &config)?;
    log::debug!("Scan settings: {settings:?}");
    if !ctx.quiet && !args.json {
        ui::info(&format!(
            "Scanning {} against {}",
            settings.env,
            settings.baseline.display()
        ));
    }

    let report = scan(&settings, ctx.quiet || args.json)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(ctx, &report);
    }

    if args.dry_run {
        if !ctx.quiet && !args.json {
            ui::dim("Dry run, nothing written");
        }
    } else {
        let written = persist(&report, &settings)?;
        if !ctx.quiet && !args.json {
            for path in &written {
                ui::success(&format!("Wrote {}", path.display()));
            }
        }
    }

    Ok(report.has_drift())
}

/// Run the pipeline and stamp the report.
pub fn scan(settings: &Settings, quiet: bool) -> Result<DriftReport> {
    let (exporter, compiler) = backends(settings)?;
    let pipeline = Pipeline::new(exporter, compiler, settings.options)
        .with_recovery(settings.recover_individually);

    let spinner = PhaseSpinner::new(&settings.env, quiet);
    let outcome = pipeline.run_with_callback(&settings.env, &settings.baseline, Some(&spinner));
    spinner.finish();

    let mut report = outcome
        .with_context(|| format!("Drift scan of {} failed", settings.env))?
        .report;
    report.generated_at = Some(chrono::Utc::now().to_rfc3339());
    Ok(report)
}

/// Write summary, JSON report and annotation files.
pub fn persist(report: &DriftReport, settings: &Settings) -> Result<Vec<PathBuf>> {
    let mut written = report
        .write_summary(&settings.output)
        .with_context(|| format!("Could not write report to {}", settings.output.display()))?;
    let planned = report.plan_files(settings.layout, &settings.output);
    let stale = report::remove_stale(&planned, &settings.output, &settings.baseline)
        .context("Could not clear annotations from a previous run")?;
    for path in &stale {
        log::info!("Removed stale annotation {}", path.display());
    }
    written.extend(report::write_files(&planned).context("Could not write drift annotations")?);
    Ok(written)
}

fn backends(
    settings: &Settings,
) -> Result<(Box<dyn RemoteExporter>, Box<dyn DefinitionCompiler>)> {
    if let Some(dir) = &settings.offline {
        return offline_backends(dir, settings);
    }

    let exporter = match &settings.az_path {
        Some(path) => AzCliExporter::with_path(path),
        None => AzCliExporter::new().context("Azure CLI (az) is required for live scans")?,
    }
    .with_timeout(settings.timeout);

    Ok((Box::new(exporter), Box::new(bicep_compiler(settings)?)))
}

fn bicep_compiler(settings: &Settings) -> Result<BicepCliCompiler> {
    let compiler = match &settings.bicep_path {
        Some(path) => BicepCliCompiler::with_path(path),
        None => BicepCliCompiler::new().context("Bicep CLI (bicep) is required to decompile exports")?,
    };
    Ok(compiler.with_timeout(settings.timeout))
}

/// Backends over a saved export directory.
fn offline_backends(
    dir: &Path,
    settings: &Settings,
) -> Result<(Box<dyn RemoteExporter>, Box<dyn DefinitionCompiler>)> {
    let listing = dir.join("listing.json");
    if !listing.is_file() {
        bail!("Offline export has no listing.json: {}", dir.display());
    }

    let bicep_template = dir.join("template.bicep");
    let json_template = dir.join("template.json");
    let (template, compiler): (PathBuf, Box<dyn DefinitionCompiler>) = if bicep_template.is_file() {
        (bicep_template, Box::new(PassthroughCompiler))
    } else if json_template.is_file() {
        (json_template, Box::new(bicep_compiler(settings)?))
    } else {
        bail!(
            "Offline export has neither template.bicep nor template.json: {}",
            dir.display()
        );
    };

    let mut exporter = FileExporter::new(listing, template);
    let warnings = dir.join("warnings.txt");
    if warnings.is_file() {
        exporter = exporter.with_warnings(warnings);
    }
    let resources = dir.join("resources");
    if resources.is_dir() {
        exporter = exporter.with_resource_dir(resources);
    }
    log::info!("Reading saved export from {}", dir.display());
    Ok((Box::new(exporter), compiler))
}

fn print_report(ctx: &Context, report: &DriftReport) {
    if !ctx.quiet {
        ui::header(&format!("Drift: {}", report.environment));
        for (title, items) in report.sections() {
            if items.is_empty() {
                continue;
            }
            ui::section(&format!("{title} ({})", items.len()));
            for item in items {
                println!(
                    "  {} {} {}",
                    ui::section_marker(title),
                    item.name,
                    item.resource_type.as_deref().unwrap_or("unknown").dimmed()
                );
            }
        }
        println!();
        ui::kv("Unchanged", &report.unchanged_count.to_string());

        if !report.commands.is_empty() {
            ui::section("Inspect manually");
            for command in &report.commands {
                ui::dim(command);
            }
        }
        for diagnostic in &report.diagnostics {
            ui::warn(&diagnostic.to_string());
        }
        println!();
    }

    let drifted = report.sections().iter().map(|(_, items)| items.len()).sum::<usize>();
    if report.has_drift() {
        ui::warn(&format!("Drift detected: {}", ui::count_label(drifted, "finding")));
    } else {
        ui::success("No drift");
    }
}
