//! # driftkit
//!
//! Drift detection between a Bicep baseline and a live Azure resource group.
//!
//! This crate provides functionality for:
//! - Splitting concatenated declarations into per-resource text
//! - Indexing a baseline store (`modules/` and `existing/`)
//! - Classifying every resource as unchanged, added, changed, removed or not
//!   exported, and flagging types the toolchain cannot represent
//! - Assembling a summary, annotation files and remediation commands
//!
//! ## Example
//!
//! ```no_run
//! use driftkit::backend::az::AzCliExporter;
//! use driftkit::backend::bicep::BicepCliCompiler;
//! use driftkit::{DriftOptions, Pipeline};
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(
//!     Box::new(AzCliExporter::new().expect("az not available")),
//!     Box::new(BicepCliCompiler::new().expect("bicep not available")),
//!     DriftOptions::default(),
//! );
//!
//! let outcome = pipeline.run("rg-prod", Path::new("infra")).expect("run failed");
//! for item in &outcome.report.changed {
//!     println!("Changed: {}", item.name);
//! }
//! ```
//!
//! ## Offline runs
//!
//! [`backend::file::FileExporter`] reads a saved listing and template, so the
//! same pipeline can run without network access.

#![warn(clippy::all)]

pub mod backend;
pub mod baseline;
pub mod classifier;
pub mod diff;
pub mod error;
pub mod header;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod splitter;
pub mod types;
pub mod unsupported;

pub use baseline::BaselineIndex;
pub use classifier::{Classification, ClassificationResult, Classifier};
pub use error::{Error, ErrorCategory, Result};
pub use identity::{MatchMode, ResourceIdentity, ResourceKey};
pub use pipeline::{Phase, PhaseCallback, Pipeline, PipelineOutcome};
pub use report::{DriftReport, ReportContext, ReportLayout};
pub use splitter::{SplitResult, split_declarations};
pub use types::{
    BaselineEntry, Category, Diagnostic, DiagnosticKind, DriftOptions, LiveResourceSummary,
    ResourceDescriptor, SourceKind, Verdict,
};
