//! Backend abstraction for the remote environment and the decompiler.
//!
//! [`RemoteExporter`] and [`DefinitionCompiler`] are the only seams through
//! which the pipeline touches the outside world, allowing for:
//! - Real CLI execution via `az` and `bicep`
//! - Offline runs against saved exports
//! - Mock implementations for testing

pub mod az;
pub mod bicep;
pub mod file;
pub mod process;

use crate::error::Result;
use crate::types::LiveResourceSummary;

/// Raw output of a whole-environment export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOutput {
    /// Exported template text
    pub template: String,
    /// Warnings emitted by the exporter, e.g. types it refused to export
    pub diagnostics: String,
}

/// Output of one decompilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// Declarative source text, possibly partial
    pub source: String,
    /// Warnings naming unsupported types or resources
    pub diagnostics: String,
}

/// Source of live resource state.
pub trait RemoteExporter {
    /// List every resource the environment reports.
    fn list_resources(&self, env: &str) -> Result<Vec<LiveResourceSummary>>;

    /// List the resources of one type.
    ///
    /// The default filters [`RemoteExporter::list_resources`].
    fn list_resources_of_type(
        &self,
        env: &str,
        resource_type: &str,
    ) -> Result<Vec<LiveResourceSummary>> {
        Ok(self
            .list_resources(env)?
            .into_iter()
            .filter(|r| r.resource_type.eq_ignore_ascii_case(resource_type))
            .collect())
    }

    /// Export the whole environment as one raw document.
    fn export_all(&self, env: &str) -> Result<ExportOutput>;

    /// Export a single resource by provider id.
    fn export_one(&self, resource_id: &str) -> Result<String>;
}

/// Turns raw exported documents into declarative source.
pub trait DefinitionCompiler {
    /// Decompile a raw document. Must tolerate partial input.
    fn compile(&self, raw: &str) -> Result<CompileOutput>;
}

/// Compiler for input that is already declarative source.
pub struct PassthroughCompiler;

impl DefinitionCompiler for PassthroughCompiler {
    fn compile(&self, raw: &str) -> Result<CompileOutput> {
        Ok(CompileOutput {
            source: raw.to_string(),
            diagnostics: String::new(),
        })
    }
}
