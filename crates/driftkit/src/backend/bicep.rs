//! Bicep CLI decompiler.

use crate::backend::process::{self, DEFAULT_TIMEOUT};
use crate::backend::{CompileOutput, DefinitionCompiler};
use crate::error::{Error, Result};
use std::io::Write;
use std::time::Duration;

/// Compiler that runs `bicep decompile` on exported ARM templates.
pub struct BicepCliCompiler {
    /// Path to the bicep executable
    bicep_path: String,
    timeout: Duration,
}

impl BicepCliCompiler {
    /// Create a new compiler.
    ///
    /// Returns an error if the Bicep CLI is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            bicep_path: process::find_program("bicep")?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Use an explicit bicep executable.
    pub fn with_path(bicep_path: impl Into<String>) -> Self {
        Self {
            bicep_path: bicep_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the time budget for each decompilation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl DefinitionCompiler for BicepCliCompiler {
    fn compile(&self, raw: &str) -> Result<CompileOutput> {
        if raw.trim().is_empty() {
            return Ok(CompileOutput::default());
        }

        // bicep only decompiles from a file path
        let mut template = tempfile::Builder::new()
            .prefix("driftscan-")
            .suffix(".json")
            .tempfile()?;
        template.write_all(raw.as_bytes())?;
        template.flush()?;

        let path = template.path().to_string_lossy().to_string();
        let output = process::run_with_timeout(
            &self.bicep_path,
            &["decompile", &path, "--stdout"],
            self.timeout,
        )?;

        interpret_output(output)
    }
}

/// Keep whatever source a failed decompilation still produced.
fn interpret_output(output: process::CommandOutput) -> Result<CompileOutput> {
    if !output.success && output.stdout.trim().is_empty() {
        return Err(Error::from_cli_output("bicep", &output.stderr, None));
    }
    if !output.success {
        log::warn!("bicep decompile exited with errors, keeping partial output");
    }
    Ok(CompileOutput {
        source: output.stdout,
        diagnostics: output.stderr,
    })
}
