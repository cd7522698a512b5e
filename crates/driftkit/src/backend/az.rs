//! Azure CLI exporter using `az` commands.

use crate::backend::process::{self, DEFAULT_TIMEOUT};
use crate::backend::{ExportOutput, RemoteExporter};
use crate::error::{Error, Result};
use crate::types::LiveResourceSummary;
use std::time::Duration;

/// Exporter that executes real `az` commands against a resource group.
pub struct AzCliExporter {
    /// Path to the az executable
    az_path: String,
    timeout: Duration,
}

impl AzCliExporter {
    /// Create a new exporter.
    ///
    /// Returns an error if the Azure CLI is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            az_path: process::find_program("az")?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Use an explicit az executable.
    pub fn with_path(az_path: impl Into<String>) -> Self {
        Self {
            az_path: az_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the time budget for each az call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run_az(&self, args: &[&str], subject: Option<&str>) -> Result<process::CommandOutput> {
        process::run_checked(&self.az_path, args, self.timeout, subject)
    }
}

impl RemoteExporter for AzCliExporter {
    fn list_resources(&self, env: &str) -> Result<Vec<LiveResourceSummary>> {
        let output = self.run_az(
            &["resource", "list", "--resource-group", env, "--output", "json"],
            Some(env),
        )?;
        parse_listing(&output.stdout)
    }

    fn list_resources_of_type(
        &self,
        env: &str,
        resource_type: &str,
    ) -> Result<Vec<LiveResourceSummary>> {
        let output = self.run_az(
            &[
                "resource",
                "list",
                "--resource-group",
                env,
                "--resource-type",
                resource_type,
                "--output",
                "json",
            ],
            Some(resource_type),
        )?;
        parse_listing(&output.stdout)
    }

    fn export_all(&self, env: &str) -> Result<ExportOutput> {
        let output = self.run_az(
            &[
                "group",
                "export",
                "--name",
                env,
                "--skip-all-params",
                "--output",
                "json",
            ],
            Some(env),
        )?;
        Ok(ExportOutput {
            template: output.stdout,
            diagnostics: output.stderr,
        })
    }

    fn export_one(&self, resource_id: &str) -> Result<String> {
        let group = resource_group_from_id(resource_id).ok_or_else(|| {
            Error::Other(format!("no resource group in id {resource_id}"))
        })?;
        let output = self.run_az(
            &[
                "group",
                "export",
                "--name",
                group,
                "--resource-ids",
                resource_id,
                "--skip-all-params",
                "--output",
                "json",
            ],
            Some(resource_id),
        )?;
        Ok(output.stdout)
    }
}

/// Parse the JSON array printed by `az resource list`.
pub fn parse_listing(json: &str) -> Result<Vec<LiveResourceSummary>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

/// Extract the resource group segment of a provider id.
pub fn resource_group_from_id(resource_id: &str) -> Option<&str> {
    let mut segments = resource_id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().filter(|s| !s.is_empty());
        }
    }
    None
}
