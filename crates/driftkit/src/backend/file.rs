//! Offline exporter reading a previously saved export.
//!
//! Expected inputs:
//! - a listing file as printed by `az resource list --output json`
//! - a template file as printed by `az group export`
//! - optionally, a file holding the exporter's warnings
//! - optionally, a directory of single-resource exports named after the
//!   last segment of each resource id (`<name>.json`)

use crate::backend::az::parse_listing;
use crate::backend::{ExportOutput, RemoteExporter};
use crate::error::{Error, Result};
use crate::types::LiveResourceSummary;
use std::fs;
use std::path::PathBuf;

/// Exporter backed by files on disk.
#[derive(Debug, Clone)]
pub struct FileExporter {
    listing: PathBuf,
    template: PathBuf,
    warnings: Option<PathBuf>,
    resource_dir: Option<PathBuf>,
}

impl FileExporter {
    pub fn new(listing: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            listing: listing.into(),
            template: template.into(),
            warnings: None,
            resource_dir: None,
        }
    }

    pub fn with_warnings(mut self, warnings: impl Into<PathBuf>) -> Self {
        self.warnings = Some(warnings.into());
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }
}

impl RemoteExporter for FileExporter {
    fn list_resources(&self, _env: &str) -> Result<Vec<LiveResourceSummary>> {
        parse_listing(&fs::read_to_string(&self.listing)?)
    }

    fn export_all(&self, _env: &str) -> Result<ExportOutput> {
        let template = fs::read_to_string(&self.template)?;
        let diagnostics = match &self.warnings {
            Some(path) => fs::read_to_string(path)?,
            None => String::new(),
        };
        Ok(ExportOutput {
            template,
            diagnostics,
        })
    }

    fn export_one(&self, resource_id: &str) -> Result<String> {
        let not_found = || Error::NotFound {
            name: resource_id.to_string(),
        };
        let dir = self.resource_dir.as_ref().ok_or_else(not_found)?;
        let name = resource_id
            .rsplit('/')
            .find(|s| !s.is_empty())
            .ok_or_else(not_found)?;
        let path = dir.join(format!("{name}.json"));
        if !path.is_file() {
            return Err(not_found());
        }
        Ok(fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_listing_template_and_warnings() {
        let temp = TempDir::new().unwrap();
        let listing = temp.path().join("listing.json");
        let template = temp.path().join("template.json");
        let warnings = temp.path().join("warnings.txt");
        fs::write(
            &listing,
            r#"[{"name":"vnetA","type":"Microsoft.Network/virtualNetworks","id":"/x/vnetA"}]"#,
        )
        .unwrap();
        fs::write(&template, "{}").unwrap();
        fs::write(&warnings, "Could not get resources of the type 'A.B/c'.").unwrap();

        let exporter = FileExporter::new(&listing, &template).with_warnings(&warnings);
        assert_eq!(exporter.list_resources("rg").unwrap().len(), 1);

        let export = exporter.export_all("rg").unwrap();
        assert_eq!(export.template, "{}");
        assert!(export.diagnostics.contains("A.B/c"));
    }

    #[test]
    fn test_export_one_from_resource_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("sqlX.json"), "{\"resources\":[]}").unwrap();

        let exporter = FileExporter::new("unused", "unused").with_resource_dir(temp.path());
        let body = exporter
            .export_one("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/sqlX")
            .unwrap();
        assert!(body.contains("resources"));

        let err = exporter.export_one("/x/missing").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_export_one_without_resource_dir() {
        let exporter = FileExporter::new("unused", "unused");
        assert!(exporter.export_one("/x/y").is_err());
    }
}
