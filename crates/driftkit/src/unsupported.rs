//! Unsupported resource resolution.
//!
//! The exporter and the decompiler both name the resource types they refuse
//! to handle in their diagnostics. Instances of those types are enumerated
//! directly and given a placeholder declaration, so they stay visible to the
//! classifier instead of silently disappearing.

use crate::backend::RemoteExporter;
use crate::header::symbolic_name_for;
use crate::identity::ResourceIdentity;
use crate::types::{Diagnostic, DiagnosticKind, LiveResourceSummary, ResourceDescriptor};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// API version written into placeholder headers.
pub const PLACEHOLDER_API_VERSION: &str = "unknown";

/// First line of every synthesized placeholder.
pub const PLACEHOLDER_MARKER: &str = "// UNSUPPORTED:";

static UNSUPPORTED_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\btype\s+['"](?P<type>[A-Za-z0-9.]+/[A-Za-z0-9./]+)['"]"#)
        .expect("unsupported type rule is a valid regex")
});

/// Collect the resource types named as unsupported in tool diagnostics.
///
/// Recognises mentions like `Could not get resources of the type
/// 'Microsoft.Web/sites/slots'` and `resource type "Microsoft.X/y" is not
/// supported`.
pub fn harvest_unsupported_types(diagnostics: &str) -> BTreeSet<String> {
    UNSUPPORTED_TYPE_RE
        .captures_iter(diagnostics)
        .map(|caps| caps["type"].trim_end_matches(['.', '/']).to_string())
        .collect()
}

/// Command a human should run to inspect every instance of a type.
pub fn inspect_type_command(env: &str, resource_type: &str) -> String {
    format!("az resource list --resource-group {env} --resource-type {resource_type} --output json")
}

/// Command a human should run to inspect one resource.
pub fn inspect_resource_command(resource_id: &str) -> String {
    format!("az resource show --ids {resource_id} --output json")
}

/// Build the placeholder declaration for one live instance.
pub fn synthesize_placeholder(resource: &LiveResourceSummary) -> ResourceDescriptor {
    let symbol = symbolic_name_for(&resource.name);
    let location = resource.location.as_deref().unwrap_or("<location>");
    let text = format!(
        "{PLACEHOLDER_MARKER} '{rtype}' cannot be decompiled, review manually.\n\
         // Inspect with: {command}\n\
         resource {symbol} '{rtype}@{PLACEHOLDER_API_VERSION}' = {{\n  \
         name: '{name}'\n  \
         location: '{location}'\n\
         }}",
        rtype = resource.resource_type,
        command = inspect_resource_command(&resource.id),
        name = resource.name,
    );
    ResourceDescriptor::synthesized(
        ResourceIdentity::new(&resource.name, &resource.resource_type),
        text,
    )
    .with_resource_id(&resource.id)
}

/// Placeholders plus the per-type failures met while building them.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub descriptors: Vec<ResourceDescriptor>,
    pub failures: Vec<Diagnostic>,
}

/// Enumerate instances of every unsupported type and synthesize placeholders.
///
/// One type failing to list is recorded and skipped; it never stops the
/// other types from being resolved.
pub fn resolve(
    exporter: &dyn RemoteExporter,
    env: &str,
    types: &BTreeSet<String>,
) -> Resolution {
    let mut resolution = Resolution::default();

    for resource_type in types {
        match exporter.list_resources_of_type(env, resource_type) {
            Ok(instances) => {
                log::debug!(
                    "{} live instance(s) of unsupported type {}",
                    instances.len(),
                    resource_type
                );
                resolution
                    .descriptors
                    .extend(instances.iter().map(synthesize_placeholder));
            }
            Err(e) => {
                log::warn!("Could not list resources of type {resource_type}: {e}");
                resolution.failures.push(Diagnostic::new(
                    DiagnosticKind::PartialExportFailure,
                    resource_type,
                    e.to_string(),
                ));
            }
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExportOutput;
    use crate::error::{Error, Result};
    use crate::header::parse_header;
    use crate::types::SourceKind;

    struct ListingExporter(Vec<LiveResourceSummary>);

    impl RemoteExporter for ListingExporter {
        fn list_resources(&self, _env: &str) -> Result<Vec<LiveResourceSummary>> {
            Ok(self.0.clone())
        }

        fn list_resources_of_type(
            &self,
            _env: &str,
            resource_type: &str,
        ) -> Result<Vec<LiveResourceSummary>> {
            if resource_type == "Microsoft.Broken/type" {
                return Err(Error::PartialExport {
                    message: "listing refused".to_string(),
                });
            }
            Ok(self
                .0
                .iter()
                .filter(|r| r.resource_type == resource_type)
                .cloned()
                .collect())
        }

        fn export_all(&self, _env: &str) -> Result<ExportOutput> {
            Ok(ExportOutput::default())
        }

        fn export_one(&self, _resource_id: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn exotic(name: &str) -> LiveResourceSummary {
        LiveResourceSummary::new(
            name,
            "Microsoft.Something/exotic",
            format!("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Something/exotic/{name}"),
        )
    }

    #[test]
    fn test_harvest_from_export_warnings() {
        let diagnostics = "WARNING: Could not get resources of the type 'Microsoft.Web/sites/slots'. Resources of this type will not be exported.\n\
                           WARNING: Could not get resources of the type 'Microsoft.Something/exotic'. Resources of this type will not be exported.";
        let types = harvest_unsupported_types(diagnostics);
        assert_eq!(
            types.into_iter().collect::<Vec<_>>(),
            vec!["Microsoft.Something/exotic", "Microsoft.Web/sites/slots"]
        );
    }

    #[test]
    fn test_harvest_from_compiler_warnings() {
        let types = harvest_unsupported_types(
            "Warning: resource type \"Microsoft.Preview/things\" is not supported.",
        );
        assert!(types.contains("Microsoft.Preview/things"));
    }

    #[test]
    fn test_harvest_nothing() {
        assert!(harvest_unsupported_types("").is_empty());
        assert!(harvest_unsupported_types("all good").is_empty());
    }

    #[test]
    fn test_placeholder_is_a_recognizable_declaration() {
        let descriptor = synthesize_placeholder(&exotic("ex-1").with_location("westeurope"));
        assert_eq!(descriptor.source_kind, SourceKind::Synthesized);
        assert!(descriptor.raw_text.starts_with(PLACEHOLDER_MARKER));
        assert!(descriptor.raw_text.contains("location: 'westeurope'"));
        assert!(descriptor.raw_text.contains("az resource show --ids"));

        let header = descriptor
            .raw_text
            .lines()
            .find_map(parse_header)
            .unwrap();
        assert_eq!(header.symbolic_name, "ex_1");
        assert_eq!(header.resource_type, "Microsoft.Something/exotic");
    }

    #[test]
    fn test_resolve_every_instance() {
        let exporter = ListingExporter(vec![
            exotic("e1"),
            exotic("e2"),
            exotic("e3"),
            LiveResourceSummary::new("vnetA", "Microsoft.Network/virtualNetworks", "/v"),
        ]);
        let types = BTreeSet::from(["Microsoft.Something/exotic".to_string()]);
        let resolution = resolve(&exporter, "rg", &types);

        assert_eq!(resolution.descriptors.len(), 3);
        assert!(resolution.failures.is_empty());
        assert!(
            resolution
                .descriptors
                .iter()
                .all(|d| d.source_kind == SourceKind::Synthesized && d.resource_id.is_some())
        );
    }

    #[test]
    fn test_resolve_absorbs_type_failure() {
        let exporter = ListingExporter(vec![exotic("e1")]);
        let types = BTreeSet::from([
            "Microsoft.Broken/type".to_string(),
            "Microsoft.Something/exotic".to_string(),
        ]);
        let resolution = resolve(&exporter, "rg", &types);

        assert_eq!(resolution.descriptors.len(), 1);
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].subject, "Microsoft.Broken/type");
    }

    #[test]
    fn test_inspect_type_command() {
        assert_eq!(
            inspect_type_command("rg", "Microsoft.Something/exotic"),
            "az resource list --resource-group rg --resource-type Microsoft.Something/exotic --output json"
        );
    }
}
