//! Descriptor splitter.
//!
//! Decomposes a block of declarative source holding many concatenated
//! declarations into one isolated text span per declaration. The scan is a
//! fold over lines with two explicit states; nothing about a declaration's
//! body is validated here.

use crate::header::{self, DeclarationHeader};
use crate::identity::ResourceIdentity;
use std::collections::BTreeMap;

/// One isolated declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub header: DeclarationHeader,
    /// Verbatim text from the header line up to the next header, trimmed
    pub text: String,
}

impl Declaration {
    /// Identity of the declared resource.
    ///
    /// The name is the literal `name:` property when there is one, otherwise
    /// the symbolic name.
    pub fn identity(&self) -> ResourceIdentity {
        let name = header::declared_name(&self.text)
            .unwrap_or_else(|| self.header.symbolic_name.clone());
        ResourceIdentity::new(name, &self.header.resource_type)
    }
}

/// Declarations keyed by symbolic name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResult {
    pub declarations: BTreeMap<String, Declaration>,
    /// Symbolic names seen more than once; the last occurrence was kept
    pub duplicates: Vec<String>,
}

impl SplitResult {
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn get(&self, symbolic_name: &str) -> Option<&Declaration> {
        self.declarations.get(symbolic_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    fn insert(&mut self, declaration: Declaration) {
        let symbol = declaration.header.symbolic_name.clone();
        if self.declarations.insert(symbol.clone(), declaration).is_some() {
            log::warn!("Duplicate declaration '{symbol}', keeping the last one");
            self.duplicates.push(symbol);
        }
    }
}

enum SplitState {
    Idle,
    Accumulating {
        header: DeclarationHeader,
        buffer: String,
    },
}

impl SplitState {
    fn flush(self, result: &mut SplitResult) {
        if let SplitState::Accumulating { header, buffer } = self {
            result.insert(Declaration {
                header,
                text: buffer.trim().to_string(),
            });
        }
    }
}

/// Split concatenated declarations into per-declaration text.
///
/// Content before the first header (parameters, `targetScope`) is ignored.
/// Anything after the last header, including a truncated tail, stays part of
/// the last declaration. Input without any header yields an empty result.
pub fn split_declarations(text: &str) -> SplitResult {
    let (state, mut result) = text.lines().fold(
        (SplitState::Idle, SplitResult::default()),
        |(state, mut result), line| {
            let next = match header::parse_header(line) {
                Some(header) => {
                    state.flush(&mut result);
                    SplitState::Accumulating {
                        header,
                        buffer: format!("{line}\n"),
                    }
                }
                None => match state {
                    SplitState::Idle => SplitState::Idle,
                    SplitState::Accumulating { header, mut buffer } => {
                        buffer.push_str(line);
                        buffer.push('\n');
                        SplitState::Accumulating { header, buffer }
                    }
                },
            };
            (next, result)
        },
    );
    state.flush(&mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const VNET: &str = "resource vnetA 'Microsoft.Network/virtualNetworks@2023-04-01' = {\n  name: 'vnetA'\n  location: 'westeurope'\n}";
    const SQL: &str = "resource sqlX 'Microsoft.Sql/servers@2022-05-01-preview' = {\n  name: 'sqlX'\n  location: 'westeurope'\n}";
    const VM: &str = "resource vm_main 'Microsoft.Compute/virtualMachines@2023-03-01' = {\n  name: 'vm-main'\n}";

    #[test]
    fn test_empty_input() {
        assert!(split_declarations("").is_empty());
    }

    #[test]
    fn test_no_headers_is_empty() {
        let result = split_declarations("param location string\n\n// nothing here\n");
        assert!(result.is_empty());
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn test_round_trip_of_concatenated_declarations() {
        let doc = format!("param location string = 'westeurope'\n\n{VNET}\n\n{SQL}\n{VM}\n");
        let result = split_declarations(&doc);

        assert_eq!(result.len(), 3);
        assert_eq!(result.get("vnetA").unwrap().text, VNET);
        assert_eq!(result.get("sqlX").unwrap().text, SQL);
        assert_eq!(result.get("vm_main").unwrap().text, VM);
    }

    #[test]
    fn test_header_without_body() {
        let result = split_declarations("resource lonely 'A.B/c@1'");
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("lonely").unwrap().text, "resource lonely 'A.B/c@1'");
    }

    #[test]
    fn test_truncated_tail_stays_in_last_declaration() {
        let doc = format!("{VNET}\nresource broken 'A.B/c@1' = {{\n  name: 'broken'\n  properties: {{\n    garbage ::: ");
        let result = split_declarations(&doc);
        assert_eq!(result.len(), 2);
        assert!(result.get("broken").unwrap().text.ends_with("garbage :::"));
        assert_eq!(result.get("vnetA").unwrap().text, VNET);
    }

    #[test]
    fn test_crlf_input() {
        let doc = VNET.replace('\n', "\r\n");
        let result = split_declarations(&doc);
        assert_eq!(result.len(), 1);
        assert!(result.get("vnetA").unwrap().text.contains("name: 'vnetA'"));
    }

    #[test]
    fn test_duplicate_symbol_last_wins() {
        let second = VNET.replace("westeurope", "northeurope");
        let doc = format!("{VNET}\n{second}");
        let result = split_declarations(&doc);
        assert_eq!(result.len(), 1);
        assert_eq!(result.duplicates, vec!["vnetA".to_string()]);
        assert!(result.get("vnetA").unwrap().text.contains("northeurope"));
    }

    #[test]
    fn test_identity_prefers_name_literal() {
        let result = split_declarations(VM);
        let identity = result.get("vm_main").unwrap().identity();
        assert_eq!(identity.name, "vm-main");
        assert_eq!(
            identity.resource_type.as_deref(),
            Some("Microsoft.Compute/virtualMachines")
        );

        let result = split_declarations("resource sym 'A.B/c@1' = {\n  name: nameParam\n}");
        assert_eq!(result.get("sym").unwrap().identity().name, "sym");
    }
}
