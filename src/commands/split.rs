//! `driftscan split`: break concatenated declarations apart.

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use driftkit::{SplitResult, split_declarations};
use std::fs;
use std::io;
use std::path::Path;

use crate::Context;
use crate::cli::SplitArgs;
use crate::ui;

pub fn run(ctx: &Context, args: SplitArgs) -> Result<()> {
    let source = read_source(&args.file)?;
    let split = split_declarations(&source);

    for (line, declaration) in describe(&split).into_iter().zip(split.iter()) {
        println!("{line}");
        if args.show {
            for text_line in declaration.text.lines() {
                println!("    {}", text_line.dimmed());
            }
        }
    }

    for symbol in &split.duplicates {
        ui::warn(&format!("'{symbol}' declared more than once, last one kept"));
    }
    if !ctx.quiet {
        ui::success(&format!("{} found", ui::count_label(split.len(), "declaration")));
    }
    Ok(())
}

/// Read a file, or stdin for `-`.
fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return io::read_to_string(io::stdin()).context("Could not read stdin");
    }
    fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))
}

/// One `symbol  name (type)` line per declaration, in symbol order.
fn describe(split: &SplitResult) -> Vec<String> {
    split
        .iter()
        .map(|d| {
            format!(
                "{}  {} lines  {}",
                d.header.symbolic_name,
                d.text.lines().count(),
                d.identity()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_describe() {
        let split = split_declarations(
            "param location string\n\
             resource b 'Microsoft.Sql/servers@2023-01-01' = {\n  name: 'sql-b'\n}\n\
             resource a 'Microsoft.Network/virtualNetworks@2023-04-01' = {\n}\n",
        );
        assert_eq!(
            describe(&split),
            vec![
                "a  2 lines  a (Microsoft.Network/virtualNetworks)".to_string(),
                "b  3 lines  sql-b (Microsoft.Sql/servers)".to_string(),
            ]
        );
    }

    #[test]
    fn test_read_source_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = read_source(&temp.path().join("nope.bicep")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }
}
