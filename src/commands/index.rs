//! `driftscan index`: show what the baseline declares.

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use driftkit::{BaselineIndex, Category, MatchMode};
use std::path::PathBuf;

use crate::Context;
use crate::cli::{IndexArgs, flag_pair};
use crate::config::Config;
use crate::ui;

pub fn run(ctx: &Context, args: IndexArgs) -> Result<()> {
    let hint = args.baseline.clone().unwrap_or_else(|| PathBuf::from("."));
    let (config, _) = Config::discover(ctx.config.as_deref(), Some(&hint))?;
    let mode = match_mode(&args, &config);
    let baseline = args
        .baseline
        .or_else(|| config.baseline_path())
        .unwrap_or(hint);

    let index = BaselineIndex::scan(&baseline, mode)
        .with_context(|| format!("Could not index {}", baseline.display()))?;

    if !ctx.quiet {
        ui::header(&format!("Baseline: {}", baseline.display()));
        for category in Category::all() {
            let entries: Vec<_> = index
                .iter()
                .filter(|(_, e)| e.category == category)
                .collect();
            ui::section(&format!("{category} ({})", entries.len()));
            for (_, entry) in entries {
                let file = entry
                    .file_path
                    .strip_prefix(&baseline)
                    .unwrap_or(&entry.file_path);
                println!(
                    "  {} {} {}",
                    entry.identity.name,
                    entry.identity.type_or_unknown().dimmed(),
                    file.display().to_string().dimmed()
                );
            }
        }
        println!();
    }

    for conflict in &index.conflicts {
        ui::warn(&format!(
            "'{}' in {} is shadowed by {}",
            conflict.key,
            conflict.shadowed.display(),
            conflict.kept.display()
        ));
    }
    for skipped in &index.skipped_files {
        ui::dim(&format!("No declaration in {}", skipped.display()));
    }

    ui::success(&format!("Indexed {}", ui::count_label(index.len(), "declaration")));
    Ok(())
}

/// `--match-by-type`/`--no-match-by-type`, then the config file, then name only.
fn match_mode(args: &IndexArgs, config: &Config) -> MatchMode {
    MatchMode::from_flag(
        flag_pair(args.match_by_type, args.no_match_by_type)
            .or(config.match_by_type)
            .unwrap_or(false),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn index_args(flags: &[&str]) -> IndexArgs {
        let cli = Cli::parse_from(["driftscan", "index"].into_iter().chain(flags.iter().copied()));
        let Command::Index(args) = cli.command else {
            panic!("expected index");
        };
        args
    }

    #[test]
    fn test_match_mode_precedence() {
        let strict = Config {
            match_by_type: Some(true),
            ..Default::default()
        };
        assert_eq!(match_mode(&index_args(&[]), &strict), MatchMode::NameAndType);
        assert_eq!(
            match_mode(&index_args(&["--no-match-by-type"]), &strict),
            MatchMode::NameOnly
        );
        assert_eq!(
            match_mode(&index_args(&["--match-by-type"]), &Config::default()),
            MatchMode::NameAndType
        );
        assert_eq!(match_mode(&index_args(&[]), &Config::default()), MatchMode::NameOnly);
    }
}
