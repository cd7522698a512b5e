use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use driftkit::ReportLayout;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "driftscan")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Detect drift between a Bicep baseline and a live Azure resource group", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <baseline>/driftscan.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare the live environment against the baseline
    Scan(ScanArgs),

    /// List the declarations indexed from a baseline
    Index(IndexArgs),

    /// Split a file of concatenated declarations
    Split(SplitArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Resource group to inspect
    #[arg(short, long)]
    pub env: Option<String>,

    /// Baseline root holding modules/ and existing/
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,

    /// Where the summary, JSON report and aggregated annotations go
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Annotation layout: aggregated or per-resource
    #[arg(long)]
    pub layout: Option<ReportLayout>,

    /// Match resources by name and type instead of name only
    #[arg(long, overrides_with = "no_match_by_type")]
    pub match_by_type: bool,

    #[arg(long, overrides_with = "match_by_type", hide = true)]
    pub no_match_by_type: bool,

    /// Resolve resource types the decompiler cannot represent
    #[arg(long, overrides_with = "no_unsupported")]
    pub unsupported: bool,

    /// Skip unsupported type resolution
    #[arg(long, overrides_with = "unsupported")]
    pub no_unsupported: bool,

    /// Report baseline resources missing from the environment
    #[arg(long, overrides_with = "no_removed")]
    pub removed: bool,

    /// Do not report removed resources
    #[arg(long, overrides_with = "removed")]
    pub no_removed: bool,

    /// Retry resources missing from the bulk export one by one
    #[arg(long, overrides_with = "no_recover")]
    pub recover: bool,

    #[arg(long, overrides_with = "recover", hide = true)]
    pub no_recover: bool,

    /// Timeout for each az/bicep call, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Read a saved export from this directory instead of calling az
    ///
    /// Expects listing.json and template.json (or template.bicep), with
    /// optional warnings.txt and resources/<name>.json.
    #[arg(long, value_name = "DIR")]
    pub offline: Option<PathBuf>,

    /// Print the report without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Print the JSON report instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Exit with status 1 when drift is found
    #[arg(long)]
    pub fail_on_drift: bool,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Baseline root holding modules/ and existing/
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,

    /// Key entries by name and type
    #[arg(long, overrides_with = "no_match_by_type")]
    pub match_by_type: bool,

    #[arg(long, overrides_with = "match_by_type", hide = true)]
    pub no_match_by_type: bool,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// File holding concatenated declarations (`-` for stdin)
    pub file: PathBuf,

    /// Print each declaration's text
    #[arg(long)]
    pub show: bool,
}

/// Resolve a `--flag` / `--no-flag` pair.
pub fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_flags() {
        let cli = Cli::parse_from([
            "driftscan",
            "-vv",
            "scan",
            "--env",
            "rg-prod",
            "--baseline",
            "infra",
            "--match-by-type",
            "--no-unsupported",
            "--layout",
            "per-resource",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.env.as_deref(), Some("rg-prod"));
        assert_eq!(flag_pair(args.match_by_type, args.no_match_by_type), Some(true));
        assert_eq!(flag_pair(args.unsupported, args.no_unsupported), Some(false));
        assert_eq!(flag_pair(args.removed, args.no_removed), None);
        assert_eq!(args.layout, Some(ReportLayout::PerResource));
    }

    #[test]
    fn test_last_flag_of_a_pair_wins() {
        let cli = Cli::parse_from(["driftscan", "scan", "--no-removed", "--removed"]);
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(flag_pair(args.removed, args.no_removed), Some(true));
    }

    #[test]
    fn test_bad_layout_is_rejected() {
        assert!(Cli::try_parse_from(["driftscan", "scan", "--layout", "flat"]).is_err());
    }
}
