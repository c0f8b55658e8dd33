use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use covmerge::cli::{self, Analysis};

/// Merge .NET code coverage reports into one line and branch view.
#[derive(Parser)]
#[command(name = "covmerge", version, about)]
struct Cli {
    /// Directory relative report patterns are resolved against.
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Directory scanned for source files (default: the base directory).
    #[arg(long, global = true)]
    sources: Option<PathBuf>,

    /// Language of the analysed sources (cs, vbnet).
    #[arg(long, global = true, default_value = "cs")]
    language: String,

    /// TOML file with `sonar.*` properties.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Set a property, e.g. -D sonar.cs.opencover.reportsPaths=**/coverage.xml
    #[arg(short = 'D', long = "define", global = true, value_name = "KEY=VALUE")]
    defines: Vec<String>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show totals of the merged coverage.
    Summary,

    /// List per-file coverage.
    Files {
        /// Sort by coverage rate ascending (show worst files first).
        #[arg(long)]
        sort_by_coverage: bool,
    },

    /// Show line-level coverage for a source file.
    Lines {
        /// The source file path, or a unique trailing part of it.
        source_file: String,

        /// Show only uncovered lines.
        #[arg(long)]
        uncovered: bool,
    },

    /// Print the merged coverage as JSON.
    Export {
        /// Indent the JSON output.
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let analysis = Analysis {
        base_dir: args.base_dir,
        sources: args.sources,
        language: args.language,
        config: args.config,
        defines: args.defines,
    };
    let coverage = cli::aggregate(&analysis)?;

    let output = match args.command {
        Commands::Summary => cli::cmd_summary(&coverage)?,
        Commands::Files { sort_by_coverage } => cli::cmd_files(&coverage, sort_by_coverage)?,
        Commands::Lines {
            source_file,
            uncovered,
        } => cli::cmd_lines(&coverage, &source_file, uncovered)?,
        Commands::Export { pretty } => cli::cmd_export(&coverage, pretty)?,
    };
    print!("{output}");
    Ok(())
}
