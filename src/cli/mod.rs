//! CLI module for kdiag
//!
//! Provides commands:
//! - `diagnose`: Run the diagnosis loop over pod metadata
//! - `catalog`: Print the built-in hypothesis catalog

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod catalog;
pub mod diagnose;

/// Kubernetes pod failure diagnosis
#[derive(Parser, Debug)]
#[command(name = "kdiag")]
#[command(about = "Hypothesis-driven failure diagnosis for Kubernetes pods")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Diagnose a failing pod from its symptom metadata
    Diagnose(DiagnoseArgs),
    /// Print the hypothesis catalog
    Catalog,
}

/// Arguments for `kdiag diagnose`
#[derive(clap::Args, Debug)]
pub struct DiagnoseArgs {
    /// Pod metadata JSON file, or `-` for stdin
    #[arg(long, short)]
    pub metadata: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Override the iteration budget
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Override the confidence threshold
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Use the template writer even when a provider is configured
    #[arg(long)]
    pub no_llm: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Diagnose(args)) => diagnose::run(args).await,
        Some(Commands::Catalog) => {
            catalog::run();
            Ok(())
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
