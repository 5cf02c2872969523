//! Command-line interface for Instability.

pub mod commands;
pub mod interactive;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::report::OutputFormat;

/// Instability - network diagnostics chatbot backed by a local LLM.
#[derive(Parser, Debug)]
#[command(name = "instability")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "instability.toml", global = true)]
    pub config: PathBuf,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Command to run (defaults to the chatbot).
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the interactive chatbot.
    #[command(visible_alias = "interactive")]
    Chatbot {
        /// Ollama model to use (overrides the configuration).
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the tools, run one, or run all of them ("all").
    Manual {
        /// Tool name, or "all".
        tool: Option<String>,
    },

    /// Smoke-test the environment: config, cache, LLM and tools.
    Test,

    /// Run checks non-interactively and print a report.
    Batch {
        /// Report format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Tools to run (default: every batch tool).
        #[arg(short, long, value_delimiter = ',')]
        tools: Vec<String>,

        /// Seconds between passes.
        #[arg(short, long, default_value_t = 300)]
        interval: u64,

        /// Number of passes.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Append each report to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable colors.
        #[arg(long)]
        no_color: bool,
    },

    /// Write a default configuration in the given directory.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Show version.
    Version,
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
    fn test_interactive_alias() {
        let cli = Cli::try_parse_from(["instability", "interactive", "--model", "phi3"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Chatbot { model: Some(ref m) }) if m == "phi3"));
    }

    #[test]
    fn test_batch_arguments() {
        let cli = Cli::try_parse_from([
            "instability",
            "batch",
            "--format",
            "json",
            "--tools",
            "check_cdns,check_ntp_servers",
            "-n",
            "3",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Batch {
                format, tools, count, ..
            }) => {
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(tools, vec!["check_cdns", "check_ntp_servers"]);
                assert_eq!(count, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_defaults_to_chatbot() {
        let cli = Cli::try_parse_from(["instability"]).unwrap();
        assert!(cli.command.is_none());
    }
}
