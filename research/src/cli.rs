//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Iterative deep-research agent
#[derive(Parser)]
#[command(name = "research", about = "Iterative deep-research agent core", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Override the logging level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Override the logging level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a research question to completion
    Run {
        /// The question to research
        question: String,

        /// Override the configured step budget
        #[arg(long)]
        max_steps: Option<u32>,

        /// Override the configured token budget
        #[arg(long)]
        token_budget: Option<u64>,

        /// Output format for the final result
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the resolved configuration
    Config,
}

/// Output format for the `run` command's final result.
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: text or json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_command() {
        let cli = Cli::parse_from(["research"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parse_run_with_question() {
        let cli = Cli::parse_from(["research", "run", "What is the capital of France?"]);
        match cli.command {
            Some(Command::Run { question, max_steps, .. }) => {
                assert_eq!(question, "What is the capital of France?");
                assert!(max_steps.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from(["research", "run", "q", "--max-steps", "5", "--token-budget", "1000"]);
        match cli.command {
            Some(Command::Run { max_steps, token_budget, .. }) => {
                assert_eq!(max_steps, Some(5));
                assert_eq!(token_budget, Some(1000));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_config_command() {
        let cli = Cli::parse_from(["research", "config"]);
        assert!(matches!(cli.command, Some(Command::Config)));
    }

    #[test]
    fn output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("bogus".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn parse_with_config_path() {
        let cli = Cli::parse_from(["research", "-c", "/tmp/research.yml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/research.yml")));
    }
}
