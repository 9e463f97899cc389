//! Iterative deep-research agent - CLI entry point

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use research::cli::{Cli, Command, OutputFormat};
use research::config::Config;
use research::domain::Question;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: unknown log-level '{other}', defaulting to INFO");
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!(?level, "logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("failed to set up logging")?;

    let config = Config::load(cli.config.as_ref()).context("failed to load configuration")?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Run { question, max_steps, token_budget, format }) => {
            cmd_run(&config, question, max_steps, token_budget, format).await
        }
        None => cmd_config(&config),
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

/// Runs a research question to completion.
///
/// The research core only defines [`research::llm::LlmClient`],
/// [`research::search::SearchProvider`], and [`research::scraper::Scraper`]
/// as consumed capabilities (see `research::lib` docs) — it never prompts a
/// model or calls a search/scrape backend itself. A production deployment
/// supplies real implementations of these traits; this CLI, lacking one,
/// validates configuration and reports what it would otherwise need.
async fn cmd_run(
    config: &Config,
    question: String,
    max_steps: Option<u32>,
    token_budget: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    config.llm.check_api_key().context("LLM is not configured")?;

    let mut research_config = config.research.clone();
    if let Some(max_steps) = max_steps {
        research_config.max_steps = max_steps;
    }
    if let Some(token_budget) = token_budget {
        research_config.token_budget = token_budget;
    }

    let _question = Question::new(question, research_config);

    eprintln!(
        "No LlmClient/SearchProvider/Scraper implementation is linked into this binary. \
         Embed the `research` library in an application that supplies those three traits \
         (see research::orchestrator::RunDependencies) to run this question for real."
    );
    match format {
        OutputFormat::Json => println!("{{\"error\":\"no collaborators configured\"}}"),
        OutputFormat::Text => println!("Configuration valid; provider: {}", config.llm.provider),
    }

    Ok(())
}
