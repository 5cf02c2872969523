use clap::Parser;
use instability::cli::commands::BatchOptions;
use instability::cli::{Cli, Commands};
use instability::types::config::Config;
use instability::InstabilityResult;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> InstabilityResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let (config, load_error) = if cli.config.exists() {
        match Config::load(&cli.config) {
            Ok(config) => (config, None),
            Err(e) => (Config::default_config(), Some(e)),
        }
    } else {
        (Config::default_config(), None)
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("instability={}", log_level)
            .parse()
            .unwrap_or_else(|_| "instability=warn".parse().expect("fallback directive is valid")),
    );

    let json = config.general.log_format.eq_ignore_ascii_case("json");
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(filter)
        .init();

    match &load_error {
        Some(e) => tracing::warn!("Invalid configuration {}, using defaults: {}", cli.config.display(), e),
        None => tracing::debug!("Configuration loaded from: {}", cli.config.display()),
    }

    match cli.command.unwrap_or(Commands::Chatbot { model: None }) {
        Commands::Chatbot { model } => {
            instability::cli::interactive::run_chatbot(model, &config).await?;
        }
        Commands::Manual { tool } => {
            instability::cli::commands::manual(tool, &config).await?;
        }
        Commands::Test => {
            instability::cli::commands::test(&config, &cli.config, load_error.as_ref()).await?;
        }
        Commands::Batch {
            format,
            tools,
            interval,
            count,
            output,
            no_color,
        } => {
            let opts = BatchOptions {
                format,
                tools,
                interval: Duration::from_secs(interval),
                count,
                output,
                no_color,
            };
            instability::cli::commands::batch(opts, &config).await?;
        }
        Commands::Init { path } => {
            instability::cli::commands::init(path).await?;
        }
        Commands::Version => {
            instability::cli::commands::version();
        }
    }

    Ok(())
}
