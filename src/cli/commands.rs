//! CLI command implementations.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use console::style;
use serde_json::json;

use super::interactive::{print_tool_run, spinner};
use crate::cache::ResultCache;
use crate::llm::{ChatBackend, OllamaClient};
use crate::report::{format_report, OutputFormat};
use crate::tools::{ToolContext, ToolRegistry, ToolRun, ToolRunner};
use crate::types::config::Config;
use crate::{InstabilityError, InstabilityResult};

/// Options of the `batch` command.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub format: OutputFormat,
    pub tools: Vec<String>,
    pub interval: Duration,
    pub count: u32,
    pub output: Option<PathBuf>,
    pub no_color: bool,
}

/// Builds the tool runner described by the configuration.
pub fn build_runner(config: &Config) -> InstabilityResult<ToolRunner> {
    let ctx = ToolContext::new(config.checks.clone())?;
    Ok(ToolRunner::new(ToolRegistry::builtin(), ctx))
}

/// Initializes configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> InstabilityResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join("instability.toml");

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    let config = Config::default_config();
    config.save(&config_path)?;

    println!("Instability initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Install Ollama and pull a model: ollama pull {}", config.llm.model);
    println!("  2. Check the environment: instability test");
    println!("  3. Start chatting: instability chatbot");

    Ok(())
}

/// Lists the tools, runs one, or runs every batch tool.
pub async fn manual(tool: Option<String>, config: &Config) -> InstabilityResult<()> {
    let runner = build_runner(config)?;

    let Some(tool) = tool else {
        println!("{}", style("Available tools:").cyan().bold());
        for t in runner.registry().iter() {
            println!("  {} - {}", style(t.name()).green(), t.description());
        }
        println!();
        println!("Run one with: instability manual <tool>   (or \"all\")");
        return Ok(());
    };

    let names: Vec<&'static str> = if tool.eq_ignore_ascii_case("all") {
        runner.registry().batch_names()
    } else {
        let found = runner.registry().find(&tool).ok_or_else(|| InstabilityError::ToolNotFound {
            name: tool.clone(),
            available: runner.registry().names().join(", "),
        })?;
        vec![found.name()]
    };

    let mut cache = ResultCache::from_config(&config.cache);
    for name in names {
        let run = run_with_spinner(&runner, name, &mut cache).await?;
        print_tool_run(&run);
    }

    Ok(())
}

async fn run_with_spinner(runner: &ToolRunner, name: &str, cache: &mut ResultCache) -> InstabilityResult<ToolRun> {
    let pb = spinner(format!("Running {}...", name));
    let result = runner.run(name, &json!({}), cache).await;
    pb.finish_and_clear();
    result
}

/// Smoke-tests the environment.
///
/// `load_error` is the error from reading `config_path`, when the caller fell
/// back to defaults because of it.
pub async fn test(
    config: &Config,
    config_path: &Path,
    load_error: Option<&InstabilityError>,
) -> InstabilityResult<()> {
    println!("Testing the Instability environment...\n");

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    match load_error {
        Some(e) => {
            println!("✗ Configuration {} is invalid, using defaults", config_path.display());
            issues.push(format!("Configuration {} is invalid: {}", config_path.display(), e));
        }
        None if config_path.exists() => {
            println!("✓ Configuration loaded from {}", config_path.display());
        }
        None => println!("✓ Configuration: defaults ({} not found)", config_path.display()),
    }

    match ResultCache::try_load(
        &config.cache.path,
        config.cache.max_entries,
        config.cache.max_value_bytes,
    ) {
        Ok(cache) if cache.path().exists() => {
            let info = cache.info();
            println!(
                "✓ Cache readable at {} ({} entries, {} bytes)",
                cache.path().display(),
                info.total_entries,
                info.size_bytes
            );
        }
        Ok(cache) => {
            println!("✓ Cache will be created at {}", cache.path().display());
        }
        Err(e) => issues.push(format!("Cache at {} is unusable: {}", config.cache.path.display(), e)),
    }

    let client = OllamaClient::from_config(&config.llm)?;
    match client.list_models().await {
        Ok(models) => {
            println!("✓ {} reachable at {}", client.name(), config.llm.base_url);
            if models.iter().any(|m| model_matches(m, &config.llm.model)) {
                println!("✓ Model {} is installed", config.llm.model);
            } else {
                warnings.push(format!(
                    "Model {} is not installed (run: ollama pull {})",
                    config.llm.model, config.llm.model
                ));
            }
        }
        Err(e) => warnings.push(format!(
            "{} not reachable at {}: {} (slash commands still work)",
            client.name(),
            config.llm.base_url,
            e
        )),
    }

    let runner = build_runner(config)?;
    println!("✓ {} diagnostic tools registered", runner.registry().len());

    let mut cache = ResultCache::from_config(&config.cache);
    let run = run_with_spinner(&runner, "check_internet_connection", &mut cache).await?;
    if run.passed() {
        println!("✓ {}", run.output);
    } else {
        warnings.push(run.output);
    }

    println!();
    if issues.is_empty() && warnings.is_empty() {
        println!("✓ All good! Instability is ready to use.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for warning in &warnings {
                println!("  ⚠ {}", warning);
            }
        }
        if !issues.is_empty() {
            println!("Problems:");
            for issue in &issues {
                println!("  ✗ {}", issue);
            }
            return Err(InstabilityError::other(format!(
                "environment test found {} problem(s)",
                issues.len()
            )));
        }
    }

    Ok(())
}

/// `qwen3:8b` matches itself; `qwen3` also matches `qwen3:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{}:latest", wanted))
}

/// Runs checks non-interactively, `count` times every `interval`.
pub async fn batch(opts: BatchOptions, config: &Config) -> InstabilityResult<()> {
    if opts.no_color {
        console::set_colors_enabled(false);
    }

    let runner = build_runner(config)?;
    let names = select_batch_tools(runner.registry(), &opts.tools)?;
    let mut cache = ResultCache::from_config(&config.cache);

    for pass in 0..opts.count.max(1) {
        tracing::info!(pass = pass + 1, tools = names.len(), "Starting batch pass");

        let mut runs = Vec::with_capacity(names.len());
        for name in &names {
            runs.push(run_with_spinner(&runner, name, &mut cache).await?);
        }

        let report = format_report(&runs, opts.format, opts.no_color);
        println!("{}", report);

        if let Some(path) = &opts.output {
            append_report(path, &report)?;
        }

        if pass + 1 < opts.count {
            tokio::time::sleep(opts.interval).await;
        }
    }

    Ok(())
}

/// Resolves requested tool names; an empty request means every batch tool.
fn select_batch_tools(registry: &ToolRegistry, requested: &[String]) -> InstabilityResult<Vec<&'static str>> {
    if requested.is_empty() {
        return Ok(registry.batch_names());
    }

    requested
        .iter()
        .map(|name| {
            registry
                .find(name.trim())
                .map(|t| t.name())
                .ok_or_else(|| InstabilityError::ToolNotFound {
                    name: name.clone(),
                    available: registry.names().join(", "),
                })
        })
        .collect()
}

fn append_report(path: &Path, report: &str) -> InstabilityResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    // ANSI codes are not wanted in a log file.
    writeln!(file, "{}", console::strip_ansi_codes(report))?;
    tracing::debug!("Report appended to {}", path.display());
    Ok(())
}

/// Shows version.
pub fn version() {
    println!("instability {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Network diagnostics chatbot for the terminal");
}
