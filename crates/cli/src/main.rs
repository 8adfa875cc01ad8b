use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use innervoice_core::{FailureRecord, SourceRow};
use kimi_client::{KimiClient, KimiConfig};
use orchestrator::{sink, BatchRunner, CheckpointStore, ResultSink};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "innervoice.toml";
const API_KEY_ENV: &str = "KIMI_API_KEY";

#[derive(Parser)]
#[command(name = "innervoice")]
#[command(about = "Batch generator of first-person inner-monologue narrations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter the source dataset, write the cache, and generate
    Run,
    /// Re-process the previous run's failures, leaving the checkpoint alone
    Retry,
    /// Continue an interrupted full run from the cache and checkpoint
    Resume,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    model: ModelSection,
    run: RunSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct ModelSection {
    base_url: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct RunSection {
    concurrency: usize,
    selection_weight: u32,
    source_file: PathBuf,
    cache_file: PathBuf,
    output_file: PathBuf,
    failure_file: PathBuf,
    checkpoint_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelSection::default(),
            run: RunSection::default(),
        }
    }
}

impl Default for ModelSection {
    fn default() -> Self {
        let defaults = KimiConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            temperature: defaults.temperature,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            concurrency: orchestrator::runner::DEFAULT_CONCURRENCY,
            selection_weight: 3,
            source_file: PathBuf::from("affirmations.csv"),
            cache_file: PathBuf::from("cache.csv"),
            output_file: PathBuf::from("narrations.csv"),
            failure_file: PathBuf::from("failures.csv"),
            checkpoint_file: PathBuf::from("checkpoint.txt"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    init_tracing();

    let client = build_client(&config)?;

    match cli.command {
        Some(Commands::Run) => full_run(&config, &client).await,
        Some(Commands::Retry) => retry(&config, &client).await,
        Some(Commands::Resume) => resume(&config, &client).await,
        None => interactive(&config, &client).await,
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}

fn build_client(config: &AppConfig) -> Result<KimiClient> {
    let api_key = std::env::var(API_KEY_ENV)
        .with_context(|| format!("{} is not set (put it in the environment or a .env file)", API_KEY_ENV))?;

    let client = KimiClient::new(KimiConfig {
        base_url: config.model.base_url.clone(),
        api_key,
        model: config.model.model.clone(),
        temperature: config.model.temperature,
        timeout: Duration::from_secs(config.model.timeout_secs),
    })?;

    Ok(client)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "innervoice=info,orchestrator=info,kimi_client=info".into()
            }),
        )
        .init();
}

async fn interactive(config: &AppConfig, client: &KimiClient) -> Result<()> {
    // The menu re-prompts on invalid input instead of exiting.
    loop {
        println!();
        println!("Select a mode:");
        println!("  0. Exit");
        println!("  1. Full run (filter source dataset, write cache, generate)");
        println!("  2. Retry failed inputs (reads the failure table)");
        println!("  3. Resume an interrupted run (reads the cache)");
        print!("Enter 0, 1, 2 or 3: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        match line.trim() {
            "0" => return Ok(()),
            "1" => return full_run(config, client).await,
            "2" => return retry(config, client).await,
            "3" => return resume(config, client).await,
            other => println!("Invalid input {:?}, expected 0, 1, 2 or 3.", other),
        }
    }
}

/// Mode 1: filter the source dataset, stage it in the cache so a later resume
/// sees the same ordering, then generate without bypass.
async fn full_run(config: &AppConfig, client: &KimiClient) -> Result<()> {
    let rows: Vec<SourceRow> = sink::read_rows(&config.run.source_file)
        .await
        .with_context(|| {
            format!(
                "Failed to read source dataset {}",
                config.run.source_file.display()
            )
        })?;

    let selected: Vec<SourceRow> = rows
        .into_iter()
        .filter(|row| row.is_selected(config.run.selection_weight))
        .collect();

    sink::write_rows(&config.run.cache_file, &selected).await?;
    info!(
        selected = selected.len(),
        cache = %config.run.cache_file.display(),
        "Source dataset filtered and staged"
    );
    println!("{} affirmations selected.", selected.len());

    let affirmations: Vec<String> = selected.into_iter().map(|row| row.affirmation).collect();
    execute(config, client, &affirmations, false).await
}

/// Mode 2: re-process the previous run's failures. The checkpoint is bypassed
/// so an isolated retry can never pollute the main resumption state.
async fn retry(config: &AppConfig, client: &KimiClient) -> Result<()> {
    if !config.run.failure_file.exists() {
        println!("No failure table found; every input has already succeeded.");
        return Ok(());
    }

    let failures: Vec<FailureRecord> = sink::read_rows(&config.run.failure_file).await?;
    let affirmations: Vec<String> = failures.into_iter().map(|f| f.affirmation).collect();
    println!("Retrying {} failed affirmations.", affirmations.len());

    execute(config, client, &affirmations, true).await
}

/// Mode 3: continue an interrupted full run from the staged cache.
async fn resume(config: &AppConfig, client: &KimiClient) -> Result<()> {
    if !config.run.cache_file.exists() {
        println!(
            "No cache found at {}; start with a full run.",
            config.run.cache_file.display()
        );
        return Ok(());
    }

    let rows: Vec<SourceRow> = sink::read_rows(&config.run.cache_file).await?;
    let store = CheckpointStore::new(&config.run.checkpoint_file);
    let completed = store.load().await?;
    if completed.len() >= rows.len() {
        println!("All cached inputs are already complete; nothing to resume.");
        return Ok(());
    }

    let affirmations: Vec<String> = rows.into_iter().map(|row| row.affirmation).collect();
    execute(config, client, &affirmations, false).await
}

async fn execute(
    config: &AppConfig,
    client: &KimiClient,
    affirmations: &[String],
    bypass: bool,
) -> Result<()> {
    let store = CheckpointStore::new(&config.run.checkpoint_file);
    let runner = BatchRunner::new(client, &store, config.run.concurrency);
    let outcome = runner.run(affirmations, 0, bypass).await?;

    let result_sink = ResultSink::new(&config.run.output_file, &config.run.failure_file);
    result_sink.append_records(&outcome.records).await?;
    result_sink.replace_failures(&outcome.failures).await?;

    println!(
        "Run finished: {} succeeded, {} failed.",
        outcome.records.len(),
        outcome.failures.len()
    );

    Ok(())
}
