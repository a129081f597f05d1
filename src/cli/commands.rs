//! CLI command definitions for etch-bench.
//!
//! The CLI stands in for a web front end: it starts a run, follows its
//! progress through the run registry, and browses saved hosts and history.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use crate::battery::ModelReport;
use crate::config::{parse_repeat_mode, BenchConfig};
use crate::llm::{normalize_models, ClientFactory, OllamaClientFactory};
use crate::metrics::{export_metrics, init_metrics};
use crate::runs::{Run, RunOrchestrator, RunRequest, RunStatus, Summary};
use crate::storage::{BenchStore, MemoryStore, SqliteStore};

/// Benchmark Ollama-compatible models on reasoning and coding tasks.
#[derive(Parser)]
#[command(name = "etch-bench")]
#[command(about = "Benchmark Ollama-compatible models on reasoning and coding tasks")]
#[command(version)]
#[command(
    long_about = "etch-bench runs a battery of reasoning questions and sandboxed coding tasks against the models served by an Ollama-compatible host, and keeps a history of the results.\n\nExample usage:\n  etch-bench run --host http://localhost:11434 --model etch:7b"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file.
    #[arg(short, long, env = "ETCH_BENCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database for hosts and history (overrides the configuration).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Keep hosts and history in memory only.
    #[arg(long, global = true)]
    pub no_db: bool,

    /// Print Prometheus metrics after the command finishes.
    #[arg(long, global = true)]
    pub metrics: bool,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the batteries against a host's models and follow progress.
    Run(RunArgs),

    /// List the models served by a host.
    Models(HostArgs),

    /// Manage saved hosts.
    Hosts(HostsArgs),

    /// Browse and export persisted run summaries.
    History(HistoryArgs),

    /// Print the active test battery as YAML.
    Battery,
}

/// Connection arguments shared by commands that talk to a host.
#[derive(Parser, Debug)]
pub struct HostArgs {
    /// Host URL (defaults to the configured host).
    #[arg(long)]
    pub host: Option<String>,

    /// Bearer token for the host.
    #[arg(long, env = "ETCH_BENCH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output JSON instead of text.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `etch-bench run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Model to test; repeat for several. Defaults to every model matching the marker.
    #[arg(short = 'm', long = "model")]
    pub models: Vec<String>,

    /// Number of repetitions requested for each model.
    #[arg(short = 'r', long, default_value = "1")]
    pub repeat: u32,

    /// How repetitions are applied (single, aggregate).
    #[arg(long)]
    pub repeat_mode: Option<String>,

    /// YAML battery replacing the built-in tests.
    #[arg(long)]
    pub battery: Option<PathBuf>,

    /// Also write the summary to this JSON file.
    #[arg(short = 'o', long)]
    pub results_file: Option<PathBuf>,
}

/// Arguments for `etch-bench hosts`.
#[derive(Parser, Debug)]
pub struct HostsArgs {
    #[command(subcommand)]
    pub command: HostsSubcommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum HostsSubcommand {
    /// List saved hosts, most recently used first.
    List,
    /// Save a host.
    Add { url: String },
    /// Forget a saved host.
    Delete { url: String },
}

/// Arguments for `etch-bench history`.
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistorySubcommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum HistorySubcommand {
    /// List persisted runs, newest first.
    List {
        /// Output JSON instead of text.
        #[arg(short = 'j', long)]
        json: bool,
    },
    /// Show one persisted run.
    Show {
        id: i64,
        /// Output the full summary as JSON.
        #[arg(short = 'j', long)]
        json: bool,
    },
    /// Write one persisted run's summary to a JSON file.
    Export {
        id: i64,
        /// Destination file (defaults to etch_run_<id>.json).
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.metrics {
        init_metrics().context("initializing metrics")?;
    }

    let config = load_config(&cli)?;
    let store = open_store(&cli, &config).await?;

    match cli.command {
        Commands::Run(args) => run_bench_command(args, config, store).await?,
        Commands::Models(args) => run_models_command(args, &config, store.as_ref()).await?,
        Commands::Hosts(args) => run_hosts_command(args, store.as_ref()).await?,
        Commands::History(args) => run_history_command(args, store.as_ref()).await?,
        Commands::Battery => {
            print!("{}", serde_yaml::to_string(&config.load_battery()?)?);
        }
    }

    if cli.metrics {
        println!("{}", export_metrics());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<BenchConfig> {
    let mut config = match &cli.config {
        Some(path) => BenchConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BenchConfig::from_env().context("loading configuration from environment")?,
    };
    if let Some(db) = &cli.db {
        config = config.with_database_path(db.clone());
    }
    Ok(config)
}

async fn open_store(cli: &Cli, config: &BenchConfig) -> anyhow::Result<Arc<dyn BenchStore>> {
    if cli.no_db {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = config.database_path.to_string_lossy().to_string();
    let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("opening database {}", path))?;
    Ok(Arc::new(store))
}

// ============================================================================
// Run Command Implementation
// ============================================================================

async fn run_bench_command(
    args: RunArgs,
    mut config: BenchConfig,
    store: Arc<dyn BenchStore>,
) -> anyhow::Result<()> {
    if let Some(mode) = &args.repeat_mode {
        config = config.with_repeat_mode(parse_repeat_mode(mode, "--repeat-mode")?);
    }
    if let Some(battery) = &args.battery {
        config = config.with_battery_file(battery.clone());
    }
    if let Some(results_file) = &args.results_file {
        config = config.with_results_file(results_file.clone());
    }

    let evaluator = config.build_evaluator()?;
    let clients: Arc<dyn ClientFactory> =
        Arc::new(OllamaClientFactory::new(config.request_timeout()));
    let orchestrator =
        RunOrchestrator::new(clients, store, evaluator).with_config(config.orchestrator_config());

    let host = args
        .host
        .host
        .clone()
        .unwrap_or_else(|| config.default_host.clone());
    let mut request = RunRequest::new(host)
        .with_repeat(args.repeat)
        .with_models(args.models.clone());
    if let Some(key) = args.host.api_key.clone().or_else(|| config.api_key.clone()) {
        request = request.with_api_key(key);
    }

    let id = orchestrator.start_run(request)?;
    info!(run_id = %id, "Run started");

    let run = follow_run(&orchestrator, &id, &config, args.host.json).await?;

    match (run.status, run.result) {
        (RunStatus::Done, Some(summary)) => {
            if args.host.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        _ => bail!(
            "run {} failed: {}",
            id,
            run.messages.last().cloned().unwrap_or_default()
        ),
    }
}

/// Poll the registry until the run reaches a terminal state, echoing new
/// messages as they arrive.
async fn follow_run(
    orchestrator: &RunOrchestrator,
    id: &str,
    config: &BenchConfig,
    quiet: bool,
) -> anyhow::Result<Run> {
    let mut printed = 0;
    loop {
        let Some(run) = orchestrator.get_run_status(id) else {
            bail!("run {} disappeared from the registry", id);
        };

        if !quiet {
            for message in &run.messages[printed..] {
                println!("[{:>3}%] {}", run.progress, message);
            }
        }
        printed = run.messages.len();

        if run.status.is_terminal() {
            return Ok(run);
        }
        tokio::time::sleep(config.poll_interval()).await;
    }
}

fn print_summary(summary: &Summary) {
    println!("\n=== etch-bench results: {} ===", summary.host);
    if summary.models_tested.is_empty() {
        println!("No models tested. Available: {}", summary.available_models.join(", "));
        return;
    }

    println!(
        "{:<32} {:>10} {:>8} {:>10}",
        "MODEL", "SMARTNESS", "CODE", "MEAN (s)"
    );
    for report in &summary.models_tested {
        println!(
            "{:<32} {:>9.1}% {:>7.1}% {:>10}",
            report.model,
            report.smartness_score,
            report.code_score,
            format_mean(report)
        );
    }

    let top = &summary.top_summary;
    if let Some(fastest) = &top.fastest {
        println!("Fastest:     {} ({}s)", fastest.model, fastest.mean);
    }
    if let Some(best) = &top.best_smart {
        println!("Smartest:    {} ({}%)", best.model, best.smartness_score);
    }
    if let Some(best) = &top.best_code {
        println!("Best coder:  {} ({}%)", best.model, best.code_score);
    }
    if let Some(id) = summary.record_id {
        println!("Saved as run #{}", id);
    }
}

fn format_mean(report: &ModelReport) -> String {
    report
        .mean_latency()
        .map(|m| format!("{:.4}", m))
        .unwrap_or_else(|| "-".to_string())
}

// ============================================================================
// Models / Hosts / History Commands
// ============================================================================

async fn run_models_command(
    args: HostArgs,
    config: &BenchConfig,
    store: &dyn BenchStore,
) -> anyhow::Result<()> {
    let host = args.host.unwrap_or_else(|| config.default_host.clone());
    let api_key = args.api_key.or_else(|| config.api_key.clone());

    let client = OllamaClientFactory::new(config.request_timeout())
        .connect(&host, api_key.as_deref())?;
    let names = normalize_models(&client.list_models().await?);

    if let Err(e) = store.record_host(&host).await {
        warn!(host = %host, error = %e, "Failed to save host");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in &names {
            let marker = if name.to_lowercase().contains(&config.model_marker.to_lowercase()) {
                "*"
            } else {
                " "
            };
            println!("{} {}", marker, name);
        }
    }
    Ok(())
}

async fn run_hosts_command(args: HostsArgs, store: &dyn BenchStore) -> anyhow::Result<()> {
    match args.command {
        HostsSubcommand::List => {
            for host in store.list_hosts().await? {
                println!("{}  (last used {})", host.url, host.last_used_at.to_rfc3339());
            }
        }
        HostsSubcommand::Add { url } => {
            store.record_host(&url).await?;
            println!("✓ Saved host {}", url);
        }
        HostsSubcommand::Delete { url } => {
            if store.delete_host(&url).await? {
                println!("✓ Deleted host {}", url);
            } else {
                println!("Host {} was not saved", url);
            }
        }
    }
    Ok(())
}

async fn run_history_command(args: HistoryArgs, store: &dyn BenchStore) -> anyhow::Result<()> {
    match args.command {
        HistorySubcommand::List { json } => {
            let records = store.list_run_records().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No runs saved.");
            } else {
                for record in records {
                    println!(
                        "#{:<5} {}  {}",
                        record.id,
                        record.created_at.format("%Y-%m-%d %H:%M:%S"),
                        record.host.unwrap_or_default()
                    );
                }
            }
        }
        HistorySubcommand::Show { id, json } => {
            let Some(summary) = store.fetch_run_record(id).await? else {
                bail!("run #{} not found", id);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        HistorySubcommand::Export { id, output } => {
            let Some(summary) = store.fetch_run_record(id).await? else {
                bail!("run #{} not found", id);
            };
            let path = output.unwrap_or_else(|| PathBuf::from(format!("etch_run_{}.json", id)));
            std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✓ Exported run #{} to {}", id, path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "etch-bench",
            "run",
            "--host",
            "http://gpu:11434",
            "-m",
            "etch:7b",
            "-m",
            "etch:1b",
            "--repeat",
            "3",
            "--no-db",
        ])
        .unwrap();

        assert!(cli.no_db);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.host.host.as_deref(), Some("http://gpu:11434"));
                assert_eq!(args.models, vec!["etch:7b", "etch:1b"]);
                assert_eq!(args.repeat, 3);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_history_export() {
        let cli =
            Cli::try_parse_from(["etch-bench", "history", "export", "7", "-o", "out.json"]).unwrap();
        match cli.command {
            Commands::History(HistoryArgs {
                command: HistorySubcommand::Export { id, output },
            }) => {
                assert_eq!(id, 7);
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected history export"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["etch-bench", "hosts", "list", "--db", "bench.db", "--metrics"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("bench.db")));
        assert!(cli.metrics);
        assert!(matches!(
            cli.command,
            Commands::Hosts(HostsArgs {
                command: HostsSubcommand::List
            })
        ));
    }
}
