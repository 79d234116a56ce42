//! agent-relay CLI - Route inbound requests through cost-aware agents

use agent_relay::{
    config::Config,
    observability::EventLedger,
    optimization::CostOptimizer,
    orchestrator::{InboundRequest, Orchestrator, ProcessResult},
    AgentId, RuleBasedParser,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "agent-relay")]
#[command(about = "Route inbound requests through agents with cost-aware model tiering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (default: ~/.config/agent-relay/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single request
    Process {
        /// Sender address
        #[arg(long)]
        sender: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Message body
        #[arg(long)]
        body: String,
    },

    /// Process a JSON array of requests concurrently
    Batch {
        /// File containing `[{"sender", "subject", "body"}, ...]`
        input: PathBuf,
    },

    /// Run the sample supplier emails and print metrics
    Demo {
        /// Number of timeline events to show
        #[arg(long)]
        timeline_limit: Option<usize>,

        /// Restrict the timeline to one agent and show its metrics
        #[arg(long)]
        agent: Option<String>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show {
        /// Show only one section (provider, optimizer, ledger)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Process {
            sender,
            subject,
            body,
        } => {
            let orchestrator = build_orchestrator(&config_path)?;
            let result = orchestrator
                .process_request(InboundRequest::new(sender, subject, body))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Batch { input } => {
            run_batch(&config_path, input).await?;
        }
        Commands::Demo {
            timeline_limit,
            agent,
        } => {
            run_demo(&config_path, timeline_limit, agent).await?;
        }
        Commands::Config(cmd) => {
            run_config_command(&config_path, cmd)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_from(path.to_path_buf())
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn build_orchestrator(config_path: &Path) -> Result<Orchestrator> {
    let config = load_config(config_path)?;
    let provider = config.build_provider()?;
    info!(provider = provider.name(), "using inference provider");

    let parser = Arc::new(RuleBasedParser::new()?);
    Ok(Orchestrator::new(
        parser.clone(),
        parser,
        CostOptimizer::new(provider, config.optimizer_config()),
        EventLedger::new(config.ledger_config()),
    ))
}

/// Run requests concurrently; failures are reported but do not stop the batch
async fn process_all(orchestrator: &Orchestrator, requests: Vec<InboundRequest>) -> Vec<Option<ProcessResult>> {
    let runs = requests.into_iter().map(|request| async move {
        let subject = request.subject.clone();
        match orchestrator.process_request(request).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(%subject, error = %e, "request failed");
                None
            }
        }
    });
    join_all(runs).await
}

async fn run_batch(config_path: &Path, input: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;
    let requests: Vec<InboundRequest> = serde_json::from_str(&content)?;
    let total = requests.len();

    let orchestrator = build_orchestrator(config_path)?;
    let results = process_all(&orchestrator, requests).await;
    let succeeded: Vec<&ProcessResult> = results.iter().flatten().collect();

    println!("{}", serde_json::to_string_pretty(&succeeded)?);
    println!("\nProcessed {}/{} requests", succeeded.len(), total);
    println!("{}", orchestrator.optimizer_stats());

    Ok(())
}

fn sample_requests() -> Vec<InboundRequest> {
    vec![
        InboundRequest::new(
            "supplier@acme.com",
            "PO #12345 Delivery Update",
            "Dear buyer, Purchase Order #12345 will be delayed by 3 days. New delivery date: December 15, 2024. Quantity: 500 units. We apologize for the inconvenience.",
        ),
        InboundRequest::new(
            "vendor@supplychain.com",
            "Price Change Notification - Order #67890",
            "Please be advised that the price for Part #ABC-123 has increased from $10.00 to $12.00 per unit, effective January 1, 2025. This affects PO #67890. Please confirm acceptance.",
        ),
        InboundRequest::new(
            "manufacturer@global.com",
            "Please acknowledge receipt of PO #99999",
            "We have received your Purchase Order #99999 for 1,000 units. Please confirm receipt so we can proceed with production. Delivery scheduled for March 20, 2025.",
        ),
        InboundRequest::new(
            "distributor@parts.com",
            "Quantity revision for order #11111",
            "Regarding PO #11111, we need to revise the quantity from 250 units to 300 units. All other terms remain the same. Please confirm if this works.",
        ),
    ]
}

async fn run_demo(config_path: &Path, timeline_limit: Option<usize>, agent: Option<String>) -> Result<()> {
    let agent = agent.map(|id| id.parse::<AgentId>()).transpose()?;
    let orchestrator = build_orchestrator(config_path)?;
    let requests = sample_requests();

    println!("=== Processing {} sample requests ===\n", requests.len());
    for request in requests {
        let subject = request.subject.clone();
        match orchestrator.process_request(request).await {
            Ok(result) => {
                println!("{}", subject);
                println!("  Intent:    {}", result.intent);
                println!("  Routed to: {}", result.routed_agent);
                println!("  Action:    {}", result.stage_result.action);
                println!("  PO number: {}", result.entities.po_number.as_deref().unwrap_or("N/A"));
                println!("  Cost:      ${:.4}", result.total_cost);
                println!("  Duration:  {:.2}ms\n", result.duration_ms);
            }
            Err(e) => println!("{}\n  Error: {}\n", subject, e),
        }
    }

    let ledger = orchestrator.ledger();
    let limit = timeline_limit.unwrap_or(ledger.config().default_timeline_limit);
    println!("=== Timeline ===");
    for event in ledger.timeline(limit, agent.map(|id| id.as_str())) {
        println!(
            "{}  {:<15} {:<35} {:<10} ${:.4}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.agent,
            event.action,
            event.outcome,
            event.cost
        );
    }
    println!();

    let names = match agent {
        Some(id) => vec![id.as_str().to_string()],
        None => ledger.agents(),
    };
    for name in &names {
        match ledger.agent_metrics(name) {
            Some(metrics) => println!("{}", metrics),
            None => println!("No events recorded for {}\n", name),
        }
    }

    println!("{}", ledger.global_metrics());
    println!("{}", orchestrator.optimizer_stats());

    println!("=== Agent Statuses ===");
    for status in orchestrator.agent_statuses() {
        println!(
            "{:<22} {:<7} ({} tasks)  cost ${:.4}  success {:.1}%",
            status.name, status.status, status.active_tasks, status.total_cost, status.success_rate
        );
    }

    Ok(())
}

fn run_config_command(config_path: &Path, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            config_init(config_path, force)?;
        }
        ConfigCommands::Show { section } => {
            config_show(config_path, section)?;
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
        }
        ConfigCommands::Validate => {
            let config = Config::load_from(config_path.to_path_buf())?;
            match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => println!("Configuration error: {}", e),
            }
        }
    }
    Ok(())
}

fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(path.to_path_buf())?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("The simulated provider is used by default. To call a real model:");
    println!("  export AGENT_RELAY_PROVIDER=openai");
    println!("  export OPENAI_API_KEY=your_key");

    Ok(())
}

fn config_show(path: &Path, section: Option<String>) -> Result<()> {
    let mut config = Config::load_from(path.to_path_buf())?;
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("***".to_string());
    }

    let display = if let Some(sec) = section {
        match sec.to_lowercase().as_str() {
            "provider" => toml::to_string_pretty(&config.provider)?,
            "optimizer" => toml::to_string_pretty(&config.optimizer)?,
            "ledger" => toml::to_string_pretty(&config.ledger)?,
            _ => {
                println!("Unknown section: {}", sec);
                println!("Available: provider, optimizer, ledger");
                return Ok(());
            }
        }
    } else {
        toml::to_string_pretty(&config)?
    };

    println!("{}", display);

    println!("\n--- Environment Variables ---");
    println!("OPENAI_API_KEY: {}", if std::env::var("OPENAI_API_KEY").is_ok() { "set" } else { "not set" });
    println!(
        "AGENT_RELAY_PROVIDER: {}",
        std::env::var("AGENT_RELAY_PROVIDER").unwrap_or_else(|_| "not set".to_string())
    );

    Ok(())
}
