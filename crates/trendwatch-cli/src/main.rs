use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use alert_scheduler::{AlertScheduler, SchedulerConfig};
use analysis_orchestrator::{AnalyzeFailure, Orchestrator};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use market_core::{AssetClass, Interval, Period};
use portfolio_model::{
    resolve, FileStore, Group, ResolvedConfig, StoreError, SymbolConfig,
};
use strategy_engine::StrategyRegistry;
use tokio::signal::unix::SignalKind;

mod notifier;
mod provider;

use notifier::TracingNotifier;
use provider::CsvDataProvider;

/// Market-analysis and alerting engine.
#[derive(Parser)]
#[command(name = "trendwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage symbol groups
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Manage symbols within a group
    Symbol {
        #[command(subcommand)]
        action: SymbolCommand,
    },
    /// Query the strategy registry
    Strategy {
        #[command(subcommand)]
        action: StrategyCommand,
    },
    /// Run a one-off analysis for a symbol
    Analyze {
        symbol: String,
        #[arg(long, default_value = "stocks")]
        asset_class: String,
        #[arg(long, default_value = "1d")]
        interval: String,
        #[arg(long, default_value = "1y")]
        period: String,
        /// Strategy name or legacy alias
        #[arg(long, default_value = "default-check-single-timeframe")]
        strategy: String,
    },
    /// Run the periodic alert scheduler until interrupted
    Run,
}

#[derive(Subcommand)]
enum GroupCommand {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List,
    Get {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum SymbolCommand {
    Add {
        group_id: String,
        symbol_key: String,
        symbol: String,
        #[arg(long, default_value = "stocks")]
        asset_class: String,
        #[arg(long, default_value = "1d")]
        interval: String,
        #[arg(long, default_value = "1y")]
        period: String,
        /// Per-symbol strategy override
        #[arg(long)]
        strategy: Option<String>,
    },
    Remove {
        group_id: String,
        symbol_key: String,
    },
    Enable {
        group_id: String,
        symbol_key: String,
    },
    Disable {
        group_id: String,
        symbol_key: String,
    },
}

#[derive(Subcommand)]
enum StrategyCommand {
    /// List registered strategies and aliases
    List,
    /// Print a strategy's parameter template
    GetTemplate { name: String },
}

/// Process-level settings, environment-driven like the rest of the stack.
struct AppConfig {
    data_dir: String,
    csv_dir: String,
}

impl AppConfig {
    fn from_env() -> Self {
        Self {
            data_dir: std::env::var("TRENDWATCH_DATA_DIR")
                .unwrap_or_else(|_| "trendwatch-data".to_string()),
            csv_dir: std::env::var("TRENDWATCH_CSV_DIR")
                .unwrap_or_else(|_| "bars".to_string()),
        }
    }
}

/// CLI error classes mapped onto the exit-code contract.
enum CliError {
    /// Exit 2: bad configuration (unknown strategy, bad parameters, bad ids)
    InvalidConfig(anyhow::Error),
    /// Exit 3: market data unavailable or invalid
    Data(anyhow::Error),
    /// Exit 4: everything else
    Internal(anyhow::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::InvalidConfig(_) => ExitCode::from(2),
            CliError::Data(_) => ExitCode::from(3),
            CliError::Internal(_) => ExitCode::from(4),
        }
    }

    fn message(&self) -> &anyhow::Error {
        match self {
            CliError::InvalidConfig(err) | CliError::Data(err) | CliError::Internal(err) => err,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GroupNotFound(_) => CliError::InvalidConfig(anyhow!(err)),
            other => CliError::Internal(anyhow!(other)),
        }
    }
}

impl From<AnalyzeFailure> for CliError {
    fn from(err: AnalyzeFailure) -> Self {
        match err {
            AnalyzeFailure::ConfigInvalid(_) => CliError::InvalidConfig(anyhow!(err)),
            AnalyzeFailure::DataUnavailable(_) | AnalyzeFailure::DataInvalid(_) => {
                CliError::Data(anyhow!(err))
            }
        }
    }
}

fn parse_arg<T: FromStr>(raw: &str, what: &str) -> Result<T, CliError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| CliError::InvalidConfig(anyhow!("invalid {what} '{raw}': {err}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err.message());
            eprintln!("Error: {:#}", err.message());
            err.exit_code()
        }
    }
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), CliError> {
    let store = Arc::new(FileStore::open(&config.data_dir).map_err(CliError::from)?);
    let registry = Arc::new(StrategyRegistry::with_builtins());

    match cli.command {
        Command::Group { action } => group_command(&store, action),
        Command::Symbol { action } => symbol_command(&store, &registry, action),
        Command::Strategy { action } => strategy_command(&registry, action),
        Command::Analyze {
            symbol,
            asset_class,
            interval,
            period,
            strategy,
        } => {
            analyze_once(
                &config, registry, symbol, asset_class, interval, period, strategy,
            )
            .await
        }
        Command::Run => run_scheduler(&config, store, registry).await,
    }
}

fn group_command(store: &FileStore, action: GroupCommand) -> Result<(), CliError> {
    match action {
        GroupCommand::Create { name, description } => {
            let group = Group::new(name, description);
            store.save_group(&group)?;
            println!("{}", group.id);
        }
        GroupCommand::List => {
            for group in store.load_groups()? {
                println!(
                    "{}  {}  ({} members{})",
                    group.id,
                    group.name,
                    group.members.len(),
                    if group.enabled { "" } else { ", disabled" }
                );
            }
        }
        GroupCommand::Get { id } => {
            let group = store.load_group(&id)?;
            let rendered = serde_json::to_string_pretty(&group)
                .map_err(|err| CliError::Internal(anyhow!(err)))?;
            println!("{rendered}");
        }
        GroupCommand::Update {
            id,
            name,
            description,
            enabled,
        } => {
            let mut group = store.load_group(&id)?;
            if let Some(name) = name {
                group.name = name;
            }
            if let Some(description) = description {
                group.description = description;
            }
            if let Some(enabled) = enabled {
                group.enabled = enabled;
            }
            group.updated_at = chrono::Utc::now();
            store.save_group(&group)?;
            println!("updated {id}");
        }
        GroupCommand::Delete { id } => {
            store.delete_group(&id)?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn symbol_command(
    store: &FileStore,
    registry: &StrategyRegistry,
    action: SymbolCommand,
) -> Result<(), CliError> {
    match action {
        SymbolCommand::Add {
            group_id,
            symbol_key,
            symbol,
            asset_class,
            interval,
            period,
            strategy,
        } => {
            let mut group = store.load_group(&group_id)?;
            let mut member = SymbolConfig::new(
                symbol,
                parse_arg::<AssetClass>(&asset_class, "asset class")?,
                parse_arg::<Interval>(&interval, "interval")?,
                parse_arg::<Period>(&period, "period")?,
            );
            if let Some(strategy) = strategy {
                // Fail fast on unknown strategies instead of at first tick
                registry
                    .get(&strategy)
                    .map_err(|err| CliError::InvalidConfig(anyhow!(err)))?;
                member.strategy_overrides.name = Some(strategy);
            }
            group.upsert_member(symbol_key.clone(), member);
            store.save_group(&group)?;
            println!("added {symbol_key} to {group_id}");
        }
        SymbolCommand::Remove {
            group_id,
            symbol_key,
        } => {
            let mut group = store.load_group(&group_id)?;
            if group.remove_member(&symbol_key).is_none() {
                return Err(CliError::InvalidConfig(anyhow!(
                    "no symbol '{symbol_key}' in group {group_id}"
                )));
            }
            store.save_group(&group)?;
            store.delete_monitor(&group_id, &symbol_key)?;
            println!("removed {symbol_key} from {group_id}");
        }
        SymbolCommand::Enable {
            group_id,
            symbol_key,
        } => set_symbol_enabled(store, &group_id, &symbol_key, true)?,
        SymbolCommand::Disable {
            group_id,
            symbol_key,
        } => set_symbol_enabled(store, &group_id, &symbol_key, false)?,
    }
    Ok(())
}

fn set_symbol_enabled(
    store: &FileStore,
    group_id: &str,
    symbol_key: &str,
    enable: bool,
) -> Result<(), CliError> {
    let mut group = store.load_group(group_id)?;
    if !group.set_member_enabled(symbol_key, enable) {
        return Err(CliError::InvalidConfig(anyhow!(
            "no symbol '{symbol_key}' in group {group_id}"
        )));
    }
    store.save_group(&group)?;
    println!(
        "{} {symbol_key} in {group_id}",
        if enable { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn strategy_command(registry: &StrategyRegistry, action: StrategyCommand) -> Result<(), CliError> {
    match action {
        StrategyCommand::List => {
            for name in registry.names() {
                println!("{name}");
            }
            for (alias, target) in registry.aliases() {
                println!("{alias} -> {target}");
            }
        }
        StrategyCommand::GetTemplate { name } => {
            let template = registry
                .template(&name)
                .map_err(|err| CliError::InvalidConfig(anyhow!(err)))?;
            let rendered = serde_json::to_string_pretty(&template)
                .map_err(|err| CliError::Internal(anyhow!(err)))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

async fn analyze_once(
    config: &AppConfig,
    registry: Arc<StrategyRegistry>,
    symbol: String,
    asset_class: String,
    interval: String,
    period: String,
    strategy: String,
) -> Result<(), CliError> {
    let interval = parse_arg::<Interval>(&interval, "interval")?;

    // Ad-hoc single-symbol group resolved through the normal override chain
    let mut group = Group::new("adhoc", "one-off analysis");
    let mut member = SymbolConfig::new(
        symbol.clone(),
        parse_arg::<AssetClass>(&asset_class, "asset class")?,
        interval,
        parse_arg::<Period>(&period, "period")?,
    );
    member.strategy_overrides.name = Some(strategy);
    let symbol_key = format!("{}-{}", symbol.to_lowercase(), interval);
    group.upsert_member(symbol_key.clone(), member);

    let resolved: ResolvedConfig = resolve(&group, &symbol_key)
        .map_err(|err| CliError::InvalidConfig(anyhow!(err)))?;

    let provider = Arc::new(CsvDataProvider::new(&config.csv_dir));
    let orchestrator = Orchestrator::new(provider, registry);
    let verdict = orchestrator.analyze(&resolved).await?;

    let rendered = serde_json::to_string_pretty(&verdict)
        .map_err(|err| CliError::Internal(anyhow!(err)))?;
    println!("{rendered}");
    Ok(())
}

async fn run_scheduler(
    config: &AppConfig,
    store: Arc<FileStore>,
    registry: Arc<StrategyRegistry>,
) -> Result<(), CliError> {
    let provider = Arc::new(CsvDataProvider::new(&config.csv_dir));
    let orchestrator = Arc::new(Orchestrator::new(provider, registry));
    let notifier = Arc::new(TracingNotifier);

    let scheduler = Arc::new(
        AlertScheduler::new(orchestrator, store, notifier, SchedulerConfig::default())
            .map_err(CliError::from)?,
    );

    tracing::info!("Scheduler running; press Ctrl+C to stop");
    let run_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())
        .map_err(|err| CliError::Internal(anyhow!(err)))?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    scheduler.stop();
    run_handle
        .await
        .context("scheduler task failed")
        .map_err(CliError::Internal)?;
    tracing::info!("Scheduler shut down");
    Ok(())
}
