use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

fn redact_host(url: &str) -> String {
    url.split('@')
        .nth(1)
        .and_then(|s| s.split('/').next())
        .unwrap_or("?")
        .to_string()
}

use options_spread_bot::{
    backtest,
    client::{FixtureMarketData, MarketDataSource, PolygonClient},
    execution::{self, RunContext, SpreadStatus},
    monitoring::{self, dashboard},
    storage::{create_pg_pool, MemorySpreadStore, PgSpreadStore, SpreadStore},
    types::{AppConfig, StoreBackend},
    utils::time::following_third_friday,
};

#[derive(Parser, Debug)]
#[command(name = "options-spread-bot")]
#[command(about = "Vertical options spread selection, scoring and paper-trade lifecycle", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    /// Override the spread store backend (memory/postgres)
    #[arg(long)]
    store: Option<StoreBackend>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Select, score and store spreads for every watchlist ticker
    Select {
        /// Chain expiration; defaults to next month's third Friday
        #[arg(long)]
        expiration: Option<NaiveDate>,
    },
    /// Advance every open spread one lifecycle step
    Run {},
    /// Select then advance in one process, sharing the store
    Cycle {
        #[arg(long)]
        expiration: Option<NaiveDate>,
    },
    /// Print stored spreads ranked by score
    List {
        #[arg(long)]
        underlying: Option<String>,
        #[arg(long)]
        min_score: Option<f64>,
        /// none, entered or completed
        #[arg(long)]
        status: Option<SpreadStatus>,
    },
    /// Replay a fixture through the lifecycle
    Backtest {
        /// Optional path to backtest configuration
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn load_settings(path: &str, store: Option<StoreBackend>) -> anyhow::Result<AppConfig> {
    tracing::debug!(target: "bot", config = %path, "loading config");
    let mut settings = AppConfig::from_file(path)?;
    if let Some(store) = store {
        settings.execution.store = store;
    }
    tracing::info!(
        target: "bot",
        config = %path,
        tickers = settings.watchlist.tickers.len(),
        base_url = %settings.market_data.base_url,
        "config loaded"
    );
    Ok(settings)
}

async fn build_store(settings: &AppConfig) -> anyhow::Result<Arc<dyn SpreadStore>> {
    match settings.execution.store {
        StoreBackend::Memory => Ok(Arc::new(MemorySpreadStore::new())),
        StoreBackend::Postgres => {
            let pg = settings
                .postgres
                .as_ref()
                .context("store = \"postgres\" requires a [postgres] section")?;
            tracing::info!(target: "bot", postgres_host = redact_host(&pg.url), "connecting store");
            let store = PgSpreadStore::new(create_pg_pool(pg).await?);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

fn resolve_expiration(explicit: Option<NaiveDate>, as_of: NaiveDate) -> anyhow::Result<NaiveDate> {
    match explicit {
        Some(date) => Ok(date),
        None => following_third_friday(as_of).context("no third Friday after the current date"),
    }
}

fn build_market_data(settings: &AppConfig) -> anyhow::Result<Arc<dyn MarketDataSource>> {
    match &settings.market_data.fixture_path {
        Some(path) => {
            let fixture = FixtureMarketData::from_file(path)
                .with_context(|| format!("failed to load market data fixture at {path}"))?;
            Ok(Arc::new(fixture))
        }
        None => Ok(Arc::new(PolygonClient::new(&settings.market_data)?)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "options_spread_bot=debug,bot=debug,info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(target: "bot", "options-spread-bot starting");

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run {}) {
        Commands::Select { expiration } => {
            let settings = load_settings(&cli.config, cli.store)?;
            monitoring::logger::log_startup(&settings, "select");
            let ctx = RunContext::from_config(
                &settings,
                build_store(&settings).await?,
                build_market_data(&settings)?,
                Utc::now(),
            );
            let expiration = resolve_expiration(expiration, ctx.as_of)?;
            execution::select_pass(&ctx, &settings.watchlist.tickers, expiration).await;
        }
        Commands::Run {} => {
            let settings = load_settings(&cli.config, cli.store)?;
            monitoring::logger::log_startup(&settings, "run");
            let ctx = RunContext::from_config(
                &settings,
                build_store(&settings).await?,
                build_market_data(&settings)?,
                Utc::now(),
            );
            execution::run_pass(&ctx).await?;
        }
        Commands::Cycle { expiration } => {
            let settings = load_settings(&cli.config, cli.store)?;
            monitoring::logger::log_startup(&settings, "cycle");
            let ctx = RunContext::from_config(
                &settings,
                build_store(&settings).await?,
                build_market_data(&settings)?,
                Utc::now(),
            );
            let expiration = resolve_expiration(expiration, ctx.as_of)?;
            execution::select_pass(&ctx, &settings.watchlist.tickers, expiration).await;
            execution::run_pass(&ctx).await?;
        }
        Commands::List {
            underlying,
            min_score,
            status,
        } => {
            let settings = load_settings(&cli.config, cli.store)?;
            let filter = dashboard::DashboardFilter {
                underlying,
                status,
                min_score,
            };
            let spreads = build_store(&settings).await?.list().await?;
            for row in dashboard::rows(&spreads, &filter) {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Commands::Backtest { config } => {
            let backtest_config_path = config.unwrap_or_else(|| "config/backtest.toml".to_string());
            let backtest_cfg = backtest::config::BacktestConfig::from_file(&backtest_config_path)?;
            backtest::runner::run_backtest(backtest_cfg).await?;
        }
    }

    Ok(())
}
