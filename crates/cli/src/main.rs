//! Command line interface of the CLMM yield monitor.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clmm_yield_api::{ApiServer, AppState, ServerConfig};
use clmm_yield_data::Database;
use clmm_yield_monitor::{
    MonitorConfig, MonitorSettings, PortfolioMonitor, PortfolioReport, PortfolioReporter,
};
use clmm_yield_protocols::pancake::{AlloyChainReader, BatchConfig, EventScanner};
use clmm_yield_protocols::prices::{DefiLlamaPriceSource, LayeredPriceSource, StaticPriceSource};
use clmm_yield_protocols::subgraph::SubgraphClient;
use dotenv::dotenv;
use prettytable::{Table, row};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clmm-yield")]
#[command(about = "Yield and impermanent loss monitor for PancakeSwap v3 positions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard and the JSON API
    Serve {
        /// Listen address, overrides BIND_ADDRESS
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print one wallet's report
    Report {
        /// Wallet address, defaults to OWNER_ADDRESS
        #[arg(short, long)]
        wallet: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Wires the monitor from configuration.
async fn build_monitor(config: &MonitorConfig) -> Result<PortfolioMonitor> {
    let database = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?;
    database.migrate().await.context("Failed to migrate database")?;

    let reader = AlloyChainReader::connect(&config.rpc_url, config.deployment)?
        .with_discovery(BatchConfig::discovery(), config.staked_lookback_blocks);
    config.check_chain_id(reader.chain_id().await?)?;
    let reader = Arc::new(reader);
    let scanner = EventScanner::new(reader.clone(), config.scan);

    let remote = DefiLlamaPriceSource::new(
        config.price_api_url.clone(),
        config.price_chain.clone(),
        config.http_timeout,
    )?;
    let prices = LayeredPriceSource::new(
        StaticPriceSource::stablecoins(config.stablecoins.as_slice()),
        Some(Arc::new(remote)),
    );

    let settings = MonitorSettings {
        reward: config.reward_token(),
        stablecoins: config.stablecoins.clone(),
    };
    let mut monitor = PortfolioMonitor::new(reader, Arc::new(prices), scanner, &database, settings);

    match config.subgraph_endpoint() {
        Some((endpoint, key)) => {
            let index = SubgraphClient::new(endpoint, key, config.http_timeout)?;
            monitor = monitor.with_staked_index(Arc::new(index));
        }
        None => warn!("THEGRAPH_API_KEY not set, farmed positions come from deposit logs"),
    }
    Ok(monitor)
}

fn print_report(report: &PortfolioReport) {
    if let Some(message) = &report.message {
        println!("{message}");
        return;
    }

    println!("📊 Wallet {} at block {}", report.wallet, report.head_block);
    let mut table = Table::new();
    table.add_row(row![
        "ID", "Pair", "Status", "Range", "Price", "Value", "Fees+Rewards", "APR", "IL", "Net"
    ]);
    for p in &report.positions {
        let (il, net) = p.impermanent_loss_data.as_ref().map_or_else(
            || ("N/A".to_string(), "N/A".to_string()),
            |il| (il.current.il_usd.clone(), il.current.net_gain_loss.clone()),
        );
        table.add_row(row![
            p.token_id,
            p.pair,
            p.status.label(),
            format!("{} - {}", p.price_range_lower, p.price_range_upper),
            p.current_price,
            p.estimated_value_usd,
            p.total_rewards_usd,
            p.annualized_apr,
            il,
            net
        ]);
    }
    table.printstd();

    println!(
        "💰 Total {} | {} positions | daily ${} | annual ${} | yield {}",
        report.total_portfolio_value,
        report.num_active_positions,
        report.total_daily_projected_usd_earnings,
        report.total_annual_projected_usd_earnings,
        report.total_annual_yield
    );
    for s in &report.skipped {
        println!("⚠️  Skipped #{}: {}", s.token_id, s.reason);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::from_env()?;
    let monitor = build_monitor(&config).await?;

    match cli.command {
        Commands::Serve { bind } => {
            let state = AppState::new(Arc::new(monitor))
                .with_default_wallet(config.owner_address.clone());
            let server_config = ServerConfig {
                bind: bind.unwrap_or_else(|| config.bind_address.clone()),
            };
            info!(bind = %server_config.bind, "Starting server");
            ApiServer::new(state, server_config).run().await?;
        }
        Commands::Report { wallet, json } => {
            let wallet = wallet
                .or_else(|| config.owner_address.clone())
                .context("No wallet given and OWNER_ADDRESS is not set")?;
            let report = monitor.report(&wallet).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}
