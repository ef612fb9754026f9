use airdrop_farmer::chain::{
    ChainClient, ChainRegistry, ChainWallet, ClientSettings, HttpConnector, TxOutcome,
};
use airdrop_farmer::platform::UnconfiguredAdapter;
use airdrop_farmer::{
    ActionExecutor, Catalog, DelayPolicy, Dispatcher, FarmerConfig, Orchestrator, UserSession,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use core_logic::{setup_logger, FarmingSession, SessionRunner, WalletManager, WalletSource};
use dotenv::dotenv;
use ethers::types::Address;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Environment variable holding a single private key, used when no wallet
/// file is given.
const PRIVATE_KEY_ENV: &str = "FARMER_PRIVATE_KEY";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/airdrop-farmer/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the activated airdrops
    List,
    /// Farm airdrops, one session per wallet file
    Run {
        /// Wallet file (JSON list or one private key per line), repeatable
        #[arg(short, long)]
        wallets: Vec<String>,
        /// Comma-separated airdrop names, all activated ones when omitted
        #[arg(short, long, value_delimiter = ',')]
        airdrops: Vec<String>,
    },
    /// Print the unsigned DeFi transactions and their fees as JSON
    Prepare {
        #[arg(long)]
        address: String,
        #[arg(short, long, value_delimiter = ',')]
        airdrops: Vec<String>,
    },
    /// Replace the lowest pending transaction of a wallet
    CancelPending {
        #[arg(long)]
        chain: String,
        #[arg(short, long)]
        wallets: Option<String>,
        #[arg(short, long, default_value = "0")]
        index: usize,
    },
}

fn wallet_source(path: Option<String>) -> WalletSource {
    match path {
        Some(path) => WalletSource::File { path },
        None => WalletSource::Env {
            key: PRIVATE_KEY_ENV.to_string(),
        },
    }
}

fn chain_wallets(manager: &WalletManager) -> Result<Vec<ChainWallet>> {
    manager
        .wallets()
        .iter()
        .enumerate()
        .map(|(i, record)| {
            ChainWallet::from_record(record)
                .with_context(|| format!("Wallet #{} of {}", i + 1, manager.path().display()))
        })
        .collect()
}

fn selected_airdrops(catalog: &Catalog, requested: Vec<String>) -> Vec<String> {
    if requested.is_empty() {
        return catalog
            .active()
            .iter()
            .map(|a| a.name.clone())
            .collect();
    }
    for name in &requested {
        match catalog.get(name) {
            None => warn!("Unknown airdrop '{}'", name),
            Some(a) if !a.is_activated => warn!("Airdrop '{}' is deactivated", name),
            Some(_) => {}
        }
    }
    requested
}

fn list(catalog: &Catalog) {
    let active = catalog.active();
    if active.is_empty() {
        println!("{}", "No active airdrop.".yellow());
        return;
    }
    for airdrop in active {
        let actions: Vec<String> = airdrop.active_actions().map(|a| a.label()).collect();
        println!(
            "{} ({} action(s)): {}",
            airdrop.name.green().bold(),
            actions.len(),
            actions.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = FarmerConfig::load(&args.config).context("Failed to load config")?;
    let _log_guard = setup_logger(&config.log_dir);
    info!("Loaded config from {}", args.config);

    let registry = Arc::new(ChainRegistry::from_settings(&config.chains)?);
    let catalog = Arc::new(Catalog::load_dir(&config.catalog_dir)?);
    let http = reqwest::Client::new();
    let settings = ClientSettings::from_config(&config);

    let executor: Arc<dyn ActionExecutor> = Arc::new(Dispatcher::new(
        registry.clone(),
        Arc::new(HttpConnector::new(http.clone())),
        settings.clone(),
        http.clone(),
        Arc::new(UnconfiguredAdapter::discord()),
        Arc::new(UnconfiguredAdapter::twitter()),
    ));
    let delays = DelayPolicy {
        window: config.delay(),
        per_platform: config.platform_wait_secs.clone(),
    };

    match args.command {
        Commands::List => list(&catalog),

        Commands::Run { wallets, airdrops } => {
            let airdrops = selected_airdrops(&catalog, airdrops);
            let sources: Vec<WalletSource> = if wallets.is_empty() {
                vec![wallet_source(None)]
            } else {
                wallets.into_iter().map(|p| wallet_source(Some(p))).collect()
            };

            let mut sessions: Vec<Box<dyn FarmingSession>> = Vec::new();
            for source in sources {
                let manager = match WalletManager::from_source(&source) {
                    Ok(manager) => manager,
                    Err(e) => {
                        error!("Cannot load wallets from {:?}: {}", source, e);
                        continue;
                    }
                };
                let label = if manager.path().as_os_str().is_empty() {
                    PRIVATE_KEY_ENV.to_string()
                } else {
                    manager.path().display().to_string()
                };
                let orchestrator =
                    Orchestrator::new(catalog.clone(), chain_wallets(&manager)?, executor.clone())
                        .with_delays(delays.clone());
                sessions.push(Box::new(UserSession::new(label, orchestrator, airdrops.clone())));
            }
            if sessions.is_empty() {
                bail!("No wallet could be loaded");
            }

            let stats = SessionRunner::run_sessions(sessions).await?;
            println!(
                "{} {} succeeded, {} failed",
                "Done:".bold(),
                stats.success.to_string().green(),
                stats.failed.to_string().red()
            );
        }

        Commands::Prepare { address, airdrops } => {
            let address: Address = address
                .parse()
                .with_context(|| format!("'{}' is not an address", address))?;
            let airdrops = selected_airdrops(&catalog, airdrops);
            let orchestrator = Orchestrator::new(catalog.clone(), Vec::new(), executor.clone());
            let prepared = orchestrator.prepare_transactions(&airdrops, address).await;
            for tx in &prepared {
                info!(
                    "{} transaction to {:?}: max fee {} ETH",
                    tx.blockchain,
                    tx.to,
                    tx.fee_eth()
                );
            }
            println!("{}", serde_json::to_string_pretty(&prepared)?);
        }

        Commands::CancelPending {
            chain,
            wallets,
            index,
        } => {
            let manager = WalletManager::from_source(&wallet_source(wallets))?;
            let wallet = ChainWallet::from_record(manager.get(index)?)?;
            let client = ChainClient::connect(
                &registry,
                &chain,
                &HttpConnector::new(http.clone()),
                settings,
                http,
                CancellationToken::new(),
            )
            .await?;
            if !client.is_connected() {
                bail!("Could not connect to {}", chain);
            }

            match client.cancel_pending(&wallet).await {
                Ok(TxOutcome::Mined { hash, success }) => println!(
                    "{} {}",
                    if success {
                        "Replaced:".green()
                    } else {
                        "Replacement reverted:".red()
                    },
                    client.explorer_link(&hash)
                ),
                Ok(TxOutcome::Prepared(txs)) => {
                    println!("{}", serde_json::to_string_pretty(&txs)?)
                }
                Err(e) => println!("{} {}", "Nothing replaced:".yellow(), e),
            }
        }
    }

    Ok(())
}
