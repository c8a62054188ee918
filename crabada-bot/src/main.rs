use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;

use crabada_runtime::chain::ChainClient;
use crabada_runtime::config::{BotConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, UserConfig};
use crabada_runtime::contracts::IIdleGame;
use crabada_runtime::game_api::{GameApi, IdleApiClient};
use crabada_runtime::mining::{MiningDispatcher, MiningOptions};
use crabada_runtime::notify::{LogNotifier, Notifier, WebhookNotifier};
use crabada_runtime::reinforce::DefenseReinforcer;
use crabada_runtime::tx_log::TX_LOG_TARGET;
use crabada_runtime::watcher::{FilterLogSource, Watcher};
use crabada_runtime::{GameGateway, User};

#[derive(Parser, Debug)]
#[command(name = "crabada-bot", version, about = "Crabada idle-game bot")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reinforce the user's mines that are under attack
    Reinforce {
        address: Address,
    },
    /// Send the user's available teams mining
    Mine {
        address: Address,

        /// Only send teams with zero looting point
        #[arg(long)]
        loot_point_filter: bool,

        /// Stop after this many teams were sent
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Follow StartGame events on the game contract
    Watch {
        /// Start from this block instead of the chain head
        #[arg(long)]
        from_block: Option<u64>,
    },
}

/// Console plus two daily files: everything for `label`, and the
/// transaction records alone.
fn setup_log(log_dir: &Path, label: &str) -> Vec<WorkerGuard> {
    use tracing_subscriber::filter::Targets;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let (app_writer, app_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(log_dir, format!("app_{label}.log")),
    );
    let (tx_writer, tx_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(log_dir, format!("tx_{label}.log")),
    );

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(app_writer))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(tx_writer)
                .with_filter(Targets::new().with_target(TX_LOG_TARGET, tracing::Level::INFO)),
        )
        .try_init()
        .is_err()
    {}

    vec![app_guard, tx_guard]
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = BotConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let label = match &cli.command {
        Command::Reinforce { address } | Command::Mine { address, .. } => {
            address.to_string().to_lowercase()
        }
        Command::Watch { .. } => "watch".to_string(),
    };
    let _guards = setup_log(&config.log_dir, &label);

    match cli.command {
        Command::Reinforce { address } => reinforce(&config, address).await?,
        Command::Mine {
            address,
            loot_point_filter,
            limit,
        } => {
            let options = MiningOptions {
                loot_point_filter,
                limit,
            };
            if config.mining_disabled(address) {
                tracing::warn!(
                    "mining disabled for {address} by {}",
                    config.no_mine_sentinel(address).display()
                );
                return Ok(ExitCode::FAILURE);
            }
            mine(&config, address, &options).await?
        }
        Command::Watch { from_block } => watch_start_games(&config, from_block).await?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn reinforce(config: &BotConfig, address: Address) -> anyhow::Result<()> {
    let (user_config, user) = resolve_user(config, address)?;
    let gateway = gateway_for(config, user_config, &user).await?;

    let report = DefenseReinforcer::new(game_api(config), gateway, notifier(config))
        .with_reinforce_delay(config.reinforce_delay())
        .reinforce_defense(&user)
        .await
        .context("reinforcement run")?;

    tracing::info!(
        "reinforced {} mine(s), {} failed, {} skipped, {} unconfirmed",
        report.succeeded,
        report.failed,
        report.skipped,
        report.unconfirmed
    );
    Ok(())
}

async fn mine(config: &BotConfig, address: Address, options: &MiningOptions) -> anyhow::Result<()> {
    let (user_config, user) = resolve_user(config, address)?;
    let gateway = gateway_for(config, user_config, &user).await?;

    let report = MiningDispatcher::new(game_api(config), gateway, notifier(config))
        .send_teams_mining(&user, options)
        .await
        .context("mining run")?;

    tracing::info!("sent {} team(s) mining", report.succeeded);
    Ok(())
}

async fn watch_start_games(config: &BotConfig, from_block: Option<u64>) -> anyhow::Result<()> {
    let mut filter = Filter::new()
        .address(config.contract_address()?)
        .event_signature(IIdleGame::StartGame::SIGNATURE_HASH);
    if let Some(block) = from_block {
        filter = filter.from_block(block);
    }

    let source = FilterLogSource::connect_http(&config.node_uri, &filter)
        .await
        .context("installing StartGame filter")?;

    let watcher = Watcher::new(source)
        .with_poll_interval(config.watcher_poll_interval())
        .add_handler(|log| {
            match log.log_decode::<IIdleGame::StartGame>() {
                Ok(decoded) => {
                    let event = decoded.inner.data;
                    tracing::info!(
                        game_id = %event.gameId,
                        team_id = %event.teamId,
                        block = ?log.block_number,
                        "game started"
                    );
                }
                Err(e) => tracing::warn!("undecodable StartGame log: {e}"),
            }
            Ok(())
        });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down watcher");
            let _ = shutdown_tx.send(true);
        }
    });

    watcher.run(shutdown_rx).await.context("watcher")?;
    Ok(())
}

fn resolve_user(config: &BotConfig, address: Address) -> anyhow::Result<(&UserConfig, User)> {
    let user_config = config.find_user(address)?;
    let user = user_config.resolve()?;
    Ok((user_config, user))
}

async fn gateway_for(
    config: &BotConfig,
    user_config: &UserConfig,
    user: &User,
) -> anyhow::Result<GameGateway<ChainClient>> {
    let private_key = user_config.private_key()?;
    let chain = ChainClient::new(&config.node_uri, &private_key, config.chain_id)?;
    chain
        .verify_chain_id()
        .await
        .context("checking the node's chain id")?;
    if chain.address != user.address {
        bail!(
            "key in {} belongs to {}, not {}",
            user_config.private_key_env,
            chain.address,
            user.address
        );
    }
    Ok(GameGateway::new(chain, config.contract_address()?, user.address)
        .with_settings(config.gateway_settings()?))
}

fn game_api(config: &BotConfig) -> Arc<dyn GameApi> {
    Arc::new(IdleApiClient::new(config.api_base_url.clone()))
}

fn notifier(config: &BotConfig) -> Arc<dyn Notifier> {
    match &config.notifier.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    }
}
