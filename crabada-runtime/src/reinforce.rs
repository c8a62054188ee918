//! Defense reinforcement run for one user.
//!
//! Each open mine goes through: filter (reinforceable now?), re-query,
//! candidate selection, submission, receipt. Only a failed initial listing or
//! an unreachable chain node ends the run early; every other problem is
//! confined to the mine it happened on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::User;
use crate::error::BotError;
use crate::game_api::GameApi;
use crate::gateway::{ChainRpc, Confirmation, GameGateway};
use crate::notify::{Notifier, notify};
use crate::scanner;
use crate::strategy::ReinforcementEngine;
use crate::types::{Mine, RunReport, format_tus};

/// Pause between consecutive reinforceable mines unless configured otherwise.
pub const DEFAULT_REINFORCE_DELAY: Duration = Duration::from_secs(5);

pub struct DefenseReinforcer<R> {
    api: Arc<dyn GameApi>,
    engine: ReinforcementEngine,
    gateway: GameGateway<R>,
    notifier: Arc<dyn Notifier>,
    reinforce_delay: Duration,
}

impl<R: ChainRpc> DefenseReinforcer<R> {
    pub fn new(api: Arc<dyn GameApi>, gateway: GameGateway<R>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine: ReinforcementEngine::new(Arc::clone(&api)),
            api,
            gateway,
            notifier,
            reinforce_delay: DEFAULT_REINFORCE_DELAY,
        }
    }

    /// Pause between consecutive reinforceable mines.
    pub fn with_reinforce_delay(mut self, delay: Duration) -> Self {
        self.reinforce_delay = delay;
        self
    }

    pub fn with_engine(mut self, engine: ReinforcementEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Reinforce every mine of `user` that is currently under attack.
    pub async fn reinforce_defense(&self, user: &User) -> Result<RunReport, BotError> {
        let mut report = RunReport::default();
        let mines = scanner::list_open_positions(self.api.as_ref(), user.address).await?;

        let now = chrono::Utc::now().timestamp();
        let (reinforceable, idle): (Vec<Mine>, Vec<Mine>) =
            mines.into_iter().partition(|m| m.is_reinforceable(now));
        report.skipped += idle.len() as u32;

        if reinforceable.is_empty() {
            tracing::info!(user = %user.address, "no mines to reinforce");
            return Ok(report);
        }
        tracing::info!(
            user = %user.address,
            count = reinforceable.len(),
            "mines to reinforce"
        );

        let total = reinforceable.len();
        let mut committed = HashSet::new();
        for (i, mine) in reinforceable.iter().enumerate() {
            self.reinforce_mine(user, mine, &mut committed, &mut report)
                .await?;
            if total > 1 && i + 1 < total {
                tokio::time::sleep(self.reinforce_delay).await;
            }
        }

        tracing::info!(
            user = %user.address,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            unconfirmed = report.unconfirmed,
            "reinforcement run finished"
        );
        Ok(report)
    }

    async fn reinforce_mine(
        &self,
        user: &User,
        listed: &Mine,
        committed: &mut HashSet<u64>,
        report: &mut RunReport,
    ) -> Result<(), BotError> {
        let game_id = listed.game_id;

        let mine = match scanner::get_position(self.api.as_ref(), game_id).await {
            Ok(mine) => mine,
            Err(e) => {
                tracing::warn!(game_id, "could not re-read mine, skipping: {e}");
                report.skipped += 1;
                return Ok(());
            }
        };
        if !mine.is_reinforceable(chrono::Utc::now().timestamp()) {
            tracing::info!(game_id, "mine no longer needs reinforcement");
            report.skipped += 1;
            return Ok(());
        }

        let settings = user.team_settings(mine.team_id);
        let candidate = match self
            .engine
            .best_reinforcement(
                user.address,
                &mine,
                settings.strategy,
                settings.max_price,
                committed,
            )
            .await
        {
            Ok(candidate) => candidate,
            Err(BotError::ReinforcementTooExpensive { cheapest, ceiling }) => {
                tracing::warn!(
                    game_id,
                    cheapest = %format_tus(cheapest),
                    ceiling = %format_tus(ceiling),
                    "reinforcement too expensive"
                );
                report.skipped += 1;
                return Ok(());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(game_id, "no reinforcement: {e}");
                report.skipped += 1;
                return Ok(());
            }
        };
        committed.insert(candidate.crab_id);

        tracing::info!(
            game_id,
            crab_id = candidate.crab_id,
            price = %format_tus(candidate.price),
            "reinforcing mine"
        );
        match self
            .gateway
            .reinforce_defense(game_id, candidate.crab_id, candidate.price)
            .await
        {
            Ok(Confirmation::Confirmed(outcome)) if outcome.is_success() => {
                report.succeeded += 1;
                tracing::info!(
                    game_id,
                    crab_id = candidate.crab_id,
                    price = %format_tus(candidate.price),
                    tx_hash = %outcome.tx_hash,
                    "mine reinforced"
                );
            }
            Ok(Confirmation::Confirmed(outcome)) => {
                report.failed += 1;
                tracing::error!(game_id, tx_hash = %outcome.tx_hash, "reinforcement reverted on chain");
                notify(
                    self.notifier.as_ref(),
                    &format!(
                        "ERROR reinforcing mine {game_id} with crab {} (tx {})",
                        candidate.crab_id, outcome.tx_hash
                    ),
                )
                .await;
            }
            Ok(Confirmation::Unconfirmed(tx_hash)) => {
                report.unconfirmed += 1;
                tracing::warn!(game_id, %tx_hash, "reinforcement sent, receipt never arrived");
                notify(
                    self.notifier.as_ref(),
                    &format!("Reinforcement of mine {game_id} unconfirmed (tx {tx_hash})"),
                )
                .await;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                report.failed += 1;
                tracing::error!(game_id, crab_id = candidate.crab_id, "reinforcement failed: {e}");
                notify(
                    self.notifier.as_ref(),
                    &format!(
                        "ERROR reinforcing mine {game_id} with crab {}: {e}",
                        candidate.crab_id
                    ),
                )
                .await;
            }
        }
        Ok(())
    }
}
