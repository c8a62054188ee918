//! Sends a user's idle teams mining.

use std::sync::Arc;

use crate::config::User;
use crate::error::BotError;
use crate::game_api::GameApi;
use crate::gateway::{ChainRpc, Confirmation, GameGateway};
use crate::notify::{Notifier, notify};
use crate::scanner;
use crate::types::{RunReport, Task};

#[derive(Debug, Clone, Default)]
pub struct MiningOptions {
    /// Only send teams whose looting point is zero.
    pub loot_point_filter: bool,
    /// Stop after this many teams were sent successfully.
    pub limit: Option<u32>,
}

pub struct MiningDispatcher<R> {
    api: Arc<dyn GameApi>,
    gateway: GameGateway<R>,
    notifier: Arc<dyn Notifier>,
}

impl<R: ChainRpc> MiningDispatcher<R> {
    pub fn new(api: Arc<dyn GameApi>, gateway: GameGateway<R>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            gateway,
            notifier,
        }
    }

    pub async fn send_teams_mining(
        &self,
        user: &User,
        options: &MiningOptions,
    ) -> Result<RunReport, BotError> {
        let mut report = RunReport::default();
        let mut teams = scanner::list_available_teams(self.api.as_ref(), user.address, Task::Mine).await?;

        if options.loot_point_filter {
            let before = teams.len();
            teams.retain(|t| t.looting_point == 0);
            report.skipped += (before - teams.len()) as u32;
        }

        if teams.is_empty() {
            tracing::info!(user = %user.address, "no available teams to send mining");
            return Ok(report);
        }

        for team in &teams {
            if options.limit.is_some_and(|limit| report.succeeded >= limit) {
                report.skipped += 1;
                continue;
            }

            let team_id = team.team_id;
            tracing::info!(team_id, "sending team to mine");
            match self.gateway.start_game(team_id).await {
                Ok(Confirmation::Confirmed(outcome)) if outcome.is_success() => {
                    report.succeeded += 1;
                    tracing::info!(team_id, tx_hash = %outcome.tx_hash, "team sent");
                    notify(
                        self.notifier.as_ref(),
                        &format!("Team {team_id} sent successfully"),
                    )
                    .await;
                }
                Ok(Confirmation::Confirmed(outcome)) => {
                    report.failed += 1;
                    tracing::error!(team_id, tx_hash = %outcome.tx_hash, "startGame reverted on chain");
                    notify(
                        self.notifier.as_ref(),
                        &format!("Error sending team {team_id} mining"),
                    )
                    .await;
                }
                Ok(Confirmation::Unconfirmed(tx_hash)) => {
                    report.unconfirmed += 1;
                    tracing::warn!(team_id, %tx_hash, "startGame sent, receipt never arrived");
                    notify(
                        self.notifier.as_ref(),
                        &format!("Team {team_id} mining unconfirmed (tx {tx_hash})"),
                    )
                    .await;
                }
                Err(BotError::Reverted(reason)) => {
                    report.failed += 1;
                    tracing::warn!(team_id, "error sending team mining: {reason}");
                    notify(
                        self.notifier.as_ref(),
                        &format!("Error sending team {team_id} mining: {reason}"),
                    )
                    .await;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            user = %user.address,
            sent = report.succeeded,
            failed = report.failed,
            "mining run finished"
        );
        Ok(report)
    }
}
