//! Reinforcement selection.
//!
//! Own crabs are always preferred (they cost nothing). Otherwise the lending
//! market is ranked by the team's [`ReinforceStrategy`] among the crabs
//! priced at or below the team's ceiling.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, U256};

use crate::error::BotError;
use crate::game_api::{GameApi, LendingQuery};
use crate::scanner;
use crate::types::{Crab, Mine, ReinforcementCandidate, format_tus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReinforceStrategy {
    /// Most mine point; cheaper, then stronger, on ties.
    #[default]
    HighestMinePoint,
    /// Most battle point; cheaper, then more mine point, on ties.
    HighestBattlePoint,
    /// Lowest price; more mine point on ties.
    Cheapest,
    /// Best mine point per TUS; free crabs first.
    MinePointPerPrice,
}

impl ReinforceStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ReinforceStrategy::HighestMinePoint => "HighestMinePoint",
            ReinforceStrategy::HighestBattlePoint => "HighestBattlePoint",
            ReinforceStrategy::Cheapest => "Cheapest",
            ReinforceStrategy::MinePointPerPrice => "MinePointPerPrice",
        }
    }

    /// Pick the best crab priced at or below `ceiling`, if any.
    pub fn select(&self, market: &[Crab], ceiling: U256) -> Option<ReinforcementCandidate> {
        market
            .iter()
            .filter(|c| c.price <= ceiling)
            .max_by(|a, b| self.rank(a, b))
            .map(ReinforcementCandidate::borrowed)
    }

    /// `Greater` means `a` is the better pick. Lower crab id wins full ties
    /// so the choice does not depend on listing order.
    fn rank(&self, a: &Crab, b: &Crab) -> Ordering {
        let primary = match self {
            ReinforceStrategy::HighestMinePoint => a
                .mine_point
                .cmp(&b.mine_point)
                .then(b.price.cmp(&a.price))
                .then(a.battle_point.cmp(&b.battle_point)),
            ReinforceStrategy::HighestBattlePoint => a
                .battle_point
                .cmp(&b.battle_point)
                .then(b.price.cmp(&a.price))
                .then(a.mine_point.cmp(&b.mine_point)),
            ReinforceStrategy::Cheapest => b
                .price
                .cmp(&a.price)
                .then(a.mine_point.cmp(&b.mine_point)),
            ReinforceStrategy::MinePointPerPrice => {
                mine_point_per_price(a, b).then(a.mine_point.cmp(&b.mine_point))
            }
        };
        primary.then(b.crabada_id.cmp(&a.crabada_id))
    }
}

/// Compares `a.mp / a.price` with `b.mp / b.price` without division.
fn mine_point_per_price(a: &Crab, b: &Crab) -> Ordering {
    match (a.price.is_zero(), b.price.is_zero()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let lhs = U256::from(a.mine_point).saturating_mul(b.price);
            let rhs = U256::from(b.mine_point).saturating_mul(a.price);
            lhs.cmp(&rhs)
        }
    }
}

impl fmt::Display for ReinforceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReinforceStrategy {
    type Err = BotError;

    /// Accepts `HighestMinePoint`, `highest_mine_point`, `highest-mine-point`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "highestminepoint" => Ok(ReinforceStrategy::HighestMinePoint),
            "highestbattlepoint" => Ok(ReinforceStrategy::HighestBattlePoint),
            "cheapest" => Ok(ReinforceStrategy::Cheapest),
            "minepointperprice" => Ok(ReinforceStrategy::MinePointPerPrice),
            _ => Err(BotError::ConfigError(format!(
                "Unknown reinforcement strategy: {s}"
            ))),
        }
    }
}

/// Finds one reinforcement for a mine.
pub struct ReinforcementEngine {
    api: Arc<dyn GameApi>,
    lending_query: LendingQuery,
}

impl ReinforcementEngine {
    pub fn new(api: Arc<dyn GameApi>) -> Self {
        Self {
            api,
            lending_query: LendingQuery::default(),
        }
    }

    pub fn with_lending_query(mut self, query: LendingQuery) -> Self {
        self.lending_query = query;
        self
    }

    /// Best reinforcement for `mine`, skipping crabs in `committed`.
    ///
    /// Returns [`BotError::ReinforcementTooExpensive`] when the market has
    /// usable crabs but none at or below `ceiling`, and
    /// [`BotError::NoSuitableReinforcementFound`] when it has none at all.
    pub async fn best_reinforcement(
        &self,
        user: Address,
        mine: &Mine,
        strategy: ReinforceStrategy,
        ceiling: U256,
        committed: &HashSet<u64>,
    ) -> Result<ReinforcementCandidate, BotError> {
        let own = scanner::list_self_reinforcements(self.api.as_ref(), user).await?;
        if let Some(crab) = own
            .iter()
            .filter(|c| !committed.contains(&c.crabada_id))
            .max_by(|a, b| {
                a.mine_point
                    .cmp(&b.mine_point)
                    .then(b.crabada_id.cmp(&a.crabada_id))
            })
        {
            tracing::info!(
                game_id = mine.game_id,
                crab_id = crab.crabada_id,
                mine_point = crab.mine_point,
                "self-reinforcing with own crab"
            );
            return Ok(ReinforcementCandidate::self_owned(crab));
        }

        let market: Vec<Crab> =
            scanner::list_lending_market(self.api.as_ref(), &self.lending_query)
                .await?
                .into_iter()
                .filter(|c| !committed.contains(&c.crabada_id))
                .collect();

        if market.is_empty() {
            return Err(BotError::NoSuitableReinforcementFound(format!(
                "lending market has no usable crab for mine {}",
                mine.game_id
            )));
        }

        match strategy.select(&market, ceiling) {
            Some(candidate) => {
                tracing::info!(
                    game_id = mine.game_id,
                    crab_id = candidate.crab_id,
                    mine_point = candidate.mine_point,
                    battle_point = candidate.battle_point,
                    price = %format_tus(candidate.price),
                    strategy = %strategy,
                    "borrowing crab"
                );
                Ok(candidate)
            }
            None => {
                let cheapest = market
                    .iter()
                    .map(|c| c.price)
                    .min()
                    .unwrap_or(U256::MAX);
                Err(BotError::ReinforcementTooExpensive { cheapest, ceiling })
            }
        }
    }
}
