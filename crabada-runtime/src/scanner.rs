//! Position scanner: the user's open mines and idle teams.

use alloy::primitives::Address;

use crate::error::BotError;
use crate::game_api::{GameApi, LendingQuery, MineQuery, TeamQuery};
use crate::types::{Crab, Mine, MineStatus, Task, Team};

/// The user's mines that are still open, as the API reports them now.
pub async fn list_open_positions(api: &dyn GameApi, user: Address) -> Result<Vec<Mine>, BotError> {
    let mines = api.list_mines(&MineQuery::open_mines_of(user)).await?;
    let open: Vec<Mine> = mines
        .into_iter()
        .filter(|m| m.status == MineStatus::Open)
        .collect();
    tracing::debug!(user = %user, count = open.len(), "open mines");
    Ok(open)
}

/// Teams that are free to start a game of the given kind.
pub async fn list_available_teams(
    api: &dyn GameApi,
    user: Address,
    task: Task,
) -> Result<Vec<Team>, BotError> {
    let teams = api.list_teams(user, &TeamQuery::available()).await?;
    let available: Vec<Team> = teams.into_iter().filter(Team::is_available).collect();
    tracing::debug!(user = %user, ?task, count = available.len(), "available teams");
    Ok(available)
}

/// Re-read one mine right before acting on it.
pub async fn get_position(api: &dyn GameApi, game_id: u64) -> Result<Mine, BotError> {
    api.get_mine(game_id).await
}

/// Crabs currently offered for lending.
pub async fn list_lending_market(
    api: &dyn GameApi,
    query: &LendingQuery,
) -> Result<Vec<Crab>, BotError> {
    let crabs = api.list_crabs_for_lending(query).await?;
    tracing::debug!(count = crabs.len(), "lending market");
    Ok(crabs)
}

/// The user's own crabs that may join one of their mines.
pub async fn list_self_reinforcements(
    api: &dyn GameApi,
    user: Address,
) -> Result<Vec<Crab>, BotError> {
    let crabs = api.list_crabs_for_self_reinforce(user).await?;
    tracing::debug!(user = %user, count = crabs.len(), "self-reinforce crabs");
    Ok(crabs)
}
