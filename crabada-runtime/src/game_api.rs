//! HTTP client for the public Crabada idle-game API.
//!
//! Every list endpoint answers with the same envelope:
//! `{"error_code": .., "message": .., "result": {"totalRecord": .., "data": [..]}}`.
//! A `null` result or `null` data means "no records" and maps to an empty
//! list. Transport failures, non-2xx statuses, unparsable bodies and a set
//! `error_code` all map to [`BotError::ServiceUnavailable`], so callers can
//! tell "nothing to do" from "could not find out".

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::BotError;
use crate::types::{Crab, Mine, MineStatus, Team};

pub const DEFAULT_API_BASE_URL: &str = "https://idle-api.crabada.com/public/idle";

/// Read-only view of the game API consumed by the scanner and the strategy engine.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn list_mines(&self, query: &MineQuery) -> Result<Vec<Mine>, BotError>;

    async fn get_mine(&self, game_id: u64) -> Result<Mine, BotError>;

    async fn list_teams(&self, user: Address, query: &TeamQuery) -> Result<Vec<Team>, BotError>;

    /// Crabs open for lending, cheapest first unless the query says otherwise.
    async fn list_crabs_for_lending(&self, query: &LendingQuery) -> Result<Vec<Crab>, BotError>;

    /// The user's own idle crabs that can join a mine as reinforcement.
    async fn list_crabs_for_self_reinforce(&self, user: Address) -> Result<Vec<Crab>, BotError>;
}

#[derive(Debug, Clone)]
pub struct MineQuery {
    pub status: Option<MineStatus>,
    pub user_address: Option<Address>,
    pub limit: u32,
    pub page: u32,
}

impl Default for MineQuery {
    fn default() -> Self {
        Self {
            status: None,
            user_address: None,
            limit: 5,
            page: 1,
        }
    }
}

impl MineQuery {
    pub fn open_mines_of(user: Address) -> Self {
        Self {
            status: Some(MineStatus::Open),
            user_address: Some(user),
            limit: 50,
            page: 1,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string()), ("page", self.page.to_string())];
        if let Some(status) = self.status {
            params.push(("status", status.as_query_param().to_string()));
        }
        if let Some(user) = self.user_address {
            params.push(("user_address", address_param(user)));
        }
        params
    }
}

#[derive(Debug, Clone)]
pub struct TeamQuery {
    pub available_only: bool,
    pub limit: u32,
    pub page: u32,
}

impl Default for TeamQuery {
    fn default() -> Self {
        Self {
            available_only: false,
            limit: 5,
            page: 1,
        }
    }
}

impl TeamQuery {
    /// Teams free to be sent mining or looting.
    pub fn available() -> Self {
        Self {
            available_only: true,
            limit: 50,
            page: 1,
        }
    }

    fn params(&self, user: Address) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.to_string()),
            ("page", self.page.to_string()),
            ("user_address", address_param(user)),
        ];
        if self.available_only {
            params.push(("is_team_available", "1".to_string()));
        }
        params
    }
}

#[derive(Debug, Clone)]
pub struct LendingQuery {
    pub order_by: String,
    pub order: String,
    pub limit: u32,
    pub page: u32,
}

impl Default for LendingQuery {
    fn default() -> Self {
        Self {
            order_by: "price".to_string(),
            order: "asc".to_string(),
            limit: 10,
            page: 1,
        }
    }
}

impl LendingQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("limit", self.limit.to_string()),
            ("page", self.page.to_string()),
            ("orderBy", self.order_by.clone()),
            ("order", self.order.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiPage<T> {
    data: Option<Vec<T>>,
}

/// `reqwest`-backed [`GameApi`].
#[derive(Debug, Clone)]
pub struct IdleApiClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl IdleApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Option<T>, BotError> {
        let url = format!("{}{}", self.base_url, path);
        let envelope: ApiEnvelope<T> = self
            .client
            .get(&url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(code) = envelope.error_code.filter(|c| !c.is_null()) {
            return Err(BotError::ServiceUnavailable(format!(
                "{path} answered error_code={code}: {}",
                envelope.message.unwrap_or_default()
            )));
        }
        Ok(envelope.result)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<T>, BotError> {
        let page: Option<ApiPage<T>> = self.get_envelope(path, params).await?;
        Ok(page.and_then(|p| p.data).unwrap_or_default())
    }
}

#[async_trait]
impl GameApi for IdleApiClient {
    async fn list_mines(&self, query: &MineQuery) -> Result<Vec<Mine>, BotError> {
        self.get_list("/mines", &query.params()).await
    }

    async fn get_mine(&self, game_id: u64) -> Result<Mine, BotError> {
        self.get_envelope(&format!("/mine/{game_id}"), &[])
            .await?
            .ok_or_else(|| BotError::ServiceUnavailable(format!("mine {game_id} not found")))
    }

    async fn list_teams(&self, user: Address, query: &TeamQuery) -> Result<Vec<Team>, BotError> {
        self.get_list("/teams", &query.params(user)).await
    }

    async fn list_crabs_for_lending(&self, query: &LendingQuery) -> Result<Vec<Crab>, BotError> {
        self.get_list("/crabadas/lending", &query.params()).await
    }

    async fn list_crabs_for_self_reinforce(&self, user: Address) -> Result<Vec<Crab>, BotError> {
        let params = [
            ("user_address", address_param(user)),
            ("limit", "20".to_string()),
            ("page", "1".to_string()),
        ];
        self.get_list("/crabadas/can-join-team", &params).await
    }
}

/// The API matches addresses in lowercase hex.
fn address_param(address: Address) -> String {
    address.to_string().to_lowercase()
}
