use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// How long after an attack the defender may answer with a reinforcement.
pub const REINFORCE_WINDOW_SECS: i64 = 30 * 60;

/// Reinforcements a defending team may receive in a single mine.
pub const MAX_DEFENSE_REINFORCEMENTS: usize = 2;

/// Smallest units per whole TUS.
pub const TUS_DECIMALS: u32 = 18;

/// A mining game ("mine") as reported by the game API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mine {
    pub game_id: u64,
    pub team_id: u64,
    #[serde(default)]
    pub owner: Option<String>,
    pub status: MineStatus,
    #[serde(default)]
    pub attack_team_id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attack_point: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub defense_point: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_time: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_time: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub process: Vec<ProcessAction>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MineStatus {
    Open,
    #[serde(alias = "close")]
    Closed,
    #[serde(alias = "settle")]
    Settled,
    #[serde(other)]
    Unknown,
}

impl MineStatus {
    pub fn as_query_param(&self) -> &'static str {
        match self {
            MineStatus::Open => "open",
            MineStatus::Closed => "close",
            MineStatus::Settled => "settle",
            MineStatus::Unknown => "unknown",
        }
    }
}

/// One entry of a mine's action log (`create-game`, `attack`, `reinforce-defense`, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessAction {
    pub action: String,
    #[serde(default)]
    pub transaction_time: i64,
}

impl Mine {
    pub fn last_action(&self) -> Option<&ProcessAction> {
        self.process.last()
    }

    pub fn defense_reinforcements(&self) -> usize {
        self.process
            .iter()
            .filter(|p| p.action == "reinforce-defense")
            .count()
    }

    /// Whether the defender can reinforce right now.
    ///
    /// True only while an attack is unanswered: the attackers lead on points,
    /// the last logged action is theirs, the reinforcement window is still open
    /// and the mine has not expired.
    pub fn is_reinforceable(&self, now: i64) -> bool {
        if self.status != MineStatus::Open || self.attack_team_id.is_none() {
            return false;
        }
        if self.attack_point <= self.defense_point {
            return false;
        }
        if self.defense_reinforcements() >= MAX_DEFENSE_REINFORCEMENTS {
            return false;
        }
        if self.end_time > 0 && now >= self.end_time {
            return false;
        }
        match self.last_action() {
            Some(last) if last.action == "attack" || last.action == "reinforce-attack" => {
                now - last.transaction_time < REINFORCE_WINDOW_SECS
            }
            _ => false,
        }
    }
}

/// A team of three crabs owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub team_id: u64,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub game_id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub looting_point: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub battle_point: u32,
    #[serde(default)]
    pub crabada_id_1: Option<u64>,
    #[serde(default)]
    pub crabada_id_2: Option<u64>,
    #[serde(default)]
    pub crabada_id_3: Option<u64>,
}

impl Team {
    pub fn members(&self) -> Vec<u64> {
        [self.crabada_id_1, self.crabada_id_2, self.crabada_id_3]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn is_available(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => status.eq_ignore_ascii_case("available"),
            None => self.game_id.is_none(),
        }
    }
}

/// What a team is being listed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Mine,
    Loot,
}

/// A crab as listed by the lending market or the self-reinforce endpoint.
///
/// `price` is the borrow price in the smallest token unit; it is zero for the
/// user's own crabs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crab {
    pub crabada_id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub battle_point: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mine_point: u32,
    #[serde(default, deserialize_with = "de_price", serialize_with = "ser_price")]
    pub price: U256,
}

/// Where a reinforcement comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    SelfOwned,
    Borrowed,
}

/// The crab chosen to reinforce one mine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReinforcementCandidate {
    pub crab_id: u64,
    pub battle_point: u32,
    pub mine_point: u32,
    pub price: U256,
    pub source: CandidateSource,
}

impl ReinforcementCandidate {
    pub fn self_owned(crab: &Crab) -> Self {
        Self {
            crab_id: crab.crabada_id,
            battle_point: crab.battle_point,
            mine_point: crab.mine_point,
            price: U256::ZERO,
            source: CandidateSource::SelfOwned,
        }
    }

    pub fn borrowed(crab: &Crab) -> Self {
        Self {
            crab_id: crab.crabada_id,
            battle_point: crab.battle_point,
            mine_point: crab.mine_point,
            price: crab.price,
            source: CandidateSource::Borrowed,
        }
    }
}

/// Tally of one reinforcement or mining run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Confirmed with a successful receipt.
    pub succeeded: u32,
    /// Reverted in simulation, at send, or on chain.
    pub failed: u32,
    /// Never submitted: stale, no candidate, too expensive or filtered out.
    pub skipped: u32,
    /// Broadcast but no receipt before the wait ran out.
    pub unconfirmed: u32,
}

impl RunReport {
    pub fn attempted(&self) -> u32 {
        self.succeeded + self.failed + self.unconfirmed
    }
}

/// Convert a whole-TUS decimal into the smallest token unit.
///
/// Fractions below one unit are truncated.
pub fn tus_to_wei(tus: Decimal) -> Result<U256, BotError> {
    if tus.is_sign_negative() && !tus.is_zero() {
        return Err(BotError::ConfigError(format!(
            "TUS amount cannot be negative: {tus}"
        )));
    }
    let scale = Decimal::from(10u64.pow(TUS_DECIMALS));
    let units = tus
        .checked_mul(scale)
        .ok_or_else(|| BotError::ConfigError(format!("TUS amount too large: {tus}")))?
        .trunc();
    U256::from_str_radix(&units.to_string(), 10)
        .map_err(|e| BotError::ConfigError(format!("TUS→wei conversion failed: {e}")))
}

/// Render a smallest-unit amount as TUS for logs and alerts.
pub fn format_tus(amount: U256) -> String {
    alloy::primitives::utils::format_units(amount, TUS_DECIMALS as u8)
        .unwrap_or_else(|_| format!("{amount} wei"))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Prices arrive as JSON integers, floats in exponent notation, or strings.
fn de_price<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(U256::ZERO),
        Some(serde_json::Value::String(s)) => parse_price(&s).map_err(de::Error::custom),
        Some(serde_json::Value::Number(n)) => parse_price(&n.to_string()).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!("invalid price: {other}"))),
    }
}

fn ser_price<S>(price: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&price.to_string())
}

fn parse_price(raw: &str) -> Result<U256, String> {
    let raw = raw.trim();
    if raw.contains(['e', 'E', '.']) {
        let value: f64 = raw.parse().map_err(|e| format!("invalid price '{raw}': {e}"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(format!("invalid price '{raw}'"));
        }
        return Ok(U256::from(value as u128));
    }
    U256::from_str_radix(raw, 10).map_err(|e| format!("invalid price '{raw}': {e}"))
}
