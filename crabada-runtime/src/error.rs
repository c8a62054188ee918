use alloy::primitives::U256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Game API unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Reinforcement too expensive: cheapest {cheapest} wei, ceiling {ceiling} wei")]
    ReinforcementTooExpensive { cheapest: U256, ceiling: U256 },

    #[error("No suitable reinforcement found: {0}")]
    NoSuitableReinforcementFound(String),

    #[error("Contract call reverted: {0}")]
    Reverted(String),

    #[error("Chain node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Log filter invalid: {0}")]
    FilterInvalid(String),

    #[error("Log handler failed: {0}")]
    HandlerFailed(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl BotError {
    /// Outcomes the orchestrators log and skip without aborting a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BotError::ServiceUnavailable(_)
                | BotError::ReinforcementTooExpensive { .. }
                | BotError::NoSuitableReinforcementFound(_)
                | BotError::Reverted(_)
                | BotError::NotificationFailed(_)
        )
    }

    /// Conditions that must end the current run or loop and reach the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::NodeUnavailable(_) | BotError::FilterInvalid(_) | BotError::ConfigError(_)
        )
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::ServiceUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::SerializationError(e.to_string())
    }
}
