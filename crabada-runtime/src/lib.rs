pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod game_api;
pub mod gateway;
pub mod mining;
pub mod notify;
pub mod reinforce;
pub mod scanner;
pub mod strategy;
pub mod tx_log;
pub mod types;
pub mod watcher;

pub use config::{BotConfig, TeamSettings, User};
pub use error::BotError;
pub use gateway::{ChainRpc, Confirmation, GameCall, GameGateway, GatewaySettings};
pub use strategy::{ReinforceStrategy, ReinforcementEngine};
pub use types::*;
