//! Transaction gateway for the idle game contract.
//!
//! Encodes game calls with the `sol!` bindings from [`crate::contracts`],
//! runs the pre-send simulations each call requires, submits the
//! transaction and waits (bounded) for its receipt.
//!
//! Simulation policy per call:
//! - `startGame`, `attack`: none (gas estimation still rejects reverts)
//! - `closeGame`, `settleGame`: one `eth_call` before sending
//! - `reinforceDefense`, `reinforceAttack`: `eth_call`, pause, `eth_call`
//!   again, then send. The market listing is not locked, so the second
//!   simulation catches a crab that was rented or a mine that was
//!   reinforced by someone else in the meantime.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::contracts::IIdleGame;
use crate::error::BotError;
use crate::tx_log::TxLog;

/// The JSON-RPC operations the gateway needs from a chain node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_call`; a revert surfaces as [`BotError::Reverted`].
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, BotError>;

    /// Sign and broadcast; returns as soon as the node accepted the transaction.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, BotError>;

    /// `None` while the transaction is still pending.
    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionOutcome>, BotError>;
}

#[async_trait]
impl<T: ChainRpc + ?Sized> ChainRpc for Arc<T> {
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, BotError> {
        (**self).call(tx).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, BotError> {
        (**self).send_transaction(tx).await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionOutcome>, BotError> {
        (**self).transaction_receipt(tx_hash).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Mined transaction as seen in its receipt.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub tx_hash: TxHash,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Native-token cost of the transaction (gas used × effective gas price).
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Where a submitted transaction ended up once the receipt wait is over.
#[derive(Debug, Clone)]
pub enum Confirmation {
    Confirmed(TransactionOutcome),
    /// Accepted by the node but no receipt within the polling budget.
    Unconfirmed(TxHash),
}

impl Confirmation {
    pub fn tx_hash(&self) -> TxHash {
        match self {
            Confirmation::Confirmed(outcome) => outcome.tx_hash,
            Confirmation::Unconfirmed(hash) => *hash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simulation {
    None,
    Once,
    Twice,
}

/// A state-changing call on the idle game contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCall {
    StartGame {
        team_id: u64,
    },
    Attack {
        game_id: u64,
        team_id: u64,
        expired_time: u64,
        certificate: Bytes,
    },
    CloseGame {
        game_id: u64,
    },
    SettleGame {
        game_id: u64,
    },
    ReinforceDefense {
        game_id: u64,
        crab_id: u64,
        price: U256,
    },
    ReinforceAttack {
        game_id: u64,
        crab_id: u64,
        price: U256,
    },
}

impl GameCall {
    pub fn name(&self) -> &'static str {
        match self {
            GameCall::StartGame { .. } => "startGame",
            GameCall::Attack { .. } => "attack",
            GameCall::CloseGame { .. } => "closeGame",
            GameCall::SettleGame { .. } => "settleGame",
            GameCall::ReinforceDefense { .. } => "reinforceDefense",
            GameCall::ReinforceAttack { .. } => "reinforceAttack",
        }
    }

    pub fn simulation(&self) -> Simulation {
        match self {
            GameCall::StartGame { .. } | GameCall::Attack { .. } => Simulation::None,
            GameCall::CloseGame { .. } | GameCall::SettleGame { .. } => Simulation::Once,
            GameCall::ReinforceDefense { .. } | GameCall::ReinforceAttack { .. } => {
                Simulation::Twice
            }
        }
    }

    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            GameCall::StartGame { team_id } => IIdleGame::startGameCall {
                teamId: U256::from(*team_id),
            }
            .abi_encode(),
            GameCall::Attack {
                game_id,
                team_id,
                expired_time,
                certificate,
            } => IIdleGame::attackCall {
                gameId: U256::from(*game_id),
                teamId: U256::from(*team_id),
                expiredTime: U256::from(*expired_time),
                certificate: certificate.clone(),
            }
            .abi_encode(),
            GameCall::CloseGame { game_id } => IIdleGame::closeGameCall {
                gameId: U256::from(*game_id),
            }
            .abi_encode(),
            GameCall::SettleGame { game_id } => IIdleGame::settleGameCall {
                gameId: U256::from(*game_id),
            }
            .abi_encode(),
            GameCall::ReinforceDefense {
                game_id,
                crab_id,
                price,
            } => IIdleGame::reinforceDefenseCall {
                gameId: U256::from(*game_id),
                crabadaId: U256::from(*crab_id),
                borrowPrice: *price,
            }
            .abi_encode(),
            GameCall::ReinforceAttack {
                game_id,
                crab_id,
                price,
            } => IIdleGame::reinforceAttackCall {
                gameId: U256::from(*game_id),
                crabadaId: U256::from(*crab_id),
                borrowPrice: *price,
            }
            .abi_encode(),
        };
        Bytes::from(encoded)
    }
}

/// Timing and fee knobs for the gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Pause between the two simulations of a reinforcement.
    pub simulation_delay: Duration,
    pub receipt_poll_interval: Duration,
    pub receipt_poll_attempts: u32,
    /// Wei; left to the provider's gas filler when `None`.
    pub max_priority_fee_per_gas: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            simulation_delay: Duration::from_secs(2),
            receipt_poll_interval: Duration::from_secs(2),
            receipt_poll_attempts: 60,
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
        }
    }
}

/// Submits game calls from one wallet to one game contract.
pub struct GameGateway<R> {
    rpc: R,
    contract: Address,
    from: Address,
    settings: GatewaySettings,
    tx_log: TxLog,
}

impl<R: ChainRpc> GameGateway<R> {
    pub fn new(rpc: R, contract: Address, from: Address) -> Self {
        Self {
            rpc,
            contract,
            from,
            settings: GatewaySettings::default(),
            tx_log: TxLog::new(from),
        }
    }

    pub fn with_settings(mut self, settings: GatewaySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn from_address(&self) -> Address {
        self.from
    }

    fn request(&self, call: &GameCall) -> TransactionRequest {
        let mut tx = TransactionRequest::default()
            .from(self.from)
            .to(self.contract)
            .input(call.calldata().into());
        if let Some(tip) = self.settings.max_priority_fee_per_gas {
            tx = tx.max_priority_fee_per_gas(tip);
        }
        if let Some(cap) = self.settings.max_fee_per_gas {
            tx = tx.max_fee_per_gas(cap);
        }
        tx
    }

    /// Dry-run the call against the latest state.
    pub async fn simulate(&self, call: &GameCall) -> Result<Bytes, BotError> {
        let tx = TransactionRequest::default()
            .from(self.from)
            .to(self.contract)
            .input(call.calldata().into());
        self.rpc.call(tx).await
    }

    /// Run the call's simulation policy, then broadcast it.
    pub async fn submit(&self, call: &GameCall) -> Result<TxHash, BotError> {
        match call.simulation() {
            Simulation::None => {}
            Simulation::Once => {
                self.simulate(call).await?;
            }
            Simulation::Twice => {
                self.simulate(call).await?;
                tokio::time::sleep(self.settings.simulation_delay).await;
                self.simulate(call).await?;
            }
        }

        let tx_hash = self.rpc.send_transaction(self.request(call)).await?;
        self.tx_log.submitted(call.name(), tx_hash);
        Ok(tx_hash)
    }

    /// Poll for the receipt, at most `receipt_poll_attempts` times.
    ///
    /// Node errors while polling are retried like a missing receipt; the
    /// transaction is already broadcast, so giving up yields
    /// [`Confirmation::Unconfirmed`] rather than an error.
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Confirmation, BotError> {
        for attempt in 1..=self.settings.receipt_poll_attempts.max(1) {
            match self.rpc.transaction_receipt(tx_hash).await {
                Ok(Some(outcome)) => {
                    self.tx_log.receipt(&outcome);
                    return Ok(Confirmation::Confirmed(outcome));
                }
                Ok(None) => {
                    tracing::debug!(%tx_hash, attempt, "receipt not available yet");
                }
                Err(e) => {
                    tracing::warn!(%tx_hash, attempt, "receipt poll failed: {e}");
                }
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }

        self.tx_log.unconfirmed(tx_hash);
        Ok(Confirmation::Unconfirmed(tx_hash))
    }

    /// Submit and wait for the receipt.
    pub async fn execute(&self, call: &GameCall) -> Result<Confirmation, BotError> {
        let tx_hash = self.submit(call).await?;
        self.wait_for_receipt(tx_hash).await
    }

    /// Send a team mining.
    pub async fn start_game(&self, team_id: u64) -> Result<Confirmation, BotError> {
        self.execute(&GameCall::StartGame { team_id }).await
    }

    /// Attack an open mine.
    pub async fn attack(
        &self,
        game_id: u64,
        team_id: u64,
        expired_time: u64,
        certificate: Bytes,
    ) -> Result<Confirmation, BotError> {
        self.execute(&GameCall::Attack {
            game_id,
            team_id,
            expired_time,
            certificate,
        })
        .await
    }

    /// Close a mining game, claim the reward and send the crabs home.
    pub async fn close_game(&self, game_id: u64) -> Result<Confirmation, BotError> {
        self.execute(&GameCall::CloseGame { game_id }).await
    }

    /// Close a looting game, claim the reward and send the crabs home.
    pub async fn settle_game(&self, game_id: u64) -> Result<Confirmation, BotError> {
        self.execute(&GameCall::SettleGame { game_id }).await
    }

    /// Add a crab to the mining team; `price` is in the smallest TUS unit.
    pub async fn reinforce_defense(
        &self,
        game_id: u64,
        crab_id: u64,
        price: U256,
    ) -> Result<Confirmation, BotError> {
        self.execute(&GameCall::ReinforceDefense {
            game_id,
            crab_id,
            price,
        })
        .await
    }

    /// Add a crab to the looting team; `price` is in the smallest TUS unit.
    pub async fn reinforce_attack(
        &self,
        game_id: u64,
        crab_id: u64,
        price: U256,
    ) -> Result<Confirmation, BotError> {
        self.execute(&GameCall::ReinforceAttack {
            game_id,
            crab_id,
            price,
        })
        .await
    }
}
