//! Transaction audit log.
//!
//! Every submission and receipt is emitted on [`TX_LOG_TARGET`] so the
//! binary can route it to a dedicated per-user file next to the app log.

use alloy::primitives::{Address, TxHash};
use alloy::primitives::utils::format_ether;

use crate::gateway::TransactionOutcome;

/// `tracing` target carrying transaction records.
pub const TX_LOG_TARGET: &str = "crabada::transactions";

#[derive(Debug, Clone, Copy)]
pub struct TxLog {
    from: Address,
}

impl TxLog {
    pub fn new(from: Address) -> Self {
        Self { from }
    }

    pub fn submitted(&self, call: &str, tx_hash: TxHash) {
        tracing::info!(target: TX_LOG_TARGET, from = %self.from, call, %tx_hash, "transaction sent");
    }

    pub fn receipt(&self, outcome: &TransactionOutcome) {
        let gas_cost = format_ether(outcome.gas_cost());
        tracing::info!(
            target: TX_LOG_TARGET,
            from = %self.from,
            tx_hash = %outcome.tx_hash,
            status = ?outcome.status,
            block = ?outcome.block_number,
            gas_used = outcome.gas_used,
            effective_gas_price = outcome.effective_gas_price,
            "receipt; gas cost {gas_cost} AVAX"
        );
    }

    pub fn unconfirmed(&self, tx_hash: TxHash) {
        tracing::warn!(target: TX_LOG_TARGET, from = %self.from, %tx_hash, "no receipt before timeout");
    }
}
