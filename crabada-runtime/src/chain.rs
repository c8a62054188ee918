//! Chain client for Avalanche C-Chain (or any EVM-compatible node).
//!
//! Provides a configured provider with a local signer (private key)
//! for simulating and submitting game transactions.

use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use async_trait::async_trait;

use crate::error::BotError;
use crate::gateway::{ChainRpc, ReceiptStatus, TransactionOutcome};

/// The concrete provider type produced by `ProviderBuilder::new().wallet(...).connect_http(...)`.
///
/// This is a fully-configured provider that fills nonce, gas, chain ID, and
/// signs transactions with the supplied wallet.
pub type HttpProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
    Ethereum,
>;

/// A chain client wrapping an alloy provider with a local signer.
pub struct ChainClient {
    pub provider: HttpProvider,
    pub address: Address,
    pub chain_id: u64,
}

impl ChainClient {
    /// Create a new chain client from an RPC URL and hex-encoded private key.
    ///
    /// The private key should be a hex string (with or without "0x" prefix).
    pub fn new(rpc_url: &str, private_key: &str, chain_id: u64) -> Result<Self, BotError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| BotError::ConfigError(format!("Invalid private key: {e}")))?;
        let address = signer.address();

        let wallet = EthereumWallet::from(signer);

        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| BotError::ConfigError(format!("Invalid RPC URL: {e}")))?;

        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        Ok(Self {
            provider,
            address,
            chain_id,
        })
    }

    /// Fail when the node serves a different chain than the one configured.
    pub async fn verify_chain_id(&self) -> Result<(), BotError> {
        let node_chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| BotError::NodeUnavailable(e.to_string()))?;
        if node_chain_id != self.chain_id {
            return Err(BotError::ConfigError(format!(
                "Node serves chain {node_chain_id}, configured chain is {}",
                self.chain_id
            )));
        }
        Ok(())
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }
}

#[async_trait]
impl ChainRpc for ChainClient {
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, BotError> {
        self.provider.call(tx).await.map_err(classify_rpc_error)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, BotError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(classify_rpc_error)?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionOutcome>, BotError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(classify_rpc_error)?;

        Ok(receipt.map(|r| TransactionOutcome {
            tx_hash: r.transaction_hash,
            status: if r.status() {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            },
            block_number: r.block_number,
            gas_used: r.gas_used,
            effective_gas_price: r.effective_gas_price,
        }))
    }
}

/// A JSON-RPC error response means the node answered and refused the call
/// (revert, bad nonce, insufficient funds); anything else means we could not
/// talk to the node at all.
pub(crate) fn classify_rpc_error(e: TransportError) -> BotError {
    match e.as_error_resp() {
        Some(payload) => BotError::Reverted(payload.message.to_string()),
        None => BotError::NodeUnavailable(e.to_string()),
    }
}
