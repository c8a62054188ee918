//! Blockchain log watcher.
//!
//! Polls a log source and passes each new entry through the registered
//! handlers, in registration order, before moving to the next entry. The
//! loop runs until the shutdown channel flips to `true` (or its sender is
//! dropped), a handler fails, or the source reports a fatal error.

use std::time::Duration;

use alloy::primitives::U256;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::BotError;

/// Something that yields the log entries that appeared since the last call.
#[async_trait]
pub trait LogSource: Send {
    async fn new_entries(&mut self) -> Result<Vec<Log>, BotError>;
}

/// Node-side log filter (`eth_newFilter` / `eth_getFilterChanges`).
pub struct FilterLogSource<P> {
    provider: P,
    filter_id: U256,
}

impl<P: Provider + Send + Sync> FilterLogSource<P> {
    /// Install `filter` on the node.
    pub async fn install(provider: P, filter: &Filter) -> Result<Self, BotError> {
        let filter_id = provider
            .new_filter(filter)
            .await
            .map_err(classify_filter_error)?;
        tracing::debug!(%filter_id, "log filter installed");
        Ok(Self {
            provider,
            filter_id,
        })
    }
}

impl FilterLogSource<RootProvider> {
    /// Read-only HTTP connection; watching needs no signer.
    pub async fn connect_http(rpc_url: &str, filter: &Filter) -> Result<Self, BotError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| BotError::ConfigError(format!("Invalid RPC URL: {e}")))?;
        Self::install(RootProvider::new_http(url), filter).await
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> LogSource for FilterLogSource<P> {
    async fn new_entries(&mut self) -> Result<Vec<Log>, BotError> {
        self.provider
            .get_filter_changes::<Log>(self.filter_id)
            .await
            .map_err(classify_filter_error)
    }
}

/// An error response from the node (e.g. "filter not found") means the
/// filter is gone; anything else means the node could not be reached.
fn classify_filter_error(e: alloy::transports::TransportError) -> BotError {
    match e.as_error_resp() {
        Some(payload) => BotError::FilterInvalid(payload.message.to_string()),
        None => BotError::NodeUnavailable(e.to_string()),
    }
}

pub type LogHandler = Box<dyn FnMut(&Log) -> Result<(), BotError> + Send>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub polls: u64,
    pub entries: u64,
}

pub struct Watcher<S> {
    source: S,
    handlers: Vec<LogHandler>,
    poll_interval: Duration,
}

impl<S: LogSource> Watcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            handlers: Vec::new(),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn add_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Log) -> Result<(), BotError> + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<WatchStats, BotError> {
        let mut stats = WatchStats::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let entries = self.source.new_entries().await?;
            stats.polls += 1;

            if entries.is_empty() {
                tracing::debug!("no new log entry");
            }
            for entry in &entries {
                tracing::debug!(
                    tx_hash = ?entry.transaction_hash,
                    block = ?entry.block_number,
                    "new log entry"
                );
                for handler in self.handlers.iter_mut() {
                    handler(entry)?;
                }
                stats.entries += 1;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(polls = stats.polls, entries = stats.entries, "watcher stopped");
        Ok(stats)
    }
}
