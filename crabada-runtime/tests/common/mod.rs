//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256, Bytes, TxHash, U256, address};
use alloy::rpc::types::{Log, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use crabada_runtime::contracts::IIdleGame;
use crabada_runtime::game_api::{GameApi, LendingQuery, MineQuery, TeamQuery};
use crabada_runtime::gateway::{ChainRpc, ReceiptStatus, TransactionOutcome};
use crabada_runtime::notify::Notifier;
use crabada_runtime::watcher::LogSource;
use crabada_runtime::{
    BotError, Crab, Mine, MineStatus, ProcessAction, ReinforceStrategy, Team, TeamSettings, User,
};

pub const USER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const CONTRACT: Address = address!("0x82a85407bd612f52577909f4a58bfc6873f14da8");

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A mine attacked a minute ago, attackers ahead on points.
pub fn mine_under_attack(game_id: u64, team_id: u64) -> Mine {
    let started = now() - 600;
    Mine {
        game_id,
        team_id,
        owner: None,
        status: MineStatus::Open,
        attack_team_id: Some(9_000 + game_id),
        attack_point: 710,
        defense_point: 650,
        start_time: started,
        end_time: started + 4 * 3600,
        process: vec![
            ProcessAction {
                action: "create-game".into(),
                transaction_time: started,
            },
            ProcessAction {
                action: "attack".into(),
                transaction_time: now() - 60,
            },
        ],
    }
}

/// An open mine nobody attacked.
pub fn quiet_mine(game_id: u64, team_id: u64) -> Mine {
    let mut mine = mine_under_attack(game_id, team_id);
    mine.attack_team_id = None;
    mine.attack_point = 0;
    mine.process.truncate(1);
    mine
}

pub fn crab(id: u64, mine_point: u32, price: u64) -> Crab {
    Crab {
        crabada_id: id,
        battle_point: 220,
        mine_point,
        price: U256::from(price),
    }
}

pub fn team(team_id: u64, looting_point: u64) -> Team {
    Team {
        team_id,
        owner: None,
        status: Some("AVAILABLE".into()),
        game_id: None,
        looting_point,
        battle_point: 700,
        crabada_id_1: Some(team_id * 10 + 1),
        crabada_id_2: Some(team_id * 10 + 2),
        crabada_id_3: Some(team_id * 10 + 3),
    }
}

pub fn user_with_ceiling(max_price: u64) -> User {
    User::new(
        USER,
        TeamSettings {
            strategy: ReinforceStrategy::HighestMinePoint,
            max_price: U256::from(max_price),
        },
    )
}

/// Game API backed by vectors, recording what was asked.
#[derive(Default)]
pub struct FakeGameApi {
    pub mines: Mutex<Vec<Mine>>,
    pub teams: Mutex<Vec<Team>>,
    pub lending: Mutex<Vec<Crab>>,
    pub own_crabs: Mutex<Vec<Crab>>,
    pub fail_listing: Mutex<bool>,
    pub fail_get_mine: Mutex<HashSet<u64>>,
    /// What `get_mine` answers instead of the listed mine.
    pub refreshed: Mutex<HashMap<u64, Mine>>,
    pub get_mine_calls: Mutex<Vec<u64>>,
    pub self_reinforce_queries: AtomicUsize,
    pub lending_queries: AtomicUsize,
}

impl FakeGameApi {
    pub fn with_mines(mines: Vec<Mine>) -> Self {
        let api = Self::default();
        *api.mines.lock().unwrap() = mines;
        api
    }

    pub fn set_lending(&self, crabs: Vec<Crab>) {
        *self.lending.lock().unwrap() = crabs;
    }

    pub fn set_own_crabs(&self, crabs: Vec<Crab>) {
        *self.own_crabs.lock().unwrap() = crabs;
    }

    pub fn set_teams(&self, teams: Vec<Team>) {
        *self.teams.lock().unwrap() = teams;
    }

    /// Number of times the strategy engine started a selection.
    pub fn selection_attempts(&self) -> usize {
        self.self_reinforce_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameApi for FakeGameApi {
    async fn list_mines(&self, _query: &MineQuery) -> Result<Vec<Mine>, BotError> {
        if *self.fail_listing.lock().unwrap() {
            return Err(BotError::ServiceUnavailable("/mines answered 502".into()));
        }
        Ok(self.mines.lock().unwrap().clone())
    }

    async fn get_mine(&self, game_id: u64) -> Result<Mine, BotError> {
        self.get_mine_calls.lock().unwrap().push(game_id);
        if self.fail_get_mine.lock().unwrap().contains(&game_id) {
            return Err(BotError::ServiceUnavailable(format!("/mine/{game_id} timed out")));
        }
        if let Some(mine) = self.refreshed.lock().unwrap().get(&game_id) {
            return Ok(mine.clone());
        }
        self.mines
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.game_id == game_id)
            .cloned()
            .ok_or_else(|| BotError::ServiceUnavailable(format!("mine {game_id} not found")))
    }

    async fn list_teams(&self, _user: Address, _query: &TeamQuery) -> Result<Vec<Team>, BotError> {
        Ok(self.teams.lock().unwrap().clone())
    }

    async fn list_crabs_for_lending(&self, _query: &LendingQuery) -> Result<Vec<Crab>, BotError> {
        self.lending_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.lending.lock().unwrap().clone())
    }

    async fn list_crabs_for_self_reinforce(&self, _user: Address) -> Result<Vec<Crab>, BotError> {
        self.self_reinforce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.own_crabs.lock().unwrap().clone())
    }
}

/// Chain RPC double.
///
/// Failures are keyed by the first argument of the call, which is the game id
/// for game calls and the team id for `startGame`.
#[derive(Default)]
pub struct MockRpc {
    pub simulations: Mutex<Vec<Bytes>>,
    pub sent: Mutex<Vec<Bytes>>,
    pub revert_simulation_for: Mutex<HashSet<u64>>,
    pub revert_send_for: Mutex<HashSet<u64>>,
    pub fail_receipt_for: Mutex<HashSet<u64>>,
    pub never_mined: Mutex<bool>,
    pub node_down: Mutex<bool>,
    hashes: Mutex<HashMap<TxHash, u64>>,
}

impl MockRpc {
    pub fn sent_reinforcements(&self) -> Vec<(u64, u64, U256)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|data| IIdleGame::reinforceDefenseCall::abi_decode(data).ok())
            .map(|c| (c.gameId.to::<u64>(), c.crabadaId.to::<u64>(), c.borrowPrice))
            .collect()
    }

    pub fn sent_start_games(&self) -> Vec<u64> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|data| IIdleGame::startGameCall::abi_decode(data).ok())
            .map(|c| c.teamId.to::<u64>())
            .collect()
    }
}

fn first_argument(data: &Bytes) -> u64 {
    if data.len() < 36 {
        return 0;
    }
    U256::from_be_slice(&data[4..36]).to::<u64>()
}

fn calldata(tx: &TransactionRequest) -> Bytes {
    tx.input.input().cloned().unwrap_or_default()
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, BotError> {
        let data = calldata(&tx);
        let key = first_argument(&data);
        self.simulations.lock().unwrap().push(data);
        if self.revert_simulation_for.lock().unwrap().contains(&key) {
            return Err(BotError::Reverted("execution reverted: GAME:ALREADY REINFORCED".into()));
        }
        Ok(Bytes::new())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, BotError> {
        if *self.node_down.lock().unwrap() {
            return Err(BotError::NodeUnavailable("connection refused".into()));
        }
        let data = calldata(&tx);
        let key = first_argument(&data);
        if self.revert_send_for.lock().unwrap().contains(&key) {
            return Err(BotError::Reverted("execution reverted: GAME:TEAM BUSY".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(data);
        let hash = B256::from(U256::from(sent.len()));
        self.hashes.lock().unwrap().insert(hash, key);
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionOutcome>, BotError> {
        if *self.never_mined.lock().unwrap() {
            return Ok(None);
        }
        let key = self.hashes.lock().unwrap().get(&tx_hash).copied().unwrap_or(0);
        let status = if self.fail_receipt_for.lock().unwrap().contains(&key) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };
        Ok(Some(TransactionOutcome {
            tx_hash,
            status,
            block_number: Some(1),
            gas_used: 150_000,
            effective_gas_price: 25_000_000_000,
        }))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), BotError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Hands out scripted batches, then empty batches forever.
pub struct FakeLogSource {
    batches: VecDeque<Result<Vec<Log>, BotError>>,
    pub polls: Arc<AtomicUsize>,
}

impl FakeLogSource {
    pub fn new(batches: Vec<Result<Vec<Log>, BotError>>) -> Self {
        Self {
            batches: batches.into(),
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl LogSource for FakeLogSource {
    async fn new_entries(&mut self) -> Result<Vec<Log>, BotError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.batches.pop_front().unwrap_or(Ok(Vec::new()))
    }
}

pub fn start_game_log(game_id: u64, team_id: u64, block: u64) -> Log {
    let event = IIdleGame::StartGame {
        gameId: U256::from(game_id),
        teamId: U256::from(team_id),
        duration: U256::from(14_400u64),
        craReward: U256::from(3_750_000_000_000_000_000u128),
        tusReward: U256::from(303_750_000_000_000_000_000u128),
    };
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT,
            data: event.encode_log_data(),
        },
        block_number: Some(block),
        ..Default::default()
    }
}
