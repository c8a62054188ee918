//! Solidity bindings for the Crabada idle game contract.
//!
//! Uses alloy's `sol!` macro to generate type-safe ABI encoders/decoders
//! for the calls the bot submits and the events the watcher decodes.

use alloy::primitives::{Address, address};
use alloy::sol;

/// `IdleGame` proxy on Avalanche C-Chain.
pub const IDLE_GAME_ADDRESS: Address = address!("0x82a85407bd612f52577909f4a58bfc6873f14da8");

/// Avalanche C-Chain mainnet.
pub const AVALANCHE_CHAIN_ID: u64 = 43114;

sol! {
    interface IIdleGame {
        event StartGame(uint256 gameId, uint256 teamId, uint256 duration, uint256 craReward, uint256 tusReward);

        function startGame(uint256 teamId) external;
        function attack(uint256 gameId, uint256 teamId, uint256 expiredTime, bytes calldata certificate) external;
        function closeGame(uint256 gameId) external;
        function settleGame(uint256 gameId) external;
        function reinforceDefense(uint256 gameId, uint256 crabadaId, uint256 borrowPrice) external payable;
        function reinforceAttack(uint256 gameId, uint256 crabadaId, uint256 borrowPrice) external payable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn test_reinforce_defense_selector_differs_from_attack() {
        assert_ne!(
            IIdleGame::reinforceDefenseCall::SELECTOR,
            IIdleGame::reinforceAttackCall::SELECTOR
        );
    }

    #[test]
    fn test_encode_start_game() {
        let call = IIdleGame::startGameCall {
            teamId: U256::from(4242u64),
        };
        let data = call.abi_encode();
        // selector + one word
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &IIdleGame::startGameCall::SELECTOR);
    }

    #[test]
    fn test_start_game_event_signature_is_stable() {
        assert_eq!(
            IIdleGame::StartGame::SIGNATURE,
            "StartGame(uint256,uint256,uint256,uint256,uint256)"
        );
    }
}
