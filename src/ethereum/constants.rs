//! Ethereum network constants.
//!
//! Contains chain IDs and the default deadlines for node operations.

use std::time::Duration;

// ============================================================================
// Chain IDs
// ============================================================================

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET_CHAIN_ID: u64 = 1;

/// Sepolia testnet chain ID.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Chain ID used by local development nodes (Anvil, Hardhat).
pub const LOCAL_DEV_CHAIN_ID: u64 = 31337;

// ============================================================================
// Deadlines
// ============================================================================

/// Default deadline for balance queries.
pub const DEFAULT_BALANCE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default deadline for a single RPC request (chain id, gas price, call, submit).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for waiting until a transaction is mined.
pub const DEFAULT_MINED_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Human-readable name of a well-known chain.
pub fn network_name(chain_id: u64) -> &'static str {
    match chain_id {
        ETHEREUM_MAINNET_CHAIN_ID => "mainnet",
        SEPOLIA_CHAIN_ID => "sepolia",
        LOCAL_DEV_CHAIN_ID => "local",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_name() {
        assert_eq!(network_name(1), "mainnet");
        assert_eq!(network_name(11155111), "sepolia");
        assert_eq!(network_name(31337), "local");
        assert_eq!(network_name(5), "unknown");
    }
}
