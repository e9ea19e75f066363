//! Common utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::{
    consensus::{Transaction as _, TxEnvelope},
    eips::{eip2718::Decodable2718, BlockId},
    primitives::{Address, Bytes, TxHash, TxKind, U256},
};
use async_trait::async_trait;
use eth_contract_mcp::{
    config::Timeouts, types::TransactionSummary, AppError, ChainClient, Config,
    EthereumContractServer, MinedReceipt, Result,
};

/// Helper to create a test server from environment variables.
///
/// `ETHEREUM_PRIVATE_KEY` is optional; without it only read tools work.
pub async fn create_test_server() -> Option<EthereumContractServer> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let rpc_url = std::env::var("ETHEREUM_RPC_URL").ok().filter(|url| !url.is_empty())?;
    let private_key = std::env::var("ETHEREUM_PRIVATE_KEY").ok().filter(|key| !key.is_empty());

    let config =
        Config { rpc_url, private_key, log_level: "warn".to_string(), timeouts: Timeouts::default() };

    EthereumContractServer::new(config).await.ok()
}

/// Skip test if server cannot be created (missing env vars or unreachable node).
#[macro_export]
macro_rules! skip_if_no_server {
    () => {
        match common::create_test_server().await {
            Some(server) => server,
            None => {
                eprintln!("Skipping test: ETHEREUM_RPC_URL not set or node unreachable");
                return;
            }
        }
    };
}

/// Well-known Hardhat/Foundry test account #0 (DO NOT use in production!)
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// ABI of a one-slot storage contract: `constructor(uint256)`, `get()`, `set(uint256)`.
pub const STORAGE_ABI: &str = r#"[
    {"inputs":[{"internalType":"uint256","name":"initial","type":"uint256"}],"stateMutability":"nonpayable","type":"constructor"},
    {"inputs":[],"name":"get","outputs":[{"internalType":"uint256","name":"","type":"uint256"}],"stateMutability":"view","type":"function"},
    {"inputs":[{"internalType":"uint256","name":"value","type":"uint256"}],"name":"set","outputs":[],"stateMutability":"nonpayable","type":"function"}
]"#;

/// Creation code prefix of the storage contract (constructor args follow it).
pub const STORAGE_BYTECODE: &str = "0x6080604052";

/// `set` reverts for values above this.
pub const STORAGE_LIMIT: u64 = 1000;

const GET_SELECTOR: [u8; 4] = [0x6d, 0x4c, 0xe6, 0x3c];
const SET_SELECTOR: [u8; 4] = [0x60, 0xfe, 0x47, 0xb1];
const CHAIN_ID: u64 = 31337;

#[derive(Default)]
struct ChainState {
    stored: U256,
    next_nonce: u64,
    block: u64,
    receipts: HashMap<TxHash, MinedReceipt>,
    transactions: HashMap<TxHash, TransactionSummary>,
}

/// In-memory node hosting a single storage contract.
///
/// Every accepted transaction is mined immediately into its own block.
#[derive(Default)]
pub struct StorageChain {
    state: Mutex<ChainState>,
}

impl StorageChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions accepted so far.
    pub fn transaction_count(&self) -> u64 {
        self.state.lock().unwrap().next_nonce
    }
}

fn word(data: &[u8]) -> U256 {
    U256::from_be_slice(&data[..32])
}

#[async_trait]
impl ChainClient for StorageChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn balance_of(&self, _address: Address, _block: BlockId) -> Result<U256> {
        Ok(U256::from(10u64).pow(U256::from(18u64)))
    }

    async fn suggested_gas_price(&self) -> Result<u128> {
        Ok(1_000_000_000)
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<(TransactionSummary, bool)> {
        let state = self.state.lock().unwrap();
        let summary = state
            .transactions
            .get(&hash)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("transaction {hash}")))?;
        let pending = summary.block_number.is_none();
        Ok((summary, pending))
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<MinedReceipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64> {
        Ok(self.state.lock().unwrap().next_nonce)
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        if data.len() >= 4 && data[..4] == GET_SELECTOR {
            let stored = self.state.lock().unwrap().stored;
            return Ok(Bytes::from(stored.to_be_bytes::<32>().to_vec()));
        }
        Err(AppError::Rpc {
            message: "execution reverted".into(),
            revert_reason: Some("unknown selector".into()),
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash> {
        let tx = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| AppError::Rpc { message: e.to_string(), revert_reason: None })?;

        let mut state = self.state.lock().unwrap();
        if tx.chain_id() != Some(CHAIN_ID) {
            return Err(AppError::Rpc { message: "invalid chain id".into(), revert_reason: None });
        }
        if tx.nonce() != state.next_nonce {
            return Err(AppError::Rpc { message: "nonce too low".into(), revert_reason: None });
        }

        let input = tx.input();
        let success = match tx.kind() {
            TxKind::Create => {
                // 5-byte creation code followed by the constructor argument.
                state.stored = word(&input[5..]);
                true
            }
            TxKind::Call(_) if input.len() >= 36 && input[..4] == SET_SELECTOR => {
                let value = word(&input[4..]);
                if value > U256::from(STORAGE_LIMIT) {
                    false
                } else {
                    state.stored = value;
                    true
                }
            }
            TxKind::Call(_) => false,
        };

        let hash = *tx.tx_hash();
        state.next_nonce += 1;
        state.block += 1;
        let block = state.block;

        state.transactions.insert(
            hash,
            TransactionSummary {
                hash,
                from: Address::ZERO,
                to: tx.to(),
                nonce: tx.nonce(),
                value: tx.value(),
                gas_limit: tx.gas_limit(),
                block_number: Some(block),
            },
        );
        state.receipts.insert(
            hash,
            MinedReceipt {
                tx_hash: hash,
                block_number: Some(block),
                gas_used: 21_000,
                success,
                contract_address: None,
            },
        );

        Ok(hash)
    }
}
