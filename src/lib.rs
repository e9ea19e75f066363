//! Ethereum Contract MCP Server Library
//!
//! An ABI-driven Ethereum contract client: connect to a node, query
//! balances and transactions, and deploy and call contracts from their ABI
//! with locally managed secp256k1 keys. The same functionality is exposed
//! as a Model Context Protocol server.
//!
//! # Features
//!
//! - **Key Management**: Generate and load secp256k1 key pairs
//! - **Chain Queries**: Balance, chain ID, gas price, transaction lookup and receipt polling
//! - **Contracts**: Parse ABIs, encode string arguments, deploy, call and send
//! - **Nonce Sequencing**: Concurrent sends from one key never reuse a nonce
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eth_contract_mcp::{
//!     config::Timeouts, ContractDescriptor, ContractInvoker, EthereumClient, KeyPair,
//!     NonceManager, TransactionOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EthereumClient::connect("http://localhost:8545", Timeouts::default()).await?;
//!     let key_pair = KeyPair::from_hex(&std::env::var("ETHEREUM_PRIVATE_KEY")?)?;
//!
//!     let descriptor = ContractDescriptor::new(ABI, BYTECODE, None)?;
//!     let invoker = ContractInvoker::new(descriptor, Arc::new(NonceManager::new()));
//!
//!     let opts = TransactionOptions::new(Default::default(), 500_000, 1_000_000_000);
//!     let deployed = invoker.deploy_with_strings(&client, &key_pair, &opts, &["42"]).await?;
//!     let value = invoker.call_with_strings(&client, deployed.address, "get", &[] as &[&str]).await?;
//!     println!("{}", value.to_json());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod ethereum;
pub mod mcp;
pub mod types;

pub use config::Config;
pub use contract::{AbiArg, ArgCoder, CallResult, ContractDescriptor, ContractInvoker};
pub use error::{AppError, Result};
pub use ethereum::constants::*;
pub use ethereum::{ChainClient, EthereumClient, KeyPair, NonceManager};
pub use mcp::EthereumContractServer;
pub use types::{DeployResult, MinedReceipt, SendResult, TransactionOptions, TxStatus};
