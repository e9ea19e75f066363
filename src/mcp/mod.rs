//! MCP server module.
//!
//! Contains the MCP server implementation with tool handlers.

pub mod server;

pub use server::EthereumContractServer;
pub use server::{
    CallContractInput, DeployContractInput, GetBalanceInput, ListMethodsInput,
    SendTransactionInput, TransactionHashInput, WaitForMinedInput,
};
