//! Ethereum interaction module.
//!
//! Contains the node client, key material and nonce sequencing.

pub mod client;
pub mod constants;
pub mod nonce;
pub mod wallet;

pub use client::{ChainClient, EthereumClient, NodeProvider};
pub use nonce::{NonceManager, NonceReservation};
pub use wallet::KeyPair;
