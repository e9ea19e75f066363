//! Transaction-related types.

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use serde::{Serialize, Serializer};

/// Caller-supplied options for a state-mutating transaction.
///
/// Nothing here is defaulted or estimated; every deploy/send builds its
/// request from these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    /// Wei transferred with the transaction.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Legacy gas price in wei.
    pub gas_price: u128,
}

impl TransactionOptions {
    /// Create options from explicit values.
    pub fn new(value: U256, gas_limit: u64, gas_price: u128) -> Self {
        Self { value, gas_limit, gas_price }
    }

    pub(crate) fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        tx.with_value(self.value).with_gas_limit(self.gas_limit).with_gas_price(self.gas_price)
    }
}

/// Serialize an address in EIP-55 mixed-case form.
pub fn serialize_checksummed<S: Serializer>(
    address: &Address,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

fn serialize_checksummed_opt<S: Serializer>(
    address: &Option<Address>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match address {
        Some(address) => serialize_checksummed(address, serializer),
        None => serializer.serialize_none(),
    }
}

fn serialize_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Result of a contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    /// Contract address derived from sender and nonce.
    ///
    /// Only authoritative once the transaction is mined.
    #[serde(serialize_with = "serialize_checksummed")]
    pub address: Address,
    /// Deployment transaction hash.
    pub tx_hash: TxHash,
    /// Nonce the deployment was signed with.
    pub nonce: u64,
}

/// Result of a state-mutating contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Nonce the transaction was signed with.
    pub nonce: u64,
}

/// Receipt of a transaction that has been included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinedReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Address of the created contract, for deployments.
    #[serde(serialize_with = "serialize_checksummed_opt", skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
}

/// Transaction data as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    /// Transaction hash.
    pub hash: TxHash,
    /// Sender.
    #[serde(serialize_with = "serialize_checksummed")]
    pub from: Address,
    /// Recipient; `None` for contract creation.
    #[serde(serialize_with = "serialize_checksummed_opt")]
    pub to: Option<Address>,
    /// Sender nonce.
    pub nonce: u64,
    /// Wei transferred.
    #[serde(serialize_with = "serialize_decimal")]
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Block number, `None` while pending.
    pub block_number: Option<u64>,
}

/// Lifecycle state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    /// Known to the node but not yet included.
    Pending,
    /// Included and executed successfully.
    Success { receipt: MinedReceipt },
    /// Included but execution failed.
    Reverted { receipt: MinedReceipt },
    /// Unknown to the node: never propagated or evicted from the pool.
    Dropped,
}

impl TxStatus {
    /// Whether the state is final (mined either way).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Success { .. } | TxStatus::Reverted { .. })
    }
}
