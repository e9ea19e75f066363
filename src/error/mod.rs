//! Error types and handling module.
//!
//! Defines all application-specific error types and conversions.

use std::time::Duration;

use alloy::primitives::TxHash;
use alloy::transports::TransportError;
use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The node could not be reached or the handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Ethereum RPC errors, including contract-level reverts of `eth_call`.
    #[error("Ethereum RPC error: {message}{}", revert_suffix(.revert_reason))]
    Rpc { message: String, revert_reason: Option<String> },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Requested object does not exist on the node.
    #[error("Not found: {0}")]
    NotFound(String),

    /// ABI text or bytecode could not be parsed.
    #[error("ABI parse error: {0}")]
    AbiParse(String),

    /// Arguments could not be ABI-encoded against the method signature.
    #[error("ABI encode error: {0}")]
    AbiEncode(String),

    /// Return data could not be decoded against the method outputs.
    #[error("ABI decode error: {0}")]
    AbiDecode(String),

    /// No ABI entry with the given name.
    #[error("Method not found in ABI: {0}")]
    MethodNotFound(String),

    /// Wrong number of arguments for an ABI entry.
    #[error("Argument count mismatch: expected {expected}, got {actual}")]
    ArgCountMismatch { expected: usize, actual: usize },

    /// A string argument could not be converted to its ABI type.
    #[error("Invalid argument #{index} of type '{ty}' ('{value}'): {reason}")]
    ArgParse { index: usize, ty: String, value: String, reason: String },

    /// Invalid Ethereum address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The randomness source failed while generating a key.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// A private key was not a valid secp256k1 scalar.
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Signing a digest or transaction failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The node rejected a signed transaction.
    #[error("Submission error: {0}")]
    Submission(String),

    /// Transaction was included in a block but execution failed.
    #[error("Transaction {tx_hash} was mined{} but execution failed", block_suffix(.block_number))]
    TransactionFailed { tx_hash: TxHash, block_number: Option<u64> },

    /// The chain id needed to scope a signature could not be fetched.
    #[error("Chain ID unavailable: {0}")]
    ChainIdUnavailable(String),
}

fn revert_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(" (revert reason: {r})")).unwrap_or_default()
}

fn block_suffix(block: &Option<u64>) -> String {
    block.map(|b| format!(" in block {b}")).unwrap_or_default()
}

impl AppError {
    /// Build an RPC error from a transport failure, keeping any revert reason.
    pub fn rpc(err: &TransportError) -> Self {
        AppError::Rpc { message: err.to_string(), revert_reason: revert_reason(err) }
    }

    /// Whether the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout { .. })
    }
}

/// Extract a human-readable revert reason from a JSON-RPC error response.
///
/// Prefers ABI-encoded revert data (`Error(string)` / `Panic(uint256)`) and
/// falls back to the `execution reverted: ...` message some nodes return.
pub fn revert_reason(err: &TransportError) -> Option<String> {
    let payload = err.as_error_resp()?;

    if let Some(data) = payload.as_revert_data() {
        if let Some(reason) = alloy::sol_types::decode_revert_reason(&data) {
            return Some(reason);
        }
    }

    payload
        .message
        .strip_prefix("execution reverted")
        .map(|rest| rest.trim_start_matches(':').trim().to_string())
        .filter(|rest| !rest.is_empty())
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        AppError::rpc(&err)
    }
}

impl From<alloy::signers::local::LocalSignerError> for AppError {
    fn from(err: alloy::signers::local::LocalSignerError) -> Self {
        AppError::InvalidKeyEncoding(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::AbiParse(err.to_string())
    }
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidAddress(_)
            | AppError::AbiParse(_)
            | AppError::AbiEncode(_)
            | AppError::MethodNotFound(_)
            | AppError::ArgCountMismatch { .. }
            | AppError::ArgParse { .. }
            | AppError::InvalidKeyEncoding(_)
            | AppError::NotFound(_) => McpError::invalid_params(err.to_string(), None),
            AppError::Config(_) => McpError::invalid_request(err.to_string(), None),
            _ => McpError::internal_error(err.to_string(), None),
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
