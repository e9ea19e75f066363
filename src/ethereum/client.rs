//! Ethereum RPC client.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    consensus::Transaction as _,
    eips::BlockId,
    network::{Ethereum, ReceiptResponse as _, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Transaction, TransactionReceipt, TransactionRequest},
    transports::TransportResult,
};
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::{
    config::Timeouts,
    error::{AppError, Result},
    ethereum::wallet::KeyPair,
    types::{MinedReceipt, TransactionSummary, TxStatus},
};

/// Type alias for the node provider.
pub type NodeProvider = RootProvider<Ethereum>;

/// A connection to a single Ethereum node.
///
/// Read operations are side-effect free and may run concurrently. Every
/// operation is bounded by a deadline; on expiry it fails with
/// [`AppError::Timeout`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Network identifier every signature must be scoped to.
    async fn chain_id(&self) -> Result<u64>;

    /// Balance in wei at the given block.
    async fn balance_of(&self, address: Address, block: BlockId) -> Result<U256>;

    /// Gas price suggested by the node.
    async fn suggested_gas_price(&self) -> Result<u128>;

    /// Look up a transaction; the flag is `true` while it is pending.
    async fn transaction_by_hash(&self, hash: TxHash) -> Result<(TransactionSummary, bool)>;

    /// Receipt of a mined transaction, `None` if not yet mined.
    async fn receipt(&self, hash: TxHash) -> Result<Option<MinedReceipt>>;

    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    /// Execute `eth_call` against `to` at the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash>;

    /// Balance in wei at the latest block.
    async fn balance(&self, address: Address) -> Result<U256> {
        self.balance_of(address, BlockId::latest()).await
    }

    /// Classify a submitted transaction.
    async fn transaction_status(&self, hash: TxHash) -> Result<TxStatus> {
        if let Some(receipt) = self.receipt(hash).await? {
            return Ok(if receipt.success {
                TxStatus::Success { receipt }
            } else {
                TxStatus::Reverted { receipt }
            });
        }

        match self.transaction_by_hash(hash).await {
            Ok(_) => Ok(TxStatus::Pending),
            Err(AppError::NotFound(_)) => Ok(TxStatus::Dropped),
            Err(e) => Err(e),
        }
    }

    /// Poll for the receipt of `hash` until it is mined or `timeout` expires.
    ///
    /// Failed receipt lookups are logged and retried; only the deadline
    /// ends the wait. A transaction that was included but failed is
    /// reported as [`AppError::TransactionFailed`], never as success.
    async fn wait_for_mined(
        &self,
        hash: TxHash,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<MinedReceipt> {
        tokio::time::timeout(timeout, poll_until_mined(self, hash, poll_interval))
            .await
            .map_err(|_| AppError::Timeout {
                operation: format!("waiting for transaction {hash}"),
                timeout,
            })?
    }
}

async fn poll_until_mined<C: ChainClient + ?Sized>(
    client: &C,
    hash: TxHash,
    poll_interval: Duration,
) -> Result<MinedReceipt> {
    loop {
        let receipt = match client.receipt(hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(tx_hash = %hash, error = %e, "Failed to retrieve receipt");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        match receipt {
            Some(receipt) if receipt.success => {
                tracing::debug!(tx_hash = %hash, block = ?receipt.block_number, "Transaction mined");
                return Ok(receipt);
            }
            Some(receipt) => {
                tracing::warn!(tx_hash = %hash, block = ?receipt.block_number, "Transaction reverted");
                return Err(AppError::TransactionFailed {
                    tx_hash: hash,
                    block_number: receipt.block_number,
                });
            }
            None => {
                tracing::debug!(tx_hash = %hash, "Receipt not available yet");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

/// Ethereum RPC client backed by an alloy provider.
#[derive(Clone)]
pub struct EthereumClient {
    /// The underlying provider.
    provider: Arc<NodeProvider>,
    /// RPC URL for logging.
    rpc_url: String,
    /// Chain ID, fetched once.
    chain_id: Arc<OnceCell<u64>>,
    /// Key associated with this connection, if any.
    key_pair: Option<KeyPair>,
    /// Operation deadlines.
    timeouts: Timeouts,
}

impl EthereumClient {
    /// Create a new HTTP client.
    ///
    /// Note: This does NOT make any network calls. The connection is
    /// established lazily when the first operation is performed.
    pub fn new(rpc_url: &str, timeouts: Timeouts) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid RPC URL: {}", rpc_url)))?;

        #[allow(deprecated)]
        let provider = ProviderBuilder::new().connect_http(url).root().clone();

        tracing::info!(rpc_url = %rpc_url, "Ethereum client created (lazy initialization)");

        Ok(Self::from_provider(provider, rpc_url, timeouts))
    }

    /// Connect to a node over http(s) or ws(s) and verify it answers `eth_chainId`.
    pub async fn connect(rpc_url: &str, timeouts: Timeouts) -> Result<Self> {
        validate_rpc_url(rpc_url)?;

        let provider = tokio::time::timeout(timeouts.request, ProviderBuilder::new().connect(rpc_url))
            .await
            .map_err(|_| {
                AppError::Connection(format!("timed out connecting to {rpc_url}"))
            })?
            .map_err(|e| AppError::Connection(e.to_string()))?
            .root()
            .clone();

        let client = Self::from_provider(provider, rpc_url, timeouts);

        let chain_id = tokio::time::timeout(timeouts.request, client.provider.get_chain_id())
            .await
            .map_err(|_| AppError::Connection(format!("handshake with {rpc_url} timed out")))?
            .map_err(|e| AppError::Connection(format!("handshake with {rpc_url} failed: {e}")))?;
        // Freshly created cell; cannot already be set.
        let _ = client.chain_id.set(chain_id);

        tracing::info!(chain_id = chain_id, rpc_url = %rpc_url, "Connected to Ethereum node");
        Ok(client)
    }

    fn from_provider(provider: NodeProvider, rpc_url: &str, timeouts: Timeouts) -> Self {
        Self {
            provider: Arc::new(provider),
            rpc_url: rpc_url.to_string(),
            chain_id: Arc::new(OnceCell::new()),
            key_pair: None,
            timeouts,
        }
    }

    /// Associate a key pair with this connection.
    pub fn with_key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// The key pair associated with this connection.
    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    /// Get the underlying provider.
    pub fn provider(&self) -> &NodeProvider {
        &self.provider
    }

    /// The endpoint this client talks to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Operation deadlines.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Run an RPC request under a deadline.
    async fn with_deadline<T, F>(&self, operation: &str, timeout: Duration, request: F) -> Result<T>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result.map_err(|e| AppError::rpc(&e)),
            Err(_) => Err(AppError::Timeout { operation: operation.to_string(), timeout }),
        }
    }
}

#[async_trait]
impl ChainClient for EthereumClient {
    async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let chain_id = self
                    .with_deadline("eth_chainId", self.timeouts.request, self.provider.get_chain_id())
                    .await?;
                tracing::info!(chain_id = chain_id, rpc_url = %self.rpc_url, "Fetched chain ID");
                Ok(chain_id)
            })
            .await
            .copied()
    }

    async fn balance_of(&self, address: Address, block: BlockId) -> Result<U256> {
        tracing::debug!(address = %address, block = ?block, "Querying balance");
        self.with_deadline(
            "eth_getBalance",
            self.timeouts.balance,
            self.provider.get_balance(address).block_id(block),
        )
        .await
    }

    async fn suggested_gas_price(&self) -> Result<u128> {
        self.with_deadline("eth_gasPrice", self.timeouts.request, self.provider.get_gas_price())
            .await
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<(TransactionSummary, bool)> {
        let tx = self
            .with_deadline(
                "eth_getTransactionByHash",
                self.timeouts.request,
                self.provider.get_transaction_by_hash(hash),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {hash}")))?;

        let pending = tx.block_number.is_none();
        Ok((summarize_transaction(&tx), pending))
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<MinedReceipt>> {
        let receipt = self
            .with_deadline(
                "eth_getTransactionReceipt",
                self.timeouts.request,
                self.provider.get_transaction_receipt(hash),
            )
            .await?;
        Ok(receipt.as_ref().map(mined_receipt))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        self.with_deadline(
            "eth_getTransactionCount",
            self.timeouts.request,
            self.provider.get_transaction_count(address).pending(),
        )
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.with_deadline("eth_call", self.timeouts.request, self.provider.call(tx)).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash> {
        let pending = self
            .with_deadline(
                "eth_sendRawTransaction",
                self.timeouts.request,
                self.provider.send_raw_transaction(&raw),
            )
            .await?;
        Ok(*pending.tx_hash())
    }
}

fn validate_rpc_url(rpc_url: &str) -> Result<()> {
    const SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];
    let lower = rpc_url.trim().to_ascii_lowercase();
    match SCHEMES.iter().find(|scheme| lower.starts_with(**scheme)) {
        Some(scheme) if lower.len() > scheme.len() => Ok(()),
        _ => Err(AppError::Config(format!(
            "Invalid RPC URL: {} (expected http, https, ws or wss)",
            rpc_url
        ))),
    }
}

fn summarize_transaction(tx: &Transaction) -> TransactionSummary {
    let envelope = tx.inner.inner();
    TransactionSummary {
        hash: *envelope.tx_hash(),
        from: tx.inner.signer(),
        to: envelope.to(),
        nonce: envelope.nonce(),
        value: envelope.value(),
        gas_limit: envelope.gas_limit(),
        block_number: tx.block_number,
    }
}

fn mined_receipt(receipt: &TransactionReceipt) -> MinedReceipt {
    MinedReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
        success: receipt.status(),
        contract_address: receipt.contract_address,
    }
}
