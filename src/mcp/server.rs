//! MCP server implementation.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{TxHash, U256},
};
use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    config::Config,
    contract::{parse_address, AbiEntry, ContractDescriptor, ContractInvoker, Mutability},
    error::AppError,
    ethereum::{constants::network_name, ChainClient, EthereumClient, KeyPair, NonceManager},
    types::{format_ether, format_gwei, parse_wei, TransactionOptions},
};

/// Ethereum contract MCP server.
///
/// Exposes key generation, chain queries and ABI-driven contract
/// deployment and calls as MCP tools.
#[derive(Clone)]
pub struct EthereumContractServer {
    client: Arc<EthereumClient>,
    nonces: Arc<NonceManager>,
    tool_router: ToolRouter<Self>,
}

impl EthereumContractServer {
    /// Connect to the configured node and create the server.
    ///
    /// Fails if the node does not answer the `eth_chainId` handshake.
    pub async fn new(config: Config) -> Result<Self, AppError> {
        tracing::info!("Initializing Ethereum contract MCP server");

        let mut client = EthereumClient::connect(&config.rpc_url, config.timeouts).await?;

        match config.private_key.as_deref() {
            Some(private_key) => {
                let key_pair = KeyPair::from_hex(private_key)?;
                tracing::info!(address = %key_pair.address(), "Signing key loaded");
                client = client.with_key_pair(key_pair);
            }
            None => tracing::warn!("ETHEREUM_PRIVATE_KEY not set; write tools are disabled"),
        }

        Ok(Self::from_client(client))
    }

    /// Create a server around an existing client.
    ///
    /// No network calls are made until a tool needs the node.
    pub fn from_client(client: EthereumClient) -> Self {
        Self {
            client: Arc::new(client),
            nonces: Arc::new(NonceManager::new()),
            tool_router: Self::tool_router(),
        }
    }

    fn signer(&self) -> Result<&KeyPair, McpError> {
        self.client.key_pair().ok_or_else(|| {
            AppError::Config("ETHEREUM_PRIVATE_KEY is not set; write tools are disabled".into())
                .into()
        })
    }

    async fn transaction_options(
        &self,
        value: Option<&str>,
        gas_limit: u64,
        gas_price: Option<&str>,
    ) -> Result<TransactionOptions, McpError> {
        let value = value
            .map(parse_wei)
            .transpose()
            .map_err(|e| McpError::invalid_params(format!("Invalid value: {e}"), None))?
            .unwrap_or(U256::ZERO);

        if gas_limit == 0 {
            return Err(McpError::invalid_params("gas_limit must be greater than zero", None));
        }

        let gas_price = match gas_price {
            Some(raw) => {
                let wei = parse_wei(raw)
                    .map_err(|e| McpError::invalid_params(format!("Invalid gas_price: {e}"), None))?;
                u128::try_from(wei)
                    .map_err(|_| McpError::invalid_params("gas_price is out of range", None))?
            }
            None => self.client.suggested_gas_price().await?,
        };

        Ok(TransactionOptions::new(value, gas_limit, gas_price))
    }
}

/// Input parameters for the get_balance tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct GetBalanceInput {
    /// Account address to query (0x...).
    pub address: String,
    /// Block tag or number: "latest" (default), "pending", "earliest", "safe",
    /// "finalized", a decimal number or a 0x-prefixed hex number.
    #[serde(default)]
    pub block: Option<String>,
}

/// Input parameters for the get_transaction tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct TransactionHashInput {
    /// Transaction hash (0x + 64 hex characters).
    pub tx_hash: String,
}

/// Input parameters for the wait_for_mined tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct WaitForMinedInput {
    /// Transaction hash (0x + 64 hex characters).
    pub tx_hash: String,
    /// Give up after this many seconds. Defaults to the server's configured deadline.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Interval between receipt polls in milliseconds.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

/// Input parameters for the list_methods tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct ListMethodsInput {
    /// Contract ABI as a JSON array (escaped quotes are accepted).
    pub abi: String,
}

/// Input parameters for the deploy_contract tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct DeployContractInput {
    /// Contract ABI as a JSON array (escaped quotes are accepted).
    pub abi: String,
    /// Creation bytecode as hex (optional 0x prefix).
    pub bytecode: String,
    /// Constructor arguments as strings, in declaration order.
    #[serde(default)]
    pub args: Vec<String>,
    /// Wei sent with the deployment (decimal). Default: 0.
    #[serde(default)]
    pub value: Option<String>,
    /// Gas limit for the deployment transaction.
    pub gas_limit: u64,
    /// Gas price in wei (decimal). Default: the node's suggestion.
    #[serde(default)]
    pub gas_price: Option<String>,
}

/// Input parameters for the call_contract tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct CallContractInput {
    /// Contract ABI as a JSON array (escaped quotes are accepted).
    pub abi: String,
    /// Deployed contract address.
    pub address: String,
    /// Method name (the first method with this name is used).
    pub method: String,
    /// Method arguments as strings, in declaration order.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Input parameters for the send_transaction tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct SendTransactionInput {
    /// Contract ABI as a JSON array (escaped quotes are accepted).
    pub abi: String,
    /// Deployed contract address.
    pub address: String,
    /// Method name (the first method with this name is used).
    pub method: String,
    /// Method arguments as strings, in declaration order.
    #[serde(default)]
    pub args: Vec<String>,
    /// Wei sent with the call (decimal). Default: 0.
    #[serde(default)]
    pub value: Option<String>,
    /// Gas limit for the transaction.
    pub gas_limit: u64,
    /// Gas price in wei (decimal). Default: the node's suggestion.
    #[serde(default)]
    pub gas_price: Option<String>,
}

/// ABI entry as reported by list_methods.
#[derive(Debug, Serialize)]
struct MethodInfo<'a> {
    name: &'a str,
    signature: String,
    selector: String,
    mutability: Mutability,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl<'a> From<&'a AbiEntry> for MethodInfo<'a> {
    fn from(entry: &'a AbiEntry) -> Self {
        Self {
            name: &entry.name,
            signature: entry.signature(),
            selector: entry.selector().to_string(),
            mutability: entry.mutability(),
            inputs: entry.inputs.iter().map(|p| p.canonical_type()).collect(),
            outputs: entry.outputs.iter().map(|p| p.canonical_type()).collect(),
        }
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

fn parse_tx_hash(s: &str) -> Result<TxHash, McpError> {
    let trimmed = s.trim();
    let valid = trimmed.len() == 66 && (trimmed.starts_with("0x") || trimmed.starts_with("0X"));
    if !valid {
        return Err(McpError::invalid_params(
            format!("Transaction hash must be 0x + 64 hex characters: {s}"),
            None,
        ));
    }
    trimmed
        .parse::<TxHash>()
        .map_err(|e| McpError::invalid_params(format!("Invalid transaction hash '{s}': {e}"), None))
}

fn parse_block(s: Option<&str>) -> Result<BlockId, McpError> {
    let Some(raw) = s.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(BlockId::latest());
    };

    if let Ok(number) = raw.parse::<u64>() {
        return Ok(BlockId::number(number));
    }

    BlockNumberOrTag::from_str(&raw.to_ascii_lowercase())
        .map(BlockId::Number)
        .map_err(|e| McpError::invalid_params(format!("Invalid block '{raw}': {e}"), None))
}

#[tool_router]
impl EthereumContractServer {
    /// Generate a fresh secp256k1 key pair.
    #[tool(
        description = "Generate a new Ethereum key pair. Returns the checksummed address and the private key hex. The key is not stored by the server."
    )]
    pub async fn generate_key(&self) -> Result<String, McpError> {
        tracing::info!("generate_key called");

        let key_pair = KeyPair::generate()?;
        to_pretty_json(&json!({
            "address": key_pair.address_checksummed(),
            "private_key": key_pair.to_hex(),
        }))
    }

    /// Query the native balance of an account.
    #[tool(description = "Query the ETH balance (in wei and ether) of an address at a block")]
    pub async fn get_balance(
        &self,
        Parameters(input): Parameters<GetBalanceInput>,
    ) -> Result<String, McpError> {
        tracing::info!(address = %input.address, block = ?input.block, "get_balance called");

        let address = parse_address(&input.address)?;
        let block = parse_block(input.block.as_deref())?;

        let balance = self.client.balance_of(address, block).await?;

        to_pretty_json(&json!({
            "address": address.to_checksum(None),
            "balance_wei": balance.to_string(),
            "balance_ether": format_ether(balance),
        }))
    }

    /// Report chain id, network and suggested gas price.
    #[tool(
        description = "Get the connected chain ID, network name, suggested gas price and the server's signing address"
    )]
    pub async fn get_chain_info(&self) -> Result<String, McpError> {
        tracing::info!("get_chain_info called");

        let chain_id = self.client.chain_id().await?;
        let gas_price = self.client.suggested_gas_price().await?;

        to_pretty_json(&json!({
            "chain_id": chain_id,
            "network": network_name(chain_id),
            "gas_price_wei": gas_price.to_string(),
            "gas_price_gwei": format_gwei(U256::from(gas_price)),
            "signer": self.client.key_pair().map(KeyPair::address_checksummed),
        }))
    }

    /// Look up a transaction and its lifecycle state.
    #[tool(description = "Look up a transaction by hash and report whether it is pending or mined")]
    pub async fn get_transaction(
        &self,
        Parameters(input): Parameters<TransactionHashInput>,
    ) -> Result<String, McpError> {
        tracing::info!(tx_hash = %input.tx_hash, "get_transaction called");

        let hash = parse_tx_hash(&input.tx_hash)?;
        let (transaction, pending) = self.client.transaction_by_hash(hash).await?;
        let status = self.client.transaction_status(hash).await?;

        to_pretty_json(&json!({
            "transaction": transaction,
            "pending": pending,
            "state": status,
        }))
    }

    /// Poll until a transaction is mined.
    #[tool(
        description = "Wait until a transaction is mined. Fails if it reverted or the timeout expires."
    )]
    pub async fn wait_for_mined(
        &self,
        Parameters(input): Parameters<WaitForMinedInput>,
    ) -> Result<String, McpError> {
        tracing::info!(
            tx_hash = %input.tx_hash,
            timeout_secs = ?input.timeout_secs,
            "wait_for_mined called"
        );

        let hash = parse_tx_hash(&input.tx_hash)?;
        let timeouts = self.client.timeouts();
        let timeout = input.timeout_secs.map(Duration::from_secs).unwrap_or(timeouts.mined);
        let poll = input
            .poll_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(timeouts.poll_interval);

        let receipt = self.client.wait_for_mined(hash, poll, timeout).await?;
        to_pretty_json(&receipt)
    }

    /// List the functions of an ABI, split into read and write methods.
    #[tool(description = "Parse a contract ABI and list its constructor, read methods and write methods")]
    pub async fn list_methods(
        &self,
        Parameters(input): Parameters<ListMethodsInput>,
    ) -> Result<String, McpError> {
        tracing::info!("list_methods called");

        let descriptor = ContractDescriptor::from_abi(&input.abi)?;

        let constructor = descriptor.constructor_method().map(|c| {
            json!({ "inputs": c.inputs.iter().map(|p| p.canonical_type()).collect::<Vec<_>>() })
        });
        let read: Vec<MethodInfo> = descriptor.read_methods().into_iter().map(Into::into).collect();
        let write: Vec<MethodInfo> =
            descriptor.write_methods().into_iter().map(Into::into).collect();

        to_pretty_json(&json!({
            "constructor": constructor,
            "read": read,
            "write": write,
        }))
    }

    /// Deploy a contract signed with the server's key.
    #[tool(
        description = "Deploy a contract from ABI and bytecode, signed with the configured key. Returns the derived address, tx hash and nonce without waiting for mining."
    )]
    pub async fn deploy_contract(
        &self,
        Parameters(input): Parameters<DeployContractInput>,
    ) -> Result<String, McpError> {
        tracing::info!(args = input.args.len(), gas_limit = input.gas_limit, "deploy_contract called");

        let key_pair = self.signer()?;
        let descriptor = ContractDescriptor::new(&input.abi, &input.bytecode, None)?;
        let invoker = ContractInvoker::new(descriptor, self.nonces.clone());
        let opts = self
            .transaction_options(input.value.as_deref(), input.gas_limit, input.gas_price.as_deref())
            .await?;

        let result =
            invoker.deploy_with_strings(&*self.client, key_pair, &opts, &input.args).await?;
        to_pretty_json(&result)
    }

    /// Call a contract method without a transaction.
    #[tool(description = "Call a contract method with eth_call and return the decoded outputs")]
    pub async fn call_contract(
        &self,
        Parameters(input): Parameters<CallContractInput>,
    ) -> Result<String, McpError> {
        tracing::info!(address = %input.address, method = %input.method, "call_contract called");

        let address = parse_address(&input.address)?;
        let descriptor = ContractDescriptor::from_abi(&input.abi)?;
        let invoker = ContractInvoker::new(descriptor, self.nonces.clone());

        let result = invoker
            .call_with_strings(&*self.client, address, &input.method, &input.args)
            .await?;

        to_pretty_json(&json!({
            "method": input.method,
            "outputs": result.to_json(),
        }))
    }

    /// Send a state-changing contract call signed with the server's key.
    #[tool(
        description = "Send a transaction calling a contract method, signed with the configured key. Returns the tx hash and nonce without waiting for mining."
    )]
    pub async fn send_transaction(
        &self,
        Parameters(input): Parameters<SendTransactionInput>,
    ) -> Result<String, McpError> {
        tracing::info!(
            address = %input.address,
            method = %input.method,
            gas_limit = input.gas_limit,
            "send_transaction called"
        );

        let key_pair = self.signer()?;
        let address = parse_address(&input.address)?;
        let descriptor = ContractDescriptor::from_abi(&input.abi)?;
        let invoker = ContractInvoker::new(descriptor, self.nonces.clone());
        let opts = self
            .transaction_options(input.value.as_deref(), input.gas_limit, input.gas_price.as_deref())
            .await?;

        let result = invoker
            .send_with_strings(
                &*self.client,
                key_pair,
                address,
                &input.method,
                &opts,
                &input.args,
            )
            .await?;
        to_pretty_json(&result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for EthereumContractServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "eth-contract-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Ethereum contract MCP server. Generates keys, queries balances and \
                 transactions, and deploys and calls contracts from their ABI."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use rmcp::model::ErrorCode;

    const ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"initial","type":"uint256"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"get","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"set","inputs":[{"name":"value","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    fn offline_server() -> EthereumContractServer {
        let client = EthereumClient::new("http://127.0.0.1:9", Timeouts::default()).unwrap();
        EthereumContractServer::from_client(client)
    }

    #[test]
    fn test_parse_tx_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(parse_tx_hash(&hash).is_ok());
        assert!(parse_tx_hash("0x1234").is_err());
        assert!(parse_tx_hash(&"ab".repeat(33)).is_err());
    }

    #[test]
    fn test_parse_block() {
        assert_eq!(parse_block(None).unwrap(), BlockId::latest());
        assert_eq!(parse_block(Some("")).unwrap(), BlockId::latest());
        assert_eq!(parse_block(Some("pending")).unwrap(), BlockId::pending());
        assert_eq!(parse_block(Some("Latest")).unwrap(), BlockId::latest());
        assert_eq!(parse_block(Some("1234")).unwrap(), BlockId::number(1234));
        assert_eq!(parse_block(Some("0x10")).unwrap(), BlockId::number(16));
        assert!(parse_block(Some("yesterday")).is_err());
    }

    #[tokio::test]
    async fn test_generate_key_returns_usable_key() {
        let server = offline_server();
        let output = server.generate_key().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        let private_key = json["private_key"].as_str().unwrap();
        let key_pair = KeyPair::from_hex(private_key).unwrap();
        assert_eq!(json["address"], key_pair.address_checksummed());
    }

    #[tokio::test]
    async fn test_list_methods_partitions_abi() {
        let server = offline_server();
        let output = server
            .list_methods(Parameters(ListMethodsInput { abi: ABI.to_string() }))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["constructor"]["inputs"], json!(["uint256"]));
        assert_eq!(json["read"].as_array().unwrap().len(), 1);
        assert_eq!(json["read"][0]["signature"], "get()");
        assert_eq!(json["read"][0]["mutability"], "view");
        assert_eq!(json["write"][0]["name"], "set");
        assert_eq!(json["write"][0]["selector"], "0x60fe47b1");
    }

    #[tokio::test]
    async fn test_list_methods_rejects_malformed_abi() {
        let server = offline_server();
        let err = server
            .list_methods(Parameters(ListMethodsInput { abi: "[{".to_string() }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_write_tools_require_private_key() {
        let server = offline_server();
        let input = DeployContractInput {
            abi: ABI.to_string(),
            bytecode: "0x6080604052".to_string(),
            args: vec!["1".to_string()],
            value: None,
            gas_limit: 300_000,
            gas_price: Some("1".to_string()),
        };

        let err = server.deploy_contract(Parameters(input)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);
        assert!(err.message.contains("ETHEREUM_PRIVATE_KEY"));
    }

    #[tokio::test]
    async fn test_call_contract_rejects_bad_address_before_network() {
        let server = offline_server();
        let input = CallContractInput {
            abi: ABI.to_string(),
            address: "0x1234".to_string(),
            method: "get".to_string(),
            args: vec![],
        };

        let err = server.call_contract(Parameters(input)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_transaction_options_validation() {
        let server = offline_server();

        let opts = server.transaction_options(Some("1000"), 21_000, Some("7")).await.unwrap();
        assert_eq!(opts, TransactionOptions::new(U256::from(1000u64), 21_000, 7));

        let err = server.transaction_options(None, 0, Some("7")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = server.transaction_options(Some("1.5"), 21_000, Some("7")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn test_server_info() {
        let info = offline_server().get_info();
        assert_eq!(info.server_info.name, "eth-contract-mcp");
        assert!(info.capabilities.tools.is_some());
    }
}
