//! Deploying and calling contracts through a [`ChainClient`].

use std::sync::Arc;

use alloy::{
    dyn_abi::DynSolValue,
    eips::eip2718::Encodable2718,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash},
    rpc::types::TransactionRequest,
};
use serde_json::Value;

use crate::{
    contract::{
        args::{decode_outputs, encode_params, sol_value_to_json, AbiArg, ArgCoder},
        descriptor::{kind_name, AbiEntry, AbiKind, ContractDescriptor},
    },
    error::{AppError, Result},
    ethereum::{client::ChainClient, nonce::NonceManager, wallet::KeyPair},
    types::{DeployResult, SendResult, TransactionOptions},
};

/// Decoded return values of a read call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// Output values in declared order.
    pub values: Vec<DynSolValue>,
}

impl CallResult {
    /// Render the outputs as a JSON array.
    pub fn to_json(&self) -> Value {
        Value::Array(self.values.iter().map(sol_value_to_json).collect())
    }
}

/// Executes deploy, call and send for one contract.
///
/// Transactions are signed locally and broadcast raw. Nonces come from the
/// shared [`NonceManager`], so invokers for different contracts that sign
/// with the same key never race each other.
#[derive(Debug, Clone)]
pub struct ContractInvoker {
    descriptor: ContractDescriptor,
    nonces: Arc<NonceManager>,
}

impl ContractInvoker {
    /// Create an invoker for `descriptor`.
    pub fn new(descriptor: ContractDescriptor, nonces: Arc<NonceManager>) -> Self {
        Self { descriptor, nonces }
    }

    /// The contract this invoker operates on.
    pub fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    /// Deploy the contract's bytecode with encoded constructor arguments.
    ///
    /// Returns as soon as the node accepts the transaction. The returned
    /// address is derived from sender and nonce.
    pub async fn deploy<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        key_pair: &KeyPair,
        opts: &TransactionOptions,
        args: &[AbiArg],
    ) -> Result<DeployResult> {
        let bytecode = self.descriptor.bytecode();
        if bytecode.is_empty() {
            return Err(AppError::AbiEncode("no bytecode to deploy".into()));
        }

        let params = self.descriptor.constructor_method().map(|c| c.inputs.as_slice());
        let encoded = encode_params(params.unwrap_or_default(), args)?;

        let mut code = bytecode.to_vec();
        code.extend_from_slice(&encoded);
        let tx = TransactionRequest::default().with_deploy_code(Bytes::from(code));

        let (tx_hash, nonce) = self.submit(client, key_pair, opts, tx).await?;
        let address = key_pair.address().create(nonce);

        tracing::info!(
            tx_hash = %tx_hash,
            address = %address,
            nonce = nonce,
            "Contract deployment submitted"
        );

        Ok(DeployResult { address, tx_hash, nonce })
    }

    /// Execute a method with `eth_call` and decode its outputs.
    ///
    /// Nothing is signed. Reverts surface as [`AppError::Rpc`] carrying the
    /// decoded revert reason when the node returns one.
    pub async fn call<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        address: Address,
        method: &str,
        args: &[AbiArg],
    ) -> Result<CallResult> {
        let entry = self.method(method)?;
        let data = call_data(entry, args)?;

        tracing::debug!(address = %address, method = %method, "Calling contract");

        let output = client.call(address, data).await?;
        let values = decode_outputs(&entry.outputs, &output)?;

        Ok(CallResult { values })
    }

    /// Sign and submit a state-changing method call.
    ///
    /// Does not wait for the transaction to be mined.
    pub async fn send<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        key_pair: &KeyPair,
        address: Address,
        method: &str,
        opts: &TransactionOptions,
        args: &[AbiArg],
    ) -> Result<SendResult> {
        let entry = self.method(method)?;
        let data = call_data(entry, args)?;
        let tx = TransactionRequest::default().with_to(address).with_input(data);

        let (tx_hash, nonce) = self.submit(client, key_pair, opts, tx).await?;

        tracing::info!(
            tx_hash = %tx_hash,
            to = %address,
            method = %method,
            nonce = nonce,
            "Transaction submitted"
        );

        Ok(SendResult { tx_hash, nonce })
    }

    /// [`deploy`](Self::deploy) with constructor arguments given as strings.
    pub async fn deploy_with_strings<C: ChainClient + ?Sized, S: AsRef<str>>(
        &self,
        client: &C,
        key_pair: &KeyPair,
        opts: &TransactionOptions,
        args: &[S],
    ) -> Result<DeployResult> {
        let typed = match self.descriptor.constructor_method() {
            Some(constructor) => ArgCoder::encode(args, constructor)?,
            None if args.is_empty() => Vec::new(),
            None => return Err(AppError::ArgCountMismatch { expected: 0, actual: args.len() }),
        };
        self.deploy(client, key_pair, opts, &typed).await
    }

    /// [`call`](Self::call) with arguments given as strings.
    pub async fn call_with_strings<C: ChainClient + ?Sized, S: AsRef<str>>(
        &self,
        client: &C,
        address: Address,
        method: &str,
        args: &[S],
    ) -> Result<CallResult> {
        let typed = ArgCoder::encode(args, self.method(method)?)?;
        self.call(client, address, method, &typed).await
    }

    /// [`send`](Self::send) with arguments given as strings.
    pub async fn send_with_strings<C: ChainClient + ?Sized, S: AsRef<str>>(
        &self,
        client: &C,
        key_pair: &KeyPair,
        address: Address,
        method: &str,
        opts: &TransactionOptions,
        args: &[S],
    ) -> Result<SendResult> {
        let typed = ArgCoder::encode(args, self.method(method)?)?;
        self.send(client, key_pair, address, method, opts, &typed).await
    }

    fn method(&self, name: &str) -> Result<&AbiEntry> {
        match self.descriptor.method_by_name(name) {
            Some(entry) if entry.kind == AbiKind::Function => Ok(entry),
            Some(entry) => Err(AppError::MethodNotFound(format!(
                "{name} is not a function ({})",
                kind_name(entry.kind)
            ))),
            None => Err(AppError::MethodNotFound(name.to_string())),
        }
    }

    /// Reserve a nonce, sign `tx` scoped to the node's chain id and broadcast it.
    async fn submit<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        key_pair: &KeyPair,
        opts: &TransactionOptions,
        tx: TransactionRequest,
    ) -> Result<(TxHash, u64)> {
        let chain_id =
            client.chain_id().await.map_err(|e| AppError::ChainIdUnavailable(e.to_string()))?;

        let from = key_pair.address();
        let reservation = self.nonces.reserve(client, from).await?;
        let nonce = reservation.nonce();

        let tx = opts.apply(tx.with_from(from).with_nonce(nonce).with_chain_id(chain_id));
        let envelope = key_pair.sign_transaction(tx)?;

        let tx_hash = client
            .send_raw_transaction(envelope.encoded_2718().into())
            .await
            .map_err(|e| match e {
                AppError::Timeout { .. } => e,
                other => AppError::Submission(other.to_string()),
            })?;

        reservation.commit();
        Ok((tx_hash, nonce))
    }
}

fn call_data(entry: &AbiEntry, args: &[AbiArg]) -> Result<Bytes> {
    let encoded = encode_params(&entry.inputs, args)?;
    let mut data = entry.selector().to_vec();
    data.extend_from_slice(&encoded);
    Ok(data.into())
}
