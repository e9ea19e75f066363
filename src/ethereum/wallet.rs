//! Key material management.

use alloy::{
    consensus::{SignableTransaction, TxEnvelope},
    primitives::{keccak256, Address, Signature, B256},
    rpc::types::TransactionRequest,
    signers::{local::PrivateKeySigner, SignerSync},
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{rngs::OsRng, RngCore};

use crate::error::{AppError, Result};

/// Redraws allowed when a random sample falls outside the curve order.
const MAX_GENERATION_ATTEMPTS: usize = 8;

/// A secp256k1 signing key with its derived Ethereum address.
#[derive(Clone)]
pub struct KeyPair {
    /// The local signer.
    signer: PrivateKeySigner,
    /// Address derived from the public key.
    address: Address,
}

impl KeyPair {
    /// Generate a new key pair from the operating system's CSPRNG.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut OsRng)
    }

    fn generate_with<R: RngCore>(rng: &mut R) -> Result<Self> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let mut scalar = [0u8; 32];
            rng.try_fill_bytes(&mut scalar).map_err(|e| AppError::KeyGeneration(e.to_string()))?;

            // Zero or >= n: draw again.
            if let Ok(signer) = PrivateKeySigner::from_slice(&scalar) {
                return Ok(Self::from_signer(signer));
            }
        }
        Err(AppError::KeyGeneration("no valid scalar produced by the random source".into()))
    }

    /// Create a key pair from a hex-encoded scalar (optional `0x` prefix).
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let key = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if key.len() != 64 {
            return Err(AppError::InvalidKeyEncoding(format!(
                "expected 64 hex characters, got {}",
                key.len()
            )));
        }

        let bytes = alloy::hex::decode(key)
            .map_err(|e| AppError::InvalidKeyEncoding(format!("invalid hex: {e}")))?;

        let signer = PrivateKeySigner::from_slice(&bytes).map_err(|_| {
            AppError::InvalidKeyEncoding("scalar is not a valid secp256k1 private key".into())
        })?;

        let key_pair = Self::from_signer(signer);
        tracing::debug!(address = %key_pair.address, "Key pair loaded");
        Ok(key_pair)
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = address_from_public_key(&public_key_of(&signer));
        Self { signer, address }
    }

    /// The private scalar as 64 lowercase hex characters, without prefix.
    pub fn to_hex(&self) -> String {
        alloy::hex::encode(self.signer.to_bytes())
    }

    /// Uncompressed SEC1 public key (`0x04 || X || Y`).
    pub fn public_key(&self) -> [u8; 65] {
        public_key_of(&self.signer)
    }

    /// The key's Ethereum address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The address in EIP-55 mixed-case form.
    pub fn address_checksummed(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Produce a recoverable signature over a 32-byte digest.
    pub(crate) fn sign_hash(&self, digest: &B256) -> Result<Signature> {
        self.signer.sign_hash_sync(digest).map_err(|e| AppError::Signing(e.to_string()))
    }

    /// Sign a fully populated request as a legacy (EIP-155) transaction.
    ///
    /// The request must carry recipient or deploy code, nonce, gas limit,
    /// gas price and chain id.
    pub(crate) fn sign_transaction(&self, tx: TransactionRequest) -> Result<TxEnvelope> {
        let tx = tx.build_legacy().map_err(|e| AppError::Signing(e.to_string()))?;
        if tx.chain_id.is_none() {
            return Err(AppError::Signing("transaction is not scoped to a chain id".into()));
        }
        let signature = self.sign_hash(&tx.signature_hash())?;
        Ok(TxEnvelope::Legacy(tx.into_signed(signature)))
    }
}

fn public_key_of(signer: &PrivateKeySigner) -> [u8; 65] {
    let point = signer.credential().verifying_key().as_affine().to_encoded_point(false);
    let mut bytes = [0u8; 65];
    bytes.copy_from_slice(point.as_bytes());
    bytes
}

/// Keccak-256 of the 64-byte public key body; the low 20 bytes are the address.
fn address_from_public_key(public_key: &[u8; 65]) -> Address {
    let hash = keccak256(&public_key[1..]);
    Address::from_slice(&hash[12..])
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.signer.credential() == other.signer.credential()
    }
}

impl Eq for KeyPair {}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").field("address", &self.address).finish()
    }
}
