//! Parsed contract interface.

use alloy::{
    dyn_abi::DynSolType,
    primitives::{keccak256, Address, Bytes, Selector},
};
use serde::{Deserialize, Serialize};

use crate::{
    contract::args::parse_address,
    error::{AppError, Result},
};

/// Kind of an ABI entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiKind {
    #[default]
    Function,
    Constructor,
    Event,
    Fallback,
    Receive,
    Error,
}

/// State mutability of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

/// A typed input or output parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    /// Solidity type as written in the ABI (`uint256`, `tuple[]`, ...).
    #[serde(rename = "type")]
    pub ty: String,
    /// Members of a `tuple` type, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

impl AbiParam {
    /// Canonical type string with tuple components expanded, e.g. `(uint256,address)[]`.
    pub fn canonical_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(dims) => {
                let members: Vec<String> =
                    self.components.iter().map(AbiParam::canonical_type).collect();
                format!("({}){}", members.join(","), dims)
            }
            None => self.ty.clone(),
        }
    }

    /// The resolved dynamic Solidity type.
    pub fn sol_type(&self) -> Result<DynSolType> {
        let canonical = self.canonical_type();
        DynSolType::parse(&canonical)
            .map_err(|e| AppError::AbiParse(format!("unsupported type '{canonical}': {e}")))
    }
}

/// One element of a contract ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type", default)]
    pub kind: AbiKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<Mutability>,
    /// Pre-0.5 compilers emit `constant` instead of `stateMutability`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub anonymous: bool,
}

impl AbiEntry {
    /// Effective mutability, falling back to the legacy flags.
    pub fn mutability(&self) -> Mutability {
        if let Some(mutability) = self.state_mutability {
            return mutability;
        }
        match (self.constant, self.payable) {
            (Some(true), _) => Mutability::View,
            (_, Some(true)) => Mutability::Payable,
            _ => Mutability::Nonpayable,
        }
    }

    /// Whether this is a `view` function.
    ///
    /// `pure` functions count as writes.
    pub fn is_read(&self) -> bool {
        self.kind == AbiKind::Function && self.mutability() == Mutability::View
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(AbiParam::canonical_type).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    /// First four bytes of the Keccak-256 hash of the signature.
    pub fn selector(&self) -> Selector {
        Selector::from_slice(&keccak256(self.signature().as_bytes())[..4])
    }

    fn validate_types(&self) -> Result<()> {
        for param in self.inputs.iter().chain(&self.outputs) {
            param.sol_type().map_err(|e| match e {
                AppError::AbiParse(msg) => {
                    AppError::AbiParse(format!("{} '{}': {msg}", kind_name(self.kind), self.name))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

pub(crate) fn kind_name(kind: AbiKind) -> &'static str {
    match kind {
        AbiKind::Function => "function",
        AbiKind::Constructor => "constructor",
        AbiKind::Event => "event",
        AbiKind::Fallback => "fallback",
        AbiKind::Receive => "receive",
        AbiKind::Error => "error",
    }
}

/// A contract's ABI, bytecode and (once known) deployed address.
///
/// Built once and never mutated; [`with_address`](Self::with_address)
/// returns a new descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    entries: Vec<AbiEntry>,
    bytecode: Bytes,
    address: Option<Address>,
}

impl ContractDescriptor {
    /// Parse ABI JSON and bytecode hex.
    ///
    /// Escaped quotes (`\"`) in the ABI text are unescaped before decoding,
    /// so ABI strings embedded in other JSON documents can be passed as-is.
    pub fn new(abi: &str, bytecode: &str, address: Option<&str>) -> Result<Self> {
        let unescaped = abi.replace("\\\"", "\"");
        let entries: Vec<AbiEntry> = serde_json::from_str(unescaped.trim())?;

        for entry in &entries {
            if matches!(entry.kind, AbiKind::Function | AbiKind::Constructor) {
                entry.validate_types()?;
            }
        }

        let bytecode = decode_bytecode(bytecode)?;
        let address = address.map(parse_address).transpose()?;

        tracing::debug!(
            entries = entries.len(),
            bytecode_len = bytecode.len(),
            address = ?address,
            "Contract descriptor parsed"
        );

        Ok(Self { entries, bytecode, address })
    }

    /// Descriptor without bytecode, for calling an already deployed contract.
    pub fn from_abi(abi: &str) -> Result<Self> {
        Self::new(abi, "", None)
    }

    /// Copy of this descriptor bound to a deployed address.
    pub fn with_address(&self, address: Address) -> Self {
        Self { address: Some(address), ..self.clone() }
    }

    /// All ABI entries in declaration order.
    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    /// Creation bytecode.
    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    /// Deployed address, if known.
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    /// The constructor entry, if the ABI declares one.
    pub fn constructor_method(&self) -> Option<&AbiEntry> {
        self.entries.iter().find(|e| e.kind == AbiKind::Constructor)
    }

    /// First ABI entry named `name`, of any kind.
    ///
    /// Overloads are not disambiguated: later entries with the same name
    /// are unreachable through this lookup.
    pub fn method_by_name(&self, name: &str) -> Option<&AbiEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// `view` functions.
    pub fn read_methods(&self) -> Vec<&AbiEntry> {
        self.functions().filter(|e| e.is_read()).collect()
    }

    /// Functions that modify state.
    pub fn write_methods(&self) -> Vec<&AbiEntry> {
        self.functions().filter(|e| !e.is_read()).collect()
    }

    fn functions(&self) -> impl Iterator<Item = &AbiEntry> {
        self.entries.iter().filter(|e| e.kind == AbiKind::Function)
    }
}

fn decode_bytecode(bytecode: &str) -> Result<Bytes> {
    let trimmed = bytecode.trim();
    let hex = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")).unwrap_or(trimmed);
    alloy::hex::decode(hex)
        .map(Bytes::from)
        .map_err(|e| AppError::AbiParse(format!("invalid bytecode hex: {e}")))
}
