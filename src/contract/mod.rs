//! ABI-driven contract access.
//!
//! [`ContractDescriptor`] parses an ABI and bytecode, [`ArgCoder`] turns
//! string arguments into typed ones and [`ContractInvoker`] deploys, calls
//! and sends through a [`ChainClient`](crate::ethereum::ChainClient).

pub mod args;
pub mod descriptor;
pub mod invoker;

pub use args::{parse_address, sol_value_to_json, AbiArg, ArgCoder};
pub use descriptor::{AbiEntry, AbiKind, AbiParam, ContractDescriptor, Mutability};
pub use invoker::{CallResult, ContractInvoker};
