//! Conversion of string arguments into ABI values and of decoded values into JSON.

use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, B256, I256, U256},
};
use serde_json::Value;

use crate::{
    contract::descriptor::{AbiEntry, AbiParam},
    error::{AppError, Result},
};

/// A typed contract argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiArg {
    Address(Address),
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Uint(U256),
    Int(I256),
}

impl AbiArg {
    /// Convert into a value of the declared Solidity type.
    ///
    /// Fails when the variant does not match the type, an integer does not
    /// fit the declared width, or fixed-size bytes have the wrong length.
    pub fn to_sol_value(&self, ty: &DynSolType) -> Result<DynSolValue> {
        let value = match (self, ty) {
            (AbiArg::Address(address), DynSolType::Address) => DynSolValue::Address(*address),
            (AbiArg::String(s), DynSolType::String) => DynSolValue::String(s.clone()),
            (AbiArg::Bool(b), DynSolType::Bool) => DynSolValue::Bool(*b),
            (AbiArg::Bytes(bytes), DynSolType::Bytes) => DynSolValue::Bytes(bytes.clone()),
            (AbiArg::Bytes(bytes), DynSolType::FixedBytes(size)) => {
                if bytes.len() != *size {
                    return Err(AppError::AbiEncode(format!(
                        "bytes{size} expects {size} bytes, got {}",
                        bytes.len()
                    )));
                }
                let mut word = B256::ZERO;
                word[..*size].copy_from_slice(bytes);
                DynSolValue::FixedBytes(word, *size)
            }
            (AbiArg::Uint(v), DynSolType::Uint(bits)) => {
                if v.bit_len() > *bits {
                    return Err(AppError::AbiEncode(format!("{v} does not fit in uint{bits}")));
                }
                DynSolValue::Uint(*v, *bits)
            }
            (AbiArg::Int(v), DynSolType::Int(bits)) => {
                if !fits_signed(*v, *bits) {
                    return Err(AppError::AbiEncode(format!("{v} does not fit in int{bits}")));
                }
                DynSolValue::Int(*v, *bits)
            }
            (arg, ty) => {
                return Err(AppError::AbiEncode(format!(
                    "{} argument cannot be encoded as {}",
                    arg.kind(),
                    ty.sol_type_name()
                )))
            }
        };
        Ok(value)
    }

    fn kind(&self) -> &'static str {
        match self {
            AbiArg::Address(_) => "address",
            AbiArg::String(_) => "string",
            AbiArg::Bool(_) => "bool",
            AbiArg::Bytes(_) => "bytes",
            AbiArg::Uint(_) => "unsigned integer",
            AbiArg::Int(_) => "signed integer",
        }
    }
}

fn fits_signed(value: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let bound = I256::from_raw(U256::from(1u8) << (bits - 1));
    value >= -bound && value < bound
}

/// Converts raw string arguments into typed arguments for an ABI entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgCoder;

impl ArgCoder {
    /// Parse one string per declared input of `entry`.
    ///
    /// All arguments are parsed or none: the first failure aborts.
    pub fn encode<S: AsRef<str>>(raw_args: &[S], entry: &AbiEntry) -> Result<Vec<AbiArg>> {
        if raw_args.len() != entry.inputs.len() {
            return Err(AppError::ArgCountMismatch {
                expected: entry.inputs.len(),
                actual: raw_args.len(),
            });
        }

        entry
            .inputs
            .iter()
            .zip(raw_args)
            .enumerate()
            .map(|(index, (param, raw))| Self::parse_arg(index, &param.ty, raw.as_ref()))
            .collect()
    }

    /// Parse a single argument according to its ABI type name.
    ///
    /// `bool` is `true` only for the exact text `"true"`; any other text
    /// is `false`.
    pub fn parse_arg(index: usize, ty: &str, raw: &str) -> Result<AbiArg> {
        let fail = |reason: String| AppError::ArgParse {
            index,
            ty: ty.to_string(),
            value: raw.to_string(),
            reason,
        };

        match ty {
            "address" => parse_address(raw).map(AbiArg::Address).map_err(|e| fail(e.to_string())),
            "string" => Ok(AbiArg::String(raw.to_string())),
            "bool" => Ok(AbiArg::Bool(raw == "true")),
            _ if is_bytes_type(ty) => {
                let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
                alloy::hex::decode(hex).map(AbiArg::Bytes).map_err(|e| fail(e.to_string()))
            }
            _ if raw.is_empty() => Err(fail("empty value".to_string())),
            _ if !is_decimal(raw, ty.starts_with("int")) => {
                Err(fail("not a base-10 integer".to_string()))
            }
            _ if ty.starts_with("int") => {
                I256::from_dec_str(raw).map(AbiArg::Int).map_err(|e| fail(e.to_string()))
            }
            _ => U256::from_str_radix(raw, 10).map(AbiArg::Uint).map_err(|e| fail(e.to_string())),
        }
    }
}

/// ASCII digits only; signed types also accept a leading `+` or `-`.
fn is_decimal(raw: &str, signed: bool) -> bool {
    let digits = if signed { raw.strip_prefix(['+', '-']).unwrap_or(raw) } else { raw };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_bytes_type(ty: &str) -> bool {
    match ty.strip_prefix("bytes") {
        Some("") => true,
        Some(size) => size.parse::<usize>().is_ok(),
        None => false,
    }
}

/// Parse an address: `0x` followed by 40 hex characters.
///
/// All-lowercase and all-uppercase input is accepted as is; mixed case
/// must be a valid EIP-55 checksum.
pub fn parse_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::InvalidAddress(format!("{trimmed}: missing 0x prefix")))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::InvalidAddress(format!("{trimmed}: expected 40 hex characters")));
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        let prefixed = format!("0x{hex}");
        return Address::parse_checksummed(&prefixed, None)
            .map_err(|_| AppError::InvalidAddress(format!("{trimmed}: bad EIP-55 checksum")));
    }

    let mut bytes = [0u8; 20];
    alloy::hex::decode_to_slice(hex, &mut bytes)
        .map_err(|e| AppError::InvalidAddress(format!("{trimmed}: {e}")))?;
    Ok(Address::from(bytes))
}

/// Convert typed arguments into call data parameters for `params`.
pub(crate) fn encode_params(params: &[AbiParam], args: &[AbiArg]) -> Result<Vec<u8>> {
    if params.len() != args.len() {
        return Err(AppError::ArgCountMismatch { expected: params.len(), actual: args.len() });
    }

    let values = params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param.sol_type().map_err(|e| AppError::AbiEncode(e.to_string()))?;
            arg.to_sol_value(&ty)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Decode return data against `params`, in declared order.
pub(crate) fn decode_outputs(params: &[AbiParam], data: &[u8]) -> Result<Vec<DynSolValue>> {
    if params.is_empty() {
        return Ok(Vec::new());
    }
    if data.is_empty() {
        return Err(AppError::AbiDecode(
            "empty return data (is a contract deployed at this address?)".into(),
        ));
    }

    let types = params
        .iter()
        .map(|param| param.sol_type().map_err(|e| AppError::AbiDecode(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    match DynSolType::Tuple(types).abi_decode_params(data) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(AppError::AbiDecode(e.to_string())),
    }
}

/// Render a decoded value as JSON.
///
/// Addresses are EIP-55 checksummed, integers are decimal strings and byte
/// strings are `0x`-prefixed hex.
pub fn sol_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Uint(v, _) => Value::String(v.to_string()),
        DynSolValue::Int(v, _) => Value::String(v.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(alloy::hex::encode_prefixed(bytes)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(alloy::hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::Function(function) => {
            Value::String(alloy::hex::encode_prefixed(function.as_slice()))
        }
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(sol_value_to_json).collect())
        }
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::descriptor::AbiKind;
    use alloy::primitives::address;

    fn entry(types: &[&str]) -> AbiEntry {
        AbiEntry {
            kind: AbiKind::Function,
            name: "f".to_string(),
            inputs: types
                .iter()
                .map(|ty| AbiParam {
                    name: String::new(),
                    ty: ty.to_string(),
                    components: vec![],
                    indexed: None,
                })
                .collect(),
            outputs: vec![],
            state_mutability: None,
            constant: None,
            payable: None,
            anonymous: false,
        }
    }

    fn param(ty: &str) -> AbiParam {
        AbiParam { name: String::new(), ty: ty.to_string(), components: vec![], indexed: None }
    }

    #[test]
    fn test_encode_mixed_arguments() {
        let entry = entry(&["address", "string", "bool", "bytes", "uint256", "int64"]);
        let args = ArgCoder::encode(
            &["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", "hello", "true", "0xdead", "42", "-7"],
            &entry,
        )
        .unwrap();

        assert_eq!(
            args,
            vec![
                AbiArg::Address(address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")),
                AbiArg::String("hello".to_string()),
                AbiArg::Bool(true),
                AbiArg::Bytes(vec![0xde, 0xad]),
                AbiArg::Uint(U256::from(42u64)),
                AbiArg::Int(I256::try_from(-7i64).unwrap()),
            ]
        );
    }

    #[test]
    fn test_count_mismatch_is_never_partial() {
        let entry = entry(&["uint256", "uint256"]);
        assert!(matches!(
            ArgCoder::encode(&["1"], &entry),
            Err(AppError::ArgCountMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            ArgCoder::encode(&["1", "2", "3"], &entry),
            Err(AppError::ArgCountMismatch { expected: 2, actual: 3 })
        ));
        let none: [&str; 0] = [];
        assert!(ArgCoder::encode(&none, &self::entry(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_bool_is_true_only_for_exact_text() {
        let entry = entry(&["bool"]);
        assert_eq!(ArgCoder::encode(&["true"], &entry).unwrap(), vec![AbiArg::Bool(true)]);
        assert_eq!(ArgCoder::encode(&["TRUE"], &entry).unwrap(), vec![AbiArg::Bool(false)]);
        assert_eq!(ArgCoder::encode(&["1"], &entry).unwrap(), vec![AbiArg::Bool(false)]);
        assert_eq!(ArgCoder::encode(&["false"], &entry).unwrap(), vec![AbiArg::Bool(false)]);
    }

    #[test]
    fn test_parse_error_names_index_type_and_token() {
        let entry = entry(&["uint256", "uint256"]);
        let err = ArgCoder::encode(&["1", "12abc"], &entry).unwrap_err();
        match err {
            AppError::ArgParse { index, ty, value, .. } => {
                assert_eq!(index, 1);
                assert_eq!(ty, "uint256");
                assert_eq!(value, "12abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_integer_is_parse_error() {
        let entry = entry(&["uint8"]);
        assert!(matches!(ArgCoder::encode(&[""], &entry), Err(AppError::ArgParse { .. })));
    }

    #[test]
    fn test_unsigned_rejects_negative() {
        let entry = entry(&["uint256"]);
        assert!(matches!(ArgCoder::encode(&["-1"], &entry), Err(AppError::ArgParse { .. })));
    }

    #[test]
    fn test_integers_must_be_plain_decimal() {
        let unsigned = entry(&["uint256"]);
        for raw in ["1_000", "0x10", " 7", "1e3", "+5"] {
            assert!(
                matches!(ArgCoder::encode(&[raw], &unsigned), Err(AppError::ArgParse { .. })),
                "{raw} should be rejected"
            );
        }

        let signed = entry(&["int256"]);
        assert!(matches!(ArgCoder::encode(&["-1_0"], &signed), Err(AppError::ArgParse { .. })));
        assert!(matches!(ArgCoder::encode(&["-"], &signed), Err(AppError::ArgParse { .. })));
        assert_eq!(
            ArgCoder::encode(&["-42"], &signed).unwrap(),
            vec![AbiArg::Int(I256::try_from(-42i64).unwrap())]
        );
        assert_eq!(
            ArgCoder::encode(&["1000"], &unsigned).unwrap(),
            vec![AbiArg::Uint(U256::from(1000u64))]
        );
    }

    #[test]
    fn test_fixed_bytes_are_hex_decoded() {
        let entry = entry(&["bytes4"]);
        let args = ArgCoder::encode(&["a9059cbb"], &entry).unwrap();
        assert_eq!(args, vec![AbiArg::Bytes(vec![0xa9, 0x05, 0x9c, 0xbb])]);

        let err = ArgCoder::encode(&["0xnothex"], &entry).unwrap_err();
        assert!(matches!(err, AppError::ArgParse { index: 0, .. }));
    }

    #[test]
    fn test_parse_address_accepts_uniform_case() {
        let expected = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap(), expected);
        assert_eq!(parse_address("0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266").unwrap(), expected);
        assert_eq!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap(), expected);
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        // Wrong checksum: one letter flipped to lowercase.
        assert!(matches!(
            parse_address("0xf39fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            Err(AppError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
            Err(AppError::InvalidAddress(_))
        ));
        assert!(matches!(parse_address("0x1234"), Err(AppError::InvalidAddress(_))));
        assert!(matches!(
            parse_address("0xg39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
            Err(AppError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_bad_address_argument_is_parse_error() {
        let entry = entry(&["address"]);
        assert!(matches!(ArgCoder::encode(&["0x12"], &entry), Err(AppError::ArgParse { .. })));
    }

    #[test]
    fn test_to_sol_value_checks_width() {
        let max_u8 = AbiArg::Uint(U256::from(255u64));
        assert!(max_u8.to_sol_value(&DynSolType::Uint(8)).is_ok());
        let too_big = AbiArg::Uint(U256::from(256u64));
        assert!(matches!(too_big.to_sol_value(&DynSolType::Uint(8)), Err(AppError::AbiEncode(_))));

        let min_i8 = AbiArg::Int(I256::try_from(-128i64).unwrap());
        assert!(min_i8.to_sol_value(&DynSolType::Int(8)).is_ok());
        let too_small = AbiArg::Int(I256::try_from(-129i64).unwrap());
        assert!(matches!(too_small.to_sol_value(&DynSolType::Int(8)), Err(AppError::AbiEncode(_))));
        let too_large = AbiArg::Int(I256::try_from(128i64).unwrap());
        assert!(matches!(too_large.to_sol_value(&DynSolType::Int(8)), Err(AppError::AbiEncode(_))));
    }

    #[test]
    fn test_to_sol_value_checks_fixed_bytes_length() {
        let arg = AbiArg::Bytes(vec![1, 2, 3]);
        assert!(matches!(arg.to_sol_value(&DynSolType::FixedBytes(4)), Err(AppError::AbiEncode(_))));

        let value = AbiArg::Bytes(vec![1, 2, 3, 4]).to_sol_value(&DynSolType::FixedBytes(4)).unwrap();
        match value {
            DynSolValue::FixedBytes(word, 4) => assert_eq!(&word[..4], &[1, 2, 3, 4]),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_to_sol_value_rejects_type_mismatch() {
        let arg = AbiArg::String("x".to_string());
        assert!(matches!(arg.to_sol_value(&DynSolType::Address), Err(AppError::AbiEncode(_))));
    }

    #[test]
    fn test_encode_params_layout() {
        let params = vec![param("address"), param("uint256")];
        let args = vec![AbiArg::Address(Address::repeat_byte(0x11)), AbiArg::Uint(U256::from(1u64))];

        let encoded = encode_params(&params, &args).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[12..32], Address::repeat_byte(0x11).as_slice());
        assert_eq!(encoded[63], 1);
    }

    #[test]
    fn test_decode_outputs_in_declared_order() {
        let params = vec![param("uint256"), param("bool")];
        let data = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(9u64), 256),
            DynSolValue::Bool(true),
        ])
        .abi_encode_params();

        let values = decode_outputs(&params, &data).unwrap();
        assert_eq!(values, vec![DynSolValue::Uint(U256::from(9u64), 256), DynSolValue::Bool(true)]);
    }

    #[test]
    fn test_decode_outputs_errors() {
        let params = vec![param("uint256")];
        assert!(matches!(decode_outputs(&params, &[]), Err(AppError::AbiDecode(_))));
        assert!(matches!(decode_outputs(&params, &[0u8; 5]), Err(AppError::AbiDecode(_))));
        assert!(decode_outputs(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_sol_value_to_json() {
        let value = DynSolValue::Tuple(vec![
            DynSolValue::Address(address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")),
            DynSolValue::Uint(U256::from(10u64).pow(U256::from(18u64)), 256),
            DynSolValue::Int(I256::try_from(-5i64).unwrap(), 32),
            DynSolValue::FixedBytes(B256::repeat_byte(0xab), 2),
            DynSolValue::Bytes(vec![0x01, 0x02]),
            DynSolValue::Array(vec![DynSolValue::Bool(false)]),
        ]);

        assert_eq!(
            sol_value_to_json(&value),
            serde_json::json!([
                "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                "1000000000000000000",
                "-5",
                "0xabab",
                "0x0102",
                [false]
            ])
        );
    }
}
