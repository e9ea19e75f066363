//! Unit formatting helpers.

use alloy::primitives::U256;

/// Decimals of ether relative to wei.
pub const ETHER_DECIMALS: u8 = 18;

/// Decimals of gwei relative to wei.
pub const GWEI_DECIMALS: u8 = 9;

/// Format a U256 value with decimals to a human-readable string.
pub fn format_units(value: U256, decimals: u8) -> String {
    // Handle zero case explicitly
    if value == U256::ZERO {
        return "0".to_string();
    }

    let value_str = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return value_str;
    }

    let len = value_str.len();
    if len <= decimals {
        // Value is less than 1, pad with zeros
        let zeros = decimals - len;
        let decimal_part = value_str.trim_end_matches('0');
        if decimal_part.is_empty() {
            "0".to_string()
        } else {
            format!("0.{}{}", "0".repeat(zeros), decimal_part)
        }
    } else {
        let (integer, decimal) = value_str.split_at(len - decimals);
        let decimal = decimal.trim_end_matches('0');
        if decimal.is_empty() {
            integer.to_string()
        } else {
            format!("{}.{}", integer, decimal)
        }
    }
}

/// Format a wei amount as ether.
pub fn format_ether(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Format a wei amount as gwei.
pub fn format_gwei(wei: U256) -> String {
    format_units(wei, GWEI_DECIMALS)
}

/// Parse a base-10 wei amount.
pub fn parse_wei(amount: &str) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("Amount cannot be empty".to_string());
    }
    if amount.starts_with('-') {
        return Err("Amount cannot be negative".to_string());
    }
    U256::from_str_radix(amount, 10).map_err(|e| format!("Invalid wei amount '{}': {}", amount, e))
}
