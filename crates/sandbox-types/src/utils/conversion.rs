//! Conversion utilities for JSON-RPC quantities.

use super::formatting::without_0x_prefix;

/// Parses a JSON-RPC quantity into a `u64`.
///
/// Accepts `0x`-prefixed hexadecimal (as returned by `eth_blockNumber` and
/// found in broadcast receipts) as well as plain decimal strings. Returns
/// `None` for empty, malformed or overflowing input. Signs are rejected.
pub fn parse_quantity(value: &str) -> Option<u64> {
	let value = value.trim();
	let (digits, radix) = if value.starts_with("0x") || value.starts_with("0X") {
		(without_0x_prefix(value), 16)
	} else {
		(value, 10)
	};
	if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
		return None;
	}
	u64::from_str_radix(digits, radix).ok()
}
