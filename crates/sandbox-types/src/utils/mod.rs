//! Utility functions for hex strings and JSON-RPC quantities.

pub mod conversion;
pub mod formatting;

pub use conversion::parse_quantity;
pub use formatting::{truncate_id, with_0x_prefix, without_0x_prefix};
