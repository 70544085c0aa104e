//! Broadcast artifact types.
//!
//! These mirror the `run-latest.json` files written by the deployment tool
//! under its `broadcast` tree. Only the fields the reconciler reasons about are
//! typed; everything else is kept verbatim in `extra` so that a merged record
//! carries the full original data.

use crate::utils::{parse_quantity, with_0x_prefix};
use alloy_primitives::keccak256;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Event name used for logs that could not be matched against a known ABI event.
pub const UNKNOWN_EVENT_NAME: &str = "Unknown";

/// Merged view of every broadcast run file for one chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRecord {
	#[serde(default, deserialize_with = "null_as_empty")]
	pub transactions: Vec<Transaction>,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub receipts: Vec<Receipt>,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub libraries: Vec<String>,
}

impl BroadcastRecord {
	/// Appends another record after this one, preserving order.
	pub fn merge(&mut self, other: BroadcastRecord) {
		self.transactions.extend(other.transactions);
		self.receipts.extend(other.receipts);
		self.libraries.extend(other.libraries);
	}

	pub fn is_empty(&self) -> bool {
		self.transactions.is_empty() && self.receipts.is_empty() && self.libraries.is_empty()
	}

	/// Finds the receipt whose `transactionHash` equals `hash`.
	pub fn receipt_for(&self, hash: &str) -> Option<&Receipt> {
		self.receipts
			.iter()
			.find(|receipt| receipt.transaction_hash.as_deref() == Some(hash))
	}
}

/// A transaction entry of a broadcast run file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hash: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub contract_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub contract_address: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// A receipt entry of a broadcast run file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_hash: Option<String>,
	/// Hex (`0x..`) or decimal quantity.
	#[serde(
		default,
		deserialize_with = "opt_quantity",
		skip_serializing_if = "Option::is_none"
	)]
	pub block_number: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub contract_address: Option<String>,
	#[serde(
		default,
		deserialize_with = "opt_quantity",
		skip_serializing_if = "Option::is_none"
	)]
	pub gas_used: Option<String>,
	#[serde(
		default,
		deserialize_with = "opt_quantity",
		skip_serializing_if = "Option::is_none"
	)]
	pub cumulative_gas_used: Option<String>,
	#[serde(
		default,
		deserialize_with = "opt_quantity",
		skip_serializing_if = "Option::is_none"
	)]
	pub effective_gas_price: Option<String>,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub logs: Vec<Log>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub decoded_logs: Vec<DecodedLog>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Receipt {
	/// Numeric block number, if the stored quantity parses.
	pub fn block_number_value(&self) -> Option<u64> {
		self.block_number.as_deref().and_then(parse_quantity)
	}
}

/// A raw event log attached to a receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Log {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub topics: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Structural view of a log, labelled with its event when the selector is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedLog {
	pub event: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	pub topics: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// An `event` entry of a contract ABI found in the build tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEvent {
	pub name: String,
	#[serde(default)]
	pub inputs: Vec<AbiParam>,
	#[serde(default)]
	pub anonymous: bool,
}

/// A parameter of an ABI event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub indexed: bool,
	#[serde(default)]
	pub components: Vec<AbiParam>,
}

impl AbiParam {
	/// Canonical type used in signatures; tuples expand to their components.
	pub fn canonical_type(&self) -> String {
		match self.kind.strip_prefix("tuple") {
			Some(suffix) => {
				let inner: Vec<String> = self.components.iter().map(|c| c.canonical_type()).collect();
				format!("({}){}", inner.join(","), suffix)
			},
			None => self.kind.clone(),
		}
	}
}

impl AbiEvent {
	/// Canonical signature, e.g. `Transfer(address,address,uint256)`.
	pub fn signature(&self) -> String {
		let types: Vec<String> = self.inputs.iter().map(|p| p.canonical_type()).collect();
		format!("{}({})", self.name, types.join(","))
	}

	/// `topic0` of logs emitted by this event, as lowercase `0x` hex.
	pub fn selector(&self) -> String {
		with_0x_prefix(&hex::encode(keccak256(self.signature().as_bytes())))
	}
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuantityRepr {
	Number(u64),
	String(String),
}

fn opt_quantity<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(
		Option::<QuantityRepr>::deserialize(deserializer)?.map(|q| match q {
			QuantityRepr::Number(n) => n.to_string(),
			QuantityRepr::String(s) => s,
		}),
	)
}
