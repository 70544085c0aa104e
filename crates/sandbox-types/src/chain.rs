//! Chain request and sandbox handle types.
//!
//! A `ChainRequest` is the caller's description of one chain to fork. Once the
//! provisioning service has created a node for it, the coordinator holds a
//! `SandboxHandle` for the duration of that chain's processing and derives the
//! `DeployEnvironment` handed to the deployment command from it.

use crate::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// Environment variable carrying the sandbox JSON-RPC URL.
pub const ENV_RPC_URL: &str = "SANDBOX_RPC_URL";
/// Environment variable carrying the sandbox mnemonic, when one was returned.
pub const ENV_MNEMONIC: &str = "SANDBOX_MNEMONIC";
/// Environment variable carrying the chain id.
pub const ENV_CHAIN_ID: &str = "SANDBOX_CHAIN_ID";
/// Environment variable carrying the sandbox identifier.
pub const ENV_SANDBOX_ID: &str = "SANDBOX_ID";
/// Environment variable carrying the fork block number.
pub const ENV_BLOCK_NUMBER: &str = "SANDBOX_BLOCK_NUMBER";

/// One chain the caller wants a sandbox for.
///
/// `block_number` absent means the latest block must be resolved before the
/// sandbox is provisioned. Both fields accept JSON numbers or decimal strings,
/// since CI inputs are frequently stringly typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRequest {
	#[serde(deserialize_with = "deserialize_u64")]
	pub chain_id: u64,
	#[serde(default, deserialize_with = "deserialize_opt_u64")]
	pub block_number: Option<u64>,
}

impl ChainRequest {
	pub fn new(chain_id: u64, block_number: Option<u64>) -> Self {
		Self {
			chain_id,
			block_number,
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
	Number(u64),
	String(String),
}

impl NumberOrString {
	fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
		match self {
			NumberOrString::Number(n) => Ok(n),
			NumberOrString::String(s) => s
				.trim()
				.parse::<u64>()
				.map_err(|e| E::custom(format!("invalid integer '{}': {}", s, e))),
		}
	}
}

fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
	D: Deserializer<'de>,
{
	NumberOrString::deserialize(deserializer)?.into_u64()
}

fn deserialize_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<NumberOrString>::deserialize(deserializer)? {
		Some(value) => value.into_u64().map(Some),
		None => Ok(None),
	}
}

/// Connection details of a provisioned sandbox node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxHandle {
	/// `{repo}-{commit[..8]}-{random 8 hex}`.
	pub sandbox_id: String,
	pub rpc_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mnemonic: Option<SecretString>,
}

/// Configuration handed to the deployment command for one chain.
///
/// Replaces process-wide exports: the runner applies these values to the
/// child process environment only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployEnvironment {
	pub chain_id: u64,
	pub block_number: u64,
	pub sandbox_id: String,
	pub rpc_url: String,
	pub mnemonic: Option<SecretString>,
}

impl DeployEnvironment {
	pub fn new(handle: &SandboxHandle, chain_id: u64, block_number: u64) -> Self {
		Self {
			chain_id,
			block_number,
			sandbox_id: handle.sandbox_id.clone(),
			rpc_url: handle.rpc_url.clone(),
			mnemonic: handle.mnemonic.clone(),
		}
	}

	/// Returns the environment variables to set on the child process.
	///
	/// The mnemonic is exposed here; callers must not log the result.
	pub fn vars(&self) -> Vec<(&'static str, String)> {
		let mut vars = vec![
			(ENV_RPC_URL, self.rpc_url.clone()),
			(ENV_CHAIN_ID, self.chain_id.to_string()),
			(ENV_SANDBOX_ID, self.sandbox_id.clone()),
			(ENV_BLOCK_NUMBER, self.block_number.to_string()),
		];
		if let Some(mnemonic) = &self.mnemonic {
			vars.push((ENV_MNEMONIC, mnemonic.expose_secret().to_string()));
		}
		vars
	}
}
