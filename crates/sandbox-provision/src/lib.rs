//! Sandbox provisioning module.
//!
//! This module requests forked sandbox nodes from the external provisioning
//! service. Each call creates a new remote resource, so the service makes
//! exactly one attempt per chain and never retries on its own.

use async_trait::async_trait;
use sandbox_types::{SandboxHandle, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

/// Length of the commit prefix and of the random suffix in sandbox ids.
const ID_SEGMENT_LEN: usize = 8;

/// Errors that can occur while provisioning a sandbox.
#[derive(Debug, Error)]
pub enum ProvisionError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The provisioning service answered with a non-success status.
	#[error("Provisioning rejected with status {status}: {body}")]
	Rejected { status: u16, body: String },
	/// The provisioning service answered without usable connection details.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

/// Body of a sandbox creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRequest {
	pub chain_id: u64,
	pub node_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_number: Option<u64>,
}

/// Connection details returned by the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSandbox {
	pub rpc_url: String,
	#[serde(default)]
	pub mnemonic: Option<SecretString>,
}

/// Trait defining the interface for sandbox provisioning backends.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProvisionInterface: Send + Sync {
	/// Creates one sandbox node. Must not retry.
	async fn create(&self, request: SandboxRequest) -> Result<CreatedSandbox, ProvisionError>;
}

/// Derives `{repo_name}-{commit[..8]}-{8 random hex chars}`.
///
/// The random suffix keeps ids unique across concurrent CI runs of the same
/// commit without any coordination.
pub fn sandbox_id(repo_name: &str, commit_hash: &str) -> String {
	let commit_prefix: String = commit_hash.chars().take(ID_SEGMENT_LEN).collect();
	let random = uuid::Uuid::new_v4().simple().to_string();
	format!(
		"{}-{}-{}",
		repo_name,
		commit_prefix,
		&random[..ID_SEGMENT_LEN]
	)
}

/// Service that creates sandboxes through a provisioning backend.
pub struct ProvisionService {
	implementation: Box<dyn ProvisionInterface>,
}

impl ProvisionService {
	pub fn new(implementation: Box<dyn ProvisionInterface>) -> Self {
		Self { implementation }
	}

	/// Creates a sandbox forked from `block_number` of `chain_id`.
	#[instrument(skip_all, fields(chain_id = chain_id))]
	pub async fn create_sandbox(
		&self,
		repo_name: &str,
		commit_hash: &str,
		chain_id: u64,
		block_number: Option<u64>,
	) -> Result<SandboxHandle, ProvisionError> {
		let node_name = sandbox_id(repo_name, commit_hash);
		tracing::info!(
			sandbox_id = %node_name,
			block_number = ?block_number,
			"Creating sandbox"
		);

		let created = self
			.implementation
			.create(SandboxRequest {
				chain_id,
				node_name: node_name.clone(),
				block_number,
			})
			.await
			.inspect_err(|e| {
				tracing::error!(sandbox_id = %node_name, error = %e, "Sandbox creation failed");
			})?;

		if created.rpc_url.trim().is_empty() {
			return Err(ProvisionError::InvalidResponse(
				"empty rpcUrl in provisioning response".into(),
			));
		}

		tracing::info!(
			sandbox_id = %node_name,
			rpc_url = %created.rpc_url,
			has_mnemonic = created.mnemonic.is_some(),
			"Sandbox created"
		);

		Ok(SandboxHandle {
			sandbox_id: node_name,
			rpc_url: created.rpc_url,
			mnemonic: created.mnemonic,
		})
	}
}
