//! Deployment outcome, per-chain record and run summary types.

use crate::BroadcastRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code the pipeline treats as a failed deployment.
pub const DEPLOY_FAILURE_EXIT_CODE: i32 = 1;

/// Result of running the deployment command once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
	/// `None` when the process was terminated by a signal.
	pub exit_code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl DeploymentOutcome {
	/// Only exit code 1 counts as failure. Other non-zero codes are treated as
	/// success for pipeline continuation; a missing code (signal) is a failure.
	pub fn is_failure(&self) -> bool {
		match self.exit_code {
			Some(code) => code == DEPLOY_FAILURE_EXIT_CODE,
			None => true,
		}
	}
}

/// Final status of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
	Success,
	Failed,
}

impl DeploymentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			DeploymentStatus::Success => "success",
			DeploymentStatus::Failed => "failed",
		}
	}
}

impl fmt::Display for DeploymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A contract created by the deployment, extracted from the reconciled record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContract {
	pub name: String,
	pub address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_hash: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_number: Option<u64>,
}

/// Everything known about one requested chain after its pipeline finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
	pub chain_id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_number: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rpc_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sandbox_id: Option<String>,
	pub status: DeploymentStatus,
	/// Set when the sandbox never became live and no deployment was attempted.
	#[serde(default)]
	pub skipped: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exit_code: Option<i32>,
	/// Set when the deployment command ran and its outcome counts as a failure,
	/// including termination by a signal.
	#[serde(default)]
	pub deploy_failed: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub broadcast: Option<BroadcastRecord>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl DeploymentRecord {
	/// A failed record for a chain that did not get past an early stage.
	pub fn failed(chain_id: u64, error: impl Into<String>) -> Self {
		Self {
			chain_id,
			block_number: None,
			rpc_url: None,
			sandbox_id: None,
			status: DeploymentStatus::Failed,
			skipped: false,
			exit_code: None,
			deploy_failed: false,
			broadcast: None,
			error: Some(error.into()),
		}
	}

	/// Contracts created on this chain, in reconciled transaction order.
	///
	/// A transaction counts when it names both the contract and its address.
	pub fn contracts(&self) -> Vec<DeployedContract> {
		let Some(broadcast) = &self.broadcast else {
			return Vec::new();
		};

		broadcast
			.transactions
			.iter()
			.filter_map(|tx| {
				let name = tx.contract_name.as_deref().filter(|n| !n.is_empty())?;
				let address = tx.contract_address.as_deref().filter(|a| !a.is_empty())?;
				let receipt = tx.hash.as_deref().and_then(|h| broadcast.receipt_for(h));
				Some(DeployedContract {
					name: name.to_string(),
					address: address.to_string(),
					transaction_hash: tx.hash.clone(),
					block_number: receipt.and_then(|r| r.block_number_value()),
				})
			})
			.collect()
	}
}

/// Ordered per-chain records of one run, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
	pub records: Vec<DeploymentRecord>,
}

impl RunSummary {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, record: DeploymentRecord) {
		self.records.push(record);
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// True when any deployment command ran and was classified as failed.
	pub fn has_deploy_failures(&self) -> bool {
		self.records.iter().any(|r| r.deploy_failed)
	}

	/// Total number of contracts extracted across all chains.
	pub fn contract_count(&self) -> usize {
		self.records.iter().map(|r| r.contracts().len()).sum()
	}
}
