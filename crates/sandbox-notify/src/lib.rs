//! Run notification module.
//!
//! Reports the start and the outcome of a run to an external collector. The
//! report is best effort: every method returns a `Result`, and the caller is
//! expected to log failures and carry on.
//!
//! This module also owns the post-run validation that decides the final
//! status: a run that deployed no contract at all, or whose deployment command
//! exited with the failure code or was killed by a signal, is reported as
//! failed.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sandbox_types::{DeployedContract, DeploymentStatus, RunSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

/// Errors that can occur while sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The collector answered with a non-success status.
	#[error("Notification rejected with status {status}: {body}")]
	Rejected { status: u16, body: String },
}

/// Point of the run a notification reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
	Started,
	Success,
	Failed,
}

impl fmt::Display for RunStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RunStage::Started => write!(f, "started"),
			RunStage::Success => write!(f, "success"),
			RunStage::Failed => write!(f, "failed"),
		}
	}
}

/// CI metadata identifying the run being reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContext {
	pub repository_name: String,
	pub repository_owner: String,
	pub action_url: String,
	pub commit_hash: String,
	pub workflow: String,
}

/// Per-chain entry of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
	pub chain_id: u64,
	pub rpc_url: Option<String>,
	pub sandbox_id: Option<String>,
	pub status: DeploymentStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub contracts: Vec<DeployedContract>,
}

/// Body of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
	#[serde(flatten)]
	pub context: NotificationContext,
	pub message: String,
	pub deployments: Vec<DeploymentReport>,
}

/// A complete notification as posted to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	/// RFC 3339 UTC timestamp.
	pub timestamp: String,
	pub status: RunStage,
	pub payload: NotificationPayload,
}

/// Outcome of the post-run validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunValidation {
	pub status: RunStage,
	pub contract_count: usize,
	pub message: String,
}

/// Recomputes the final status of a run from its records.
///
/// Zero extracted contracts across all chains fails the run even when every
/// deployment command exited cleanly.
pub fn validate_run(summary: &RunSummary) -> RunValidation {
	let contract_count = summary.contract_count();
	let chains = summary.len();

	if summary.has_deploy_failures() {
		let failed: Vec<String> = summary
			.records
			.iter()
			.filter(|r| r.deploy_failed)
			.map(|r| r.chain_id.to_string())
			.collect();
		return RunValidation {
			status: RunStage::Failed,
			contract_count,
			message: format!("Deploy command failed on chain(s) {}", failed.join(", ")),
		};
	}

	if contract_count == 0 {
		return RunValidation {
			status: RunStage::Failed,
			contract_count,
			message: format!("No contracts deployed across {} chain(s)", chains),
		};
	}

	RunValidation {
		status: RunStage::Success,
		contract_count,
		message: format!(
			"Deployed {} contract(s) across {} chain(s)",
			contract_count, chains
		),
	}
}

impl Notification {
	/// Builds a notification stamped with the current time.
	pub fn new(
		status: RunStage,
		context: &NotificationContext,
		message: impl Into<String>,
		summary: &RunSummary,
	) -> Self {
		let deployments = summary
			.records
			.iter()
			.map(|record| DeploymentReport {
				chain_id: record.chain_id,
				rpc_url: record.rpc_url.clone(),
				sandbox_id: record.sandbox_id.clone(),
				status: record.status,
				error: record.error.clone(),
				contracts: record.contracts(),
			})
			.collect();

		Self {
			timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
			status,
			payload: NotificationPayload {
				context: context.clone(),
				message: message.into(),
				deployments,
			},
		}
	}
}

/// Trait defining the interface for notification backends.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotifierInterface: Send + Sync {
	/// Delivers one notification.
	async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Service that reports run progress through a notification backend.
pub struct NotifyService {
	implementation: Box<dyn NotifierInterface>,
	context: NotificationContext,
}

impl NotifyService {
	pub fn new(implementation: Box<dyn NotifierInterface>, context: NotificationContext) -> Self {
		Self {
			implementation,
			context,
		}
	}

	/// Sends a notification for `stage`. The caller may ignore the result.
	pub async fn notify(
		&self,
		stage: RunStage,
		message: &str,
		summary: &RunSummary,
	) -> Result<(), NotifyError> {
		let notification = Notification::new(stage, &self.context, message, summary);
		tracing::debug!(status = %stage, deployments = summary.len(), "Sending notification");
		self.implementation.send(&notification).await
	}
}
