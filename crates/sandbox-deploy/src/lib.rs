//! Deployment runner module.
//!
//! Runs the caller-supplied deployment command for one chain and classifies
//! how it exited. The command is opaque: it only receives the sandbox
//! connection details through its environment.

use async_trait::async_trait;
use sandbox_types::{DeployEnvironment, DeploymentOutcome};
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

/// Re-export implementations
pub mod implementations {
	pub mod shell;
}

/// Errors that can occur while running the deployment command.
///
/// A command that runs and exits, whatever its exit code, is never an error;
/// these cover the cases where no exit status could be observed at all.
#[derive(Debug, Error)]
pub enum DeployError {
	/// The command was empty.
	#[error("Invalid command: {0}")]
	InvalidCommand(String),
	/// The child process could not be started.
	#[error("Failed to spawn deploy command: {0}")]
	Spawn(String),
	/// Waiting for the child or reading its output failed.
	#[error("Failed to run deploy command: {0}")]
	Io(String),
}

/// Trait defining the interface for deployment command runners.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeployerInterface: Send + Sync {
	/// Runs `command` rooted at `working_dir` with `env` applied to the child.
	async fn run(
		&self,
		command: &str,
		working_dir: &Path,
		env: &DeployEnvironment,
	) -> Result<DeploymentOutcome, DeployError>;
}

/// Service running deployment commands through a runner implementation.
pub struct DeployService {
	implementation: Box<dyn DeployerInterface>,
}

impl DeployService {
	pub fn new(implementation: Box<dyn DeployerInterface>) -> Self {
		Self { implementation }
	}

	#[instrument(skip_all, fields(chain_id = env.chain_id, sandbox_id = %env.sandbox_id))]
	pub async fn run_deploy(
		&self,
		command: &str,
		working_dir: &Path,
		env: &DeployEnvironment,
	) -> Result<DeploymentOutcome, DeployError> {
		if command.trim().is_empty() {
			return Err(DeployError::InvalidCommand(
				"deploy command is empty".into(),
			));
		}

		tracing::info!(working_dir = %working_dir.display(), "Running deploy command");
		let outcome = self.implementation.run(command, working_dir, env).await?;

		if outcome.is_failure() {
			tracing::error!(exit_code = ?outcome.exit_code, "Deploy command failed");
		} else {
			tracing::info!(exit_code = ?outcome.exit_code, "Deploy command finished");
		}
		Ok(outcome)
	}
}
