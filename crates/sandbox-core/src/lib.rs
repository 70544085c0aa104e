//! Run coordination for the sandbox deployment orchestrator.
//!
//! Ties the pipeline stages together: block resolution, sandbox provisioning,
//! liveness polling, running the deployment command, and reconciling its
//! artifacts, for each requested chain in turn. Progress is reported to the
//! notifier at the start and the end of a run.

use thiserror::Error;

pub mod builder;
pub mod engine;
pub mod report;
pub mod state;

pub use builder::CoordinatorBuilder;
pub use engine::{RunCoordinator, RunOutcome, RunRequest};
pub use report::SummaryReport;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum CoordinatorError {
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// The run inputs are unusable.
	#[error("Invalid input: {0}")]
	InvalidInput(String),
}
