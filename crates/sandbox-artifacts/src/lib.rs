//! Artifact reconciliation for the sandbox deployment orchestrator.
//!
//! After the deployment command has run, this crate collects the broadcast
//! run files it left for a chain, merges them into one record, orders the
//! receipts by block, lines the transactions up with their receipts and
//! attaches a labelled view of every log.

use sandbox_types::BroadcastRecord;
use std::path::{Component, Path};
use thiserror::Error;
use tracing::instrument;

pub mod events;
pub mod ordering;
pub mod walker;

pub use events::{scan_build_events, EventRegistry};
pub use ordering::order_record;
pub use walker::walk_files;

/// File name of the per-run record written by the deployment tool.
pub const RUN_FILE_NAME: &str = "run-latest.json";

/// Errors that can occur during artifact reconciliation.
#[derive(Debug, Error)]
pub enum ArtifactError {
	/// Error that occurs while reading the artifact tree.
	#[error("IO error: {0}")]
	Io(String),
	/// A run file is not valid broadcast JSON.
	#[error("Failed to parse {path}: {message}")]
	Parse { path: String, message: String },
}

/// Reconciles broadcast artifacts found under a working directory.
#[derive(Debug, Clone)]
pub struct Reconciler {
	broadcast_dir: String,
	build_dir: String,
	scan_build: bool,
}

impl Default for Reconciler {
	fn default() -> Self {
		Self::new("broadcast", "build", true)
	}
}

impl Reconciler {
	pub fn new(broadcast_dir: impl Into<String>, build_dir: impl Into<String>, scan_build: bool) -> Self {
		Self {
			broadcast_dir: broadcast_dir.into(),
			build_dir: build_dir.into(),
			scan_build,
		}
	}

	/// Builds the merged broadcast record of `chain_id`.
	///
	/// Returns `Ok(None)` when the working directory has no broadcast
	/// directory. Run files that cannot be read or parsed are logged and
	/// skipped. Running twice over an unchanged tree yields identical records.
	#[instrument(skip_all, fields(chain_id = chain_id))]
	pub async fn reconcile(
		&self,
		chain_id: u64,
		working_dir: &Path,
	) -> Result<Option<BroadcastRecord>, ArtifactError> {
		let broadcast_root = working_dir.join(&self.broadcast_dir);
		if !tokio::fs::metadata(&broadcast_root)
			.await
			.map(|m| m.is_dir())
			.unwrap_or(false)
		{
			tracing::info!(path = %broadcast_root.display(), "No broadcast directory found");
			return Ok(None);
		}

		let chain_segment = chain_id.to_string();
		let mut record = BroadcastRecord::default();
		let mut merged = 0usize;

		for path in walk_files(&broadcast_root).await? {
			if !is_run_file_for(&path, &broadcast_root, &chain_segment) {
				continue;
			}
			match load_run_file(&path).await {
				Ok(run) => {
					tracing::debug!(
						path = %path.display(),
						transactions = run.transactions.len(),
						receipts = run.receipts.len(),
						"Merging run file"
					);
					record.merge(run);
					merged += 1;
				},
				Err(e) => {
					tracing::warn!(error = %e, "Skipping run file");
				},
			}
		}

		order_record(&mut record);

		let registry = if self.scan_build && !record.receipts.is_empty() {
			EventRegistry::new(scan_build_events(&working_dir.join(&self.build_dir)).await)
		} else {
			EventRegistry::default()
		};
		if self.scan_build && registry.is_empty() && !record.receipts.is_empty() {
			tracing::debug!("No ABI events known, logs will be labelled as unknown");
		}
		for receipt in &mut record.receipts {
			receipt.decoded_logs = receipt.logs.iter().map(|log| registry.decode(log)).collect();
		}

		tracing::info!(
			files = merged,
			transactions = record.transactions.len(),
			receipts = record.receipts.len(),
			known_events = registry.len(),
			"Reconciled broadcast artifacts"
		);
		Ok(Some(record))
	}
}

/// True when `path` is a run file and one of its directories below `root`
/// is named exactly `chain_segment`.
fn is_run_file_for(path: &Path, root: &Path, chain_segment: &str) -> bool {
	if path.file_name().is_none_or(|name| name != RUN_FILE_NAME) {
		return false;
	}
	let Ok(relative) = path.strip_prefix(root) else {
		return false;
	};
	relative
		.parent()
		.map(|dirs| {
			dirs.components()
				.any(|c| matches!(c, Component::Normal(s) if s == chain_segment))
		})
		.unwrap_or(false)
}

async fn load_run_file(path: &Path) -> Result<BroadcastRecord, ArtifactError> {
	let bytes = tokio::fs::read(path)
		.await
		.map_err(|e| ArtifactError::Io(format!("{}: {}", path.display(), e)))?;
	serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Parse {
		path: path.display().to_string(),
		message: e.to_string(),
	})
}
