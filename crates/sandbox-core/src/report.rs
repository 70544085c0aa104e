//! Human-readable run summary.

use crate::engine::RunOutcome;
use sandbox_types::{truncate_id, DeploymentRecord};
use std::fmt;

/// Renders one block per chain, in request order, followed by the verdict.
pub struct SummaryReport<'a>(pub &'a RunOutcome);

impl fmt::Display for SummaryReport<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Deployment summary")?;
		writeln!(f, "==================")?;
		for record in &self.0.summary.records {
			write_record(f, record)?;
		}
		write!(
			f,
			"Result: {} - {}",
			self.0.validation.status, self.0.validation.message
		)
	}
}

fn write_record(f: &mut fmt::Formatter<'_>, record: &DeploymentRecord) -> fmt::Result {
	writeln!(f, "Chain {}", record.chain_id)?;
	if record.skipped {
		writeln!(f, "  Status:    {} (skipped)", record.status)?;
	} else {
		writeln!(f, "  Status:    {}", record.status)?;
	}
	if let Some(sandbox_id) = &record.sandbox_id {
		writeln!(f, "  Sandbox:   {}", sandbox_id)?;
	}
	if let Some(rpc_url) = &record.rpc_url {
		writeln!(f, "  RPC URL:   {}", rpc_url)?;
	}
	if let Some(block) = record.block_number {
		writeln!(f, "  Block:     {}", block)?;
	}
	if let Some(code) = record.exit_code {
		writeln!(f, "  Exit code: {}", code)?;
	}
	if let Some(error) = &record.error {
		writeln!(f, "  Error:     {}", error)?;
	}

	let contracts = record.contracts();
	writeln!(f, "  Contracts: {}", contracts.len())?;
	for contract in contracts {
		write!(f, "    - {} at {}", contract.name, contract.address)?;
		if let Some(block) = contract.block_number {
			write!(f, " (block {})", block)?;
		}
		if let Some(hash) = &contract.transaction_hash {
			write!(f, " tx {}", truncate_id(hash))?;
		}
		writeln!(f)?;
	}
	writeln!(f)
}
