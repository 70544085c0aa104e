//! Per-chain pipeline state machine.
//!
//! Each requested chain moves through
//! ResolvingBlock -> Provisioning -> Polling -> Deploying -> Reconciling -> Recorded.
//! A sandbox that never becomes live goes Polling -> SkippedNotLive -> Recorded,
//! and any stage may jump straight to Recorded when it fails.

use std::fmt;

/// Stage of one chain's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStage {
	ResolvingBlock,
	Provisioning,
	Polling,
	Deploying,
	SkippedNotLive,
	Reconciling,
	Recorded,
}

impl fmt::Display for ChainStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ChainStage::ResolvingBlock => "resolving-block",
			ChainStage::Provisioning => "provisioning",
			ChainStage::Polling => "polling",
			ChainStage::Deploying => "deploying",
			ChainStage::SkippedNotLive => "skipped-not-live",
			ChainStage::Reconciling => "reconciling",
			ChainStage::Recorded => "recorded",
		};
		f.write_str(name)
	}
}

impl ChainStage {
	pub fn is_valid_transition(from: ChainStage, to: ChainStage) -> bool {
		use ChainStage::*;
		matches!(
			(from, to),
			(ResolvingBlock, Provisioning)
				| (Provisioning, Polling)
				| (Polling, Deploying)
				| (Polling, SkippedNotLive)
				| (Deploying, Reconciling)
				| (Reconciling, Recorded)
				| (SkippedNotLive, Recorded)
		) || (to == Recorded && from != Recorded)
	}
}

/// Tracks the current stage of one chain.
#[derive(Debug)]
pub struct ChainProgress {
	chain_id: u64,
	stage: ChainStage,
}

impl ChainProgress {
	pub fn new(chain_id: u64) -> Self {
		Self {
			chain_id,
			stage: ChainStage::ResolvingBlock,
		}
	}

	pub fn stage(&self) -> ChainStage {
		self.stage
	}

	/// Moves to `next`. Invalid transitions are logged and ignored.
	pub fn advance(&mut self, next: ChainStage) {
		if !ChainStage::is_valid_transition(self.stage, next) {
			tracing::warn!(
				chain_id = self.chain_id,
				from = %self.stage,
				to = %next,
				"Ignoring invalid chain stage transition"
			);
			return;
		}
		tracing::debug!(chain_id = self.chain_id, from = %self.stage, to = %next, "Chain stage");
		self.stage = next;
	}
}
