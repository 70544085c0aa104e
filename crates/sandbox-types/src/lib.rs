//! Common types module for the sandbox deployment orchestrator.
//!
//! This module defines the data model shared by every pipeline stage: the
//! chain requests supplied by the caller, the sandbox handles returned by the
//! provisioning service, the broadcast artifacts produced by the deployment
//! tool, and the per-chain records that make up a run summary.

/// Broadcast artifact types (transactions, receipts, logs, ABI events).
pub mod broadcast;
/// Chain request and sandbox handle types.
pub mod chain;
/// Deployment outcome, record and run summary types.
pub mod deployment;
/// Secure string type for API tokens and mnemonics.
pub mod secret_string;
/// Utility functions for hex and quantity handling.
pub mod utils;

pub use broadcast::{
	AbiEvent, AbiParam, BroadcastRecord, DecodedLog, Log, Receipt, Transaction,
	UNKNOWN_EVENT_NAME,
};
pub use chain::{ChainRequest, DeployEnvironment, SandboxHandle};
pub use deployment::{
	DeployedContract, DeploymentOutcome, DeploymentRecord, DeploymentStatus, RunSummary,
};
pub use secret_string::SecretString;
pub use utils::{parse_quantity, truncate_id, with_0x_prefix, without_0x_prefix};
