//! Run coordinator.
//!
//! Drives every requested chain through the pipeline, one chain at a time,
//! and collects the per-chain records in request order. A failure in one
//! chain's pipeline becomes a failed record for that chain; the next chain is
//! processed regardless.

use crate::state::{ChainProgress, ChainStage};
use crate::CoordinatorError;
use sandbox_artifacts::Reconciler;
use sandbox_deploy::DeployService;
use sandbox_notify::{validate_run, NotifyService, RunStage, RunValidation};
use sandbox_provision::ProvisionService;
use sandbox_rpc::{BlockResolver, LivenessPoller};
use sandbox_types::{
	ChainRequest, DeployEnvironment, DeploymentRecord, DeploymentStatus, RunSummary,
};
use std::path::PathBuf;
use tracing::instrument;

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
	pub chains: Vec<ChainRequest>,
	pub deploy_command: String,
	pub working_dir: PathBuf,
	pub repo_name: String,
	pub commit_hash: String,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
	pub summary: RunSummary,
	pub validation: RunValidation,
}

impl RunOutcome {
	/// True when the host platform should see a failure.
	pub fn is_failure(&self) -> bool {
		self.validation.status == RunStage::Failed
	}
}

/// Coordinates the pipeline stages over a list of chains.
pub struct RunCoordinator {
	pub(crate) resolver: BlockResolver,
	pub(crate) provisioner: ProvisionService,
	pub(crate) liveness: LivenessPoller,
	pub(crate) deployer: DeployService,
	pub(crate) reconciler: Reconciler,
	pub(crate) notifier: Option<NotifyService>,
}

impl RunCoordinator {
	pub fn new(
		resolver: BlockResolver,
		provisioner: ProvisionService,
		liveness: LivenessPoller,
		deployer: DeployService,
		reconciler: Reconciler,
		notifier: Option<NotifyService>,
	) -> Self {
		Self {
			resolver,
			provisioner,
			liveness,
			deployer,
			reconciler,
			notifier,
		}
	}

	/// Processes every chain of `request` sequentially.
	///
	/// Only invalid inputs abort the run; everything that goes wrong for a
	/// single chain is captured in that chain's record.
	pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome, CoordinatorError> {
		if request.chains.is_empty() {
			return Err(CoordinatorError::InvalidInput(
				"at least one chain must be requested".into(),
			));
		}
		if request.deploy_command.trim().is_empty() {
			return Err(CoordinatorError::InvalidInput(
				"deploy command cannot be empty".into(),
			));
		}

		tracing::info!(
			chains = request.chains.len(),
			working_dir = %request.working_dir.display(),
			"Starting sandbox deployment run"
		);

		let mut summary = RunSummary::new();
		self.notify(
			RunStage::Started,
			&format!("Deploying to {} chain(s)", request.chains.len()),
			&summary,
		)
		.await;

		for chain in &request.chains {
			let record = self.process_chain(chain, request).await;
			summary.push(record);
		}

		let validation = validate_run(&summary);
		if validation.status == RunStage::Failed {
			tracing::error!(contracts = validation.contract_count, "{}", validation.message);
		} else {
			tracing::info!(contracts = validation.contract_count, "{}", validation.message);
		}

		self.notify(validation.status, &validation.message, &summary)
			.await;

		Ok(RunOutcome {
			summary,
			validation,
		})
	}

	/// Sends a notification, logging and dropping any error.
	async fn notify(&self, stage: RunStage, message: &str, summary: &RunSummary) {
		let Some(notifier) = &self.notifier else {
			return;
		};
		if let Err(e) = notifier.notify(stage, message, summary).await {
			tracing::warn!(status = %stage, error = %e, "Failed to send notification");
		}
	}

	#[instrument(skip_all, fields(chain_id = chain.chain_id))]
	async fn process_chain(&self, chain: &ChainRequest, request: &RunRequest) -> DeploymentRecord {
		let chain_id = chain.chain_id;
		let mut progress = ChainProgress::new(chain_id);

		let block_number = match chain.block_number {
			Some(block) => {
				tracing::info!(block_number = block, "Using requested fork block");
				block
			},
			None => match self.resolver.resolve_latest_block(chain_id).await {
				Ok(block) => block,
				Err(e) => {
					tracing::error!(error = %e, "Failed to resolve fork block");
					progress.advance(ChainStage::Recorded);
					return DeploymentRecord::failed(chain_id, e.to_string());
				},
			},
		};

		progress.advance(ChainStage::Provisioning);
		let handle = match self
			.provisioner
			.create_sandbox(
				&request.repo_name,
				&request.commit_hash,
				chain_id,
				Some(block_number),
			)
			.await
		{
			Ok(handle) => handle,
			Err(e) => {
				progress.advance(ChainStage::Recorded);
				return DeploymentRecord {
					block_number: Some(block_number),
					..DeploymentRecord::failed(chain_id, e.to_string())
				};
			},
		};

		let mut record = DeploymentRecord {
			block_number: Some(block_number),
			rpc_url: Some(handle.rpc_url.clone()),
			sandbox_id: Some(handle.sandbox_id.clone()),
			..DeploymentRecord::failed(chain_id, "")
		};

		progress.advance(ChainStage::Polling);
		let liveness = self.liveness.await_liveness(&handle.rpc_url).await;
		if !liveness.live {
			progress.advance(ChainStage::SkippedNotLive);
			tracing::warn!(
				sandbox_id = %handle.sandbox_id,
				attempts = liveness.attempts,
				"Sandbox did not become live, skipping deployment"
			);
			record.skipped = true;
			record.error = Some(format!(
				"Sandbox not live after {} attempt(s)",
				liveness.attempts
			));
			progress.advance(ChainStage::Recorded);
			return record;
		}

		progress.advance(ChainStage::Deploying);
		let env = DeployEnvironment::new(&handle, chain_id, block_number);
		let outcome = match self
			.deployer
			.run_deploy(&request.deploy_command, &request.working_dir, &env)
			.await
		{
			Ok(outcome) => outcome,
			Err(e) => {
				progress.advance(ChainStage::Recorded);
				record.error = Some(e.to_string());
				return record;
			},
		};

		record.exit_code = outcome.exit_code;
		record.deploy_failed = outcome.is_failure();
		if record.deploy_failed {
			record.error = Some(match outcome.exit_code {
				Some(code) => format!("Deploy command exited with code {}", code),
				None => "Deploy command terminated by signal".to_string(),
			});
		} else {
			record.status = DeploymentStatus::Success;
			record.error = None;
		}

		progress.advance(ChainStage::Reconciling);
		match self
			.reconciler
			.reconcile(chain_id, &request.working_dir)
			.await
		{
			Ok(broadcast) => record.broadcast = broadcast,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to reconcile broadcast artifacts");
			},
		}

		progress.advance(ChainStage::Recorded);
		tracing::info!(
			status = %record.status,
			contracts = record.contracts().len(),
			"Chain processed"
		);
		record
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sandbox_deploy::{DeployError, MockDeployerInterface};
	use sandbox_notify::{MockNotifierInterface, NotificationContext, NotifyError};
	use sandbox_provision::{CreatedSandbox, MockProvisionInterface, ProvisionError};
	use sandbox_rpc::{MockRpcTransport, RpcResponse, RpcTransport};
	use sandbox_types::DeploymentOutcome;
	use serde_json::json;
	use std::collections::HashMap;
	use std::path::Path;
	use std::sync::{Arc, Mutex};
	use std::time::Duration;
	use tempfile::TempDir;

	const DEAD_SANDBOX: &str = "http://sandbox/dead";

	fn rpc_ok(result: &str) -> RpcResponse {
		RpcResponse {
			status: 200,
			body: Some(json!({"jsonrpc": "2.0", "id": 1, "result": result})),
		}
	}

	/// Upstreams answer block 0x10; sandboxes answer eth_chainId unless dead.
	fn transport() -> MockRpcTransport {
		let mut transport = MockRpcTransport::new();
		transport.expect_call().returning(|url, method, _| {
			Ok(match method {
				"eth_blockNumber" => rpc_ok("0x10"),
				_ if url == DEAD_SANDBOX => RpcResponse {
					status: 503,
					body: None,
				},
				_ => rpc_ok("0x1"),
			})
		});
		transport
	}

	/// Provisions `http://sandbox/{chain_id}` for every chain.
	fn provisioner() -> MockProvisionInterface {
		let mut provisioner = MockProvisionInterface::new();
		provisioner.expect_create().returning(|req| {
			Ok(CreatedSandbox {
				rpc_url: format!("http://sandbox/{}", req.chain_id),
				mnemonic: None,
			})
		});
		provisioner
	}

	fn deployer_with_exit(code: i32) -> MockDeployerInterface {
		let mut deployer = MockDeployerInterface::new();
		deployer.expect_run().returning(move |_, _, _| {
			Ok(DeploymentOutcome {
				exit_code: Some(code),
				..Default::default()
			})
		});
		deployer
	}

	fn coordinator(
		provisioner: MockProvisionInterface,
		deployer: MockDeployerInterface,
		notifier: Option<MockNotifierInterface>,
	) -> RunCoordinator {
		let transport: Arc<dyn RpcTransport> = Arc::new(transport());
		let upstreams = HashMap::from([(1u64, vec!["https://rpc.one".to_string()])]);
		RunCoordinator::new(
			BlockResolver::new(upstreams, transport.clone()),
			ProvisionService::new(Box::new(provisioner)),
			LivenessPoller::new(transport, 2, Duration::ZERO),
			DeployService::new(Box::new(deployer)),
			Reconciler::default(),
			notifier.map(|n| NotifyService::new(Box::new(n), NotificationContext::default())),
		)
	}

	fn workspace(chains: &[(u64, &str)]) -> TempDir {
		let dir = tempfile::tempdir().unwrap();
		for (chain_id, contract) in chains {
			let path = dir
				.path()
				.join(format!("broadcast/Deploy.s.sol/{}/run-latest.json", chain_id));
			std::fs::create_dir_all(path.parent().unwrap()).unwrap();
			let run = json!({
				"transactions": [{
					"hash": format!("0x{:02x}", chain_id % 256),
					"contractName": contract,
					"contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3"
				}],
				"receipts": [{
					"transactionHash": format!("0x{:02x}", chain_id % 256),
					"blockNumber": "0x11",
					"logs": []
				}]
			});
			std::fs::write(path, run.to_string()).unwrap();
		}
		dir
	}

	fn request(chains: Vec<ChainRequest>, working_dir: &Path) -> RunRequest {
		RunRequest {
			chains,
			deploy_command: "forge script Deploy --broadcast".into(),
			working_dir: working_dir.to_path_buf(),
			repo_name: "contracts".into(),
			commit_hash: "deadbeefcafebabe".into(),
		}
	}

	fn recording_notifier(fail: bool) -> (MockNotifierInterface, Arc<Mutex<Vec<RunStage>>>) {
		let stages = Arc::new(Mutex::new(Vec::new()));
		let seen = stages.clone();
		let mut notifier = MockNotifierInterface::new();
		notifier.expect_send().returning(move |notification| {
			seen.lock().unwrap().push(notification.status);
			if fail {
				Err(NotifyError::Network("connection refused".into()))
			} else {
				Ok(())
			}
		});
		(notifier, stages)
	}

	#[tokio::test]
	async fn test_two_chain_run_preserves_order() {
		let dir = workspace(&[(1, "Token"), (137, "Vault")]);
		let mut provisioner = MockProvisionInterface::new();
		provisioner
			.expect_create()
			.withf(|req| req.chain_id == 1 && req.block_number == Some(16))
			.times(1)
			.returning(|_| {
				Ok(CreatedSandbox {
					rpc_url: "http://sandbox/1".into(),
					mnemonic: None,
				})
			});
		provisioner
			.expect_create()
			.withf(|req| req.chain_id == 137 && req.block_number == Some(5_000_000))
			.times(1)
			.returning(|_| {
				Ok(CreatedSandbox {
					rpc_url: "http://sandbox/137".into(),
					mnemonic: None,
				})
			});

		let mut deployer = MockDeployerInterface::new();
		deployer
			.expect_run()
			.withf(|command, _, env| {
				command == "forge script Deploy --broadcast"
					&& env.rpc_url == format!("http://sandbox/{}", env.chain_id)
			})
			.times(2)
			.returning(|_, _, _| {
				Ok(DeploymentOutcome {
					exit_code: Some(0),
					..Default::default()
				})
			});

		let (notifier, stages) = recording_notifier(false);
		let coordinator = coordinator(provisioner, deployer, Some(notifier));
		let outcome = coordinator
			.run(&request(
				vec![ChainRequest::new(1, None), ChainRequest::new(137, Some(5_000_000))],
				dir.path(),
			))
			.await
			.unwrap();

		let records = &outcome.summary.records;
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].chain_id, 1);
		assert_eq!(records[0].block_number, Some(16));
		assert_eq!(records[1].chain_id, 137);
		assert_eq!(records[1].block_number, Some(5_000_000));
		assert!(records.iter().all(|r| r.status == DeploymentStatus::Success));
		assert!(records
			.iter()
			.all(|r| r.sandbox_id.as_deref().unwrap().starts_with("contracts-deadbeef-")));
		assert_eq!(records[0].contracts()[0].name, "Token");
		assert_eq!(records[1].contracts()[0].name, "Vault");

		assert!(!outcome.is_failure());
		assert_eq!(
			*stages.lock().unwrap(),
			vec![RunStage::Started, RunStage::Success]
		);
	}

	#[tokio::test]
	async fn test_notifier_failure_is_swallowed() {
		let dir = workspace(&[(137, "Vault")]);
		let (notifier, stages) = recording_notifier(true);
		let coordinator = coordinator(provisioner(), deployer_with_exit(0), Some(notifier));

		let outcome = coordinator
			.run(&request(vec![ChainRequest::new(137, Some(1))], dir.path()))
			.await
			.unwrap();

		assert_eq!(outcome.summary.len(), 1);
		assert!(!outcome.is_failure());
		assert_eq!(stages.lock().unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_resolution_failure_does_not_stop_later_chains() {
		let dir = workspace(&[(137, "Vault")]);
		let coordinator = coordinator(provisioner(), deployer_with_exit(0), None);

		let outcome = coordinator
			.run(&request(
				vec![ChainRequest::new(999, None), ChainRequest::new(137, Some(1))],
				dir.path(),
			))
			.await
			.unwrap();

		let records = &outcome.summary.records;
		assert_eq!(records[0].chain_id, 999);
		assert_eq!(records[0].status, DeploymentStatus::Failed);
		assert!(records[0].error.as_deref().unwrap().contains("Unsupported chain"));
		assert_eq!(records[1].status, DeploymentStatus::Success);
	}

	#[tokio::test]
	async fn test_provisioning_failure_is_recorded() {
		let dir = workspace(&[(10, "Token")]);
		let mut provisioner = MockProvisionInterface::new();
		provisioner
			.expect_create()
			.withf(|req| req.chain_id == 137)
			.times(1)
			.returning(|_| {
				Err(ProvisionError::Rejected {
					status: 429,
					body: "quota".into(),
				})
			});
		provisioner
			.expect_create()
			.withf(|req| req.chain_id == 10)
			.returning(|_| {
				Ok(CreatedSandbox {
					rpc_url: "http://sandbox/10".into(),
					mnemonic: None,
				})
			});
		let coordinator = coordinator(provisioner, deployer_with_exit(0), None);

		let outcome = coordinator
			.run(&request(
				vec![ChainRequest::new(137, Some(7)), ChainRequest::new(10, Some(8))],
				dir.path(),
			))
			.await
			.unwrap();

		let records = &outcome.summary.records;
		assert_eq!(records[0].status, DeploymentStatus::Failed);
		assert_eq!(records[0].block_number, Some(7));
		assert!(records[0].sandbox_id.is_none());
		assert!(records[0].error.as_deref().unwrap().contains("429"));
		assert_eq!(records[1].status, DeploymentStatus::Success);
		assert!(!outcome.is_failure());
	}

	#[tokio::test]
	async fn test_dead_sandbox_is_skipped_without_deploying() {
		let dir = workspace(&[]);
		let mut provisioner = MockProvisionInterface::new();
		provisioner.expect_create().returning(|_| {
			Ok(CreatedSandbox {
				rpc_url: DEAD_SANDBOX.into(),
				mnemonic: None,
			})
		});
		let mut deployer = MockDeployerInterface::new();
		deployer.expect_run().never();

		let coordinator = coordinator(provisioner, deployer, None);
		let outcome = coordinator
			.run(&request(vec![ChainRequest::new(137, Some(1))], dir.path()))
			.await
			.unwrap();

		let record = &outcome.summary.records[0];
		assert!(record.skipped);
		assert_eq!(record.status, DeploymentStatus::Failed);
		assert!(record.exit_code.is_none());
		assert!(record.error.as_deref().unwrap().contains("2 attempt"));
		assert!(outcome.is_failure());
	}

	#[tokio::test]
	async fn test_exit_one_fails_but_still_reconciles() {
		let dir = workspace(&[(137, "Vault")]);
		let coordinator = coordinator(provisioner(), deployer_with_exit(1), None);

		let outcome = coordinator
			.run(&request(vec![ChainRequest::new(137, Some(1))], dir.path()))
			.await
			.unwrap();

		let record = &outcome.summary.records[0];
		assert_eq!(record.status, DeploymentStatus::Failed);
		assert_eq!(record.exit_code, Some(1));
		assert!(record.broadcast.is_some());
		assert_eq!(record.contracts().len(), 1);
		assert!(outcome.is_failure());
	}

	#[tokio::test]
	async fn test_signal_kill_fails_run_next_to_successful_chain() {
		let dir = workspace(&[(1, "Token")]);
		let mut deployer = MockDeployerInterface::new();
		deployer.expect_run().returning(|_, _, env| {
			Ok(DeploymentOutcome {
				exit_code: if env.chain_id == 137 { None } else { Some(0) },
				..Default::default()
			})
		});
		let coordinator = coordinator(provisioner(), deployer, None);

		let outcome = coordinator
			.run(&request(
				vec![ChainRequest::new(1, Some(16)), ChainRequest::new(137, Some(1))],
				dir.path(),
			))
			.await
			.unwrap();

		let records = &outcome.summary.records;
		assert_eq!(records[0].status, DeploymentStatus::Success);
		assert_eq!(records[0].contracts().len(), 1);
		assert_eq!(records[1].status, DeploymentStatus::Failed);
		assert!(records[1].exit_code.is_none());
		assert!(records[1].deploy_failed);
		assert_eq!(outcome.validation.status, RunStage::Failed);
		assert!(outcome.validation.message.contains("137"));
		assert!(outcome.is_failure());
	}

	#[tokio::test]
	async fn test_exit_two_counts_as_success() {
		let dir = workspace(&[(137, "Vault")]);
		let coordinator = coordinator(provisioner(), deployer_with_exit(2), None);

		let outcome = coordinator
			.run(&request(vec![ChainRequest::new(137, Some(1))], dir.path()))
			.await
			.unwrap();

		let record = &outcome.summary.records[0];
		assert_eq!(record.status, DeploymentStatus::Success);
		assert_eq!(record.exit_code, Some(2));
		assert!(record.error.is_none());
		assert!(!outcome.is_failure());
	}

	#[tokio::test]
	async fn test_zero_contracts_fails_run() {
		let dir = workspace(&[]);
		let coordinator = coordinator(provisioner(), deployer_with_exit(0), None);

		let outcome = coordinator
			.run(&request(vec![ChainRequest::new(137, Some(1))], dir.path()))
			.await
			.unwrap();

		assert_eq!(outcome.summary.records[0].status, DeploymentStatus::Success);
		assert!(outcome.summary.records[0].broadcast.is_none());
		assert!(outcome.is_failure());
	}

	#[tokio::test]
	async fn test_deploy_error_is_recorded() {
		let dir = workspace(&[]);
		let mut deployer = MockDeployerInterface::new();
		deployer
			.expect_run()
			.returning(|_, _, _| Err(DeployError::Spawn("sh: not found".into())));
		let coordinator = coordinator(provisioner(), deployer, None);

		let outcome = coordinator
			.run(&request(vec![ChainRequest::new(137, Some(1))], dir.path()))
			.await
			.unwrap();

		let record = &outcome.summary.records[0];
		assert_eq!(record.status, DeploymentStatus::Failed);
		assert!(record.error.as_deref().unwrap().contains("sh: not found"));
	}

	#[tokio::test]
	async fn test_empty_inputs_are_rejected() {
		let dir = workspace(&[]);
		let coordinator = coordinator(
			MockProvisionInterface::new(),
			MockDeployerInterface::new(),
			None,
		);

		let result = coordinator.run(&request(vec![], dir.path())).await;
		assert!(matches!(result, Err(CoordinatorError::InvalidInput(_))));

		let mut blank = request(vec![ChainRequest::new(1, None)], dir.path());
		blank.deploy_command = " ".into();
		let result = coordinator.run(&blank).await;
		assert!(matches!(result, Err(CoordinatorError::InvalidInput(_))));
	}
}
