//! Construction of a `RunCoordinator` from configuration.

use crate::engine::RunCoordinator;
use crate::CoordinatorError;
use sandbox_artifacts::Reconciler;
use sandbox_config::Config;
use sandbox_deploy::implementations::shell::ShellDeployer;
use sandbox_deploy::DeployService;
use sandbox_notify::implementations::http::HttpNotifier;
use sandbox_notify::{NotificationContext, NotifyService};
use sandbox_provision::implementations::http::HttpProvisioner;
use sandbox_provision::ProvisionService;
use sandbox_rpc::{BlockResolver, HttpTransport, LivenessPoller, RpcTransport};
use std::sync::Arc;

/// Builds a coordinator wired to the HTTP backends named in the configuration.
pub struct CoordinatorBuilder {
	config: Config,
}

impl CoordinatorBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the coordinator. Fails when the provisioning token is missing.
	pub fn build(self, context: NotificationContext) -> Result<RunCoordinator, CoordinatorError> {
		let config = self.config;
		let token = config
			.auth_token()
			.map_err(|e| CoordinatorError::Config(e.to_string()))?
			.clone();

		let client = reqwest::Client::builder()
			.build()
			.map_err(|e| CoordinatorError::Config(format!("Failed to build HTTP client: {}", e)))?;

		let transport: Arc<dyn RpcTransport> = Arc::new(HttpTransport::new(client.clone()));
		let resolver = BlockResolver::new(config.upstream_table(), transport.clone());
		let liveness = LivenessPoller::new(
			transport,
			config.liveness.max_retries,
			config.liveness.delay(),
		);

		let provisioner = ProvisionService::new(Box::new(HttpProvisioner::new(
			client.clone(),
			&config.provisioner.base_url,
			token,
		)));

		let deployer = DeployService::new(Box::new(ShellDeployer::new()));

		let reconciler = Reconciler::new(
			config.artifacts.broadcast_dir.clone(),
			config.artifacts.build_dir.clone(),
			config.artifacts.scan_build,
		);

		let notifier = config.active_notifier().map(|notifier| {
			NotifyService::new(
				Box::new(HttpNotifier::new(
					client.clone(),
					notifier.url.clone(),
					notifier.auth_token.clone(),
				)),
				context.clone(),
			)
		});
		if notifier.is_none() {
			tracing::info!("Notifications disabled");
		}

		Ok(RunCoordinator::new(
			resolver,
			provisioner,
			liveness,
			deployer,
			reconciler,
			notifier,
		))
	}
}
