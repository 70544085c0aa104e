//! Main entry point for the sandbox deployment orchestrator.
//!
//! This binary forks one sandbox node per requested chain, runs the caller's
//! deployment command against each, reconciles the artifacts it produced and
//! reports an ordered summary. It exits non-zero when the configuration or the
//! chain list is unusable, when a deployment command exited with code 1 or was
//! killed by a signal, or when no contract was deployed at all.

use clap::Parser;
use sandbox_config::{parse_chain_requests, Config};
use sandbox_core::{CoordinatorBuilder, RunOutcome, RunRequest, SummaryReport};
use sandbox_notify::NotificationContext;
use sandbox_types::SecretString;
use std::path::{Path, PathBuf};

/// Command-line arguments for the orchestrator.
///
/// Every run input can also come from the environment, which is how CI
/// platforms usually hand them over.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "SANDBOX_CONFIG", default_value = "sandbox.toml")]
	config: PathBuf,

	/// JSON array of `{"chainId": .., "blockNumber": ..}` objects
	#[arg(long, env = "SANDBOX_CHAINS")]
	chains: String,

	/// Shell command that performs the deployment
	#[arg(long, env = "SANDBOX_DEPLOY_COMMAND")]
	deploy_command: String,

	/// Directory the deployment command runs in
	#[arg(long, env = "SANDBOX_WORKING_DIRECTORY", default_value = ".")]
	working_directory: PathBuf,

	/// Repository name, used in sandbox ids
	#[arg(long, env = "SANDBOX_REPO_NAME")]
	repo_name: String,

	/// Repository owner, reported in notifications
	#[arg(long, env = "SANDBOX_REPO_OWNER", default_value = "")]
	repo_owner: String,

	/// Commit being deployed
	#[arg(long, env = "SANDBOX_COMMIT_HASH")]
	commit: String,

	/// CI workflow name, reported in notifications
	#[arg(long, env = "SANDBOX_WORKFLOW", default_value = "")]
	workflow: String,

	/// Link to the CI run, reported in notifications
	#[arg(long, env = "SANDBOX_ACTION_URL", default_value = "")]
	action_url: String,

	/// Provisioning API token, overrides the configured one
	#[arg(long, env = "SANDBOX_API_TOKEN", hide_env_values = true)]
	api_token: Option<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Write the structured run summary as JSON to this file
	#[arg(long)]
	summary_file: Option<PathBuf>,
}

impl Args {
	fn notification_context(&self) -> NotificationContext {
		NotificationContext {
			repository_name: self.repo_name.clone(),
			repository_owner: self.repo_owner.clone(),
			action_url: self.action_url.clone(),
			commit_hash: self.commit.clone(),
			workflow: self.workflow.clone(),
		}
	}
}

/// Main entry point for the orchestrator.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration and the chain list
/// 4. Runs the pipeline over every chain
/// 5. Prints the summary and reports failure through the exit status
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt().with_env_filter(env_filter).with_target(true).init();

	tracing::info!("Started sandbox orchestrator");

	let config = Config::from_file(&args.config)
		.await?
		.with_auth_token(args.api_token.clone().map(SecretString::from));
	tracing::info!(path = %args.config.display(), "Loaded configuration");

	let chains = parse_chain_requests(&args.chains)?;

	let coordinator = CoordinatorBuilder::new(config).build(args.notification_context())?;
	let outcome = coordinator
		.run(&RunRequest {
			chains,
			deploy_command: args.deploy_command.clone(),
			working_dir: args.working_directory.clone(),
			repo_name: args.repo_name.clone(),
			commit_hash: args.commit.clone(),
		})
		.await?;

	println!("{}", SummaryReport(&outcome));

	if let Some(path) = &args.summary_file {
		write_summary(path, &outcome).await?;
		tracing::info!(path = %path.display(), "Wrote run summary");
	}

	if outcome.is_failure() {
		return Err(outcome.validation.message.into());
	}

	tracing::info!("Stopped sandbox orchestrator");
	Ok(())
}

async fn write_summary(path: &Path, outcome: &RunOutcome) -> Result<(), Box<dyn std::error::Error>> {
	let json = serde_json::to_string_pretty(&outcome.summary)?;
	tokio::fs::write(path, json).await?;
	Ok(())
}
