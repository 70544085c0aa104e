//! Configuration module for the sandbox deployment orchestrator.
//!
//! This module loads the TOML configuration describing the external services
//! the orchestrator talks to (provisioning API, notification collector,
//! upstream RPC endpoints) and the tunables of the pipeline stages.
//!
//! String values may reference environment variables with `${VAR_NAME}` or
//! `${VAR_NAME:-default}`; placeholders are resolved before parsing so that
//! tokens never need to be committed to the file.

mod chains;
mod upstreams;

pub use chains::parse_chain_requests;
pub use upstreams::{default_upstreams, UpstreamTable};

use regex::Regex;
use sandbox_types::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing configuration or run inputs.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering repeats the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Sandbox provisioning service.
	pub provisioner: ProvisionerConfig,
	/// Liveness polling of freshly provisioned sandboxes.
	#[serde(default)]
	pub liveness: LivenessConfig,
	/// Locations of the deployment tool's output trees.
	#[serde(default)]
	pub artifacts: ArtifactsConfig,
	/// Optional notification collector.
	pub notifier: Option<NotifierConfig>,
	/// Per-chain upstream RPC overrides, merged over the built-in table.
	#[serde(default, deserialize_with = "deserialize_upstreams")]
	pub upstreams: UpstreamTable,
}

/// Configuration of the sandbox provisioning service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisionerConfig {
	/// Base URL; sandboxes are created with `POST {base_url}/sandbox`.
	pub base_url: String,
	/// Bearer token. May also be supplied on the command line.
	#[serde(default)]
	pub auth_token: Option<SecretString>,
}

/// Configuration of the liveness poller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessConfig {
	/// Number of probes before a sandbox is declared not live.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// Fixed delay between probes in milliseconds.
	#[serde(default = "default_delay_ms")]
	pub delay_ms: u64,
}

impl LivenessConfig {
	pub fn delay(&self) -> Duration {
		Duration::from_millis(self.delay_ms)
	}
}

impl Default for LivenessConfig {
	fn default() -> Self {
		Self {
			max_retries: default_max_retries(),
			delay_ms: default_delay_ms(),
		}
	}
}

fn default_max_retries() -> u32 {
	10
}

fn default_delay_ms() -> u64 {
	5000
}

/// Names of the deployment tool's output directories under the working directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
	#[serde(default = "default_broadcast_dir")]
	pub broadcast_dir: String,
	#[serde(default = "default_build_dir")]
	pub build_dir: String,
	/// Whether to scan the build tree for ABI events used to label logs.
	#[serde(default = "default_scan_build")]
	pub scan_build: bool,
}

impl Default for ArtifactsConfig {
	fn default() -> Self {
		Self {
			broadcast_dir: default_broadcast_dir(),
			build_dir: default_build_dir(),
			scan_build: default_scan_build(),
		}
	}
}

fn default_broadcast_dir() -> String {
	"broadcast".to_string()
}

fn default_build_dir() -> String {
	"build".to_string()
}

fn default_scan_build() -> bool {
	true
}

/// Configuration of the notification collector.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
	#[serde(default = "default_notifier_enabled")]
	pub enabled: bool,
	pub url: String,
	#[serde(default)]
	pub auth_token: Option<SecretString>,
}

fn default_notifier_enabled() -> bool {
	true
}

/// Deserializes `[upstreams]`, whose keys are chain ids written as TOML strings.
fn deserialize_upstreams<'de, D>(deserializer: D) -> Result<UpstreamTable, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, Vec<String>> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, urls)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, urls))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

/// Resolves `${VAR}` and `${VAR:-default}` placeholders from the environment.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	if let Some(var_name) = missing {
		return Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		)));
	}

	Ok(resolved.into_owned())
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Replaces the provisioning token, e.g. with one passed on the command line.
	pub fn with_auth_token(mut self, token: Option<SecretString>) -> Self {
		if let Some(token) = token {
			self.provisioner.auth_token = Some(token);
		}
		self
	}

	/// Returns the provisioning token, which must be set before a run starts.
	pub fn auth_token(&self) -> Result<&SecretString, ConfigError> {
		self.provisioner
			.auth_token
			.as_ref()
			.filter(|token| !token.is_empty())
			.ok_or_else(|| {
				ConfigError::Validation("Provisioner auth_token is not configured".into())
			})
	}

	/// Built-in upstream table with configured overrides applied per chain.
	pub fn upstream_table(&self) -> UpstreamTable {
		let mut table = default_upstreams();
		for (chain_id, urls) in &self.upstreams {
			table.insert(*chain_id, urls.clone());
		}
		table
	}

	/// Returns the notifier configuration if notifications are enabled.
	pub fn active_notifier(&self) -> Option<&NotifierConfig> {
		self.notifier.as_ref().filter(|n| n.enabled)
	}

	/// Validates the configuration.
	///
	/// - Provisioner base URL must be set
	/// - Liveness must allow at least one probe
	/// - Artifact directory names must be set
	/// - Every upstream override must list at least one URL
	/// - An enabled notifier must have a URL
	fn validate(&self) -> Result<(), ConfigError> {
		if self.provisioner.base_url.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Provisioner base_url cannot be empty".into(),
			));
		}

		if self.liveness.max_retries == 0 {
			return Err(ConfigError::Validation(
				"Liveness max_retries must be at least 1".into(),
			));
		}

		if self.artifacts.broadcast_dir.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Artifacts broadcast_dir cannot be empty".into(),
			));
		}
		if self.artifacts.scan_build && self.artifacts.build_dir.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Artifacts build_dir cannot be empty when scan_build is enabled".into(),
			));
		}

		for (chain_id, urls) in &self.upstreams {
			if urls.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Upstream list for chain {} cannot be empty",
					chain_id
				)));
			}
		}

		if let Some(notifier) = self.active_notifier() {
			if notifier.url.trim().is_empty() {
				return Err(ConfigError::Validation(
					"Notifier url cannot be empty when enabled".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		tracing::debug!(
			upstream_overrides = config.upstreams.len(),
			notifier = config.active_notifier().is_some(),
			"Parsed configuration"
		);
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[provisioner]
base_url = "https://sandbox.example.com"
auth_token = "token"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SANDBOX_TEST_HOST", "localhost");
		std::env::set_var("SANDBOX_TEST_PORT", "8545");

		let input = "url = \"http://${SANDBOX_TEST_HOST}:${SANDBOX_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("SANDBOX_TEST_HOST");
		std::env::remove_var("SANDBOX_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${SANDBOX_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${SANDBOX_MISSING_VAR}\"";
		let err = resolve_env_vars(input).unwrap_err();
		assert!(err.to_string().contains("SANDBOX_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.liveness.max_retries, 10);
		assert_eq!(config.liveness.delay(), Duration::from_millis(5000));
		assert_eq!(config.artifacts.broadcast_dir, "broadcast");
		assert_eq!(config.artifacts.build_dir, "build");
		assert!(config.artifacts.scan_build);
		assert!(config.active_notifier().is_none());
		assert_eq!(config.auth_token().unwrap().expose_secret(), "token");
	}

	#[test]
	fn test_full_config() {
		std::env::set_var("SANDBOX_TEST_NOTIFY_TOKEN", "notify-secret");
		let config_str = r#"
[provisioner]
base_url = "https://sandbox.example.com"

[liveness]
max_retries = 3
delay_ms = 10

[artifacts]
broadcast_dir = "broadcast"
build_dir = "out"

[notifier]
url = "https://collector.example.com/events"
auth_token = "${SANDBOX_TEST_NOTIFY_TOKEN}"

[upstreams]
"1" = ["http://localhost:8545"]
"31337" = ["http://localhost:8546", "http://localhost:8547"]
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.liveness.max_retries, 3);
		assert_eq!(config.artifacts.build_dir, "out");
		let notifier = config.active_notifier().unwrap();
		assert_eq!(
			notifier.auth_token.as_ref().unwrap().expose_secret(),
			"notify-secret"
		);

		let table = config.upstream_table();
		assert_eq!(table[&1], vec!["http://localhost:8545".to_string()]);
		assert_eq!(table[&31337].len(), 2);
		assert!(table.contains_key(&137));

		std::env::remove_var("SANDBOX_TEST_NOTIFY_TOKEN");
	}

	#[test]
	fn test_missing_auth_token() {
		let config: Config = r#"
[provisioner]
base_url = "https://sandbox.example.com"
"#
		.parse()
		.unwrap();
		assert!(config.auth_token().is_err());

		let config = config.with_auth_token(Some(SecretString::from("cli-token")));
		assert_eq!(config.auth_token().unwrap().expose_secret(), "cli-token");
	}

	#[test]
	fn test_validation_errors() {
		let empty_url = "[provisioner]\nbase_url = \"\"\n";
		assert!(Config::from_str(empty_url)
			.unwrap_err()
			.to_string()
			.contains("base_url"));

		let zero_retries = format!("{}\n[liveness]\nmax_retries = 0\n", MINIMAL);
		assert!(Config::from_str(&zero_retries)
			.unwrap_err()
			.to_string()
			.contains("max_retries"));

		let empty_upstream = format!("{}\n[upstreams]\n\"5\" = []\n", MINIMAL);
		assert!(Config::from_str(&empty_upstream)
			.unwrap_err()
			.to_string()
			.contains("chain 5"));

		let bad_chain = format!("{}\n[upstreams]\nmainnet = [\"http://x\"]\n", MINIMAL);
		assert!(Config::from_str(&bad_chain).is_err());

		let empty_notifier = format!("{}\n[notifier]\nurl = \"\"\n", MINIMAL);
		assert!(Config::from_str(&empty_notifier)
			.unwrap_err()
			.to_string()
			.contains("Notifier url"));
	}

	#[tokio::test]
	async fn test_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("sandbox.toml");
		std::fs::write(&path, MINIMAL).unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(config.provisioner.base_url, "https://sandbox.example.com");

		let missing = Config::from_file(dir.path().join("missing.toml")).await;
		assert!(matches!(missing, Err(ConfigError::Io(_))));
	}
}
