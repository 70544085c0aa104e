//! ABI event collection and log labelling.
//!
//! The build tree holds one JSON artifact per compiled contract, each with an
//! `abi` array. Event entries found there are indexed by selector so that raw
//! receipt logs can be labelled with the event that produced them. Arguments
//! are not decoded.

use crate::walker::walk_files;
use sandbox_types::{AbiEvent, DecodedLog, Log, UNKNOWN_EVENT_NAME};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Deserialize)]
struct BuildArtifact {
	#[serde(default)]
	abi: Vec<serde_json::Value>,
}

/// Collects every `event` entry from the JSON artifacts under `build_dir`.
///
/// A missing build directory yields no events. Files that cannot be read or
/// parsed are skipped individually. Events with the same signature are kept
/// once, first occurrence wins.
pub async fn scan_build_events(build_dir: &Path) -> Vec<AbiEvent> {
	if !tokio::fs::try_exists(build_dir).await.unwrap_or(false) {
		tracing::debug!(path = %build_dir.display(), "No build directory, skipping ABI scan");
		return Vec::new();
	}

	let files = match walk_files(build_dir).await {
		Ok(files) => files,
		Err(e) => {
			tracing::warn!(error = %e, "Failed to scan build directory");
			return Vec::new();
		},
	};

	let mut events: Vec<AbiEvent> = Vec::new();
	let mut seen = HashSet::new();

	for path in files
		.iter()
		.filter(|p| p.extension().is_some_and(|ext| ext == "json"))
	{
		let artifact = match tokio::fs::read(path).await {
			Ok(bytes) => match serde_json::from_slice::<BuildArtifact>(&bytes) {
				Ok(artifact) => artifact,
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping build file");
					continue;
				},
			},
			Err(e) => {
				tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable build file");
				continue;
			},
		};

		for entry in artifact.abi {
			if entry.get("type").and_then(|t| t.as_str()) != Some("event") {
				continue;
			}
			match serde_json::from_value::<AbiEvent>(entry) {
				Ok(event) => {
					if seen.insert(event.signature()) {
						events.push(event);
					}
				},
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping malformed ABI event");
				},
			}
		}
	}

	tracing::debug!(count = events.len(), "Collected ABI events");
	events
}

/// Labels raw logs with known events, keyed by `topic0`.
#[derive(Debug, Default, Clone)]
pub struct EventRegistry {
	by_selector: HashMap<String, AbiEvent>,
}

impl EventRegistry {
	pub fn new(events: Vec<AbiEvent>) -> Self {
		let mut by_selector = HashMap::new();
		for event in events.into_iter().filter(|e| !e.anonymous) {
			by_selector.entry(event.selector()).or_insert(event);
		}
		Self { by_selector }
	}

	pub fn len(&self) -> usize {
		self.by_selector.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_selector.is_empty()
	}

	/// Copies the log structurally, naming the event when `topic0` is known.
	pub fn decode(&self, log: &Log) -> DecodedLog {
		let event = log
			.topics
			.first()
			.and_then(|topic| self.by_selector.get(&topic.to_ascii_lowercase()));

		DecodedLog {
			event: event
				.map(|e| e.name.clone())
				.unwrap_or_else(|| UNKNOWN_EVENT_NAME.to_string()),
			signature: event.map(|e| e.signature()),
			address: log.address.clone(),
			topics: log.topics.clone(),
			data: log.data.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use tempfile::tempdir;

	const TRANSFER_TOPIC: &str =
		"0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

	fn transfer_abi() -> serde_json::Value {
		json!({
			"type": "event",
			"name": "Transfer",
			"anonymous": false,
			"inputs": [
				{"name": "from", "type": "address", "indexed": true},
				{"name": "to", "type": "address", "indexed": true},
				{"name": "value", "type": "uint256", "indexed": false}
			]
		})
	}

	fn write(root: &Path, relative: &str, contents: &str) {
		let path = root.join(relative);
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(path, contents).unwrap();
	}

	#[tokio::test]
	async fn test_scan_collects_events_and_skips_bad_files() {
		let dir = tempdir().unwrap();
		let artifact = json!({
			"abi": [
				{"type": "function", "name": "transfer", "inputs": []},
				transfer_abi()
			]
		});
		write(dir.path(), "Token.sol/Token.json", &artifact.to_string());
		write(dir.path(), "Token2.sol/Token.json", &artifact.to_string());
		write(dir.path(), "Broken.sol/Broken.json", "{ not json");
		write(dir.path(), "notes.txt", "ignored");

		let events = scan_build_events(dir.path()).await;
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].name, "Transfer");
	}

	#[tokio::test]
	async fn test_scan_missing_build_dir() {
		let dir = tempdir().unwrap();
		assert!(scan_build_events(&dir.path().join("build")).await.is_empty());
	}

	#[test]
	fn test_decode_known_and_unknown() {
		let event: AbiEvent = serde_json::from_value(transfer_abi()).unwrap();
		let registry = EventRegistry::new(vec![event]);
		assert_eq!(registry.len(), 1);

		let known = Log {
			address: Some("0x01".into()),
			topics: vec![TRANSFER_TOPIC.to_uppercase().replace("0X", "0x")],
			data: Some("0x00".into()),
			..Default::default()
		};
		let decoded = registry.decode(&known);
		assert_eq!(decoded.event, "Transfer");
		assert_eq!(
			decoded.signature.as_deref(),
			Some("Transfer(address,address,uint256)")
		);
		assert_eq!(decoded.data.as_deref(), Some("0x00"));

		let unknown = Log {
			topics: vec!["0x1234".into()],
			..Default::default()
		};
		let decoded = registry.decode(&unknown);
		assert_eq!(decoded.event, UNKNOWN_EVENT_NAME);
		assert!(decoded.signature.is_none());
		assert_eq!(decoded.topics, vec!["0x1234".to_string()]);
	}

	#[test]
	fn test_empty_registry_passes_through() {
		let registry = EventRegistry::default();
		let decoded = registry.decode(&Log::default());
		assert_eq!(decoded.event, UNKNOWN_EVENT_NAME);
		assert!(decoded.topics.is_empty());
	}
}
