//! Liveness polling of provisioned sandbox nodes.
//!
//! A sandbox is live once it answers `eth_chainId` with an HTTP success status
//! and a non-null `result`. Probes are repeated with a fixed delay until the
//! node is live or the retry budget is spent.

use crate::RpcTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Outcome of polling one sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessResult {
	pub live: bool,
	/// Number of probes issued.
	pub attempts: u32,
}

/// Polls a sandbox URL until it responds or `max_retries` probes have failed.
pub struct LivenessPoller {
	transport: Arc<dyn RpcTransport>,
	max_retries: u32,
	delay: Duration,
}

impl LivenessPoller {
	pub fn new(transport: Arc<dyn RpcTransport>, max_retries: u32, delay: Duration) -> Self {
		Self {
			transport,
			max_retries,
			delay,
		}
	}

	/// Issues a single `eth_chainId` probe.
	///
	/// Transport errors and non-JSON answers count as "not live yet".
	async fn probe(&self, url: &str) -> bool {
		match self.transport.call(url, "eth_chainId", json!([])).await {
			Ok(response) => response.is_success() && response.result().is_some(),
			Err(e) => {
				tracing::debug!(error = %e, "Liveness probe failed");
				false
			},
		}
	}

	/// Probes `url` up to `max_retries` times, sleeping `delay` between probes.
	///
	/// Returns as soon as a probe succeeds; no probe is issued after the last
	/// failed one.
	#[instrument(skip_all, fields(url = %url))]
	pub async fn await_liveness(&self, url: &str) -> LivenessResult {
		for attempt in 1..=self.max_retries {
			if self.probe(url).await {
				tracing::info!(attempt, "Sandbox is live");
				return LivenessResult {
					live: true,
					attempts: attempt,
				};
			}

			tracing::info!(
				attempt,
				max_retries = self.max_retries,
				"Sandbox not live yet"
			);

			if attempt < self.max_retries {
				tokio::time::sleep(self.delay).await;
			}
		}

		tracing::warn!(
			max_retries = self.max_retries,
			"Sandbox did not become live"
		);
		LivenessResult {
			live: false,
			attempts: self.max_retries,
		}
	}
}
