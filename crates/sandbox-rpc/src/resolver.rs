//! Latest-block resolution through round-robin upstream endpoints.

use crate::{RpcError, RpcTransport};
use sandbox_types::parse_quantity;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::instrument;

struct Upstreams {
	urls: Vec<String>,
	cursor: AtomicUsize,
}

/// Resolves the latest block number of a chain.
///
/// Each chain has a fixed, ordered list of upstream URLs and a rotating
/// cursor. Every call uses the URL under the cursor and advances it, spreading
/// load across endpoints without tracking their health. A call is made
/// exactly once; retrying is left to the caller.
pub struct BlockResolver {
	upstreams: HashMap<u64, Upstreams>,
	transport: Arc<dyn RpcTransport>,
}

impl BlockResolver {
	/// Creates a resolver over the given chain id → URLs table.
	///
	/// Chains with an empty URL list are treated as unsupported.
	pub fn new(table: HashMap<u64, Vec<String>>, transport: Arc<dyn RpcTransport>) -> Self {
		let upstreams = table
			.into_iter()
			.filter(|(_, urls)| !urls.is_empty())
			.map(|(chain_id, urls)| {
				(
					chain_id,
					Upstreams {
						urls,
						cursor: AtomicUsize::new(0),
					},
				)
			})
			.collect();

		Self {
			upstreams,
			transport,
		}
	}

	/// Selects the next upstream URL for a chain and advances its cursor.
	fn next_url(&self, chain_id: u64) -> Result<&str, RpcError> {
		let upstreams = self
			.upstreams
			.get(&chain_id)
			.ok_or(RpcError::UnsupportedChain(chain_id))?;
		let index = upstreams.cursor.fetch_add(1, Ordering::Relaxed) % upstreams.urls.len();
		Ok(&upstreams.urls[index])
	}

	/// Fetches `eth_blockNumber` from the next upstream of the chain.
	#[instrument(skip_all, fields(chain_id = chain_id))]
	pub async fn resolve_latest_block(&self, chain_id: u64) -> Result<u64, RpcError> {
		let url = self.next_url(chain_id)?;
		tracing::debug!(upstream = %url, "Resolving latest block");

		let response = self.transport.call(url, "eth_blockNumber", json!([])).await?;

		if !response.is_success() {
			return Err(RpcError::Upstream(format!(
				"{} answered eth_blockNumber with HTTP {}",
				url, response.status
			)));
		}
		if let Some(error) = response.error() {
			return Err(RpcError::Upstream(format!(
				"{} answered eth_blockNumber with error {}",
				url, error
			)));
		}

		let result = response
			.result()
			.and_then(|value| value.as_str())
			.ok_or_else(|| {
				RpcError::InvalidResponse(format!("{} returned no block number", url))
			})?;

		let block_number = parse_quantity(result).ok_or_else(|| {
			RpcError::InvalidResponse(format!("{} returned malformed block number '{}'", url, result))
		})?;

		tracing::info!(block_number, "Resolved latest block");
		Ok(block_number)
	}
}
