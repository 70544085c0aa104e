//! Minimal JSON-RPC plumbing for the sandbox orchestrator.
//!
//! This crate only implements the two calls the pipeline needs: resolving the
//! latest block of a chain through public upstream endpoints, and probing a
//! freshly provisioned sandbox until it answers. Both go through the
//! `RpcTransport` trait so that the HTTP layer can be replaced in tests.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod liveness;
pub mod resolver;

pub use liveness::{LivenessPoller, LivenessResult};
pub use resolver::BlockResolver;

/// Errors that can occur during JSON-RPC operations.
#[derive(Debug, Error)]
pub enum RpcError {
	/// No upstream endpoints are configured for the chain.
	#[error("Unsupported chain: {0}")]
	UnsupportedChain(u64),
	/// The HTTP call failed or the upstream answered with an error.
	#[error("Upstream error: {0}")]
	Upstream(String),
	/// The upstream answered, but not with a usable result.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

/// Raw answer of a JSON-RPC endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
	/// HTTP status code.
	pub status: u16,
	/// Parsed JSON body, `None` when the body was not JSON.
	pub body: Option<Value>,
}

impl RpcResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// The non-null `result` member of the body, if any.
	pub fn result(&self) -> Option<&Value> {
		self.body
			.as_ref()
			.and_then(|body| body.get("result"))
			.filter(|result| !result.is_null())
	}

	/// The `error` member of the body, if any.
	pub fn error(&self) -> Option<&Value> {
		self.body
			.as_ref()
			.and_then(|body| body.get("error"))
			.filter(|error| !error.is_null())
	}
}

/// Transport used to issue a single JSON-RPC call.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RpcTransport: Send + Sync {
	/// Posts one JSON-RPC request to `url`.
	///
	/// Returns `Err` only when no HTTP response was obtained; HTTP error
	/// statuses are reported through `RpcResponse::status`.
	async fn call(&self, url: &str, method: &str, params: Value) -> Result<RpcResponse, RpcError>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
	jsonrpc: &'static str,
	id: u64,
	method: &'a str,
	params: Value,
}

/// `RpcTransport` over HTTP using reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl RpcTransport for HttpTransport {
	async fn call(&self, url: &str, method: &str, params: Value) -> Result<RpcResponse, RpcError> {
		let request = JsonRpcRequest {
			jsonrpc: "2.0",
			id: 1,
			method,
			params,
		};

		let response = self
			.client
			.post(url)
			.json(&request)
			.send()
			.await
			.map_err(|e| RpcError::Upstream(format!("{} to {} failed: {}", method, url, e)))?;

		let status = response.status().as_u16();
		let body = match response.bytes().await {
			Ok(bytes) => serde_json::from_slice::<Value>(&bytes).ok(),
			Err(e) => {
				tracing::debug!(url = %url, error = %e, "Failed to read RPC response body");
				None
			},
		};

		Ok(RpcResponse { status, body })
	}
}
