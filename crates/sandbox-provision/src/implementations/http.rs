//! HTTP provisioning backend.
//!
//! Talks to the sandbox provisioning API: `POST {base_url}/sandbox` with a
//! bearer token and a JSON body of `{chainId, nodeName, blockNumber}`. The
//! answer carries the sandbox `rpcUrl` and, optionally, its `mnemonic`.

use crate::{CreatedSandbox, ProvisionError, ProvisionInterface, SandboxRequest};
use async_trait::async_trait;
use sandbox_types::SecretString;

/// Provisioning backend over HTTP.
pub struct HttpProvisioner {
	client: reqwest::Client,
	endpoint: String,
	auth_token: SecretString,
}

impl HttpProvisioner {
	pub fn new(client: reqwest::Client, base_url: &str, auth_token: SecretString) -> Self {
		Self {
			client,
			endpoint: format!("{}/sandbox", base_url.trim_end_matches('/')),
			auth_token,
		}
	}
}

#[async_trait]
impl ProvisionInterface for HttpProvisioner {
	async fn create(&self, request: SandboxRequest) -> Result<CreatedSandbox, ProvisionError> {
		let response = self
			.client
			.post(&self.endpoint)
			.bearer_auth(self.auth_token.expose_secret())
			.json(&request)
			.send()
			.await
			.map_err(|e| ProvisionError::Network(e.to_string()))?;

		let status = response.status();
		let body = response
			.text()
			.await
			.map_err(|e| ProvisionError::Network(e.to_string()))?;

		if !status.is_success() {
			return Err(ProvisionError::Rejected {
				status: status.as_u16(),
				body,
			});
		}

		serde_json::from_str::<CreatedSandbox>(&body)
			.map_err(|e| ProvisionError::InvalidResponse(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use httpmock::prelude::*;
	use serde_json::json;

	fn provisioner(server: &MockServer) -> HttpProvisioner {
		HttpProvisioner::new(
			reqwest::Client::new(),
			&format!("{}/", server.base_url()),
			SecretString::from("api-token"),
		)
	}

	fn request() -> SandboxRequest {
		SandboxRequest {
			chain_id: 137,
			node_name: "repo-deadbeef-0a1b2c3d".into(),
			block_number: Some(5_000_000),
		}
	}

	#[tokio::test]
	async fn test_create_posts_request_with_bearer() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/sandbox")
					.header("authorization", "Bearer api-token")
					.json_body(json!({
						"chainId": 137,
						"nodeName": "repo-deadbeef-0a1b2c3d",
						"blockNumber": 5000000
					}));
				then.status(200).json_body(json!({
					"rpcUrl": "https://sandbox.example/rpc/1",
					"mnemonic": "test test test"
				}));
			})
			.await;

		let created = provisioner(&server).create(request()).await.unwrap();

		mock.assert_async().await;
		assert_eq!(created.rpc_url, "https://sandbox.example/rpc/1");
		assert_eq!(
			created.mnemonic.as_ref().map(|m| m.expose_secret()),
			Some("test test test")
		);
	}

	#[tokio::test]
	async fn test_create_omits_missing_block_number() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/sandbox").json_body(json!({
					"chainId": 137,
					"nodeName": "repo-deadbeef-0a1b2c3d"
				}));
				then.status(201)
					.json_body(json!({"rpcUrl": "https://sandbox.example/rpc/2"}));
			})
			.await;

		let mut req = request();
		req.block_number = None;
		let created = provisioner(&server).create(req).await.unwrap();

		mock.assert_async().await;
		assert!(created.mnemonic.is_none());
	}

	#[tokio::test]
	async fn test_create_rejected_status() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/sandbox");
				then.status(401).body("unauthorized");
			})
			.await;

		let err = provisioner(&server).create(request()).await.unwrap_err();

		mock.assert_hits_async(1).await;
		match err {
			ProvisionError::Rejected { status, body } => {
				assert_eq!(status, 401);
				assert_eq!(body, "unauthorized");
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn test_create_missing_rpc_url() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(POST).path("/sandbox");
				then.status(200).json_body(json!({"status": "queued"}));
			})
			.await;

		assert!(matches!(
			provisioner(&server).create(request()).await,
			Err(ProvisionError::InvalidResponse(_))
		));
	}

	#[tokio::test]
	async fn test_create_network_error() {
		let provisioner = HttpProvisioner::new(
			reqwest::Client::new(),
			"http://127.0.0.1:1",
			SecretString::from("t"),
		);
		assert!(matches!(
			provisioner.create(request()).await,
			Err(ProvisionError::Network(_))
		));
	}
}
