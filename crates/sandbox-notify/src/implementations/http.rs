//! HTTP notification backend.

use crate::{Notification, NotifierInterface, NotifyError};
use async_trait::async_trait;
use sandbox_types::SecretString;

/// Posts notifications as JSON to a collector URL.
pub struct HttpNotifier {
	client: reqwest::Client,
	url: String,
	auth_token: Option<SecretString>,
}

impl HttpNotifier {
	pub fn new(client: reqwest::Client, url: impl Into<String>, auth_token: Option<SecretString>) -> Self {
		Self {
			client,
			url: url.into(),
			auth_token,
		}
	}
}

#[async_trait]
impl NotifierInterface for HttpNotifier {
	async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
		let mut request = self.client.post(&self.url).json(notification);
		if let Some(token) = &self.auth_token {
			request = request.bearer_auth(token.expose_secret());
		}

		let response = request
			.send()
			.await
			.map_err(|e| NotifyError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(NotifyError::Rejected {
				status: status.as_u16(),
				body,
			});
		}
		Ok(())
	}
}
