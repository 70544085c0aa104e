//! Parsing of the chain-list input.

use crate::ConfigError;
use sandbox_types::ChainRequest;

/// Parses the JSON array of `{chainId, blockNumber?}` supplied by the CI job.
///
/// Malformed JSON and an empty list are configuration errors; both abort the
/// run before any chain is processed.
pub fn parse_chain_requests(input: &str) -> Result<Vec<ChainRequest>, ConfigError> {
	let requests: Vec<ChainRequest> = serde_json::from_str(input.trim())
		.map_err(|e| ConfigError::Parse(format!("Invalid chain list: {}", e)))?;

	if requests.is_empty() {
		return Err(ConfigError::Validation(
			"Chain list must contain at least one chain".into(),
		));
	}

	Ok(requests)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_chain_list() {
		let requests =
			parse_chain_requests(r#" [{"chainId":1},{"chainId":137,"blockNumber":5000000}] "#)
				.unwrap();
		assert_eq!(requests.len(), 2);
		assert_eq!(requests[0].chain_id, 1);
		assert_eq!(requests[0].block_number, None);
		assert_eq!(requests[1].block_number, Some(5_000_000));
	}

	#[test]
	fn test_parse_chain_list_malformed() {
		let err = parse_chain_requests("[{\"chainId\":").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));

		let err = parse_chain_requests(r#"{"chainId":1}"#).unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}

	#[test]
	fn test_parse_chain_list_empty() {
		let err = parse_chain_requests("[]").unwrap_err();
		assert!(err.to_string().contains("at least one chain"));
	}
}
