//! Built-in table of public upstream RPC endpoints.
//!
//! Used by the block resolver to find the latest block of a chain when the
//! caller did not pin one. Entries can be overridden per chain from the
//! `[upstreams]` section of the configuration file.

use std::collections::HashMap;

/// Map of chain id to ordered upstream RPC URLs.
pub type UpstreamTable = HashMap<u64, Vec<String>>;

const DEFAULT_UPSTREAMS: &[(u64, &[&str])] = &[
	(
		1,
		&[
			"https://eth.llamarpc.com",
			"https://ethereum-rpc.publicnode.com",
			"https://rpc.ankr.com/eth",
			"https://cloudflare-eth.com",
		],
	),
	(
		10,
		&[
			"https://mainnet.optimism.io",
			"https://optimism-rpc.publicnode.com",
			"https://rpc.ankr.com/optimism",
		],
	),
	(
		56,
		&[
			"https://bsc-dataseed.bnbchain.org",
			"https://bsc-rpc.publicnode.com",
			"https://rpc.ankr.com/bsc",
		],
	),
	(
		100,
		&[
			"https://rpc.gnosischain.com",
			"https://gnosis-rpc.publicnode.com",
		],
	),
	(
		137,
		&[
			"https://polygon-rpc.com",
			"https://polygon-bor-rpc.publicnode.com",
			"https://rpc.ankr.com/polygon",
		],
	),
	(324, &["https://mainnet.era.zksync.io"]),
	(
		8453,
		&[
			"https://mainnet.base.org",
			"https://base-rpc.publicnode.com",
			"https://base.llamarpc.com",
		],
	),
	(
		42161,
		&[
			"https://arb1.arbitrum.io/rpc",
			"https://arbitrum-one-rpc.publicnode.com",
			"https://rpc.ankr.com/arbitrum",
		],
	),
	(
		43114,
		&[
			"https://api.avax.network/ext/bc/C/rpc",
			"https://avalanche-c-chain-rpc.publicnode.com",
		],
	),
	(59144, &["https://rpc.linea.build"]),
	(84532, &["https://sepolia.base.org"]),
	(
		11155111,
		&[
			"https://ethereum-sepolia-rpc.publicnode.com",
			"https://rpc.sepolia.org",
		],
	),
];

/// Returns the built-in upstream table.
pub fn default_upstreams() -> UpstreamTable {
	DEFAULT_UPSTREAMS
		.iter()
		.map(|(chain_id, urls)| (*chain_id, urls.iter().map(|u| u.to_string()).collect()))
		.collect()
}
