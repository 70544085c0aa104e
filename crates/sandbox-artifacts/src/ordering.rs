//! Receipt sorting and transaction alignment.

use sandbox_types::BroadcastRecord;
use std::collections::HashMap;

/// Sorts receipts by block number and lines transactions up behind them.
///
/// Receipts are stably sorted by numeric block number; receipts whose block
/// number is missing or unparseable go last. Transactions are then stably
/// sorted by the position of their receipt. A transaction without a receipt
/// gets key -1 and therefore moves ahead of every matched one.
///
/// Does nothing when no receipt was collected.
pub fn order_record(record: &mut BroadcastRecord) {
	if record.receipts.is_empty() {
		return;
	}

	record
		.receipts
		.sort_by_key(|receipt| match receipt.block_number_value() {
			Some(block) => (false, block),
			None => (true, 0),
		});

	let mut positions: HashMap<&str, i64> = HashMap::new();
	for (index, receipt) in record.receipts.iter().enumerate() {
		if let Some(hash) = receipt.transaction_hash.as_deref() {
			positions.entry(hash).or_insert(index as i64);
		}
	}

	let keys: Vec<i64> = record
		.transactions
		.iter()
		.map(|tx| {
			tx.hash
				.as_deref()
				.and_then(|hash| positions.get(hash).copied())
				.unwrap_or(-1)
		})
		.collect();

	let mut keyed: Vec<_> = keys
		.into_iter()
		.zip(std::mem::take(&mut record.transactions))
		.collect();
	keyed.sort_by_key(|(key, _)| *key);
	record.transactions = keyed.into_iter().map(|(_, tx)| tx).collect();
}
