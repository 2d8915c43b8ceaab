mod shard;
mod types;

pub use crate::shard::{RangeShardAssigner, ShardAssigner, MAINNET_BOUNDARY_ACCOUNTS};
pub use crate::types::*;
pub use fastnear_primitives::near_indexer_primitives::types::BlockHeight;

pub const SHARD_COUNT: usize = 6;

pub const BLOCK_SUMMARY: &str = "block-summary";

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("malformed block: {0}")]
    MalformedBlock(String),
    #[error("invalid shard layout: {0}")]
    InvalidShardLayout(String),
}

/// Aggregates one block into `SHARD_COUNT` shard summaries.
///
/// Account activity is attributed to the shard computed by `assigner`, while
/// transaction and receipt records are listed under the shard the chunk was
/// read from. Receipts without an `Action` payload are skipped.
pub fn summarize(
    raw_block: &RawBlock,
    assigner: &impl ShardAssigner,
) -> Result<BlockSummary, SummaryError> {
    let height = raw_block.height();
    let raw_shards = match raw_block.shards.as_deref() {
        Some(shards) if !shards.is_empty() => shards,
        Some(_) => {
            return Err(SummaryError::MalformedBlock(format!(
                "block {height:?} has an empty shard list"
            )))
        }
        None => {
            return Err(SummaryError::MalformedBlock(format!(
                "block {height:?} has no shard list"
            )))
        }
    };

    let mut summary = BlockSummary {
        height,
        ..Default::default()
    };

    for raw_shard in raw_shards {
        let origin_shard_id = origin_shard_id(raw_shard.shard_id);
        let Some(chunk) = &raw_shard.chunk else {
            tracing::debug!(target: BLOCK_SUMMARY, "Block {:?} shard {} has no chunk", height, raw_shard.shard_id);
            continue;
        };

        for tx in chunk.transactions.iter().flatten() {
            let signer_id = tx.transaction.signer_id.as_str();
            let receiver_id = tx.transaction.receiver_id.as_str();
            let signer_shard_id = assigner.shard_for(signer_id);
            let receiver_shard_id = assigner.shard_for(receiver_id);

            summary.shards[signer_shard_id].record_sent(signer_id);
            summary.shards[receiver_shard_id].record_received(receiver_id);

            summary.shards[origin_shard_id]
                .transactions
                .push(TransactionRecord {
                    hash: tx.transaction.hash.clone(),
                    signer_id: signer_id.to_string(),
                    receiver_id: receiver_id.to_string(),
                    signer_shard_id,
                    receiver_shard_id,
                    gas_burnt: tx.gas_burnt(),
                    tokens_burnt: tx.tokens_burnt(),
                });
        }

        for receipt in chunk.receipts.iter().flatten() {
            let Some(action) = &receipt.receipt.action else {
                continue;
            };
            let predecessor_id = receipt.predecessor_id.as_str();
            let receiver_id = receipt.receiver_id.as_str();
            let predecessor_shard_id = assigner.shard_for(predecessor_id);
            let receiver_shard_id = assigner.shard_for(receiver_id);

            summary.shards[predecessor_shard_id].record_sent(predecessor_id);
            summary.shards[receiver_shard_id].record_received(receiver_id);

            summary.shards[origin_shard_id].receipts.push(ReceiptRecord {
                id: receipt.receipt_id.clone(),
                predecessor_id: predecessor_id.to_string(),
                receiver_id: receiver_id.to_string(),
                predecessor_shard_id,
                receiver_shard_id,
                gas: action.gas(),
            });
        }
    }

    tracing::debug!(target: BLOCK_SUMMARY,
        "Summarized block {:?}: {} transactions, {} receipts, {} accounts",
        height,
        summary.transaction_count(),
        summary.receipt_count(),
        summary.account_count(),
    );

    Ok(summary)
}

fn origin_shard_id(shard_id: u64) -> ShardId {
    let index = (shard_id % SHARD_COUNT as u64) as ShardId;
    if index as u64 != shard_id {
        tracing::warn!(target: BLOCK_SUMMARY, "Shard id {} is outside of the shard layout, listing under shard {}", shard_id, index);
    }
    index
}
