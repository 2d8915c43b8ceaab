use crate::*;

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::collections::BTreeMap;

pub type ShardId = usize;
pub type Gas = u64;
pub type Balance = u128;

// Wire types for the neardata block payload. Every level is optional so a
// partially populated block still summarizes.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBlock {
    pub block: Option<RawBlockView>,
    pub header: Option<RawHeader>,
    pub shards: Option<Vec<RawShard>>,
}

impl RawBlock {
    pub fn height(&self) -> Option<BlockHeight> {
        self.block
            .as_ref()
            .map(|block| &block.header)
            .or(self.header.as_ref())
            .map(|header| header.height)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlockView {
    pub header: RawHeader,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHeader {
    pub height: BlockHeight,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawShard {
    #[serde(default)]
    pub shard_id: u64,
    pub chunk: Option<RawChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChunk {
    pub transactions: Option<Vec<RawTransactionWithOutcome>>,
    pub receipts: Option<Vec<RawReceipt>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransactionWithOutcome {
    pub transaction: RawTransaction,
    pub outcome: Option<RawTransactionOutcome>,
}

impl RawTransactionWithOutcome {
    fn execution_outcome(&self) -> Option<&RawExecutionOutcome> {
        self.outcome
            .as_ref()?
            .execution_outcome
            .as_ref()?
            .outcome
            .as_ref()
    }

    pub fn gas_burnt(&self) -> Gas {
        self.execution_outcome()
            .and_then(|outcome| outcome.gas_burnt)
            .unwrap_or(0)
    }

    pub fn tokens_burnt(&self) -> Balance {
        self.execution_outcome()
            .and_then(|outcome| outcome.tokens_burnt)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub signer_id: String,
    #[serde(default)]
    pub receiver_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransactionOutcome {
    pub execution_outcome: Option<RawExecutionOutcomeWithId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawExecutionOutcomeWithId {
    pub outcome: Option<RawExecutionOutcome>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct RawExecutionOutcome {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub gas_burnt: Option<Gas>,
    // Balances are serialized as decimal strings by nearcore
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub tokens_burnt: Option<Balance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReceipt {
    #[serde(default)]
    pub receipt_id: String,
    #[serde(default)]
    pub predecessor_id: String,
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default)]
    pub receipt: RawReceiptPayload,
}

/// Externally tagged receipt body. Only the `Action` tag is read; `Data` and
/// any other tag leave `action` empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReceiptPayload {
    #[serde(rename = "Action")]
    pub action: Option<RawActionReceipt>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawActionReceipt {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub gas: Option<Balance>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub gas_price: Option<Balance>,
}

impl RawActionReceipt {
    pub fn gas(&self) -> Balance {
        self.gas.or(self.gas_price).unwrap_or(0)
    }
}

// Summary types

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountActivity {
    pub account_id: String,
    /// Transactions and receipts received by the account.
    pub receipt_count: u64,
    /// Transactions signed and receipts sent by the account.
    pub transaction_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: String,
    pub signer_id: String,
    pub receiver_id: String,
    pub signer_shard_id: ShardId,
    pub receiver_shard_id: ShardId,
    pub gas_burnt: Gas,
    pub tokens_burnt: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRecord {
    pub id: String,
    pub predecessor_id: String,
    pub receiver_id: String,
    pub predecessor_shard_id: ShardId,
    pub receiver_shard_id: ShardId,
    pub gas: Balance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardSummary {
    pub accounts: BTreeMap<String, AccountActivity>,
    pub transactions: Vec<TransactionRecord>,
    pub receipts: Vec<ReceiptRecord>,
}

impl ShardSummary {
    fn account_mut(&mut self, account_id: &str) -> &mut AccountActivity {
        self.accounts
            .entry(account_id.to_string())
            .or_insert_with(|| AccountActivity {
                account_id: account_id.to_string(),
                ..Default::default()
            })
    }

    pub(crate) fn record_sent(&mut self, account_id: &str) {
        self.account_mut(account_id).transaction_count += 1;
    }

    pub(crate) fn record_received(&mut self, account_id: &str) {
        self.account_mut(account_id).receipt_count += 1;
    }

    pub fn max_receipt_count(&self) -> u64 {
        self.accounts
            .values()
            .map(|activity| activity.receipt_count)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub height: Option<BlockHeight>,
    pub shards: [ShardSummary; SHARD_COUNT],
}

impl BlockSummary {
    pub fn transaction_count(&self) -> usize {
        self.shards.iter().map(|s| s.transactions.len()).sum()
    }

    pub fn receipt_count(&self) -> usize {
        self.shards.iter().map(|s| s.receipts.len()).sum()
    }

    pub fn account_count(&self) -> usize {
        self.shards.iter().map(|s| s.accounts.len()).sum()
    }

    /// Finds the shard whose accounts map holds `account_id`.
    pub fn home_shard(&self, account_id: &str) -> Option<ShardId> {
        self.shards
            .iter()
            .position(|shard| shard.accounts.contains_key(account_id))
    }
}
