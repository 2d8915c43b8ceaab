use crate::*;

/// Mainnet shard layout boundaries. Shard `i` holds the accounts below
/// `boundary[i]` and at or above `boundary[i - 1]`.
pub const MAINNET_BOUNDARY_ACCOUNTS: [&str; SHARD_COUNT - 1] = [
    "aurora",
    "aurora-0",
    "game.hot.tg",
    "kkuuue2akv_1630967379.near",
    "tge-lockup.sweat",
];

pub trait ShardAssigner {
    /// Returns the shard in `[0, SHARD_COUNT)` that owns `account_id`.
    fn shard_for(&self, account_id: &str) -> ShardId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeShardAssigner {
    boundary_accounts: Vec<String>,
}

impl Default for RangeShardAssigner {
    fn default() -> Self {
        Self {
            boundary_accounts: MAINNET_BOUNDARY_ACCOUNTS
                .iter()
                .map(|account| account.to_string())
                .collect(),
        }
    }
}

impl RangeShardAssigner {
    pub fn new(boundary_accounts: Vec<String>) -> Result<Self, SummaryError> {
        if boundary_accounts.len() != SHARD_COUNT - 1 {
            return Err(SummaryError::InvalidShardLayout(format!(
                "expected {} boundary accounts, got {}",
                SHARD_COUNT - 1,
                boundary_accounts.len()
            )));
        }
        if let Some(pair) = boundary_accounts.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(SummaryError::InvalidShardLayout(format!(
                "boundary accounts are not strictly ascending: {:?} >= {:?}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { boundary_accounts })
    }
}

impl ShardAssigner for RangeShardAssigner {
    fn shard_for(&self, account_id: &str) -> ShardId {
        // `str` ordering is byte-wise, independent of locale
        self.boundary_accounts
            .iter()
            .position(|boundary| account_id < boundary.as_str())
            .unwrap_or(SHARD_COUNT - 1)
    }
}
