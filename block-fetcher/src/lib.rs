mod neardata;

pub use crate::neardata::{BlockSource, NeardataClient};

use block_summary::{summarize, BlockHeight, BlockSummary, RangeShardAssigner, RawBlock};
use fastnear_primitives::types::ChainId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const BLOCK_FETCHER: &str = "block-fetcher";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response status {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to decode block: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("empty response from {0}")]
    Empty(String),
    #[error("redirect failed: {0}")]
    Redirect(String),
}

#[derive(Debug)]
pub enum BlockFetcherUpdate {
    Block {
        block_height: BlockHeight,
        summary: BlockSummary,
    },
    /// Transport kept failing; the fetcher has stopped.
    Failed {
        block_height: Option<BlockHeight>,
        error: FetchError,
    },
}

#[derive(Debug, Clone)]
pub struct BlockFetcherConfig {
    /// Starts from the latest final block when empty.
    pub start_block_height: Option<BlockHeight>,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub retry_delay: Duration,
    pub max_failures: usize,
}

impl Default for BlockFetcherConfig {
    fn default() -> Self {
        Self {
            start_block_height: None,
            poll_interval: Duration::from_millis(200),
            max_poll_interval: Duration::from_secs(2),
            retry_delay: Duration::from_millis(100),
            max_failures: 10,
        }
    }
}

pub struct BlockFetcher<S> {
    source: S,
    assigner: RangeShardAssigner,
}

impl BlockFetcher<NeardataClient> {
    pub fn neardata(
        chain_id: ChainId,
        auth_bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self::new(
            NeardataClient::new(chain_id, auth_bearer_token, timeout)?,
            RangeShardAssigner::default(),
        ))
    }
}

impl<S: BlockSource> BlockFetcher<S> {
    pub fn new(source: S, assigner: RangeShardAssigner) -> Self {
        Self { source, assigner }
    }

    /// Fetches blocks one height at a time and sends their summaries to `sink`
    /// in height order, until `is_running` is cleared, the sink is closed or the
    /// transport fails `max_failures` times in a row.
    pub async fn start(
        self,
        config: BlockFetcherConfig,
        sink: mpsc::Sender<BlockFetcherUpdate>,
        is_running: Arc<AtomicBool>,
    ) {
        let Some(mut block_height) = self.start_block_height(&config, &sink, &is_running).await
        else {
            tracing::info!(target: BLOCK_FETCHER, "Stopped block fetcher before the first block");
            return;
        };
        tracing::info!(target: BLOCK_FETCHER, "Starting block fetcher from height {}", block_height);

        let mut poll_interval = config.poll_interval;
        let mut retry_delay = config.retry_delay;
        let mut failures = 0;
        while is_running.load(Ordering::SeqCst) {
            match self.source.fetch_block_at_height(block_height).await {
                Ok(Some(raw_block)) => {
                    failures = 0;
                    retry_delay = config.retry_delay;
                    poll_interval = config.poll_interval;
                    if !is_running.load(Ordering::SeqCst) {
                        tracing::debug!(target: BLOCK_FETCHER, "Discarding block {} after shutdown", block_height);
                        break;
                    }
                    match summarize(&raw_block, &self.assigner) {
                        Ok(summary) => {
                            tracing::info!(target: BLOCK_FETCHER,
                                "Fetched block {}: {} transactions, {} receipts",
                                block_height,
                                summary.transaction_count(),
                                summary.receipt_count(),
                            );
                            let update = BlockFetcherUpdate::Block {
                                block_height,
                                summary,
                            };
                            if sink.send(update).await.is_err() {
                                tracing::info!(target: BLOCK_FETCHER, "Sink is closed");
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(target: BLOCK_FETCHER, "Skipping block {}: {}", block_height, err);
                        }
                    }
                    block_height += 1;
                }
                Ok(None) => {
                    tracing::debug!(target: BLOCK_FETCHER, "Block {} is not available yet, retrying in {:?}", block_height, poll_interval);
                    tokio::time::sleep(poll_interval).await;
                    poll_interval = (poll_interval * 2).min(config.max_poll_interval);
                }
                Err(err) => {
                    failures += 1;
                    tracing::error!(target: BLOCK_FETCHER, "Attempt #{} to fetch block {}: {}", failures, block_height, err);
                    if failures >= config.max_failures {
                        if is_running.load(Ordering::SeqCst) {
                            let _ = sink
                                .send(BlockFetcherUpdate::Failed {
                                    block_height: Some(block_height),
                                    error: err,
                                })
                                .await;
                        }
                        break;
                    }
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(config.max_poll_interval);
                }
            }
        }
        tracing::info!(target: BLOCK_FETCHER, "Stopped block fetcher at height {}", block_height);
    }

    async fn start_block_height(
        &self,
        config: &BlockFetcherConfig,
        sink: &mpsc::Sender<BlockFetcherUpdate>,
        is_running: &AtomicBool,
    ) -> Option<BlockHeight> {
        if let Some(block_height) = config.start_block_height {
            return Some(block_height);
        }
        let mut retry_delay = config.retry_delay;
        let mut failures = 0;
        while is_running.load(Ordering::SeqCst) {
            let error = match self.source.fetch_latest_final_block().await {
                Ok(raw_block) => match raw_block.height() {
                    Some(block_height) => {
                        tracing::info!(target: BLOCK_FETCHER, "Latest final block height: {}", block_height);
                        return Some(block_height);
                    }
                    None => FetchError::Empty("latest final block height".to_string()),
                },
                Err(err) => err,
            };
            failures += 1;
            tracing::error!(target: BLOCK_FETCHER, "Attempt #{} to fetch the latest final block: {}", failures, error);
            if failures >= config.max_failures {
                if is_running.load(Ordering::SeqCst) {
                    let _ = sink
                        .send(BlockFetcherUpdate::Failed {
                            block_height: None,
                            error,
                        })
                        .await;
                }
                return None;
            }
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(config.max_poll_interval);
        }
        None
    }
}
