use anyhow::{anyhow, Context};
use block_fetcher::BlockFetcherConfig;
use fastnear_primitives::near_indexer_primitives::types::BlockHeight;
use fastnear_primitives::types::ChainId;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub struct Config {
    pub chain_id: ChainId,
    pub auth_bearer_token: Option<String>,
    pub request_timeout: Duration,
    pub fetcher: BlockFetcherConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let chain_id: ChainId = lookup("CHAIN_ID")
            .context("CHAIN_ID required")?
            .try_into()
            .map_err(|err| anyhow!("Invalid chain id: {:?}", err))?;

        let defaults = BlockFetcherConfig::default();
        let start_block_height: Option<BlockHeight> =
            parse_optional(&lookup, "START_BLOCK_HEIGHT")?;
        let fetcher = BlockFetcherConfig {
            start_block_height,
            poll_interval: parse_millis(&lookup, "POLL_INTERVAL_MS", defaults.poll_interval)?,
            max_poll_interval: parse_millis(
                &lookup,
                "MAX_POLL_INTERVAL_MS",
                defaults.max_poll_interval,
            )?,
            retry_delay: parse_millis(&lookup, "RETRY_DELAY_MS", defaults.retry_delay)?,
            max_failures: parse_optional(&lookup, "MAX_FAILURES")?.unwrap_or(defaults.max_failures),
        };
        if fetcher.max_failures == 0 {
            anyhow::bail!("MAX_FAILURES must be at least 1");
        }

        Ok(Self {
            chain_id,
            auth_bearer_token: lookup("FASTNEAR_AUTH_BEARER_TOKEN")
                .filter(|token| !token.is_empty()),
            request_timeout: parse_millis(&lookup, "REQUEST_TIMEOUT_MS", Duration::from_secs(10))?,
            fetcher,
        })
    }
}

fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(name)
        .map(|value| {
            value
                .parse()
                .map_err(|err| anyhow!("Invalid {}={:?}: {}", name, value, err))
        })
        .transpose()
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    Ok(parse_optional(lookup, name)?
        .map(Duration::from_millis)
        .unwrap_or(default))
}
