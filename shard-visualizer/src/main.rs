mod config;

use crate::config::Config;
use anyhow::Context;
use block_fetcher::{BlockFetcher, BlockFetcherUpdate};
use dotenv::dotenv;
use shard_visualizer::{
    AnimationConfig, LayoutConfig, Millis, RenderInstruction, Visualizer, VisualizerState,
};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const PROJECT_ID: &str = "shard-visualizer";

/// Writes one batch of instructions as a JSON line on stdout.
fn emit(instructions: &[RenderInstruction]) -> anyhow::Result<()> {
    if instructions.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, instructions)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter("shard-visualizer=info,block-fetcher=info,block-summary=info")
        .init();

    let config = Config::from_env()?;

    let fetcher = BlockFetcher::neardata(
        config.chain_id,
        config.auth_bearer_token.clone(),
        config.request_timeout,
    )
    .context("Can't create neardata client")?;

    let is_running = Arc::new(AtomicBool::new(true));
    let ctrl_c_running = is_running.clone();

    ctrlc::set_handler(move || {
        ctrl_c_running.store(false, Ordering::SeqCst);
        tracing::info!(target: PROJECT_ID, "Received Ctrl+C, starting shutdown...");
    })
    .context("Error setting Ctrl+C handler")?;

    tracing::info!(target: PROJECT_ID,
        "Starting {} visualizer from height {:?}. Auth token: {}",
        config.chain_id,
        config.fetcher.start_block_height,
        config.auth_bearer_token.is_some()
    );

    let (sender, mut receiver) = mpsc::channel(100);
    tokio::spawn(fetcher.start(config.fetcher.clone(), sender, is_running.clone()));

    let started = Instant::now();
    let now = || started.elapsed().as_millis() as Millis;
    let mut visualizer = Visualizer::new(LayoutConfig::default(), AnimationConfig::default());
    let mut state = VisualizerState::Idle;
    let mut failure = None;

    loop {
        let deadline = state
            .next_deadline()
            .map(|due| started + Duration::from_millis(due));
        tokio::select! {
            update = receiver.recv() => match update {
                Some(BlockFetcherUpdate::Block { block_height, summary }) => {
                    tracing::info!(target: PROJECT_ID, "Rendering block {}: {} accounts", block_height, summary.account_count());
                    let (next_state, instructions) =
                        visualizer.apply_frame(state, Some(&summary), now());
                    state = next_state;
                    emit(&instructions)?;
                }
                Some(BlockFetcherUpdate::Failed { block_height, error }) => {
                    tracing::error!(target: PROJECT_ID, "Stopping stream, fetching block {:?} failed: {}", block_height, error);
                    is_running.store(false, Ordering::SeqCst);
                    failure = Some(error);
                    break;
                }
                None => break,
            },
            _ = sleep_until(deadline) => {
                let instructions = visualizer.tick(&mut state, now());
                emit(&instructions)?;
            }
        }
    }

    emit(&visualizer.teardown(state))?;

    if let Some(error) = failure {
        return Err(error).context("Block stream failed");
    }
    tracing::info!(target: PROJECT_ID, "Successfully shut down");
    Ok(())
}
