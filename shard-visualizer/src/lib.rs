mod layout;
mod render;
mod state;

pub use crate::layout::*;
pub use crate::render::*;
pub use crate::state::{AnimationConfig, Generation, Visualizer, VisualizerState};

use block_summary::{BlockHeight, BlockSummary, ShardId, SHARD_COUNT};

pub const SHARD_VISUALIZER: &str = "shard-visualizer";
