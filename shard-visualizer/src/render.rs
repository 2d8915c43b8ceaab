use crate::*;

use serde::Serialize;

/// Logical clock in milliseconds, supplied by the owner of the visualizer.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GenerationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

/// Drawing surface operations. Every element lives inside a generation
/// container; removing the container removes all of its elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderInstruction {
    CreateGeneration {
        generation: GenerationId,
        block_height: Option<BlockHeight>,
    },
    DrawShard {
        generation: GenerationId,
        element: ElementId,
        shard_id: ShardId,
        center: Point,
        radius: f64,
        label: String,
    },
    DrawAccount {
        generation: GenerationId,
        element: ElementId,
        account_id: String,
        shard_id: ShardId,
        center: Point,
        radius: f64,
        color: String,
        opacity: f64,
        tooltip: String,
    },
    /// Fades in to `opacity`, holds, then fades out.
    DrawLine {
        generation: GenerationId,
        element: ElementId,
        from: Point,
        to: Point,
        color: String,
        opacity: f64,
        fade_in_ms: Millis,
        hold_ms: Millis,
        fade_out_ms: Millis,
    },
    /// Moves linearly from `from` to `to` over `duration_ms`.
    SpawnParticle {
        generation: GenerationId,
        element: ElementId,
        from: Point,
        to: Point,
        color: String,
        radius: f64,
        duration_ms: Millis,
    },
    RemoveElement {
        generation: GenerationId,
        element: ElementId,
    },
    FadeOutGeneration {
        generation: GenerationId,
        duration_ms: Millis,
    },
    RemoveGeneration {
        generation: GenerationId,
    },
}

impl RenderInstruction {
    pub fn generation(&self) -> GenerationId {
        match self {
            RenderInstruction::CreateGeneration { generation, .. }
            | RenderInstruction::DrawShard { generation, .. }
            | RenderInstruction::DrawAccount { generation, .. }
            | RenderInstruction::DrawLine { generation, .. }
            | RenderInstruction::SpawnParticle { generation, .. }
            | RenderInstruction::RemoveElement { generation, .. }
            | RenderInstruction::FadeOutGeneration { generation, .. }
            | RenderInstruction::RemoveGeneration { generation } => *generation,
        }
    }
}
