use crate::*;

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct AnimationConfig {
    pub particle_duration_ms: Millis,
    pub line_fade_in_ms: Millis,
    pub line_hold_ms: Millis,
    pub line_fade_out_ms: Millis,
    pub line_opacity: f64,
    pub account_opacity: f64,
    /// How long an outgoing generation fades before it is removed.
    pub generation_fade_out_ms: Millis,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            particle_duration_ms: 1000,
            line_fade_in_ms: 150,
            line_hold_ms: 700,
            line_fade_out_ms: 150,
            line_opacity: 0.2,
            account_opacity: 0.6,
            generation_fade_out_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskAction {
    RemoveElement(ElementId),
    RemoveGeneration,
}

#[derive(Debug, Clone, Copy)]
struct TimedTask {
    due: Millis,
    action: TaskAction,
}

/// One rendered frame: a container of drawn elements plus the timed tasks
/// that clean up its animations. Dropping a generation cancels its tasks.
#[derive(Debug)]
pub struct Generation {
    id: GenerationId,
    block_height: Option<BlockHeight>,
    positions: HashMap<String, AccountPosition>,
    animated_elements: BTreeSet<ElementId>,
    tasks: Vec<TimedTask>,
}

impl Generation {
    pub fn id(&self) -> GenerationId {
        self.id
    }

    pub fn block_height(&self) -> Option<BlockHeight> {
        self.block_height
    }

    pub fn positions(&self) -> &HashMap<String, AccountPosition> {
        &self.positions
    }

    /// Particles and lines that are still on the surface.
    pub fn animated_element_count(&self) -> usize {
        self.animated_elements.len()
    }

    pub fn pending_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.tasks.iter().map(|task| task.due).min()
    }

    fn schedule(&mut self, due: Millis, action: TaskAction) {
        self.tasks.push(TimedTask { due, action });
    }

    /// Runs the tasks due at `now`. Returns `true` once the generation itself
    /// has been removed from the surface.
    fn run_due_tasks(&mut self, now: Millis, instructions: &mut Vec<RenderInstruction>) -> bool {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|task| task.due <= now);
        self.tasks = pending;
        due.sort_by_key(|task| task.due);

        for task in due {
            match task.action {
                TaskAction::RemoveElement(element) => {
                    if self.animated_elements.remove(&element) {
                        instructions.push(RenderInstruction::RemoveElement {
                            generation: self.id,
                            element,
                        });
                    }
                }
                TaskAction::RemoveGeneration => {
                    instructions.push(RenderInstruction::RemoveGeneration {
                        generation: self.id,
                    });
                    self.tasks.clear();
                    self.animated_elements.clear();
                    return true;
                }
            }
        }
        false
    }
}

/// Owned by the caller and threaded through every update, so the outgoing
/// generation is never held anywhere else.
#[derive(Debug, Default)]
pub enum VisualizerState {
    #[default]
    Idle,
    Rendering {
        current: Generation,
        fading: Option<Generation>,
    },
}

impl VisualizerState {
    pub fn current(&self) -> Option<&Generation> {
        match self {
            VisualizerState::Idle => None,
            VisualizerState::Rendering { current, .. } => Some(current),
        }
    }

    pub fn fading(&self) -> Option<&Generation> {
        match self {
            VisualizerState::Idle => None,
            VisualizerState::Rendering { fading, .. } => fading.as_ref(),
        }
    }

    /// Account positions of the frame on screen, used when the next frame is built.
    pub fn previous_account_positions(&self) -> Option<&HashMap<String, AccountPosition>> {
        self.current().map(Generation::positions)
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.current()
            .into_iter()
            .chain(self.fading())
            .filter_map(Generation::next_deadline)
            .min()
    }
}

pub struct Visualizer {
    layout: LayoutConfig,
    animation: AnimationConfig,
    next_generation_id: u64,
    next_element_id: u64,
}

impl Visualizer {
    pub fn new(layout: LayoutConfig, animation: AnimationConfig) -> Self {
        Self {
            layout,
            animation,
            next_generation_id: 0,
            next_element_id: 0,
        }
    }

    /// Replaces the frame on screen with one built from `summary`.
    ///
    /// The outgoing generation fades out and is removed once the fade is over.
    /// A generation that is still fading from an earlier update is removed right
    /// away, so at most two generations are ever on the surface. A missing
    /// summary leaves the state untouched.
    pub fn apply_frame(
        &mut self,
        state: VisualizerState,
        summary: Option<&BlockSummary>,
        now: Millis,
    ) -> (VisualizerState, Vec<RenderInstruction>) {
        let Some(summary) = summary else {
            tracing::warn!(target: SHARD_VISUALIZER, "No block summary, keeping the current frame");
            return (state, vec![]);
        };

        let mut instructions = vec![];
        let fading = match state {
            VisualizerState::Idle => None,
            VisualizerState::Rendering { current, fading } => {
                if let Some(stale) = fading {
                    tracing::debug!(target: SHARD_VISUALIZER,
                        "Removing generation {:?} before its fade completed, cancelling {} tasks",
                        stale.id,
                        stale.pending_task_count(),
                    );
                    instructions.push(RenderInstruction::RemoveGeneration {
                        generation: stale.id,
                    });
                }
                Some(self.fade_out(current, now, &mut instructions))
            }
        };
        let current = self.build_generation(summary, now, &mut instructions);

        (VisualizerState::Rendering { current, fading }, instructions)
    }

    /// Runs every timed task that is due at `now`.
    pub fn tick(&mut self, state: &mut VisualizerState, now: Millis) -> Vec<RenderInstruction> {
        let mut instructions = vec![];
        if let VisualizerState::Rendering { current, fading } = state {
            if let Some(generation) = fading {
                if generation.run_due_tasks(now, &mut instructions) {
                    tracing::debug!(target: SHARD_VISUALIZER, "Generation {:?} faded out", generation.id);
                    *fading = None;
                }
            }
            current.run_due_tasks(now, &mut instructions);
        }
        instructions
    }

    /// Removes everything from the surface. Pending tasks are dropped with
    /// their generations.
    pub fn teardown(&mut self, state: VisualizerState) -> Vec<RenderInstruction> {
        match state {
            VisualizerState::Idle => vec![],
            VisualizerState::Rendering { current, fading } => fading
                .into_iter()
                .chain(Some(current))
                .map(|generation| RenderInstruction::RemoveGeneration {
                    generation: generation.id,
                })
                .collect(),
        }
    }

    fn fade_out(
        &self,
        mut generation: Generation,
        now: Millis,
        instructions: &mut Vec<RenderInstruction>,
    ) -> Generation {
        instructions.push(RenderInstruction::FadeOutGeneration {
            generation: generation.id,
            duration_ms: self.animation.generation_fade_out_ms,
        });
        generation.schedule(
            now + self.animation.generation_fade_out_ms,
            TaskAction::RemoveGeneration,
        );
        generation
    }

    fn next_element(&mut self) -> ElementId {
        self.next_element_id += 1;
        ElementId(self.next_element_id)
    }

    fn build_generation(
        &mut self,
        summary: &BlockSummary,
        now: Millis,
        instructions: &mut Vec<RenderInstruction>,
    ) -> Generation {
        self.next_generation_id += 1;
        let id = GenerationId(self.next_generation_id);
        instructions.push(RenderInstruction::CreateGeneration {
            generation: id,
            block_height: summary.height,
        });

        let layout = layout_frame(&self.layout, summary);
        for anchor in &layout.anchors {
            let element = self.next_element();
            instructions.push(RenderInstruction::DrawShard {
                generation: id,
                element,
                shard_id: anchor.shard_id,
                center: Point {
                    x: anchor.x,
                    y: anchor.y,
                },
                radius: self.layout.shard_radius,
                label: format!("Shard {}", anchor.shard_id),
            });
        }
        for dot in &layout.accounts {
            let element = self.next_element();
            instructions.push(RenderInstruction::DrawAccount {
                generation: id,
                element,
                account_id: dot.position.account_id.clone(),
                shard_id: dot.position.shard_id,
                center: dot.position.point(),
                radius: dot.radius,
                color: dot.color.clone(),
                opacity: self.animation.account_opacity,
                tooltip: format!(
                    "{}\nReceipts: {}\nTransactions: {}",
                    dot.position.account_id, dot.receipt_count, dot.transaction_count
                ),
            });
        }

        let mut generation = Generation {
            id,
            block_height: summary.height,
            positions: layout.positions,
            animated_elements: BTreeSet::new(),
            tasks: vec![],
        };

        let transfers = summary.shards.iter().flat_map(|shard| {
            shard
                .transactions
                .iter()
                .map(|tx| (tx.signer_id.as_str(), tx.receiver_id.as_str()))
                .chain(
                    shard
                        .receipts
                        .iter()
                        .map(|receipt| {
                            (receipt.predecessor_id.as_str(), receipt.receiver_id.as_str())
                        }),
                )
        });
        let mut animated = 0;
        let mut skipped = 0;
        for (source_id, target_id) in transfers {
            if self.animate_transfer(&mut generation, source_id, target_id, now, instructions) {
                animated += 1;
            } else {
                skipped += 1;
            }
        }

        tracing::debug!(target: SHARD_VISUALIZER,
            "Built generation {:?} for block {:?}: {} accounts, {} animations, {} skipped",
            id,
            summary.height,
            layout.accounts.len(),
            animated,
            skipped,
        );
        generation
    }

    /// Draws a line and a particle from `source_id` to `target_id`. Returns
    /// `false` when either endpoint has no position in this frame.
    fn animate_transfer(
        &mut self,
        generation: &mut Generation,
        source_id: &str,
        target_id: &str,
        now: Millis,
        instructions: &mut Vec<RenderInstruction>,
    ) -> bool {
        let (Some(source), Some(target)) = (
            generation.positions.get(source_id),
            generation.positions.get(target_id),
        ) else {
            return false;
        };
        let (from, to) = (source.point(), target.point());
        let color = account_color(&self.layout, source_id);

        let line = self.next_element();
        instructions.push(RenderInstruction::DrawLine {
            generation: generation.id,
            element: line,
            from,
            to,
            color: color.clone(),
            opacity: self.animation.line_opacity,
            fade_in_ms: self.animation.line_fade_in_ms,
            hold_ms: self.animation.line_hold_ms,
            fade_out_ms: self.animation.line_fade_out_ms,
        });
        let line_lifetime = self.animation.line_fade_in_ms
            + self.animation.line_hold_ms
            + self.animation.line_fade_out_ms;
        generation.animated_elements.insert(line);
        generation.schedule(now + line_lifetime, TaskAction::RemoveElement(line));

        let particle = self.next_element();
        instructions.push(RenderInstruction::SpawnParticle {
            generation: generation.id,
            element: particle,
            from,
            to,
            color,
            radius: self.layout.particle_radius,
            duration_ms: self.animation.particle_duration_ms,
        });
        generation.animated_elements.insert(particle);
        generation.schedule(
            now + self.animation.particle_duration_ms,
            TaskAction::RemoveElement(particle),
        );
        true
    }
}
