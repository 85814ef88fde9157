//! Interpolation engine
//!
//! Owns the [`TranslationLedger`] and drains it once per simulation frame.
//! A tick reads the whole ledger, advances every segment, folds each
//! object's contributions into one net local and one net world delta,
//! composes the new poses and only then writes them back, in one bulk call
//! when enough objects changed.
//!
//! The loop watches its own wall-clock cost. A tick that exceeds the frame
//! budget switches the engine to a throttled cadence that only runs every
//! `throttled_interval` seconds of simulation time, until a tick fits the
//! budget again. Segment progress is computed from absolute time, so skipped
//! frames coarsen motion without changing where it ends.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use stagehand_core::{NodeId, Pose, SceneProvider, Vec3};
use std::time::{Duration, Instant};

use crate::easing::Easing;
use crate::error::{AnimationError, Result};
use crate::ledger::{SpaceMode, TranslationLedger, TranslationSegment};

/// Changed-object count at which pose writes are batched
pub const DEFAULT_BATCH_THRESHOLD: usize = 5;
/// Wall-clock budget for one tick
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(33);
/// Simulation seconds between ticks while throttled
pub const DEFAULT_THROTTLED_INTERVAL: f64 = 0.1;

/// Engine tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub batch_threshold: usize,
    pub frame_budget: Duration,
    pub throttled_interval: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            frame_budget: DEFAULT_FRAME_BUDGET,
            throttled_interval: DEFAULT_THROTTLED_INTERVAL,
        }
    }
}

/// How often the standing loop runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cadence {
    #[default]
    EveryFrame,
    Throttled,
}

/// What one tick did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Objects whose pose was written
    pub objects_written: usize,
    /// Segments that reached full progress and were removed
    pub segments_completed: usize,
    /// Ledger entries dropped because their object vanished or rejected a write
    pub entries_dropped: usize,
    /// Poses were written with one bulk call
    pub batched: bool,
    /// The tick was skipped by the throttled cadence
    pub skipped: bool,
    /// Wall-clock time spent
    pub cost: Duration,
}

/// Incremental transform interpolation over many concurrent moves
#[derive(Debug, Default)]
pub struct InterpolationEngine {
    ledger: TranslationLedger,
    config: InterpolationConfig,
    cadence: Cadence,
    last_tick: Option<f64>,
}

impl InterpolationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InterpolationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn set_frame_budget(&mut self, budget: Duration) {
        self.config.frame_budget = budget;
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn ledger(&self) -> &TranslationLedger {
        &self.ledger
    }

    /// Check if any moves are still in flight
    pub fn has_active_moves(&self) -> bool {
        !self.ledger.is_empty()
    }

    /// Queue a move of `node` by `target_delta` over `duration` seconds,
    /// starting at `now`.
    ///
    /// Nothing moves until the next [`tick`](Self::tick). Concurrent requests
    /// on the same object are independent and add up.
    pub fn request_move<S: SceneProvider + ?Sized>(
        &mut self,
        scene: &S,
        node: NodeId,
        target_delta: Vec3,
        duration: f64,
        space: SpaceMode,
        easing: Easing,
        now: f64,
    ) -> Result<()> {
        let kind = scene
            .kind(node)
            .ok_or_else(|| AnimationError::invalid("object", "node does not exist"))?;
        if !kind.has_pose() {
            return Err(AnimationError::invalid(
                "object",
                format!("{kind:?} has no reference pose to move"),
            ));
        }
        if !target_delta.is_finite() {
            return Err(AnimationError::invalid(
                "target_delta",
                "every component must be a finite number",
            ));
        }
        if !duration.is_finite() {
            return Err(AnimationError::invalid("duration", "must be a finite number"));
        }
        if duration < 0.0 {
            return Err(AnimationError::invalid("duration", "must not be negative"));
        }

        tracing::trace!(?node, ?target_delta, duration, ?space, "move requested");
        self.ledger.push(
            node,
            TranslationSegment::new(now, target_delta, duration, space, easing),
        );
        Ok(())
    }

    /// Run one pass of the standing loop at simulation time `now`.
    pub fn tick<S: SceneProvider + ?Sized>(&mut self, now: f64, scene: &mut S) -> TickReport {
        if self.cadence == Cadence::Throttled {
            if let Some(last) = self.last_tick {
                if now - last < self.config.throttled_interval {
                    return TickReport {
                        skipped: true,
                        ..TickReport::default()
                    };
                }
            }
        }

        let started = Instant::now();
        self.last_tick = Some(now);
        let mut report = TickReport::default();

        // Read and compute everything before the first write.
        let mut writes: Vec<(NodeId, Pose)> = Vec::new();
        let mut vanished: SmallVec<[NodeId; 4]> = SmallVec::new();
        let nodes: Vec<NodeId> = self.ledger.nodes().collect();
        for node in nodes {
            let current = match scene.pose(node) {
                Ok(pose) => pose,
                Err(err) => {
                    tracing::debug!(?node, %err, "dropping moves for unreachable object");
                    vanished.push(node);
                    continue;
                }
            };
            let Some(segments) = self.ledger.segments_mut(node) else {
                continue;
            };

            let mut local = Vec3::ZERO;
            let mut world = Vec3::ZERO;
            let mut finished: SmallVec<[bool; 4]> = SmallVec::new();
            for segment in segments.iter_mut() {
                let step = segment.advance(now);
                match segment.space {
                    SpaceMode::Local => local += step.contribution,
                    SpaceMode::World => world += step.contribution,
                }
                finished.push(step.finished);
            }

            let mut index = 0;
            segments.retain(|_| {
                let keep = !finished[index];
                index += 1;
                keep
            });
            report.segments_completed += finished.iter().filter(|f| **f).count();

            let pose = current.translate_local(local).translate_world(world);
            if pose != current {
                writes.push((node, pose));
            }
        }

        for node in vanished {
            self.ledger.forget(node);
            report.entries_dropped += 1;
        }
        self.ledger.prune_empty();

        report.objects_written = writes.len();
        if writes.len() >= self.config.batch_threshold {
            report.batched = true;
            for (node, err) in scene.set_poses(&writes) {
                tracing::warn!(?node, %err, "bulk pose write rejected");
                report.objects_written -= 1;
                report.entries_dropped += usize::from(self.ledger.forget(node) > 0);
            }
        } else {
            for (node, pose) in writes {
                if let Err(err) = scene.set_pose(node, pose) {
                    tracing::warn!(?node, %err, "pose write rejected");
                    report.objects_written -= 1;
                    report.entries_dropped += usize::from(self.ledger.forget(node) > 0);
                }
            }
        }

        report.cost = started.elapsed();
        self.update_cadence(report.cost);
        tracing::trace!(
            objects = report.objects_written,
            completed = report.segments_completed,
            batched = report.batched,
            "interpolation tick"
        );
        report
    }

    fn update_cadence(&mut self, cost: Duration) {
        let over_budget = cost > self.config.frame_budget;
        match (self.cadence, over_budget) {
            (Cadence::EveryFrame, true) => {
                tracing::warn!(
                    cost_ms = cost.as_secs_f64() * 1000.0,
                    interval = self.config.throttled_interval,
                    "interpolation over budget, throttling"
                );
                self.cadence = Cadence::Throttled;
            }
            (Cadence::Throttled, false) => {
                tracing::debug!("interpolation back under budget");
                self.cadence = Cadence::EveryFrame;
            }
            _ => {}
        }
    }
}
