//! Translation ledger
//!
//! Every in-flight move is a [`TranslationSegment`] that remembers how much
//! of its own target delta it has already applied (its checkpoint). Each tick
//! a segment contributes only the difference between its newly eased
//! position and that checkpoint, so any number of overlapping moves on one
//! object add up instead of overwriting each other.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use stagehand_core::{NodeId, Vec3};

use crate::easing::{self, Easing};

/// Frame in which a segment's delta is expressed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceMode {
    /// Along the object's own axes
    Local,
    /// Along the world axes
    #[default]
    World,
}

/// One in-flight incremental move contribution
#[derive(Clone, Debug, PartialEq)]
pub struct TranslationSegment {
    pub start_time: f64,
    pub target_delta: Vec3,
    /// Portion of `target_delta` already applied
    pub checkpoint: Vec3,
    pub duration: f64,
    pub space: SpaceMode,
    pub easing: Easing,
}

/// Result of advancing a segment to a point in time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentStep {
    /// Delta to apply this tick
    pub contribution: Vec3,
    /// The segment reached full progress and must be removed after this tick
    pub finished: bool,
}

impl TranslationSegment {
    pub fn new(
        start_time: f64,
        target_delta: Vec3,
        duration: f64,
        space: SpaceMode,
        easing: Easing,
    ) -> Self {
        Self {
            start_time,
            target_delta,
            checkpoint: Vec3::ZERO,
            duration,
            space,
            easing,
        }
    }

    /// Linear progress at `now`, clamped to `[0, 1]`. A segment that has not
    /// started yet has no progress. Zero-length segments complete at their
    /// start time.
    pub fn progress(&self, now: f64) -> f64 {
        if now < self.start_time {
            return 0.0;
        }
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    /// Move the checkpoint to the eased position at `now` and return the
    /// difference.
    pub fn advance(&mut self, now: f64) -> SegmentStep {
        let progress = self.progress(now);
        let eased = easing::evaluate(progress as f32, self.easing.style, self.easing.direction);
        let applied = self.target_delta * eased;
        let contribution = applied - self.checkpoint;
        self.checkpoint = applied;
        SegmentStep {
            contribution,
            finished: progress >= 1.0,
        }
    }
}

/// Per-object ordered segment lists
#[derive(Debug, Default)]
pub struct TranslationLedger {
    entries: IndexMap<NodeId, SmallVec<[TranslationSegment; 2]>>,
}

impl TranslationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment in arrival order, creating the object's entry if needed
    pub fn push(&mut self, node: NodeId, segment: TranslationSegment) {
        self.entries.entry(node).or_default().push(segment);
    }

    pub fn segments(&self, node: NodeId) -> Option<&[TranslationSegment]> {
        self.entries.get(&node).map(|s| s.as_slice())
    }

    /// Objects with at least one active segment, in first-request order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    pub(crate) fn segments_mut(&mut self, node: NodeId) -> Option<&mut SmallVec<[TranslationSegment; 2]>> {
        self.entries.get_mut(&node)
    }

    /// Drop an object's entry regardless of remaining segments
    pub fn forget(&mut self, node: NodeId) -> usize {
        self.entries
            .shift_remove(&node)
            .map(|segments| segments.len())
            .unwrap_or(0)
    }

    /// Drop entries whose segment lists are empty
    pub(crate) fn prune_empty(&mut self) {
        self.entries.retain(|_, segments| !segments.is_empty());
    }

    /// Number of objects being moved
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total active segments across all objects
    pub fn segment_count(&self) -> usize {
        self.entries.values().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::{EasingDirection, EasingStyle};
    use stagehand_core::{MemoryScene, Pose};

    fn segment(delta: Vec3, duration: f64, easing: Easing) -> TranslationSegment {
        TranslationSegment::new(0.0, delta, duration, SpaceMode::World, easing)
    }

    #[test]
    fn test_contributions_sum_to_target() {
        let easing = Easing::new(EasingStyle::Sine, EasingDirection::InOut);
        let target = Vec3::new(3.0, -7.5, 12.25);
        let mut seg = segment(target, 1.3, easing);

        let mut total = Vec3::ZERO;
        let mut t = 0.0;
        loop {
            t += 1.0 / 60.0;
            let step = seg.advance(t);
            total += step.contribution;
            if step.finished {
                break;
            }
        }
        assert!(total.abs_diff_eq(target, 1e-4));
        assert_eq!(seg.checkpoint, target);
    }

    #[test]
    fn test_checkpoint_is_bounded_and_monotonic() {
        let easing = Easing::new(EasingStyle::Quad, EasingDirection::Out);
        let mut seg = segment(Vec3::new(-4.0, 0.0, 2.0), 2.0, easing);

        let mut last = 0.0f32;
        for i in 1..=40 {
            seg.advance(i as f64 * 0.05);
            assert!(seg.checkpoint.x.abs() <= 4.0 + 1e-6);
            assert!(seg.checkpoint.z.abs() <= 2.0 + 1e-6);
            assert!(seg.checkpoint.x.abs() >= last);
            last = seg.checkpoint.x.abs();
        }
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let mut seg = segment(Vec3::UP, 0.0, Easing::LINEAR);
        let step = seg.advance(0.0);
        assert!(step.finished);
        assert_eq!(step.contribution, Vec3::UP);
    }

    #[test]
    fn test_segment_waits_for_its_start_time() {
        let mut seg = TranslationSegment::new(1.0, Vec3::UP, 0.0, SpaceMode::World, Easing::LINEAR);
        let step = seg.advance(0.5);
        assert!(!step.finished);
        assert_eq!(step.contribution, Vec3::ZERO);
        assert!(seg.advance(1.0).finished);
        assert_eq!(seg.checkpoint, Vec3::UP);

        let delayed = TranslationSegment::new(2.0, Vec3::X, 2.0, SpaceMode::World, Easing::LINEAR);
        assert_eq!(delayed.progress(1.0), 0.0);
        assert_eq!(delayed.progress(3.0), 0.5);
    }

    #[test]
    fn test_ledger_keeps_arrival_order() {
        let mut scene = MemoryScene::new();
        let a = scene.add_part("A", Pose::IDENTITY);
        let b = scene.add_part("B", Pose::IDENTITY);

        let mut ledger = TranslationLedger::new();
        ledger.push(b, segment(Vec3::X, 1.0, Easing::LINEAR));
        ledger.push(a, segment(Vec3::UP, 1.0, Easing::LINEAR));
        ledger.push(b, segment(Vec3::ONE, 2.0, Easing::LINEAR));

        assert_eq!(ledger.nodes().collect::<Vec<_>>(), vec![b, a]);
        let segments = ledger.segments(b).unwrap();
        assert_eq!(segments[0].target_delta, Vec3::X);
        assert_eq!(segments[1].target_delta, Vec3::ONE);
        assert_eq!(ledger.segment_count(), 3);

        assert_eq!(ledger.forget(b), 2);
        assert_eq!(ledger.len(), 1);
    }
}
