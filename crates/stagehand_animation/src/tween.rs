//! Tween runner
//!
//! The generic tween facility: a tween drives either a set of named node
//! properties or a free-standing value holder towards goal values over time.
//! Tweens are created paused, started with [`TweenRunner::play`] and advanced
//! by [`TweenRunner::step`], which also reports the ones that finished.
//!
//! Start values are captured on the first step after the start delay, so a
//! tween always departs from whatever the target holds at that moment.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use stagehand_core::{NodeId, SceneProvider, Value};

use crate::easing::Easing;
use crate::error::AnimationError;

new_key_type! {
    /// Handle to a tween owned by a [`TweenRunner`]
    pub struct TweenId;
    /// Handle to a value holder owned by a [`TweenRunner`]
    pub struct HolderId;
}

/// Timing of a tween
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweenInfo {
    /// Seconds per leg
    pub duration: f64,
    pub easing: Easing,
    /// Extra cycles after the first, `-1` repeats forever
    pub repeat_count: i32,
    /// Each cycle plays forwards then backwards
    pub reverses: bool,
    /// Seconds before the tween starts moving
    pub delay: f64,
}

impl Default for TweenInfo {
    fn default() -> Self {
        Self {
            duration: 1.0,
            easing: Easing::default(),
            repeat_count: 0,
            reverses: false,
            delay: 0.0,
        }
    }
}

impl TweenInfo {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_repeat_count(mut self, repeat_count: i32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn with_reverses(mut self, reverses: bool) -> Self {
        self.reverses = reverses;
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// True when the tween repeats forever
    pub fn is_unbounded(&self) -> bool {
        self.repeat_count < 0
    }

    /// Length of one cycle, both legs included
    pub fn cycle_length(&self) -> f64 {
        self.duration.max(0.0) * if self.reverses { 2.0 } else { 1.0 }
    }

    /// Playing time excluding the start delay, `+∞` when unbounded
    pub fn total_length(&self) -> f64 {
        if self.is_unbounded() {
            f64::INFINITY
        } else {
            self.cycle_length() * f64::from(self.repeat_count + 1)
        }
    }
}

/// What a tween writes to
#[derive(Clone, Debug, PartialEq)]
pub enum TweenTarget {
    /// Named properties of one scene node
    Properties {
        node: NodeId,
        goals: SmallVec<[(String, Value); 2]>,
    },
    /// A value holder
    Holder { holder: HolderId, goal: Value },
}

/// How a tween ended
#[derive(Clone, Debug, PartialEq)]
pub enum TweenOutcome {
    Completed,
    Failed(AnimationError),
}

/// A tween that left the runner during a step
#[derive(Clone, Debug, PartialEq)]
pub struct TweenFinished {
    pub id: TweenId,
    pub target: TweenTarget,
    pub outcome: TweenOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PlayState {
    Created,
    Playing { started_at: f64 },
}

struct Tween {
    target: TweenTarget,
    info: TweenInfo,
    state: PlayState,
    /// Start values, captured on the first active step
    from: Option<SmallVec<[Value; 2]>>,
}

/// Owns and advances every tween and value holder
#[derive(Default)]
pub struct TweenRunner {
    tweens: SlotMap<TweenId, Tween>,
    holders: SlotMap<HolderId, Value>,
}

impl TweenRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a paused tween
    pub fn create(&mut self, target: TweenTarget, info: TweenInfo) -> TweenId {
        self.tweens.insert(Tween {
            target,
            info,
            state: PlayState::Created,
            from: None,
        })
    }

    /// Start a created tween at `now`. Returns false for unknown or already
    /// playing tweens.
    pub fn play(&mut self, id: TweenId, now: f64) -> bool {
        match self.tweens.get_mut(id) {
            Some(tween) if tween.state == PlayState::Created => {
                tween.state = PlayState::Playing { started_at: now };
                true
            }
            _ => false,
        }
    }

    /// Stop a tween where it is, without a completion report
    pub fn cancel(&mut self, id: TweenId) -> bool {
        self.tweens.remove(id).is_some()
    }

    pub fn is_active(&self, id: TweenId) -> bool {
        self.tweens.contains_key(id)
    }

    /// Number of live tweens
    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    /// Create a value holder seeded with `value`
    pub fn create_holder(&mut self, value: Value) -> HolderId {
        self.holders.insert(value)
    }

    pub fn holder(&self, id: HolderId) -> Option<&Value> {
        self.holders.get(id)
    }

    pub fn discard_holder(&mut self, id: HolderId) -> Option<Value> {
        self.holders.remove(id)
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Advance every playing tween to `now` and write the interpolated
    /// values. Finished tweens are removed and returned in creation order.
    pub fn step<S: SceneProvider + ?Sized>(&mut self, now: f64, scene: &mut S) -> Vec<TweenFinished> {
        let mut finished = Vec::new();
        let mut done: SmallVec<[(TweenId, TweenOutcome); 4]> = SmallVec::new();

        for (id, tween) in self.tweens.iter_mut() {
            let PlayState::Playing { started_at } = tween.state else {
                continue;
            };
            let elapsed = now - started_at - tween.info.delay;
            if elapsed < 0.0 {
                continue;
            }

            if tween.from.is_none() {
                match capture(&tween.target, &self.holders, scene) {
                    Ok(from) => tween.from = Some(from),
                    Err(err) => {
                        done.push((id, TweenOutcome::Failed(err)));
                        continue;
                    }
                }
            }

            let (alpha, complete) = sample(&tween.info, elapsed);
            let from = tween.from.as_deref().unwrap_or_default();
            match &tween.target {
                TweenTarget::Properties { node, goals } => {
                    for ((name, goal), start) in goals.iter().zip(from) {
                        let value = start.lerp(goal, alpha);
                        if let Err(err) = scene.set_property(*node, name, value) {
                            tracing::warn!(?node, property = %name, %err, "tween write failed");
                        }
                    }
                }
                TweenTarget::Holder { holder, goal } => {
                    if let (Some(slot), Some(start)) = (self.holders.get_mut(*holder), from.first()) {
                        *slot = start.lerp(goal, alpha);
                    }
                }
            }

            if complete {
                done.push((id, TweenOutcome::Completed));
            }
        }

        for (id, outcome) in done {
            if let Some(tween) = self.tweens.remove(id) {
                tracing::trace!(?id, ?outcome, "tween finished");
                finished.push(TweenFinished {
                    id,
                    target: tween.target,
                    outcome,
                });
            }
        }
        finished
    }
}

fn capture<S: SceneProvider + ?Sized>(
    target: &TweenTarget,
    holders: &SlotMap<HolderId, Value>,
    scene: &S,
) -> Result<SmallVec<[Value; 2]>, AnimationError> {
    match target {
        TweenTarget::Properties { node, goals } => goals
            .iter()
            .map(|(name, _)| {
                scene
                    .property(*node, name)
                    .map_err(|source| AnimationError::PropertyApplication {
                        node: *node,
                        name: name.clone(),
                        source,
                    })
            })
            .collect(),
        TweenTarget::Holder { holder, .. } => holders
            .get(*holder)
            .map(|value| SmallVec::from_elem(value.clone(), 1))
            .ok_or_else(|| AnimationError::invalid("holder", "value holder was discarded")),
    }
}

/// Eased interpolation factor at `elapsed` seconds into play, and whether
/// the tween is done.
fn sample(info: &TweenInfo, elapsed: f64) -> (f32, bool) {
    let rest = if info.reverses { 0.0 } else { 1.0 };
    let cycle = info.cycle_length();
    if cycle <= 0.0 || elapsed >= info.total_length() {
        return (rest, true);
    }

    let phase = elapsed % cycle;
    let mut t = phase / info.duration;
    if t > 1.0 {
        t = 2.0 - t;
    }
    (info.easing.apply(t as f32), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::{EasingDirection, EasingStyle};
    use smallvec::smallvec;
    use stagehand_core::{MemoryScene, Pose};

    fn lamp() -> (MemoryScene, NodeId) {
        let mut scene = MemoryScene::new();
        let lamp = scene.add_part("Lamp", Pose::IDENTITY);
        scene
            .insert_property(lamp, "Brightness", Value::Number(0.0))
            .unwrap();
        (scene, lamp)
    }

    fn brightness(scene: &MemoryScene, node: NodeId) -> f64 {
        scene.property(node, "Brightness").unwrap().as_number().unwrap()
    }

    fn linear(duration: f64) -> TweenInfo {
        TweenInfo::new(duration).with_easing(Easing::new(EasingStyle::Linear, EasingDirection::InOut))
    }

    #[test]
    fn test_property_tween_runs_to_goal() {
        let (mut scene, lamp) = lamp();
        let mut runner = TweenRunner::new();
        let id = runner.create(
            TweenTarget::Properties {
                node: lamp,
                goals: smallvec![("Brightness".to_string(), Value::Number(10.0))],
            },
            linear(2.0),
        );

        assert!(runner.step(1.0, &mut scene).is_empty());
        assert_eq!(brightness(&scene, lamp), 0.0);

        assert!(runner.play(id, 0.0));
        assert!(!runner.play(id, 0.0));
        runner.step(0.5, &mut scene);
        assert!((brightness(&scene, lamp) - 2.5).abs() < 1e-6);

        let finished = runner.step(2.0, &mut scene);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].outcome, TweenOutcome::Completed);
        assert_eq!(brightness(&scene, lamp), 10.0);
        assert!(runner.is_empty());
    }

    #[test]
    fn test_delay_captures_start_late() {
        let (mut scene, lamp) = lamp();
        let mut runner = TweenRunner::new();
        let id = runner.create(
            TweenTarget::Properties {
                node: lamp,
                goals: smallvec![("Brightness".to_string(), Value::Number(4.0))],
            },
            linear(1.0).with_delay(1.0),
        );
        runner.play(id, 0.0);

        scene
            .set_property(lamp, "Brightness", Value::Number(2.0))
            .unwrap();
        runner.step(0.5, &mut scene);
        assert_eq!(brightness(&scene, lamp), 2.0);

        runner.step(1.5, &mut scene);
        assert!((brightness(&scene, lamp) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_reverses_returns_to_start() {
        let (mut scene, lamp) = lamp();
        let mut runner = TweenRunner::new();
        let info = linear(1.0).with_reverses(true).with_repeat_count(1);
        assert_eq!(info.total_length(), 4.0);
        let id = runner.create(
            TweenTarget::Properties {
                node: lamp,
                goals: smallvec![("Brightness".to_string(), Value::Number(8.0))],
            },
            info,
        );
        runner.play(id, 0.0);

        runner.step(0.0, &mut scene);
        runner.step(1.0, &mut scene);
        assert!((brightness(&scene, lamp) - 8.0).abs() < 1e-6);
        runner.step(1.5, &mut scene);
        assert!((brightness(&scene, lamp) - 4.0).abs() < 1e-6);
        runner.step(2.5, &mut scene);
        assert!((brightness(&scene, lamp) - 4.0).abs() < 1e-6);

        let finished = runner.step(4.0, &mut scene);
        assert_eq!(finished.len(), 1);
        assert_eq!(brightness(&scene, lamp), 0.0);
    }

    #[test]
    fn test_unbounded_tween_never_finishes() {
        let mut scene = MemoryScene::new();
        let mut runner = TweenRunner::new();
        let holder = runner.create_holder(Value::Number(0.0));
        let info = linear(1.0).with_repeat_count(-1);
        assert!(info.total_length().is_infinite());
        let id = runner.create(
            TweenTarget::Holder {
                holder,
                goal: Value::Number(1.0),
            },
            info,
        );
        runner.play(id, 0.0);

        for i in 0..50 {
            assert!(runner.step(i as f64 * 0.3, &mut scene).is_empty());
        }
        assert!(runner.is_active(id));
        assert!(runner.cancel(id));
        assert!(!runner.is_active(id));
    }

    #[test]
    fn test_missing_property_fails_the_tween() {
        let (mut scene, lamp) = lamp();
        let mut runner = TweenRunner::new();
        let id = runner.create(
            TweenTarget::Properties {
                node: lamp,
                goals: smallvec![("Volume".to_string(), Value::Number(1.0))],
            },
            linear(1.0),
        );
        runner.play(id, 0.0);

        let finished = runner.step(0.1, &mut scene);
        assert!(matches!(
            finished[0].outcome,
            TweenOutcome::Failed(AnimationError::PropertyApplication { .. })
        ));
    }

    #[test]
    fn test_zero_duration_lands_immediately() {
        let mut scene = MemoryScene::new();
        let mut runner = TweenRunner::new();
        let holder = runner.create_holder(Value::Number(1.0));
        let id = runner.create(
            TweenTarget::Holder {
                holder,
                goal: Value::Number(5.0),
            },
            linear(0.0),
        );
        runner.play(id, 3.0);

        let finished = runner.step(3.0, &mut scene);
        assert_eq!(finished.len(), 1);
        assert_eq!(runner.holder(holder), Some(&Value::Number(5.0)));
    }
}
