//! Keyframe dispatch
//!
//! One match over [`KeyframeOp`] routes a due keyframe to the interpolation
//! engine, the property tween engine or the presentation hooks. Handlers only
//! resolve targets and parameters; failures are logged and the keyframe is
//! dropped.

use stagehand_animation::{InterpolationEngine, PropertyChange, PropertyTweenEngine};
use stagehand_core::{NodeId, SceneProvider};

use crate::data::EntityTarget;
use crate::hooks::PresentationHooks;
use crate::keyframe::{Keyframe, KeyframeOp};
use crate::registry::TimelineDef;
use crate::scheduler::KeyframeSink;

/// Borrowed view of everything a keyframe can act on
pub struct Dispatcher<'a, S: ?Sized, H: ?Sized> {
    pub scene: &'a mut S,
    pub moves: &'a mut InterpolationEngine,
    pub tweens: &'a mut PropertyTweenEngine,
    pub hooks: &'a mut H,
}

impl<'a, S, H> Dispatcher<'a, S, H>
where
    S: SceneProvider + ?Sized,
    H: PresentationHooks + ?Sized,
{
    pub fn new(
        scene: &'a mut S,
        moves: &'a mut InterpolationEngine,
        tweens: &'a mut PropertyTweenEngine,
        hooks: &'a mut H,
    ) -> Self {
        Self {
            scene,
            moves,
            tweens,
            hooks,
        }
    }

    /// The keyframe's node target, falling back to the participant.
    fn resolve_target(&self, keyframe: &Keyframe, participant: Option<NodeId>) -> Option<NodeId> {
        match &keyframe.target {
            Some(EntityTarget::Node { node }) => self.scene.find(node),
            Some(EntityTarget::Value(_)) | None => participant,
        }
    }

    fn run(
        &mut self,
        timeline: &TimelineDef,
        keyframe: &Keyframe,
        op: &KeyframeOp,
        participant: Option<NodeId>,
        at: f64,
    ) -> Result<(), String> {
        let length = keyframe.length;
        match op {
            KeyframeOp::Move { offset, space } => {
                let node = self
                    .resolve_target(keyframe, participant)
                    .ok_or("move target not found")?;
                let start = at + keyframe.tween.delay;
                self.moves
                    .request_move(&*self.scene, node, *offset, length, *space, keyframe.tween.easing, start)
                    .map_err(|err| err.to_string())?;
            }
            KeyframeOp::Tween {
                relative,
                descendants,
            } => {
                let node = self
                    .resolve_target(keyframe, participant)
                    .ok_or("tween target not found")?;
                let change = PropertyChange {
                    properties: keyframe.properties.clone(),
                    attributes: keyframe.attributes.clone(),
                    tween: keyframe.tween_info(),
                    descendants: *descendants,
                    relative: *relative,
                };
                let report = self.tweens.set_properties(&mut *self.scene, node, &change, at);
                if !report.failures.is_empty() {
                    tracing::debug!(
                        timeline = %timeline.name,
                        failures = report.failures.len(),
                        "tween keyframe partially applied"
                    );
                }
            }
            KeyframeOp::Message { text } => self.hooks.message(participant, text, length),
            KeyframeOp::CameraFocus => {
                let node = self
                    .resolve_target(keyframe, participant)
                    .ok_or("camera focus target not found")?;
                self.hooks.camera_focus(participant, node, length);
            }
            KeyframeOp::CameraShake { intensity } => {
                self.hooks.camera_shake(participant, *intensity, length)
            }
            KeyframeOp::Sound { sound, volume } => {
                let source = keyframe.target_node().and_then(|name| self.scene.find(name));
                self.hooks.play_sound(participant, sound, *volume, source);
            }
            KeyframeOp::Teleport { destination } => {
                let participant = participant.ok_or("teleport needs a participant")?;
                let node = match destination {
                    Some(name) => self.scene.find(name),
                    None => keyframe.target_node().and_then(|name| self.scene.find(name)),
                }
                .ok_or("teleport destination not found")?;
                let pose = self.scene.pose(node).map_err(|err| err.to_string())?;
                self.hooks.relocate(participant, pose);
            }
        }
        Ok(())
    }
}

impl<S, H> KeyframeSink for Dispatcher<'_, S, H>
where
    S: SceneProvider + ?Sized,
    H: PresentationHooks + ?Sized,
{
    fn dispatch(&mut self, timeline: &TimelineDef, keyframe: &Keyframe, participant: Option<NodeId>, at: f64) {
        let Some(op) = &keyframe.op else {
            return;
        };
        if let Err(reason) = self.run(timeline, keyframe, op, participant, at) {
            tracing::warn!(
                timeline = %timeline.name,
                keyframe = keyframe.index,
                function = op.name(),
                %reason,
                "keyframe dropped"
            );
        }
    }
}
