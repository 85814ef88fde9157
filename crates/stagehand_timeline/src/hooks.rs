//! Presentation hooks
//!
//! Messages, camera work, sound and participant relocation are host
//! concerns. Keyframe dispatch resolves their parameters and hands them to a
//! [`PresentationHooks`] implementation.

use stagehand_core::{NodeId, Pose};

/// Host presentation surface
pub trait PresentationHooks {
    /// Show `text` to the participant (everyone when `None`) for `duration`
    /// seconds.
    fn message(&mut self, participant: Option<NodeId>, text: &str, duration: f64);

    fn camera_focus(&mut self, participant: Option<NodeId>, target: NodeId, duration: f64);

    fn camera_shake(&mut self, participant: Option<NodeId>, intensity: f64, duration: f64);

    /// Play a sound, positioned at `source` when given.
    fn play_sound(&mut self, participant: Option<NodeId>, sound: &str, volume: f64, source: Option<NodeId>);

    /// Move the participant to `destination`.
    fn relocate(&mut self, participant: NodeId, destination: Pose);
}

/// Hooks that only log what they are asked to do
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingHooks;

impl PresentationHooks for TracingHooks {
    fn message(&mut self, participant: Option<NodeId>, text: &str, duration: f64) {
        tracing::info!(?participant, text, duration, "message");
    }

    fn camera_focus(&mut self, participant: Option<NodeId>, target: NodeId, duration: f64) {
        tracing::info!(?participant, ?target, duration, "camera focus");
    }

    fn camera_shake(&mut self, participant: Option<NodeId>, intensity: f64, duration: f64) {
        tracing::info!(?participant, intensity, duration, "camera shake");
    }

    fn play_sound(&mut self, participant: Option<NodeId>, sound: &str, volume: f64, source: Option<NodeId>) {
        tracing::info!(?participant, sound, volume, ?source, "sound");
    }

    fn relocate(&mut self, participant: NodeId, destination: Pose) {
        tracing::info!(?participant, position = ?destination.position, "relocate");
    }
}

/// A hook invocation captured by [`RecordingHooks`]
#[derive(Clone, Debug, PartialEq)]
pub enum HookCall {
    Message {
        participant: Option<NodeId>,
        text: String,
        duration: f64,
    },
    CameraFocus {
        participant: Option<NodeId>,
        target: NodeId,
        duration: f64,
    },
    CameraShake {
        participant: Option<NodeId>,
        intensity: f64,
        duration: f64,
    },
    Sound {
        participant: Option<NodeId>,
        sound: String,
        volume: f64,
        source: Option<NodeId>,
    },
    Relocate {
        participant: NodeId,
        destination: Pose,
    },
}

/// Hooks that record every call in order
#[derive(Clone, Debug, Default)]
pub struct RecordingHooks {
    pub calls: Vec<HookCall>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HookCall::Message { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl PresentationHooks for RecordingHooks {
    fn message(&mut self, participant: Option<NodeId>, text: &str, duration: f64) {
        self.calls.push(HookCall::Message {
            participant,
            text: text.to_string(),
            duration,
        });
    }

    fn camera_focus(&mut self, participant: Option<NodeId>, target: NodeId, duration: f64) {
        self.calls.push(HookCall::CameraFocus {
            participant,
            target,
            duration,
        });
    }

    fn camera_shake(&mut self, participant: Option<NodeId>, intensity: f64, duration: f64) {
        self.calls.push(HookCall::CameraShake {
            participant,
            intensity,
            duration,
        });
    }

    fn play_sound(&mut self, participant: Option<NodeId>, sound: &str, volume: f64, source: Option<NodeId>) {
        self.calls.push(HookCall::Sound {
            participant,
            sound: sound.to_string(),
            volume,
            source,
        });
    }

    fn relocate(&mut self, participant: NodeId, destination: Pose) {
        self.calls.push(HookCall::Relocate {
            participant,
            destination,
        });
    }
}
