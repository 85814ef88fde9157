//! Timeline error types

use stagehand_animation::AnimationError;
use stagehand_core::SceneError;
use thiserror::Error;

/// Timeline loading and scheduling errors
///
/// Most of these are diagnostics: the registry records them and skips the
/// offending entry instead of failing the whole load.
#[derive(Error, Debug)]
pub enum TimelineError {
    /// A keyframe is missing its function or timestamp, or has unusable
    /// parameters
    #[error("timeline `{timeline}` keyframe #{index}: {reason}")]
    MalformedKeyframe {
        timeline: String,
        index: usize,
        reason: String,
    },

    /// A `Timeline` entity declares no trigger
    #[error("timeline `{timeline}` declares no trigger (Delay, Button, Touch or Chain)")]
    NoTrigger { timeline: String },

    /// A timeline attribute has the wrong type
    #[error("timeline `{timeline}` attribute `{attribute}`: expected {expected}")]
    BadAttribute {
        timeline: String,
        attribute: String,
        expected: &'static str,
    },

    /// A configuration value is out of range
    #[error("invalid `{parameter}`: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    #[error("failed to parse timeline data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Animation(#[from] AnimationError),
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
