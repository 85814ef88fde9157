//! Animation error types

use stagehand_core::{NodeId, SceneError};
use thiserror::Error;

/// Animation-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// A request parameter is unusable; the request is rejected
    #[error("invalid argument `{parameter}`: {reason}")]
    InvalidArgument {
        parameter: &'static str,
        reason: String,
    },

    /// Reading or writing one property/attribute on one target failed
    #[error("failed to apply `{name}` on {node:?}: {source}")]
    PropertyApplication {
        node: NodeId,
        name: String,
        source: SceneError,
    },

    /// A relative change was requested for values that do not compose
    #[error("cannot compose `{name}`: {current} with {delta}")]
    NotComposable {
        name: String,
        current: &'static str,
        delta: &'static str,
    },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl AnimationError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter,
            reason: reason.into(),
        }
    }

    /// The offending request parameter, for `InvalidArgument` errors
    pub fn parameter(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { parameter, .. } => Some(*parameter),
            _ => None,
        }
    }
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
