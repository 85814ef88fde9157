//! Scene access error types

use thiserror::Error;

use crate::scene::NodeId;

/// Errors raised by a [`SceneProvider`](crate::scene::SceneProvider)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// The handle no longer refers to a live node
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// The node has no property with this name
    #[error("node {node:?} has no property `{name}`")]
    MissingProperty { node: NodeId, name: String },

    /// The value has the wrong type for the property
    #[error("property `{name}` expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The node kind cannot carry a pose
    #[error("node {0:?} has no pose")]
    NoPose(NodeId),

    /// Re-parenting would make a node its own ancestor
    #[error("node {child:?} cannot be parented under {parent:?}, which it contains")]
    ParentCycle { child: NodeId, parent: NodeId },

    /// Only groups take a reference part
    #[error("node {0:?} is not a group")]
    NotAGroup(NodeId),

    /// A group reference must be a part inside the group
    #[error("node {reference:?} is not a member part of group {group:?}")]
    InvalidReference { group: NodeId, reference: NodeId },
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;
