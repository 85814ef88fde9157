//! Stagehand Core Runtime
//!
//! This crate provides the foundational primitives shared by the Stagehand
//! animation and timeline crates:
//!
//! - **Geometry**: vectors, quaternions, rigid poses and colors
//! - **Scene Access**: the [`SceneProvider`] boundary plus an in-memory scene
//! - **Contact Events**: per-emitter listener registration and dispatch
//! - **State Machines**: typed flat state machines with history
//! - **Frame Clock**: deterministic simulation time
//!
//! # Example
//!
//! ```rust
//! use stagehand_core::{MemoryScene, Pose, SceneProvider, Vec3};
//!
//! let mut scene = MemoryScene::new();
//! let crate_id = scene.add_part("Crate", Pose::IDENTITY);
//!
//! scene
//!     .set_pose(crate_id, Pose::from_position(Vec3::new(0.0, 2.0, 0.0)))
//!     .unwrap();
//! assert_eq!(scene.pose(crate_id).unwrap().position.y, 2.0);
//! ```

pub mod clock;
pub mod error;
pub mod events;
pub mod fsm;
pub mod geometry;
pub mod scene;
pub mod value;

pub use clock::FrameClock;
pub use error::{Result, SceneError};
pub use events::{ContactEvent, ContactListeners, ListenerId};
pub use fsm::{StateMachine, Transition};
pub use geometry::{Color, Pose, Quat, Vec3};
pub use scene::{
    MemoryScene, NodeDescription, NodeId, NodeKind, SceneDescription, SceneNode, SceneProvider,
};
pub use value::Value;
