//! Stagehand Animation System
//!
//! Easing curves, incremental translation and property tweening.
//!
//! # Features
//!
//! - **Easing**: eleven curve styles in three directions, exact at both ends
//! - **Translation Ledger**: checkpointed segments that let concurrent moves
//!   on one object add up
//! - **Interpolation Engine**: drains the ledger once per frame with batched
//!   writes and self-throttling
//! - **Tweens**: property and attribute tweening with repeats, reversal and
//!   start delays

pub mod easing;
pub mod error;
pub mod interpolation;
pub mod ledger;
pub mod properties;
pub mod tween;

pub use easing::{Easing, EasingDirection, EasingStyle, UnknownEasing};
pub use error::{AnimationError, Result};
pub use interpolation::{Cadence, InterpolationConfig, InterpolationEngine, TickReport};
pub use ledger::{SpaceMode, TranslationLedger, TranslationSegment};
pub use properties::{ApplyReport, PropertyChange, PropertyTweenEngine};
pub use tween::{HolderId, TweenFinished, TweenId, TweenInfo, TweenOutcome, TweenRunner, TweenTarget};
