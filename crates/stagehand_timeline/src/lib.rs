//! Stagehand Timelines
//!
//! Declarative keyframe timelines and the runtime that plays them.
//!
//! # Features
//!
//! - **Stage Data**: JSON entity trees describing a scene and its timelines
//! - **Registry**: timeline discovery with per-entry diagnostics
//! - **Triggers**: delay, button, touch and chain triggers with per-participant
//!   debounce
//! - **Scheduler**: one timed task queue driving every run's state machine
//! - **Dispatch**: keyframes routed to moves, tweens and presentation hooks
//! - **Director**: a headless frame loop tying it all together
//!
//! # Example
//!
//! ```rust
//! use stagehand_timeline::{Director, DirectorConfig, RecordingHooks, StageData};
//!
//! let data = StageData::from_json(
//!     r#"{
//!         "scene": { "nodes": [{ "name": "Lift" }] },
//!         "entities": [{
//!             "kind": "Timeline", "name": "Rise", "attributes": { "Delay": 0.0 },
//!             "children": [{
//!                 "kind": "Keyframe",
//!                 "attributes": { "Function": "Move", "Timestamp": 0.0, "Length": 1.0,
//!                                 "Offset": [0.0, 3.0, 0.0] },
//!                 "target": { "node": "Lift" }
//!             }]
//!         }]
//!     }"#,
//! )
//! .unwrap();
//!
//! let mut director = Director::from_stage(&data, DirectorConfig::default(), RecordingHooks::new()).unwrap();
//! director.run_for(1.5);
//! assert!(director.is_idle());
//! ```

pub mod config;
pub mod data;
pub mod director;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod keyframe;
pub mod registry;
pub mod scheduler;

pub use config::DirectorConfig;
pub use data::{Entity, EntityTarget, StageData, TIMELINE_KIND};
pub use director::{Director, StepReport};
pub use dispatch::Dispatcher;
pub use error::{Result, TimelineError};
pub use hooks::{HookCall, PresentationHooks, RecordingHooks, TracingHooks};
pub use keyframe::{timeline_duration, Keyframe, KeyframeOp, TweenParams};
pub use registry::{Registry, TimelineDef, TimelineIndex, Triggers};
pub use scheduler::{
    ContactOutcome, KeyframeSink, Run, RunEvent, RunId, RunState, SchedulerConfig, SchedulerEvent,
    TimelineScheduler, TimelineStats, TriggerSource,
};
