//! Headless director
//!
//! Owns one of everything: the scene, the frame clock, the scheduler, the
//! interpolation and tween engines and the presentation hooks. Each
//! [`Director::step`] runs one frame in a fixed order:
//!
//! 1. advance the clock
//! 2. run due scheduler tasks (keyframe dispatch may queue moves)
//! 3. one interpolation tick, which already sees the moves from step 2
//! 4. advance property and attribute tweens

use stagehand_animation::{
    Easing, InterpolationEngine, PropertyTweenEngine, SpaceMode, TickReport,
};
use stagehand_core::{ContactEvent, FrameClock, MemoryScene, NodeId, SceneProvider, Vec3};

use crate::config::DirectorConfig;
use crate::data::StageData;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::hooks::{PresentationHooks, TracingHooks};
use crate::registry::Registry;
use crate::scheduler::{ContactOutcome, RunId, SchedulerEvent, TimelineScheduler};

/// What one frame did
#[derive(Clone, Debug, Default)]
pub struct StepReport {
    pub now: f64,
    pub frame: u64,
    /// Scheduler tasks run
    pub tasks: usize,
    pub tick: TickReport,
    /// Tweens that finished this frame
    pub tweens_finished: usize,
    pub events: Vec<SchedulerEvent>,
}

/// Headless timeline runtime
pub struct Director<S, H = TracingHooks> {
    scene: S,
    hooks: H,
    clock: FrameClock,
    scheduler: TimelineScheduler,
    moves: InterpolationEngine,
    tweens: PropertyTweenEngine,
    config: DirectorConfig,
}

impl<S: SceneProvider> Director<S, TracingHooks> {
    /// Director that logs presentation hooks.
    pub fn headless(scene: S, registry: Registry, config: DirectorConfig) -> Self {
        Self::new(scene, registry, config, TracingHooks)
    }
}

impl<H: PresentationHooks> Director<MemoryScene, H> {
    /// Build the scene and timelines of a stage file.
    pub fn from_stage(data: &StageData, config: DirectorConfig, hooks: H) -> Result<Self> {
        let scene = MemoryScene::from_description(&data.scene)?;
        let registry = Registry::scan(&data.entities);
        Ok(Self::new(scene, registry, config, hooks))
    }
}

impl<S: SceneProvider, H: PresentationHooks> Director<S, H> {
    pub fn new(scene: S, registry: Registry, config: DirectorConfig, hooks: H) -> Self {
        Self {
            scene,
            hooks,
            clock: FrameClock::new(),
            scheduler: TimelineScheduler::new(registry, config.scheduler()),
            moves: InterpolationEngine::with_config(config.interpolation()),
            tweens: PropertyTweenEngine::new(),
            config,
        }
    }

    /// Wire triggers and start delay-only timelines at the current time.
    pub fn start(&mut self) {
        self.scheduler.start(&self.scene, self.clock.now());
    }

    /// Run one frame of `dt` seconds.
    pub fn step(&mut self, dt: f64) -> StepReport {
        self.start();
        let now = self.clock.advance(dt);

        let mut dispatcher = Dispatcher::new(
            &mut self.scene,
            &mut self.moves,
            &mut self.tweens,
            &mut self.hooks,
        );
        let tasks = self.scheduler.advance(now, &mut dispatcher);
        let tick = self.moves.tick(now, &mut self.scene);
        let tweens_finished = self.tweens.step(now, &mut self.scene).len();

        StepReport {
            now,
            frame: self.clock.frame(),
            tasks,
            tick,
            tweens_finished,
            events: self.scheduler.take_events(),
        }
    }

    /// Step at the configured frame rate for `seconds` of simulation time and
    /// return every scheduler event on the way.
    pub fn run_for(&mut self, seconds: f64) -> Vec<SchedulerEvent> {
        let dt = self.config.frame_interval();
        let frames = (seconds.max(0.0) / dt).round() as u64;
        let mut events = Vec::new();
        for _ in 0..frames {
            events.extend(self.step(dt).events);
        }
        events
    }

    /// Signal a button. The runs start on a later step.
    pub fn press_button(&mut self, button: &str, participant: Option<NodeId>) -> Vec<RunId> {
        self.start();
        self.scheduler
            .press_button(button, participant, self.clock.now())
    }

    /// Report that `participant` touched `emitter`.
    pub fn contact(&mut self, emitter: NodeId, participant: NodeId) -> Vec<ContactOutcome> {
        self.start();
        self.scheduler.contact(&ContactEvent {
            emitter,
            participant,
            timestamp: self.clock.now(),
        })
    }

    /// Queue a move outside any timeline. It starts moving on the next step.
    pub fn request_move(
        &mut self,
        node: NodeId,
        delta: Vec3,
        duration: f64,
        space: SpaceMode,
        easing: Easing,
    ) -> Result<()> {
        self.moves
            .request_move(&self.scene, node, delta, duration, space, easing, self.clock.now())?;
        Ok(())
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn scheduler(&self) -> &TimelineScheduler {
        &self.scheduler
    }

    pub fn moves(&self) -> &InterpolationEngine {
        &self.moves
    }

    pub fn tweens(&self) -> &PropertyTweenEngine {
        &self.tweens
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// True when nothing is queued, moving or tweening.
    pub fn is_idle(&self) -> bool {
        self.scheduler.pending_tasks() == 0
            && !self.moves.has_active_moves()
            && !self.tweens.has_active_tweens()
    }

    pub fn into_scene(self) -> S {
        self.scene
    }
}
