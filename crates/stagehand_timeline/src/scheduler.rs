//! Timeline scheduler
//!
//! Every triggered timeline becomes a run walking
//! `Idle → Scheduled → Running → Completed`, with `Completed → Scheduled` for
//! looping timelines. All waiting (start delays, keyframe offsets, run
//! completion, touch settle delays) is expressed as tasks in one timed queue
//! that the host drains once per frame with [`TimelineScheduler::advance`].
//!
//! Tasks carry their exact due time. Runs start at their due time and
//! keyframes are dispatched with it, so coarse frames delay work without
//! shifting it.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use stagehand_core::{
    ContactEvent, ContactListeners, NodeId, SceneProvider, StateMachine, Transition,
};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::keyframe::Keyframe;
use crate::registry::{Registry, TimelineDef, TimelineIndex};

/// Seconds a multiple-touch participant stays engaged after a touch
pub const DEFAULT_TOUCH_SETTLE_DELAY: f64 = 1.0;
/// Contact emitters wired per touch timeline
pub const DEFAULT_MAX_TOUCH_LISTENERS: usize = 64;

new_key_type! {
    /// Handle to one run of a timeline
    pub struct RunId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scheduled,
    Running,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunEvent {
    Trigger,
    Start,
    Finish,
    Loop,
}

/// The run lifecycle
pub fn run_machine() -> StateMachine<RunState, RunEvent> {
    StateMachine::new(
        RunState::Idle,
        [
            Transition::new(RunState::Idle, RunEvent::Trigger, RunState::Scheduled),
            Transition::new(RunState::Scheduled, RunEvent::Start, RunState::Running),
            Transition::new(RunState::Running, RunEvent::Finish, RunState::Completed),
            Transition::new(RunState::Completed, RunEvent::Loop, RunState::Scheduled),
        ],
    )
}

/// Why a run was created
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerSource {
    /// Started at process start
    Delay,
    Button(String),
    Touch { emitter: NodeId },
    /// Started by the completion of another timeline
    Chain { from: TimelineIndex },
}

/// One run of a timeline
#[derive(Debug)]
pub struct Run {
    pub timeline: TimelineIndex,
    pub participant: Option<NodeId>,
    pub source: TriggerSource,
    machine: StateMachine<RunState, RunEvent>,
    started_at: Option<f64>,
    cycles: u32,
    /// Queued tasks that refer to this run
    pending: u32,
}

impl Run {
    pub fn state(&self) -> RunState {
        self.machine.current_state()
    }

    pub fn history(&self) -> &[(RunState, RunEvent, RunState)] {
        self.machine.history()
    }

    /// Start time of the current cycle
    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    /// Number of times the run entered `Running`
    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

/// Scheduler tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub touch_settle_delay: f64,
    pub max_touch_listeners: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            touch_settle_delay: DEFAULT_TOUCH_SETTLE_DELAY,
            max_touch_listeners: DEFAULT_MAX_TOUCH_LISTENERS,
        }
    }
}

/// Result of a contact for one listening timeline
#[derive(Clone, Debug, PartialEq)]
pub enum ContactOutcome {
    Triggered { timeline: TimelineIndex, run: RunId },
    /// The participant is still engaged with this timeline
    DebounceSuppressed { timeline: TimelineIndex },
}

/// Lifecycle notifications, in the order they happened
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerEvent {
    Triggered {
        timeline: TimelineIndex,
        run: RunId,
        source: TriggerSource,
        at: f64,
    },
    Started {
        timeline: TimelineIndex,
        run: RunId,
        at: f64,
    },
    Dispatched {
        timeline: TimelineIndex,
        run: RunId,
        keyframe: usize,
        at: f64,
    },
    Completed {
        timeline: TimelineIndex,
        run: RunId,
        at: f64,
    },
    Looped {
        timeline: TimelineIndex,
        run: RunId,
        at: f64,
    },
}

/// Per-timeline counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimelineStats {
    pub triggered: u32,
    pub started: u32,
    pub completed: u32,
    pub dispatched: u32,
    pub suppressed: u32,
}

/// Receiver of due keyframes
pub trait KeyframeSink {
    fn dispatch(&mut self, timeline: &TimelineDef, keyframe: &Keyframe, participant: Option<NodeId>, at: f64);
}

#[derive(Clone, Copy, Debug)]
enum TaskKind {
    StartRun(RunId),
    DispatchKeyframe { run: RunId, keyframe: usize },
    CompleteRun(RunId),
    ReleaseDebounce {
        timeline: TimelineIndex,
        participant: NodeId,
    },
}

impl TaskKind {
    fn run(&self) -> Option<RunId> {
        match self {
            TaskKind::StartRun(run) | TaskKind::CompleteRun(run) => Some(*run),
            TaskKind::DispatchKeyframe { run, .. } => Some(*run),
            TaskKind::ReleaseDebounce { .. } => None,
        }
    }
}

#[derive(Debug)]
struct Task {
    due: f64,
    seq: u64,
    kind: TaskKind,
}

// Min-heap on (due, seq).
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

/// Drives timeline runs from triggers to completion
pub struct TimelineScheduler {
    registry: Registry,
    config: SchedulerConfig,
    runs: SlotMap<RunId, Run>,
    queue: BinaryHeap<Task>,
    /// Zero-period re-triggers held back until the next drain
    deferred: Vec<Task>,
    next_seq: u64,
    draining: bool,
    buttons: FxHashMap<String, SmallVec<[TimelineIndex; 2]>>,
    listeners: ContactListeners<TimelineIndex>,
    debounce: Vec<FxHashSet<NodeId>>,
    stats: Vec<TimelineStats>,
    events: Vec<SchedulerEvent>,
    started: bool,
}

impl TimelineScheduler {
    pub fn new(registry: Registry, config: SchedulerConfig) -> Self {
        let count = registry.len();
        Self {
            registry,
            config,
            runs: SlotMap::with_key(),
            queue: BinaryHeap::new(),
            deferred: Vec::new(),
            next_seq: 0,
            draining: false,
            buttons: FxHashMap::default(),
            listeners: ContactListeners::new(),
            debounce: vec![FxHashSet::default(); count],
            stats: vec![TimelineStats::default(); count],
            events: Vec::new(),
            started: false,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Wire button and touch triggers and start delay-only timelines.
    /// Only the first call has any effect.
    pub fn start<S: SceneProvider + ?Sized>(&mut self, scene: &S, now: f64) {
        if self.started {
            return;
        }
        self.started = true;

        let mut autostart = Vec::new();
        for (index, def) in self.registry.timelines().iter().enumerate() {
            if let Some(button) = &def.triggers.button {
                self.buttons.entry(button.clone()).or_default().push(index);
            }
            if let Some(tag) = &def.triggers.touch {
                let emitters = scene.tagged(tag);
                if emitters.len() > self.config.max_touch_listeners {
                    tracing::warn!(
                        timeline = %def.name,
                        tag = %tag,
                        emitters = emitters.len(),
                        limit = self.config.max_touch_listeners,
                        "too many contact emitters, extra ones ignored"
                    );
                }
                if emitters.is_empty() {
                    tracing::debug!(timeline = %def.name, tag = %tag, "no contact emitters carry the touch tag");
                }
                for emitter in emitters.into_iter().take(self.config.max_touch_listeners) {
                    self.listeners.register(emitter, index);
                }
            }
            if def.triggers.is_delay_only() {
                autostart.push(index);
            }
        }

        for index in autostart {
            self.spawn(index, TriggerSource::Delay, None, now, None);
        }
    }

    /// Trigger a timeline directly. Returns `None` for unknown indices.
    pub fn trigger(
        &mut self,
        timeline: TimelineIndex,
        source: TriggerSource,
        participant: Option<NodeId>,
        now: f64,
    ) -> Option<RunId> {
        self.spawn(timeline, source, participant, now, None)
    }

    /// Deliver a button signal to every timeline listening for `button`.
    pub fn press_button(&mut self, button: &str, participant: Option<NodeId>, now: f64) -> Vec<RunId> {
        let Some(timelines) = self.buttons.get(button).cloned() else {
            tracing::debug!(button, "no timeline listens for this button");
            return Vec::new();
        };
        timelines
            .into_iter()
            .filter_map(|timeline| {
                self.spawn(
                    timeline,
                    TriggerSource::Button(button.to_string()),
                    participant,
                    now,
                    None,
                )
            })
            .collect()
    }

    /// Deliver a contact to the timelines listening on its emitter.
    pub fn contact(&mut self, event: &ContactEvent) -> Vec<ContactOutcome> {
        let mut outcomes = Vec::new();
        for (listener, timeline) in self.listeners.dispatch(event) {
            let engaged = &mut self.debounce[timeline];
            if !engaged.insert(event.participant) {
                self.stats[timeline].suppressed += 1;
                tracing::trace!(timeline, participant = ?event.participant, "touch debounced");
                outcomes.push(ContactOutcome::DebounceSuppressed { timeline });
                continue;
            }

            let multiple = self
                .registry
                .get(timeline)
                .map_or(false, |def| def.touch_multiple);
            if multiple {
                self.schedule(
                    event.timestamp + self.config.touch_settle_delay,
                    TaskKind::ReleaseDebounce {
                        timeline,
                        participant: event.participant,
                    },
                );
            } else {
                self.listeners.unregister(listener);
            }

            if let Some(run) = self.spawn(
                timeline,
                TriggerSource::Touch {
                    emitter: event.emitter,
                },
                Some(event.participant),
                event.timestamp,
                None,
            ) {
                outcomes.push(ContactOutcome::Triggered { timeline, run });
            }
        }
        outcomes
    }

    /// Run every task due at or before `now`. Returns the number of tasks run.
    pub fn advance<K: KeyframeSink + ?Sized>(&mut self, now: f64, sink: &mut K) -> usize {
        for mut task in self.deferred.drain(..) {
            task.due = task.due.max(now);
            self.queue.push(task);
        }
        self.draining = true;

        let mut processed = 0;
        while self.queue.peek().is_some_and(|task| task.due <= now) {
            let Some(task) = self.queue.pop() else {
                break;
            };
            processed += 1;
            self.run_task(task, sink);
        }

        self.draining = false;
        processed
    }

    fn run_task<K: KeyframeSink + ?Sized>(&mut self, task: Task, sink: &mut K) {
        if let Some(run) = task.kind.run().and_then(|id| self.runs.get_mut(id)) {
            run.pending = run.pending.saturating_sub(1);
        }

        match task.kind {
            TaskKind::StartRun(run) => self.start_run(run, task.due),
            TaskKind::DispatchKeyframe { run, keyframe } => {
                self.dispatch_keyframe(run, keyframe, task.due, sink)
            }
            TaskKind::CompleteRun(run) => self.complete_run(run, task.due),
            TaskKind::ReleaseDebounce {
                timeline,
                participant,
            } => {
                if let Some(engaged) = self.debounce.get_mut(timeline) {
                    engaged.remove(&participant);
                }
                tracing::trace!(timeline, ?participant, "touch debounce released");
            }
        }

        if let Some(run) = task.kind.run() {
            self.reap(run);
        }
    }

    fn spawn(
        &mut self,
        timeline: TimelineIndex,
        source: TriggerSource,
        participant: Option<NodeId>,
        now: f64,
        origin: Option<f64>,
    ) -> Option<RunId> {
        let def = self.registry.get(timeline)?;
        let due = now + def.triggers.start_delay();
        tracing::debug!(timeline = %def.name, ?source, ?participant, due, "timeline triggered");

        let mut machine = run_machine();
        machine.send(RunEvent::Trigger);
        let run = self.runs.insert(Run {
            timeline,
            participant,
            source: source.clone(),
            machine,
            started_at: None,
            cycles: 0,
            pending: 0,
        });
        self.stats[timeline].triggered += 1;
        self.events.push(SchedulerEvent::Triggered {
            timeline,
            run,
            source,
            at: now,
        });
        self.schedule_start(run, due, origin);
        Some(run)
    }

    /// Queue a run start. Starts that would happen no later than the start
    /// of the cycle that caused them wait for the next drain and begin at
    /// that drain's time.
    fn schedule_start(&mut self, run: RunId, due: f64, origin: Option<f64>) {
        let zero_period = self.draining && origin.is_some_and(|origin| due <= origin);
        if zero_period {
            let task = self.make_task(due, TaskKind::StartRun(run));
            self.deferred.push(task);
        } else {
            self.schedule(due, TaskKind::StartRun(run));
        }
    }

    fn schedule(&mut self, due: f64, kind: TaskKind) {
        let task = self.make_task(due, kind);
        self.queue.push(task);
    }

    fn make_task(&mut self, due: f64, kind: TaskKind) -> Task {
        if let Some(run) = kind.run().and_then(|id| self.runs.get_mut(id)) {
            run.pending += 1;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Task { due, seq, kind }
    }

    fn start_run(&mut self, run: RunId, at: f64) {
        let Some(entry) = self.runs.get_mut(run) else {
            return;
        };
        if entry.machine.send(RunEvent::Start).is_none() {
            tracing::warn!(?run, state = ?entry.state(), "run cannot start");
            return;
        }
        entry.started_at = Some(at);
        entry.cycles += 1;
        let timeline = entry.timeline;

        let Some(def) = self.registry.get(timeline) else {
            return;
        };
        let duration = def.duration;
        let due: SmallVec<[(f64, usize); 8]> = def
            .keyframes
            .iter()
            .enumerate()
            .filter(|(_, keyframe)| keyframe.is_dispatchable())
            .map(|(index, keyframe)| (at + keyframe.timestamp, index))
            .collect();
        tracing::debug!(timeline = %def.name, at, duration, keyframes = due.len(), "timeline running");

        self.stats[timeline].started += 1;
        self.events.push(SchedulerEvent::Started { timeline, run, at });
        for (when, keyframe) in due {
            self.schedule(when, TaskKind::DispatchKeyframe { run, keyframe });
        }

        if duration.is_infinite() {
            self.complete_run(run, at);
        } else {
            self.schedule(at + duration, TaskKind::CompleteRun(run));
        }
    }

    fn dispatch_keyframe<K: KeyframeSink + ?Sized>(
        &mut self,
        run: RunId,
        keyframe: usize,
        at: f64,
        sink: &mut K,
    ) {
        let Some(entry) = self.runs.get(run) else {
            return;
        };
        let (timeline, participant) = (entry.timeline, entry.participant);
        let Some(def) = self.registry.get(timeline) else {
            return;
        };
        let Some(kf) = def.keyframes.get(keyframe) else {
            return;
        };

        tracing::trace!(timeline = %def.name, function = %kf.function, at, "dispatching keyframe");
        sink.dispatch(def, kf, participant, at);
        self.stats[timeline].dispatched += 1;
        self.events.push(SchedulerEvent::Dispatched {
            timeline,
            run,
            keyframe,
            at,
        });
    }

    fn complete_run(&mut self, run: RunId, at: f64) {
        let Some(entry) = self.runs.get_mut(run) else {
            return;
        };
        if entry.machine.send(RunEvent::Finish).is_none() {
            return;
        }
        let (timeline, participant) = (entry.timeline, entry.participant);
        let origin = entry.started_at.unwrap_or(at);

        let Some(def) = self.registry.get(timeline) else {
            return;
        };
        let loops = def.loops();
        let delay = def.triggers.start_delay();
        let chained: SmallVec<[TimelineIndex; 2]> = self.registry.chained_to(&def.name).collect();
        tracing::debug!(timeline = %def.name, at, chained = chained.len(), loops, "timeline completed");

        self.stats[timeline].completed += 1;
        self.events.push(SchedulerEvent::Completed { timeline, run, at });

        for next in chained {
            self.spawn(
                next,
                TriggerSource::Chain { from: timeline },
                participant,
                at,
                Some(origin),
            );
        }

        if loops {
            if let Some(entry) = self.runs.get_mut(run) {
                entry.machine.send(RunEvent::Loop);
            }
            self.events.push(SchedulerEvent::Looped { timeline, run, at });
            self.schedule_start(run, at + delay, Some(origin));
        }
    }

    /// Forget completed runs with nothing left to do.
    fn reap(&mut self, run: RunId) {
        let finished = self
            .runs
            .get(run)
            .is_some_and(|entry| entry.state() == RunState::Completed && entry.pending == 0);
        if finished {
            self.runs.remove(run);
        }
    }

    pub fn run(&self, run: RunId) -> Option<&Run> {
        self.runs.get(run)
    }

    /// State of a live run, `None` once it has been retired
    pub fn run_state(&self, run: RunId) -> Option<RunState> {
        self.runs.get(run).map(Run::state)
    }

    /// Runs that are scheduled, running or still have keyframes queued
    pub fn active_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn stats(&self, timeline: TimelineIndex) -> TimelineStats {
        self.stats.get(timeline).copied().unwrap_or_default()
    }

    /// Whether `participant` is in the timeline's touch debounce set
    pub fn is_engaged(&self, timeline: TimelineIndex, participant: NodeId) -> bool {
        self.debounce
            .get(timeline)
            .is_some_and(|engaged| engaged.contains(&participant))
    }

    /// Active contact listeners across all timelines
    pub fn touch_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Queued tasks, including deferred ones
    pub fn pending_tasks(&self) -> usize {
        self.queue.len() + self.deferred.len()
    }

    /// Due time of the earliest queued task
    pub fn next_due(&self) -> Option<f64> {
        self.queue
            .peek()
            .map(|task| task.due)
            .into_iter()
            .chain(self.deferred.iter().map(|task| task.due))
            .reduce(f64::min)
    }

    /// Drain the lifecycle notifications collected so far.
    pub fn take_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Entity, TIMELINE_KIND};
    use stagehand_core::{MemoryScene, Pose};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, usize, Option<NodeId>, f64)>,
    }

    impl KeyframeSink for Recorder {
        fn dispatch(&mut self, timeline: &TimelineDef, keyframe: &Keyframe, participant: Option<NodeId>, at: f64) {
            self.calls
                .push((timeline.name.clone(), keyframe.index, participant, at));
        }
    }

    fn message(timestamp: f64) -> Entity {
        Entity::new("Keyframe", "")
            .with_attribute("Function", "Message")
            .with_attribute("Timestamp", timestamp)
            .with_attribute("Text", "hi")
    }

    fn scheduler(entities: Vec<Entity>) -> TimelineScheduler {
        TimelineScheduler::new(Registry::scan(&entities), SchedulerConfig::default())
    }

    fn step_until(
        scheduler: &mut TimelineScheduler,
        sink: &mut Recorder,
        from: f64,
        to: f64,
        dt: f64,
    ) -> f64 {
        let mut now = from;
        while now < to - 1e-9 {
            now += dt;
            scheduler.advance(now, sink);
        }
        now
    }

    #[test]
    fn test_run_machine_transitions() {
        let mut machine = run_machine();
        assert_eq!(machine.send(RunEvent::Start), None);
        assert_eq!(machine.send(RunEvent::Trigger), Some(RunState::Scheduled));
        assert_eq!(machine.send(RunEvent::Start), Some(RunState::Running));
        assert_eq!(machine.send(RunEvent::Loop), None);
        assert_eq!(machine.send(RunEvent::Finish), Some(RunState::Completed));
        assert_eq!(machine.send(RunEvent::Loop), Some(RunState::Scheduled));
    }

    #[test]
    fn test_delay_only_timeline_autostarts() {
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Intro")
            .with_attribute("Delay", 1.0)
            .with_child(message(0.5))
            .with_child(message(2.0))]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();

        scheduler.start(&scene, 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 1.4, 0.1);
        assert!(sink.calls.is_empty());

        step_until(&mut scheduler, &mut sink, 1.4, 3.5, 0.1);
        let times: Vec<f64> = sink.calls.iter().map(|c| c.3).collect();
        assert_eq!(times, vec![1.5, 3.0]);
        assert_eq!(scheduler.stats(0).completed, 1);
        assert_eq!(scheduler.active_runs(), 0);
    }

    #[test]
    fn test_delay_is_start_delay_for_other_triggers() {
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Door")
            .with_attribute("Delay", 0.5)
            .with_attribute("Button", "Lever")
            .with_child(message(0.0))]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();

        scheduler.start(&scene, 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 2.0, 0.25);
        assert!(sink.calls.is_empty());

        let runs = scheduler.press_button("Lever", None, 2.0);
        assert_eq!(runs.len(), 1);
        assert_eq!(scheduler.run_state(runs[0]), Some(RunState::Scheduled));
        step_until(&mut scheduler, &mut sink, 2.0, 3.0, 0.25);
        assert_eq!(sink.calls.len(), 1);
        assert_eq!(sink.calls[0].3, 2.5);
        assert!(scheduler.press_button("Unknown", None, 3.0).is_empty());
    }

    #[test]
    fn test_loop_reenters_scheduled_once_per_duration() {
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Beacon")
            .with_attribute("Button", "On")
            .with_attribute("Loop", true)
            .with_child(message(0.0))
            .with_child(message(2.0))]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);

        let run = scheduler.press_button("On", None, 0.0)[0];
        step_until(&mut scheduler, &mut sink, 0.0, 7.0, 0.5);

        let stats = scheduler.stats(0);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.started, 4);
        assert_eq!(scheduler.run(run).map(Run::cycles), Some(4));
        let loops = scheduler
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, SchedulerEvent::Looped { .. }))
            .count();
        assert_eq!(loops, 3);
        let history = scheduler.run(run).unwrap().history();
        assert!(history
            .iter()
            .any(|(from, event, to)| (*from, *event, *to)
                == (RunState::Completed, RunEvent::Loop, RunState::Scheduled)));
    }

    #[test]
    fn test_zero_duration_loop_runs_once_per_frame() {
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Spin")
            .with_attribute("Button", "Go")
            .with_attribute("Loop", true)
            .with_child(message(0.0))]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);
        scheduler.press_button("Go", None, 0.0);

        for frame in 1..=5 {
            scheduler.advance(frame as f64, &mut sink);
        }
        assert_eq!(sink.calls.len(), 5);
        assert_eq!(scheduler.pending_tasks(), 1);
    }

    #[test]
    fn test_unbounded_timeline_completes_immediately_and_chains() {
        let endless = Entity::new("Keyframe", "")
            .with_attribute("Function", "Tween")
            .with_attribute("Timestamp", 0.0)
            .with_attribute("Length", 1.0)
            .with_attribute("Tween_RepeatCount", -1.0);
        let mut scheduler = scheduler(vec![
            Entity::new(TIMELINE_KIND, "Spin")
                .with_attribute("Button", "Go")
                .with_attribute("Loop", true)
                .with_child(endless),
            Entity::new(TIMELINE_KIND, "After")
                .with_attribute("Chain", "Spin")
                .with_child(message(0.0)),
        ]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);

        scheduler.press_button("Go", None, 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 3.0, 0.5);

        assert_eq!(scheduler.stats(0).completed, 1);
        assert_eq!(scheduler.stats(0).started, 1);
        assert_eq!(scheduler.stats(1).completed, 1);
        assert_eq!(sink.calls.len(), 2);
    }

    #[test]
    fn test_chain_passes_participant() {
        let mut scene = MemoryScene::new();
        let player = scene.add_part("Player", Pose::IDENTITY);
        let mut scheduler = scheduler(vec![
            Entity::new(TIMELINE_KIND, "First")
                .with_attribute("Button", "Go")
                .with_child(message(1.0)),
            Entity::new(TIMELINE_KIND, "Second")
                .with_attribute("Chain", "First")
                .with_child(message(0.5)),
        ]);
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);

        scheduler.press_button("Go", Some(player), 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 2.0, 0.25);

        assert_eq!(sink.calls.len(), 2);
        assert_eq!(sink.calls[1].0, "Second");
        assert_eq!(sink.calls[1].2, Some(player));
        assert_eq!(sink.calls[1].3, 1.5);
    }

    #[test]
    fn test_self_chained_timeline_runs_once() {
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Echo")
            .with_attribute("Button", "Go")
            .with_attribute("Chain", "Echo")
            .with_child(message(0.0))
            .with_child(message(1.0))]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);

        scheduler.press_button("Go", None, 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 5.0, 0.25);

        let stats = scheduler.stats(0);
        assert_eq!(stats.triggered, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(sink.calls.len(), 2);
        assert_eq!(scheduler.active_runs(), 0);
    }

    #[test]
    fn test_looping_timeline_chains_once_per_cycle() {
        let mut scheduler = scheduler(vec![
            Entity::new(TIMELINE_KIND, "Pulse")
                .with_attribute("Button", "Go")
                .with_attribute("Loop", true)
                .with_child(message(0.0))
                .with_child(message(1.0)),
            Entity::new(TIMELINE_KIND, "Flash")
                .with_attribute("Chain", "Pulse")
                .with_child(message(0.0)),
        ]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);

        scheduler.press_button("Go", None, 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 5.5, 0.25);

        let pulse = scheduler.stats(0);
        let flash = scheduler.stats(1);
        assert_eq!(pulse.completed, 5);
        assert_eq!(flash.triggered, pulse.completed);
        assert_eq!(flash.completed, pulse.completed);
        let flashes: Vec<f64> = sink
            .calls
            .iter()
            .filter(|c| c.0 == "Flash")
            .map(|c| c.3)
            .collect();
        assert_eq!(flashes, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_touch_single_locks_participant_and_tears_down_listener() {
        let mut scene = MemoryScene::new();
        let pad_a = scene.add_part("PadA", Pose::IDENTITY);
        let pad_b = scene.add_part("PadB", Pose::IDENTITY);
        scene.add_tag(pad_a, "Pad").unwrap();
        scene.add_tag(pad_b, "Pad").unwrap();
        let p = scene.add_part("P", Pose::IDENTITY);
        let q = scene.add_part("Q", Pose::IDENTITY);

        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Trap")
            .with_attribute("Touch", "Pad")
            .with_child(message(0.0))]);
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);
        assert_eq!(scheduler.touch_listener_count(), 2);

        let touch = |emitter, participant, timestamp| ContactEvent {
            emitter,
            participant,
            timestamp,
        };
        let first = scheduler.contact(&touch(pad_a, p, 0.0));
        assert!(matches!(first[0], ContactOutcome::Triggered { .. }));
        assert_eq!(scheduler.touch_listener_count(), 1);
        assert!(scheduler.contact(&touch(pad_a, p, 0.1)).is_empty());

        step_until(&mut scheduler, &mut sink, 0.0, 5.0, 0.5);
        assert_eq!(
            scheduler.contact(&touch(pad_b, p, 5.0)),
            vec![ContactOutcome::DebounceSuppressed { timeline: 0 }]
        );
        assert!(scheduler.is_engaged(0, p));

        let other = scheduler.contact(&touch(pad_b, q, 5.0));
        assert!(matches!(other[0], ContactOutcome::Triggered { .. }));
        step_until(&mut scheduler, &mut sink, 5.0, 6.0, 0.5);
        assert_eq!(sink.calls.len(), 2);
        assert_eq!(scheduler.touch_listener_count(), 0);
    }

    #[test]
    fn test_touch_multiple_releases_after_settle_delay() {
        let mut scene = MemoryScene::new();
        let pad = scene.add_part("Pad", Pose::IDENTITY);
        scene.add_tag(pad, "Pad").unwrap();
        let p = scene.add_part("P", Pose::IDENTITY);

        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Chime")
            .with_attribute("Touch", "Pad")
            .with_attribute("TouchMultiple", true)
            .with_attribute("Loop", true)
            .with_child(message(0.0))]);
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);

        let touch = |timestamp| ContactEvent {
            emitter: pad,
            participant: p,
            timestamp,
        };
        assert!(matches!(scheduler.contact(&touch(0.0))[0], ContactOutcome::Triggered { .. }));
        step_until(&mut scheduler, &mut sink, 0.0, 0.5, 0.25);
        assert!(matches!(
            scheduler.contact(&touch(0.5))[0],
            ContactOutcome::DebounceSuppressed { .. }
        ));

        step_until(&mut scheduler, &mut sink, 0.5, 1.0, 0.25);
        assert!(!scheduler.is_engaged(0, p));
        assert!(matches!(scheduler.contact(&touch(1.0))[0], ContactOutcome::Triggered { .. }));
        assert_eq!(scheduler.touch_listener_count(), 1);

        step_until(&mut scheduler, &mut sink, 1.0, 4.0, 0.25);
        // Multiple-touch timelines never loop.
        assert_eq!(sink.calls.len(), 2);
        assert_eq!(scheduler.stats(0).suppressed, 1);
    }

    #[test]
    fn test_touch_listeners_are_capped() {
        let mut scene = MemoryScene::new();
        for i in 0..70 {
            let pad = scene.add_part(&format!("Pad{i}"), Pose::IDENTITY);
            scene.add_tag(pad, "Pad").unwrap();
        }
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Floor").with_attribute("Touch", "Pad")]);
        scheduler.start(&scene, 0.0);
        scheduler.start(&scene, 0.0);
        assert_eq!(scheduler.touch_listener_count(), DEFAULT_MAX_TOUCH_LISTENERS);
    }

    #[test]
    fn test_unknown_functions_are_not_dispatched() {
        let mut scheduler = scheduler(vec![Entity::new(TIMELINE_KIND, "Odd")
            .with_attribute("Button", "Go")
            .with_child(
                Entity::new("Keyframe", "")
                    .with_attribute("Function", "Explode")
                    .with_attribute("Timestamp", 1.0),
            )]);
        let scene = MemoryScene::new();
        let mut sink = Recorder::default();
        scheduler.start(&scene, 0.0);
        scheduler.press_button("Go", None, 0.0);
        step_until(&mut scheduler, &mut sink, 0.0, 2.0, 0.5);

        assert!(sink.calls.is_empty());
        assert_eq!(scheduler.stats(0).completed, 1);
    }
}
