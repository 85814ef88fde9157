//! State Machine Runtime
//!
//! Small flat state machines with typed states and events. Supports:
//! - Guards (conditional transitions)
//! - Transition history
//!
//! Timeline runs use this to walk `Idle → Scheduled → Running → Completed`.

use smallvec::SmallVec;

/// A guard that decides whether a transition may fire
pub type Guard = fn() -> bool;

/// A transition in the state machine
#[derive(Clone, Debug)]
pub struct Transition<S, E> {
    pub from_state: S,
    pub event: E,
    pub to_state: S,
    pub guard: Option<Guard>,
}

impl<S, E> Transition<S, E> {
    /// Create a simple transition without guard
    pub fn new(from: S, event: E, to: S) -> Self {
        Self {
            from_state: from,
            event,
            to_state: to,
            guard: None,
        }
    }

    /// Add a guard condition
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// A state machine instance
#[derive(Clone, Debug)]
pub struct StateMachine<S, E> {
    current_state: S,
    transitions: SmallVec<[Transition<S, E>; 6]>,
    /// History of state transitions (for debugging)
    history: Vec<(S, E, S)>,
}

impl<S, E> StateMachine<S, E>
where
    S: Copy + PartialEq,
    E: Copy + PartialEq,
{
    /// Create a new state machine with an initial state and transitions
    pub fn new(initial_state: S, transitions: impl IntoIterator<Item = Transition<S, E>>) -> Self {
        Self {
            current_state: initial_state,
            transitions: transitions.into_iter().collect(),
            history: Vec::new(),
        }
    }

    /// Get the current state
    pub fn current_state(&self) -> S {
        self.current_state
    }

    /// Check if we're in a specific state
    pub fn is_in(&self, state: S) -> bool {
        self.current_state == state
    }

    /// Get transition history
    pub fn history(&self) -> &[(S, E, S)] {
        &self.history
    }

    /// Clear transition history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn find(&self, event: E) -> Option<&Transition<S, E>> {
        let current = self.current_state;
        self.transitions.iter().find(|t| {
            t.from_state == current && t.event == event && t.guard.map_or(true, |guard| guard())
        })
    }

    /// Check if an event can trigger a transition from current state
    pub fn can_send(&self, event: E) -> bool {
        self.find(event).is_some()
    }

    /// Send an event, returning the new state if a transition fired
    pub fn send(&mut self, event: E) -> Option<S> {
        let current = self.current_state;
        let to_state = self.find(event)?.to_state;
        self.current_state = to_state;
        self.history.push((current, event, to_state));
        Some(to_state)
    }
}
