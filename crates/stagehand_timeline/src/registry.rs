//! Timeline registry and validator
//!
//! Scans an entity tree once, keeps every well-formed timeline and records a
//! diagnostic for everything it had to skip. A timeline is kept when it is of
//! kind `Timeline` and declares at least one trigger; malformed keyframes are
//! dropped individually without rejecting their timeline.

use stagehand_core::Value;

use crate::data::Entity;
use crate::error::TimelineError;
use crate::keyframe::{timeline_duration, Keyframe};

/// Index of a timeline inside its [`Registry`]
pub type TimelineIndex = usize;

/// Trigger attributes of a timeline
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Triggers {
    /// Start delay in seconds; auto-starts the timeline when it is the only
    /// trigger
    pub delay: Option<f64>,
    /// External button signal id
    pub button: Option<String>,
    /// Tag of the contact emitters
    pub touch: Option<String>,
    /// Name of the timeline whose completion starts this one
    pub chain: Option<String>,
}

impl Triggers {
    pub fn is_empty(&self) -> bool {
        self.delay.is_none() && self.button.is_none() && self.touch.is_none() && self.chain.is_none()
    }

    /// Only `Delay` is declared
    pub fn is_delay_only(&self) -> bool {
        self.delay.is_some() && self.button.is_none() && self.touch.is_none() && self.chain.is_none()
    }

    pub fn start_delay(&self) -> f64 {
        self.delay.unwrap_or(0.0)
    }
}

/// A validated timeline
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineDef {
    pub name: String,
    pub triggers: Triggers,
    /// Repeat on completion
    pub looped: bool,
    /// Touch may re-trigger per participant after the settle delay
    pub touch_multiple: bool,
    /// Valid keyframes in authored order
    pub keyframes: Vec<Keyframe>,
    /// Seconds, `+∞` when unbounded
    pub duration: f64,
}

impl TimelineDef {
    fn from_entity(entity: &Entity, diagnostics: &mut Vec<TimelineError>) -> Option<Self> {
        let name = entity.name.clone();
        let mut bad = |attribute: &str, expected: &'static str| {
            diagnostics.push(TimelineError::BadAttribute {
                timeline: name.clone(),
                attribute: attribute.to_string(),
                expected,
            })
        };

        let delay = match entity.attribute("Delay") {
            None => None,
            Some(Value::Number(n)) if n.is_finite() && *n >= 0.0 => Some(*n),
            Some(_) => {
                bad("Delay", "a non-negative number");
                None
            }
        };
        let button = match entity.attribute("Button") {
            None => None,
            Some(Value::Text(id)) => Some(id.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                bad("Button", "a button id");
                None
            }
        };
        let mut text = |attribute: &str| match entity.attribute(attribute) {
            None => None,
            Some(Value::Text(s)) => Some(s.clone()),
            Some(_) => {
                bad(attribute, "a string");
                None
            }
        };
        let touch = text("Touch");
        let chain = text("Chain");
        let mut boolean = |attribute: &str| match entity.attribute(attribute) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                bad(attribute, "a bool");
                false
            }
        };
        let looped = boolean("Loop");
        let touch_multiple = boolean("TouchMultiple");

        let triggers = Triggers {
            delay,
            button,
            touch,
            chain,
        };
        if triggers.is_empty() {
            diagnostics.push(TimelineError::NoTrigger {
                timeline: entity.name.clone(),
            });
            return None;
        }

        let keyframes: Vec<Keyframe> = entity
            .children
            .iter()
            .enumerate()
            .filter_map(|(index, child)| match Keyframe::parse(&entity.name, index, child) {
                Ok(keyframe) => Some(keyframe),
                Err(err) => {
                    diagnostics.push(err);
                    None
                }
            })
            .collect();
        let duration = timeline_duration(&keyframes);

        Some(Self {
            name: entity.name.clone(),
            triggers,
            looped,
            touch_multiple,
            keyframes,
            duration,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.duration.is_infinite()
    }

    /// Whether a completed run goes around again
    pub fn loops(&self) -> bool {
        self.looped && !self.is_unbounded() && !self.touch_multiple
    }
}

/// The set of valid timelines and the diagnostics of everything skipped
#[derive(Debug, Default)]
pub struct Registry {
    timelines: Vec<TimelineDef>,
    diagnostics: Vec<TimelineError>,
}

impl Registry {
    /// Scan an entity tree for timelines.
    pub fn scan(entities: &[Entity]) -> Self {
        let mut registry = Self::default();
        for entity in entities {
            registry.visit(entity);
        }
        for diagnostic in &registry.diagnostics {
            tracing::warn!(%diagnostic, "skipped timeline data");
        }
        tracing::debug!(
            timelines = registry.timelines.len(),
            skipped = registry.diagnostics.len(),
            "timeline registry built"
        );
        registry
    }

    fn visit(&mut self, entity: &Entity) {
        if entity.is_timeline() {
            if let Some(def) = TimelineDef::from_entity(entity, &mut self.diagnostics) {
                self.timelines.push(def);
            }
            return;
        }
        for child in &entity.children {
            self.visit(child);
        }
    }

    pub fn timelines(&self) -> &[TimelineDef] {
        &self.timelines
    }

    pub fn get(&self, index: TimelineIndex) -> Option<&TimelineDef> {
        self.timelines.get(index)
    }

    /// Index of the first timeline called `name`
    pub fn find(&self, name: &str) -> Option<TimelineIndex> {
        self.timelines.iter().position(|t| t.name == name)
    }

    /// Timelines chained to the completion of `name`. A timeline chained to
    /// itself is not included.
    pub fn chained_to<'a>(&'a self, name: &'a str) -> impl Iterator<Item = TimelineIndex> + 'a {
        self.timelines
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.triggers.chain.as_deref() == Some(name) && t.name != name)
            .map(|(index, _)| index)
    }

    pub fn diagnostics(&self) -> &[TimelineError] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TIMELINE_KIND;

    fn message(timestamp: f64) -> Entity {
        Entity::new("Keyframe", "")
            .with_attribute("Function", "Message")
            .with_attribute("Timestamp", timestamp)
            .with_attribute("Text", "hi")
    }

    #[test]
    fn test_scan_keeps_triggered_timelines() {
        let tree = vec![Entity::new("Folder", "Level")
            .with_child(
                Entity::new(TIMELINE_KIND, "Intro")
                    .with_attribute("Delay", 2.0)
                    .with_child(message(1.0))
                    .with_child(message(3.0)),
            )
            .with_child(Entity::new(TIMELINE_KIND, "Untriggered").with_child(message(0.0)))
            .with_child(Entity::new("Model", "Decoy").with_attribute("Delay", 1.0))];

        let registry = Registry::scan(&tree);
        assert_eq!(registry.len(), 1);
        let intro = &registry.timelines()[0];
        assert_eq!(intro.name, "Intro");
        assert!(intro.triggers.is_delay_only());
        assert_eq!(intro.duration, 3.0);
        assert!(matches!(
            registry.diagnostics()[0],
            TimelineError::NoTrigger { .. }
        ));
    }

    #[test]
    fn test_malformed_keyframes_are_skipped() {
        let tree = vec![Entity::new(TIMELINE_KIND, "Door")
            .with_attribute("Button", "Lever")
            .with_child(message(1.0))
            .with_child(Entity::new("Keyframe", "").with_attribute("Function", "Message"))
            .with_child(message(4.0))];

        let registry = Registry::scan(&tree);
        let door = registry.get(0).unwrap();
        assert_eq!(door.keyframes.len(), 2);
        assert_eq!(door.keyframes[1].index, 2);
        assert_eq!(door.duration, 4.0);
        assert!(matches!(
            registry.diagnostics()[0],
            TimelineError::MalformedKeyframe { index: 1, .. }
        ));
    }

    #[test]
    fn test_chain_lookup_and_loop_rules() {
        let tree = vec![
            Entity::new(TIMELINE_KIND, "A").with_attribute("Button", 7.0),
            Entity::new(TIMELINE_KIND, "B")
                .with_attribute("Chain", "A")
                .with_attribute("Loop", true),
            Entity::new(TIMELINE_KIND, "C")
                .with_attribute("Touch", "Pad")
                .with_attribute("TouchMultiple", true)
                .with_attribute("Loop", true),
        ];
        let registry = Registry::scan(&tree);

        assert_eq!(registry.get(0).unwrap().triggers.button.as_deref(), Some("7"));
        assert_eq!(registry.chained_to("A").collect::<Vec<_>>(), vec![1]);
        assert!(registry.get(1).unwrap().loops());
        assert!(!registry.get(2).unwrap().loops());
        assert_eq!(registry.find("C"), Some(2));
    }

    #[test]
    fn test_self_chain_is_not_a_successor() {
        let tree = vec![
            Entity::new(TIMELINE_KIND, "Echo")
                .with_attribute("Button", "Go")
                .with_attribute("Chain", "Echo"),
            Entity::new(TIMELINE_KIND, "Reply").with_attribute("Chain", "Echo"),
        ];
        let registry = Registry::scan(&tree);

        assert_eq!(registry.chained_to("Echo").collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_mistyped_trigger_is_reported() {
        let tree = vec![Entity::new(TIMELINE_KIND, "Odd")
            .with_attribute("Touch", 5.0)
            .with_attribute("Chain", "Intro")];
        let registry = Registry::scan(&tree);

        assert_eq!(registry.len(), 1);
        assert!(registry.get(0).unwrap().triggers.touch.is_none());
        assert!(matches!(
            registry.diagnostics()[0],
            TimelineError::BadAttribute { .. }
        ));
    }
}
