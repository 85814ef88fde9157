//! Keyframe parsing and timeline duration
//!
//! Keyframe attributes live in three namespaces:
//!
//! | key          | meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `Prop_X`     | override for node property `X`                       |
//! | `Attr_X`     | override for key-value attribute `X`                 |
//! | `Tween_X`    | tween parameter: `Style`, `Direction`, `RepeatCount`, `Reverses`, `Delay` |
//!
//! Every other key is a parameter of the keyframe's operation (`Offset`,
//! `Space`, `Relative`, `Text`, ...). `Function`, `Timestamp` and `Length`
//! are reserved.

use indexmap::IndexMap;
use stagehand_animation::{Easing, EasingDirection, EasingStyle, SpaceMode, TweenInfo};
use stagehand_core::{Value, Vec3};

use crate::data::{Entity, EntityTarget};
use crate::error::{Result, TimelineError};

const PROPERTY_PREFIX: &str = "Prop_";
const ATTRIBUTE_PREFIX: &str = "Attr_";
const TWEEN_PREFIX: &str = "Tween_";

/// Tween parameters of a keyframe
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TweenParams {
    pub easing: Easing,
    /// Extra cycles, `-1` forever
    pub repeat_count: i32,
    pub reverses: bool,
    pub delay: f64,
}

impl Default for TweenParams {
    fn default() -> Self {
        Self {
            easing: Easing::default(),
            repeat_count: 0,
            reverses: false,
            delay: 0.0,
        }
    }
}

/// The closed set of keyframe operations
#[derive(Clone, Debug, PartialEq)]
pub enum KeyframeOp {
    /// Incremental move of the target by `offset`
    Move { offset: Vec3, space: SpaceMode },
    /// Property/attribute change on the target
    Tween { relative: bool, descendants: bool },
    /// On-screen message to the participant
    Message { text: String },
    /// Point the participant's camera at the target
    CameraFocus,
    CameraShake { intensity: f64 },
    Sound { sound: String, volume: f64 },
    /// Relocate the participant to the destination node's pose
    Teleport { destination: Option<String> },
}

impl KeyframeOp {
    /// Parse an operation from a function name and its parameters. Unknown
    /// function names yield `Ok(None)`.
    fn parse(
        function: &str,
        params: &IndexMap<String, Value>,
        target: Option<&EntityTarget>,
    ) -> std::result::Result<Option<Self>, String> {
        let op = match function {
            "Move" => KeyframeOp::Move {
                offset: params
                    .get("Offset")
                    .and_then(Value::as_vec3)
                    .ok_or("Move needs a vector `Offset`")?,
                space: match params.get("Space").map(|v| v.as_str()) {
                    None => SpaceMode::World,
                    Some(Some(s)) if s.eq_ignore_ascii_case("local") => SpaceMode::Local,
                    Some(Some(s)) if s.eq_ignore_ascii_case("world") => SpaceMode::World,
                    Some(_) => return Err("`Space` must be \"Local\" or \"World\"".into()),
                },
            },
            "Tween" => KeyframeOp::Tween {
                relative: flag(params, "Relative")?,
                descendants: flag(params, "Descendants")?,
            },
            "Message" => KeyframeOp::Message {
                text: match (params.get("Text"), target) {
                    (Some(Value::Text(text)), _) => text.clone(),
                    (None, Some(EntityTarget::Value(Value::Text(text)))) => text.clone(),
                    _ => return Err("Message needs a text `Text` or text target".into()),
                },
            },
            "CameraFocus" => KeyframeOp::CameraFocus,
            "CameraShake" => KeyframeOp::CameraShake {
                intensity: number(params, "Intensity", 1.0)?,
            },
            "Sound" => KeyframeOp::Sound {
                sound: params
                    .get("Sound")
                    .and_then(Value::as_str)
                    .ok_or("Sound needs a text `Sound`")?
                    .to_string(),
                volume: number(params, "Volume", 1.0)?,
            },
            "Teleport" => KeyframeOp::Teleport {
                destination: match params.get("Destination") {
                    None => None,
                    Some(Value::Text(name)) => Some(name.clone()),
                    Some(_) => return Err("`Destination` must be a node name".into()),
                },
            },
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyframeOp::Move { .. } => "Move",
            KeyframeOp::Tween { .. } => "Tween",
            KeyframeOp::Message { .. } => "Message",
            KeyframeOp::CameraFocus => "CameraFocus",
            KeyframeOp::CameraShake { .. } => "CameraShake",
            KeyframeOp::Sound { .. } => "Sound",
            KeyframeOp::Teleport { .. } => "Teleport",
        }
    }
}

fn flag(params: &IndexMap<String, Value>, name: &str) -> std::result::Result<bool, String> {
    match params.get(name) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(format!("`{name}` must be a bool, got {}", other.kind())),
    }
}

fn number(params: &IndexMap<String, Value>, name: &str, default: f64) -> std::result::Result<f64, String> {
    match params.get(name) {
        None => Ok(default),
        Some(Value::Number(n)) if n.is_finite() => Ok(*n),
        Some(other) => Err(format!("`{name}` must be a finite number, got {other}")),
    }
}

/// A parsed keyframe
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    /// Position among the timeline's children
    pub index: usize,
    pub function: String,
    /// Seconds after run start
    pub timestamp: f64,
    /// Seconds, `0` means instantaneous
    pub length: f64,
    pub target: Option<EntityTarget>,
    /// `None` for unrecognised functions
    pub op: Option<KeyframeOp>,
    pub tween: TweenParams,
    /// `Prop_` entries, prefix stripped
    pub properties: IndexMap<String, Value>,
    /// `Attr_` entries, prefix stripped
    pub attributes: IndexMap<String, Value>,
    /// Unprefixed operation parameters
    pub params: IndexMap<String, Value>,
}

impl Keyframe {
    /// Parse a keyframe entity of `timeline`.
    pub fn parse(timeline: &str, index: usize, entity: &Entity) -> Result<Self> {
        let malformed = |reason: String| TimelineError::MalformedKeyframe {
            timeline: timeline.to_string(),
            index,
            reason,
        };

        let function = entity
            .attribute("Function")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("`Function` must be a string".into()))?
            .to_string();
        let timestamp = entity
            .attribute("Timestamp")
            .and_then(Value::as_number)
            .ok_or_else(|| malformed("`Timestamp` must be a number".into()))?;
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(malformed(format!("`Timestamp` must be >= 0, got {timestamp}")));
        }
        let length = match entity.attribute("Length") {
            None => 0.0,
            Some(Value::Number(n)) if n.is_finite() && *n >= 0.0 => *n,
            Some(other) => return Err(malformed(format!("`Length` must be >= 0, got {other}"))),
        };

        let mut properties = IndexMap::new();
        let mut attributes = IndexMap::new();
        let mut tween_values = IndexMap::new();
        let mut params = IndexMap::new();
        for (key, value) in &entity.attributes {
            if let Some(name) = key.strip_prefix(PROPERTY_PREFIX) {
                properties.insert(name.to_string(), value.clone());
            } else if let Some(name) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                attributes.insert(name.to_string(), value.clone());
            } else if let Some(name) = key.strip_prefix(TWEEN_PREFIX) {
                tween_values.insert(name.to_string(), value.clone());
            } else if !matches!(key.as_str(), "Function" | "Timestamp" | "Length") {
                params.insert(key.clone(), value.clone());
            }
        }

        let tween = parse_tween(&tween_values).map_err(malformed)?;
        let op = KeyframeOp::parse(&function, &params, entity.target.as_ref()).map_err(malformed)?;
        if matches!(op, Some(KeyframeOp::Move { .. })) && (tween.repeat_count != 0 || tween.reverses) {
            return Err(malformed("Move does not repeat or reverse".into()));
        }
        if op.is_none() {
            tracing::debug!(timeline, index, function = %function, "unknown keyframe function, never dispatched");
        }

        Ok(Self {
            index,
            function,
            timestamp,
            length,
            target: entity.target.clone(),
            op,
            tween,
            properties,
            attributes,
            params,
        })
    }

    /// `length × (repeat_count + 1) × (reverses ? 2 : 1)`, `+∞` for endless
    /// repeats.
    pub fn effective_length(&self) -> f64 {
        if self.tween.repeat_count < 0 {
            return f64::INFINITY;
        }
        let legs = if self.tween.reverses { 2.0 } else { 1.0 };
        self.length * f64::from(self.tween.repeat_count + 1) * legs
    }

    /// End of this keyframe relative to run start.
    pub fn end(&self) -> f64 {
        self.timestamp + self.effective_length()
    }

    /// Tween timing, or `None` for instantaneous keyframes.
    pub fn tween_info(&self) -> Option<TweenInfo> {
        (self.length > 0.0).then(|| TweenInfo {
            duration: self.length,
            easing: self.tween.easing,
            repeat_count: self.tween.repeat_count,
            reverses: self.tween.reverses,
            delay: self.tween.delay,
        })
    }

    /// Name of the target node, if the target is a node reference.
    pub fn target_node(&self) -> Option<&str> {
        match &self.target {
            Some(EntityTarget::Node { node }) => Some(node),
            _ => None,
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        self.op.is_some()
    }
}

fn parse_tween(values: &IndexMap<String, Value>) -> std::result::Result<TweenParams, String> {
    let mut params = TweenParams::default();
    for (name, value) in values {
        match (name.as_str(), value) {
            ("Style", Value::Text(s)) => {
                params.easing.style = s.parse::<EasingStyle>().map_err(|e| e.to_string())?
            }
            ("Direction", Value::Text(s)) => {
                params.easing.direction = s.parse::<EasingDirection>().map_err(|e| e.to_string())?
            }
            ("RepeatCount", Value::Number(n)) if n.fract() == 0.0 && *n >= -1.0 && *n <= i32::MAX as f64 => {
                params.repeat_count = *n as i32
            }
            ("Reverses", Value::Bool(b)) => params.reverses = *b,
            ("Delay", Value::Number(n)) if n.is_finite() && *n >= 0.0 => params.delay = *n,
            ("Style" | "Direction" | "RepeatCount" | "Reverses" | "Delay", other) => {
                return Err(format!("`Tween_{name}` has an unusable value {other}"));
            }
            _ => tracing::debug!(parameter = %name, "ignoring unknown tween parameter"),
        }
    }
    Ok(params)
}

/// Duration of a set of keyframes: the latest keyframe end, `0` when empty
/// and `+∞` when any keyframe repeats forever.
pub fn timeline_duration(keyframes: &[Keyframe]) -> f64 {
    keyframes.iter().map(Keyframe::end).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframe(function: &str, timestamp: f64) -> Entity {
        Entity::new("Keyframe", "")
            .with_attribute("Function", function)
            .with_attribute("Timestamp", timestamp)
    }

    #[test]
    fn test_namespaces_are_split() {
        let entity = keyframe("Tween", 1.0)
            .with_attribute("Length", 2.0)
            .with_attribute("Prop_Brightness", 4.0)
            .with_attribute("Attr_Kind", "Lava")
            .with_attribute("Tween_Style", "Quad")
            .with_attribute("Tween_Direction", "InOut")
            .with_attribute("Tween_Reverses", true)
            .with_attribute("Relative", true);
        let kf = Keyframe::parse("Lights", 0, &entity).unwrap();

        assert_eq!(kf.properties.get("Brightness"), Some(&Value::Number(4.0)));
        assert_eq!(kf.attributes.get("Kind"), Some(&Value::from("Lava")));
        assert_eq!(kf.params.len(), 1);
        assert_eq!(kf.tween.easing, Easing::new(EasingStyle::Quad, EasingDirection::InOut));
        assert_eq!(
            kf.op,
            Some(KeyframeOp::Tween {
                relative: true,
                descendants: false
            })
        );
        assert_eq!(kf.effective_length(), 4.0);
        assert_eq!(kf.tween_info().map(|t| t.duration), Some(2.0));
    }

    #[test]
    fn test_missing_function_or_timestamp_is_malformed() {
        let no_function = Entity::new("Keyframe", "").with_attribute("Timestamp", 0.0);
        assert!(matches!(
            Keyframe::parse("T", 3, &no_function),
            Err(TimelineError::MalformedKeyframe { index: 3, .. })
        ));

        let text_timestamp = keyframe("Move", 0.0).with_attribute("Timestamp", "soon");
        assert!(Keyframe::parse("T", 0, &text_timestamp).is_err());

        let negative = keyframe("Message", -1.0).with_attribute("Text", "hi");
        assert!(Keyframe::parse("T", 0, &negative).is_err());
    }

    #[test]
    fn test_unknown_function_counts_but_does_not_dispatch() {
        let kf = Keyframe::parse("T", 0, &keyframe("Explode", 3.0).with_attribute("Length", 1.0)).unwrap();
        assert!(kf.op.is_none());
        assert!(!kf.is_dispatchable());
        assert_eq!(timeline_duration(&[kf]), 4.0);
    }

    #[test]
    fn test_duration_takes_latest_end() {
        let a = Keyframe::parse(
            "T",
            0,
            &keyframe("Tween", 1.0)
                .with_attribute("Length", 2.0)
                .with_attribute("Tween_RepeatCount", 2.0),
        )
        .unwrap();
        let b = Keyframe::parse("T", 1, &keyframe("Message", 5.0).with_attribute("Text", "go")).unwrap();

        let keyframes = vec![a, b];
        assert_eq!(timeline_duration(&keyframes), 7.0);
        assert_eq!(timeline_duration(&keyframes), timeline_duration(&keyframes));
        assert_eq!(timeline_duration(&[]), 0.0);
    }

    #[test]
    fn test_move_accepts_delay_but_not_repeats() {
        let base = || {
            keyframe("Move", 0.0)
                .with_attribute("Length", 1.0)
                .with_attribute("Offset", Vec3::UP)
        };

        let delayed = Keyframe::parse("T", 0, &base().with_attribute("Tween_Delay", 0.5)).unwrap();
        assert_eq!(delayed.tween.delay, 0.5);

        for entity in [
            base().with_attribute("Tween_RepeatCount", 2.0),
            base().with_attribute("Tween_RepeatCount", -1.0),
            base().with_attribute("Tween_Reverses", true),
        ] {
            assert!(matches!(
                Keyframe::parse("T", 4, &entity),
                Err(TimelineError::MalformedKeyframe { index: 4, .. })
            ));
        }
    }

    #[test]
    fn test_endless_repeat_is_unbounded() {
        let kf = Keyframe::parse(
            "T",
            0,
            &keyframe("Tween", 0.0)
                .with_attribute("Length", 1.0)
                .with_attribute("Tween_RepeatCount", -1.0),
        )
        .unwrap();
        assert!(timeline_duration(&[kf]).is_infinite());
    }

    #[test]
    fn test_operation_parameters() {
        let kf = Keyframe::parse(
            "T",
            0,
            &keyframe("Move", 0.0)
                .with_attribute("Offset", Vec3::new(1.0, 2.0, 3.0))
                .with_attribute("Space", "Local"),
        )
        .unwrap();
        assert_eq!(
            kf.op,
            Some(KeyframeOp::Move {
                offset: Vec3::new(1.0, 2.0, 3.0),
                space: SpaceMode::Local
            })
        );

        let message = keyframe("Message", 0.0).with_target(EntityTarget::Value(Value::from("Welcome")));
        assert_eq!(
            Keyframe::parse("T", 0, &message).unwrap().op,
            Some(KeyframeOp::Message {
                text: "Welcome".into()
            })
        );

        let bad_move = keyframe("Move", 0.0).with_attribute("Offset", 3.0);
        assert!(Keyframe::parse("T", 0, &bad_move).is_err());

        let bad_style = keyframe("Tween", 0.0).with_attribute("Tween_Style", "Wobbly");
        assert!(Keyframe::parse("T", 0, &bad_style).is_err());
    }
}
