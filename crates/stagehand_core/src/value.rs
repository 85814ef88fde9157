//! Dynamic property and attribute values
//!
//! Scene properties, key-value attributes and keyframe parameters all carry a
//! [`Value`]. Authored data is JSON, so the enum deserializes untagged:
//! booleans, numbers and strings map directly, `[x, y, z]` arrays become
//! vectors, `{ "r", "g", "b" }` maps become colors and `{ "position" }` maps
//! become poses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{Color, Pose, Vec3};

/// A typed property/attribute value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Vec3(Vec3),
    Color(Color),
    Pose(Pose),
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Vec3(_) => "vec3",
            Value::Color(_) => "color",
            Value::Pose(_) => "pose",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_pose(&self) -> Option<Pose> {
        match self {
            Value::Pose(p) => Some(*p),
            Value::Vec3(v) => Some(Pose::from_position(*v)),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Relative composition `self ∘ delta`.
    ///
    /// Poses compose as rigid transforms, numbers, vectors and colors add.
    /// Returns `None` when the pair has no meaningful composition (text,
    /// booleans, or mismatched kinds).
    pub fn compose(&self, delta: &Value) -> Option<Value> {
        match (self, delta) {
            (Value::Number(a), Value::Number(b)) => Some(Value::Number(a + b)),
            (Value::Vec3(a), Value::Vec3(b)) => Some(Value::Vec3(*a + *b)),
            (Value::Color(a), Value::Color(b)) => Some(Value::Color(*a + *b)),
            (Value::Pose(a), Value::Pose(b)) => Some(Value::Pose(a.compose(b))),
            (Value::Pose(a), Value::Vec3(b)) => Some(Value::Pose(a.translate_local(*b))),
            _ => None,
        }
    }

    /// Interpolate towards `to`. Kinds without a continuous interpolation
    /// (and mismatched kinds) hold `self` until `t` reaches 1.
    pub fn lerp(&self, to: &Value, t: f32) -> Value {
        match (self, to) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + (b - a) * t as f64),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(a.lerp(*b, t)),
            (Value::Color(a), Value::Color(b)) => Value::Color(a.lerp(b, t)),
            (Value::Pose(a), Value::Pose(b)) => Value::Pose(a.lerp(b, t)),
            _ if t >= 1.0 => to.clone(),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Color(c) => write!(f, "rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Value::Pose(p) => write!(
                f,
                "pose(({}, {}, {}), [{}, {}, {}, {}])",
                p.position.x,
                p.position.y,
                p.position.z,
                p.rotation.x,
                p.rotation.y,
                p.rotation.z,
                p.rotation.w
            ),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec3> for Value {
    fn from(value: Vec3) -> Self {
        Value::Vec3(value)
    }
}

impl From<Color> for Value {
    fn from(value: Color) -> Self {
        Value::Color(value)
    }
}

impl From<Pose> for Value {
    fn from(value: Pose) -> Self {
        Value::Pose(value)
    }
}
