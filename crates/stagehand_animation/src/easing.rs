//! Easing functions for animations
//!
//! An easing is a curve ([`EasingStyle`]) paired with a direction
//! ([`EasingDirection`]). Each style is defined by its "in" shape; `Out` and
//! `InOut` are derived from it. [`evaluate`] is exact at both ends: progress
//! 0 maps to 0 and progress 1 maps to 1 for every pair, which the
//! incremental translation ledger relies on to land segments precisely.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Easing curve shape
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EasingStyle {
    #[default]
    Linear,
    Sine,
    Quad,
    Cubic,
    Quart,
    Quint,
    Exponential,
    Circular,
    /// Overshoots slightly before settling
    Back,
    Bounce,
    /// Oscillates around the endpoint
    Elastic,
}

/// Which end of the curve carries the easing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EasingDirection {
    In,
    #[default]
    Out,
    InOut,
}

/// Unknown easing name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown easing `{0}`")]
pub struct UnknownEasing(pub String);

impl FromStr for EasingStyle {
    type Err = UnknownEasing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "linear" => EasingStyle::Linear,
            "sine" => EasingStyle::Sine,
            "quad" => EasingStyle::Quad,
            "cubic" => EasingStyle::Cubic,
            "quart" => EasingStyle::Quart,
            "quint" => EasingStyle::Quint,
            "exponential" => EasingStyle::Exponential,
            "circular" => EasingStyle::Circular,
            "back" => EasingStyle::Back,
            "bounce" => EasingStyle::Bounce,
            "elastic" => EasingStyle::Elastic,
            _ => return Err(UnknownEasing(s.to_string())),
        })
    }
}

impl FromStr for EasingDirection {
    type Err = UnknownEasing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "in" => EasingDirection::In,
            "out" => EasingDirection::Out,
            "inout" | "in_out" => EasingDirection::InOut,
            _ => return Err(UnknownEasing(s.to_string())),
        })
    }
}

impl fmt::Display for EasingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for EasingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Curve and direction bundled together
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Easing {
    pub style: EasingStyle,
    pub direction: EasingDirection,
}

impl Easing {
    pub const LINEAR: Easing = Easing {
        style: EasingStyle::Linear,
        direction: EasingDirection::InOut,
    };

    pub const fn new(style: EasingStyle, direction: EasingDirection) -> Self {
        Self { style, direction }
    }

    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        evaluate(t, self.style, self.direction)
    }
}

/// Map linear progress in `[0, 1]` to eased progress.
///
/// Out-of-range input is clamped. `Back` and `Elastic` may return values
/// slightly outside `[0, 1]` between the endpoints.
pub fn evaluate(progress: f32, style: EasingStyle, direction: EasingDirection) -> f32 {
    if progress.is_nan() || progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    match direction {
        EasingDirection::In => ease_in(style, progress),
        EasingDirection::Out => 1.0 - ease_in(style, 1.0 - progress),
        EasingDirection::InOut => {
            if progress < 0.5 {
                ease_in(style, progress * 2.0) / 2.0
            } else {
                1.0 - ease_in(style, (1.0 - progress) * 2.0) / 2.0
            }
        }
    }
}

/// The "in" shape of each style.
fn ease_in(style: EasingStyle, t: f32) -> f32 {
    match style {
        EasingStyle::Linear => t,
        EasingStyle::Sine => 1.0 - (t * PI / 2.0).cos(),
        EasingStyle::Quad => t * t,
        EasingStyle::Cubic => t * t * t,
        EasingStyle::Quart => t.powi(4),
        EasingStyle::Quint => t.powi(5),
        EasingStyle::Exponential => {
            if t <= 0.0 {
                0.0
            } else {
                2f32.powf(10.0 * t - 10.0)
            }
        }
        EasingStyle::Circular => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        EasingStyle::Back => {
            const C1: f32 = 1.70158;
            const C3: f32 = C1 + 1.0;
            C3 * t * t * t - C1 * t * t
        }
        EasingStyle::Bounce => 1.0 - bounce_out(1.0 - t),
        EasingStyle::Elastic => {
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else {
                const C4: f32 = (2.0 * PI) / 3.0;
                -(2f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * C4).sin()
            }
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}
