use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shape of a fade over normalized time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    #[default]
    Linear,
    /// Slow start, fast end.
    EaseIn,
    /// Fast start, slow end.
    EaseOut,
    EaseInOut,
    /// Holds the start value until the end.
    Step,
}

impl FadeCurve {
    /// Maps `t` in [0, 1] to an eased value in [0, 1]. Out-of-range input is clamped.
    pub fn apply(self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EaseIn => t * t,
            FadeCurve::EaseOut => {
                let rest = 1.0 - t;
                1.0 - rest * rest
            }
            FadeCurve::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    let rest = 1.0 - t;
                    1.0 - 2.0 * rest * rest
                }
            }
            FadeCurve::Step => {
                if t >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}
