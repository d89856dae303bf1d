//! Easing functions for eased scrolls and reveal tweens.

use serde::{Deserialize, Serialize};

/// Easing function applied to a normalized progress value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Exponential ease-out, the usual choice for programmatic scrolls.
    OutExpo,
    CubicBezier(f32, f32, f32, f32),
}

impl Default for Easing {
    fn default() -> Self {
        Self::OutExpo
    }
}

impl Easing {
    /// Apply the easing function. Input outside `[0, 1]` is clamped.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Easing::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Easing::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Easing::OutExpo => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2.0_f32.powf(-10.0 * t)
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier(*x1, *y1, *x2, *y2, t),
        }
    }
}

/// Linear interpolation.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// CSS-style cubic bezier easing: solve the curve parameter for `x = t`
/// by Newton iteration, then evaluate y.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, t: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let sample = |p1: f32, p2: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    };
    let derivative = |p1: f32, p2: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
    };

    let mut s = t;
    for _ in 0..8 {
        let x = sample(x1, x2, s) - t;
        if x.abs() < 1e-5 {
            break;
        }
        let d = derivative(x1, x2, s);
        if d.abs() < 1e-6 {
            break;
        }
        s -= x / d;
        s = s.clamp(0.0, 1.0);
    }

    sample(y1, y2, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear() {
        assert!((Easing::Linear.apply(0.5) - 0.5).abs() < 1e-6);
        assert_eq!(Easing::Linear.apply(-1.0), 0.0);
        assert_eq!(Easing::Linear.apply(2.0), 1.0);
    }

    #[test]
    fn test_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::OutExpo,
            Easing::CubicBezier(0.25, 0.1, 0.25, 1.0),
        ] {
            assert!(easing.apply(0.0).abs() < 1e-3, "{easing:?} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-3, "{easing:?} at 1");
        }
    }

    #[test]
    fn test_monotonic() {
        for easing in [Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut, Easing::OutExpo] {
            let mut previous = 0.0;
            for i in 1..=100 {
                let value = easing.apply(i as f32 / 100.0);
                assert!(value >= previous - 1e-4, "{easing:?} dipped at step {i}");
                previous = value;
            }
        }
    }

    #[test]
    fn test_lerp() {
        assert!((lerp(0.0, 100.0, 0.5) - 50.0).abs() < 1e-6);
        assert!((lerp(0.0, 100.0, 0.0)).abs() < 1e-6);
        assert!((lerp(0.0, 100.0, 1.0) - 100.0).abs() < 1e-6);
    }
}
