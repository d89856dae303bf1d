//! Trigger configuration surface.

use crate::spec::{Boundary, TriggerError};
use serde::{Deserialize, Serialize};

/// Scrub mode: `false` (one-shot transitions), `true` (progress drives a
/// timeline directly), or a number (progress drives a timeline through a
/// smoothing lag of that many seconds). Mirrors the `boolean | number`
/// configuration value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scrub {
    Flag(bool),
    Smooth(f32),
}

impl Default for Scrub {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl Scrub {
    /// Whether progress should drive a timeline position.
    pub fn is_active(&self) -> bool {
        match self {
            Scrub::Flag(flag) => *flag,
            Scrub::Smooth(_) => true,
        }
    }

    /// Smoothing lag in seconds, when configured numerically.
    pub fn smoothing(&self) -> Option<f32> {
        match self {
            Scrub::Flag(_) => None,
            Scrub::Smooth(lag) => Some(*lag),
        }
    }
}

/// Configuration for one trigger. Immutable per registration; changing it
/// means re-registering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerOptions {
    /// Start boundary spec, e.g. `"top bottom"`.
    pub start: String,
    /// End boundary spec, e.g. `"bottom top"`.
    pub end: String,
    pub scrub: Scrub,
    /// Fire `on_enter` once, then freeze the trigger permanently.
    pub once: bool,
    /// Produce a debug marker snapshot each tick. Debug-only; no
    /// production behavior depends on it.
    pub markers: bool,
    /// Suppress all evaluation without destroying the registration
    /// (reduced-motion or mobile fallback).
    pub disabled: bool,
    /// Hold the element fixed in the viewport while progress advances.
    /// Accepted and recorded, but not yet evaluated; see `TriggerSet`.
    pub pin: bool,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            start: "top bottom".to_string(),
            end: "bottom top".to_string(),
            scrub: Scrub::default(),
            once: false,
            markers: false,
            disabled: false,
            pin: false,
        }
    }
}

impl TriggerOptions {
    /// Parse both boundary specs, failing fast at registration time.
    pub fn boundaries(&self) -> Result<(Boundary, Boundary), TriggerError> {
        Ok((self.start.parse()?, self.end.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TriggerOptions::default();
        assert_eq!(options.start, "top bottom");
        assert_eq!(options.end, "bottom top");
        assert!(!options.scrub.is_active());
        assert!(!options.once);
        options.boundaries().unwrap();
    }

    #[test]
    fn test_scrub_from_json() {
        let flag: TriggerOptions = serde_json::from_str(r#"{ "scrub": true }"#).unwrap();
        assert!(flag.scrub.is_active());
        assert_eq!(flag.scrub.smoothing(), None);

        let smooth: TriggerOptions = serde_json::from_str(r#"{ "scrub": 0.5 }"#).unwrap();
        assert!(smooth.scrub.is_active());
        assert_eq!(smooth.scrub.smoothing(), Some(0.5));
    }

    #[test]
    fn test_invalid_spec_fails_at_parse() {
        let options = TriggerOptions {
            start: "sideways bottom".to_string(),
            ..Default::default()
        };
        assert!(options.boundaries().is_err());
    }
}
