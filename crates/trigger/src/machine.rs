//! The trigger state machine, as pure functions.
//!
//! Classification and transition derivation take inputs and return values;
//! callback dispatch and state mutation live in the trigger set. This
//! keeps the machine unit-testable without any DOM or GPU.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Where the scroll position sits relative to the activation window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Before,
    Active,
    After,
}

/// Callback-worthy transitions between phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Before → Active, scrolling forward.
    Enter,
    /// After → Active, scrolling backward.
    EnterBack,
    /// Active → After.
    Leave,
    /// Active → Before.
    LeaveBack,
}

/// Mutable per-trigger state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    pub phase: Phase,
    /// Normalized progress through the window, monotonic with scroll
    /// direction while `Active`.
    pub progress: f32,
    /// Set by the first `Enter` of a `once` trigger; never reset without
    /// explicit re-registration.
    pub has_triggered_once: bool,
}

/// An activation window resolved to scroll-space pixels for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowPixels {
    pub start: f32,
    pub end: f32,
}

impl WindowPixels {
    /// Classify a scroll position against this window.
    ///
    /// The window boundaries themselves are `Active`: sitting exactly at
    /// `start` reports progress 0, exactly at `end` progress 1. A
    /// degenerate window (`end <= start`) classifies as a step function
    /// rather than dividing by zero.
    pub fn classify(&self, scroll_position: f32) -> (Phase, f32) {
        if scroll_position < self.start {
            return (Phase::Before, 0.0);
        }

        let span = self.end - self.start;
        if span <= 0.0 {
            // Degenerate window: at or past the boundary counts as after.
            return if scroll_position > self.end {
                (Phase::After, 1.0)
            } else {
                (Phase::Active, 1.0)
            };
        }

        if scroll_position > self.end {
            (Phase::After, 1.0)
        } else {
            let progress = ((scroll_position - self.start) / span).clamp(0.0, 1.0);
            (Phase::Active, progress)
        }
    }
}

/// Events fired by a phase change, in dispatch order.
///
/// A jump across the whole window in one tick (fast scroll) still fires
/// the pass-through pair so consumers never miss a transition.
pub fn transitions(from: Phase, to: Phase) -> SmallVec<[TriggerEvent; 2]> {
    use Phase::*;
    use TriggerEvent::*;

    let mut events = SmallVec::new();
    match (from, to) {
        (Before, Active) => events.push(Enter),
        (Active, After) => events.push(Leave),
        (After, Active) => events.push(EnterBack),
        (Active, Before) => events.push(LeaveBack),
        (Before, After) => {
            events.push(Enter);
            events.push(Leave);
        }
        (After, Before) => {
            events.push(EnterBack);
            events.push(LeaveBack);
        }
        (Before, Before) | (Active, Active) | (After, After) => {}
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: WindowPixels = WindowPixels {
        start: 400.0,
        end: 1200.0,
    };

    #[test]
    fn test_classify_phases() {
        assert_eq!(WINDOW.classify(0.0), (Phase::Before, 0.0));
        assert_eq!(WINDOW.classify(400.0), (Phase::Active, 0.0));
        assert_eq!(WINDOW.classify(800.0), (Phase::Active, 0.5));
        assert_eq!(WINDOW.classify(1200.0), (Phase::Active, 1.0));
        assert_eq!(WINDOW.classify(1500.0), (Phase::After, 1.0));
    }

    #[test]
    fn test_classify_is_monotonic_in_scroll() {
        let mut previous = -1.0;
        for i in 0..=200 {
            let scroll = i as f32 * 10.0;
            let (_, progress) = WINDOW.classify(scroll);
            assert!(progress >= previous);
            previous = progress;
        }
    }

    #[test]
    fn test_degenerate_window_is_a_step() {
        let window = WindowPixels {
            start: 500.0,
            end: 500.0,
        };
        assert_eq!(window.classify(499.9), (Phase::Before, 0.0));
        assert_eq!(window.classify(500.0), (Phase::Active, 1.0));
        assert_eq!(window.classify(500.1), (Phase::After, 1.0));
    }

    #[test]
    fn test_transition_pairs() {
        use Phase::*;
        use TriggerEvent::*;

        assert_eq!(transitions(Before, Active).as_slice(), &[Enter]);
        assert_eq!(transitions(Active, After).as_slice(), &[Leave]);
        assert_eq!(transitions(After, Active).as_slice(), &[EnterBack]);
        assert_eq!(transitions(Active, Before).as_slice(), &[LeaveBack]);
        assert_eq!(transitions(Before, After).as_slice(), &[Enter, Leave]);
        assert_eq!(transitions(After, Before).as_slice(), &[EnterBack, LeaveBack]);
        assert!(transitions(Active, Active).is_empty());
    }
}
