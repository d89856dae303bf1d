//! Activation window edge specs.
//!
//! A boundary is written `"<elementEdge> <viewportEdge>"`: the window
//! boundary is the scroll position at which the named element edge meets
//! the named viewport edge. `"top bottom"` is the moment the element's top
//! enters at the bottom of the viewport.

use common::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from trigger configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Invalid edge `{0}`: expected top, center, or bottom")]
    InvalidEdge(String),
    #[error("Invalid boundary spec `{0}`: expected \"<elementEdge> <viewportEdge>\"")]
    InvalidSpec(String),
}

/// A horizontal edge of an element or of the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Center,
    Bottom,
}

impl Edge {
    /// Position of this edge of an element in document coordinates.
    fn element_position(&self, rect: &Rect, scroll_position: f32) -> f32 {
        match self {
            Edge::Top => rect.document_top(scroll_position),
            Edge::Center => rect.document_top(scroll_position) + rect.height / 2.0,
            Edge::Bottom => rect.document_bottom(scroll_position),
        }
    }

    /// Offset of this viewport edge from the viewport top.
    fn viewport_offset(&self, viewport_height: f32) -> f32 {
        match self {
            Edge::Top => 0.0,
            Edge::Center => viewport_height / 2.0,
            Edge::Bottom => viewport_height,
        }
    }
}

impl FromStr for Edge {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Edge::Top),
            "center" => Ok(Edge::Center),
            "bottom" => Ok(Edge::Bottom),
            other => Err(TriggerError::InvalidEdge(other.to_string())),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edge::Top => "top",
            Edge::Center => "center",
            Edge::Bottom => "bottom",
        })
    }
}

/// One resolved boundary of an activation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub element: Edge,
    pub viewport: Edge,
}

impl Boundary {
    pub const fn new(element: Edge, viewport: Edge) -> Self {
        Self { element, viewport }
    }

    /// The scroll position at which the element edge meets the viewport
    /// edge, computed from the element's current viewport-relative rect.
    ///
    /// With the element's top at document offset `T`, height `H`, and a
    /// viewport of height `V`: `"top bottom"` resolves to `T - V` and
    /// `"bottom top"` to `T + H`.
    pub fn resolve(&self, rect: &Rect, scroll_position: f32, viewport_height: f32) -> f32 {
        self.element.element_position(rect, scroll_position)
            - self.viewport.viewport_offset(viewport_height)
    }
}

impl FromStr for Boundary {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let (element, viewport) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(element), Some(viewport), None) => (element, viewport),
            _ => return Err(TriggerError::InvalidSpec(s.to_string())),
        };
        Ok(Boundary {
            element: element.parse()?,
            viewport: viewport.parse()?,
        })
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.element, self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let boundary: Boundary = "top bottom".parse().unwrap();
        assert_eq!(boundary, Boundary::new(Edge::Top, Edge::Bottom));

        let boundary: Boundary = "center center".parse().unwrap();
        assert_eq!(boundary, Boundary::new(Edge::Center, Edge::Center));
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        assert_eq!(
            "top".parse::<Boundary>(),
            Err(TriggerError::InvalidSpec("top".to_string()))
        );
        assert_eq!(
            "top bottom left".parse::<Boundary>(),
            Err(TriggerError::InvalidSpec("top bottom left".to_string()))
        );
        assert_eq!(
            "middle bottom".parse::<Boundary>(),
            Err(TriggerError::InvalidEdge("middle".to_string()))
        );
    }

    #[test]
    fn test_resolve_standard_window() {
        // Element of height 200 whose top sits at document offset 1000,
        // viewport 600 tall, currently scrolled to 500.
        let scroll = 500.0;
        let rect = Rect::new(0.0, 500.0, 300.0, 200.0); // viewport-relative
        let viewport_height = 600.0;

        let start: Boundary = "top bottom".parse().unwrap();
        let end: Boundary = "bottom top".parse().unwrap();

        // T - V and T + H.
        assert_eq!(start.resolve(&rect, scroll, viewport_height), 400.0);
        assert_eq!(end.resolve(&rect, scroll, viewport_height), 1200.0);
    }

    #[test]
    fn test_resolve_is_scroll_invariant() {
        // The same element seen at two different scroll positions resolves
        // to the same document-space boundary.
        let boundary: Boundary = "top bottom".parse().unwrap();
        let viewport_height = 600.0;

        let at_scroll_0 = Rect::new(0.0, 1000.0, 300.0, 200.0);
        let at_scroll_700 = Rect::new(0.0, 300.0, 300.0, 200.0);

        assert_eq!(
            boundary.resolve(&at_scroll_0, 0.0, viewport_height),
            boundary.resolve(&at_scroll_700, 700.0, viewport_height),
        );
    }

    #[test]
    fn test_display_round_trip() {
        for spec in ["top bottom", "bottom top", "center center"] {
            let boundary: Boundary = spec.parse().unwrap();
            assert_eq!(boundary.to_string(), spec);
        }
    }
}
