//! Layers for the map view that can handle input, and draw on top of the map view different kinds
//! of data.
//!
use egui::{Context, Painter, Response};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use crate::projection::{GeoPos, MapProjection};
use crate::source::Properties;

/// Conversion of GeoJSON features for fill layers.
pub mod geojson;

/// Fill layer
pub mod fill;

/// Tile layer
pub mod tile;

/// A trait for map layers.
pub trait Layer: Any {
    /// Handles user input for the layer. Returns `true` if the input was handled and should not be
    /// processed further by the map.
    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool;

    /// Called every frame the layer is visible, after input handling, with the final projection
    /// of the frame.
    fn prepare(&mut self, _ctx: &Context, _projection: &MapProjection) {}

    /// Draws the layer.
    fn draw(&self, painter: &Painter, projection: &MapProjection);

    /// Returns the properties of the topmost feature at `pos`, if the layer has queryable features.
    fn feature_at(&self, _pos: GeoPos) -> Option<&Properties> {
        None
    }

    /// Gets the layer as a `dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Gets the layer as a mutable `dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The visibility of a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// The layer is drawn.
    #[default]
    Visible,
    /// The layer is not drawn.
    #[serde(rename = "none")]
    Hidden,
}

impl Visibility {
    /// The visibility matching a checkbox state.
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    /// Whether the layer is drawn.
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Visible => f.write_str("visible"),
            Visibility::Hidden => f.write_str("none"),
        }
    }
}

/// Even-odd test of whether `p` lies inside the (unclosed) ring.
pub(crate) fn point_in_ring(p: GeoPos, ring: &[GeoPos]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let cross_lon = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < cross_lon {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<GeoPos> {
        points.iter().copied().map(GeoPos::from).collect()
    }

    #[test]
    fn test_point_in_ring() {
        let triangle = ring(&[(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]);

        assert!(point_in_ring(GeoPos::from((5.0, 2.0)), &triangle));
        assert!(!point_in_ring(GeoPos::from((0.5, 9.0)), &triangle));
        assert!(!point_in_ring(GeoPos::from((-1.0, 1.0)), &triangle));

        // Concave "U" shape, the notch is outside.
        let u_shape = ring(&[
            (0.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (2.0, 3.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ]);
        assert!(point_in_ring(GeoPos::from((0.5, 2.0)), &u_shape));
        assert!(!point_in_ring(GeoPos::from((1.5, 2.0)), &u_shape));

        // Degenerate rings never contain anything.
        assert!(!point_in_ring(GeoPos::from((0.0, 0.0)), &ring(&[(0.0, 0.0), (1.0, 1.0)])));
    }

    #[test]
    fn visibility_from_checked() {
        assert_eq!(Visibility::from_checked(true), Visibility::Visible);
        assert_eq!(Visibility::from_checked(false), Visibility::Hidden);
        assert_eq!(Visibility::Hidden.to_string(), "none");
        assert_eq!(Visibility::Visible.to_string(), "visible");
        assert_eq!(
            serde_json::to_value(Visibility::Hidden).unwrap(),
            serde_json::json!("none")
        );
    }
}
