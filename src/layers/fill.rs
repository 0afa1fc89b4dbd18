//! A layer that fills the polygons of a GeoJSON source.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use egui::Color32;
//! use manifest_map_view::config::OpenStreetMapConfig;
//! use manifest_map_view::layers::fill::FillLayer;
//! use manifest_map_view::{Map, source::GeoJsonSource};
//!
//! let collection: geojson::FeatureCollection = std::fs::read_to_string("parks.geojson")
//!     .unwrap()
//!     .parse::<geojson::GeoJson>()
//!     .unwrap()
//!     .try_into()
//!     .unwrap();
//! let source = Arc::new(GeoJsonSource::new("parks", &collection));
//!
//! let mut map = Map::new(OpenStreetMapConfig::default());
//! map.add_layer("parks", FillLayer::new(source, None, Color32::from_rgb(0, 128, 0))).unwrap();
//! ```

use std::any::Any;
use std::sync::Arc;

use egui::{Color32, Mesh, Painter, Pos2, Response, Shape, Stroke};
use log::warn;

use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};
use crate::source::{GeoJsonSource, Polygon, Properties, PropertyFilter, SourceFeature};

/// Opacity applied to the fill color of vector layers.
pub const FILL_OPACITY: f32 = 0.6;

/// Layer implementation that fills the polygons of a [`GeoJsonSource`], optionally restricted to
/// the features passing a [`PropertyFilter`].
pub struct FillLayer {
    source: Arc<GeoJsonSource>,
    filter: Option<PropertyFilter>,
    /// Indices into the source features that pass the filter.
    matched: Vec<usize>,

    /// The opaque base color of the layer.
    pub color: Color32,

    /// The opacity the fill is drawn with.
    pub opacity: f32,

    /// The outline drawn around each polygon.
    pub stroke: Stroke,
}

impl FillLayer {
    /// Creates a new `FillLayer` drawing the features of `source` that pass `filter`.
    pub fn new(source: Arc<GeoJsonSource>, filter: Option<PropertyFilter>, color: Color32) -> Self {
        let matched = source
            .features()
            .iter()
            .enumerate()
            .filter(|(_, f)| filter.as_ref().is_none_or(|filter| filter.matches(&f.properties)))
            .map(|(i, _)| i)
            .collect();

        Self {
            source,
            filter,
            matched,
            color,
            opacity: FILL_OPACITY,
            stroke: Stroke::new(1.0, color),
        }
    }

    /// The source this layer draws from.
    pub fn source(&self) -> &GeoJsonSource {
        &self.source
    }

    /// The filter of this layer.
    pub fn filter(&self) -> Option<&PropertyFilter> {
        self.filter.as_ref()
    }

    /// The features drawn by this layer, in draw order.
    pub fn features(&self) -> impl Iterator<Item = &SourceFeature> {
        self.matched.iter().map(|i| &self.source.features()[*i])
    }

    /// The fill color with the layer opacity applied.
    pub fn fill_color(&self) -> Color32 {
        let [r, g, b, _] = self.color.to_array();
        let alpha = (self.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color32::from_rgba_unmultiplied(r, g, b, alpha)
    }

    fn draw_polygon(&self, painter: &Painter, projection: &MapProjection, polygon: &Polygon) {
        let mut screen_points: Vec<Pos2> =
            polygon.exterior.iter().map(|p| projection.project(*p)).collect();

        painter.add(Shape::Path(egui::epaint::PathShape {
            points: screen_points.clone(),
            closed: true,
            fill: Color32::TRANSPARENT,
            stroke: self.stroke.into(),
        }));

        let mut hole_indices = Vec::with_capacity(polygon.holes.len());
        for hole in &polygon.holes {
            hole_indices.push(screen_points.len());
            screen_points.extend(hole.iter().map(|p| projection.project(*p)));
        }

        // Triangulate for the fill.
        let flat_points: Vec<f64> = screen_points
            .iter()
            .flat_map(|p| [p.x as f64, p.y as f64])
            .collect();
        let indices = match earcutr::earcut(&flat_points, &hole_indices, 2) {
            Ok(indices) => indices,
            Err(e) => {
                warn!("Failed to triangulate polygon: {:?}", e);
                return;
            }
        };

        let fill = self.fill_color();
        let mut mesh = Mesh::default();
        mesh.vertices = screen_points
            .iter()
            .map(|p| egui::epaint::Vertex {
                pos: *p,
                uv: Default::default(),
                color: fill,
            })
            .collect();
        mesh.indices = indices.into_iter().map(|i| i as u32).collect();
        painter.add(Shape::Mesh(mesh.into()));
    }
}

impl Layer for FillLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, _response: &Response, _projection: &MapProjection) -> bool {
        false
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        for feature in self.features() {
            for polygon in &feature.polygons {
                self.draw_polygon(painter, projection, polygon);
            }
        }
    }

    fn feature_at(&self, pos: GeoPos) -> Option<&Properties> {
        // Later features are drawn on top.
        self.matched
            .iter()
            .rev()
            .map(|i| &self.source.features()[*i])
            .find(|f| f.contains(pos))
            .map(|f| &f.properties)
    }
}
