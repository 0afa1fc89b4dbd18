//! Click-to-inspect popups for vector layers.

use egui::{Align2, RichText};

use crate::error::ViewerError;
use crate::projection::GeoPos;
use crate::source::Properties;
use crate::{Map, MapClick};

/// The text of a popup: one `key: value` line per feature property.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopupContent {
    lines: Vec<(String, String)>,
}

impl PopupContent {
    /// Renders every property of a feature, in document order.
    pub fn from_properties(properties: &Properties) -> Self {
        Self {
            lines: properties
                .iter()
                .map(|(k, v)| (k.chars().filter(|c| !c.is_control()).collect(), v.to_string()))
                .collect(),
        }
    }

    /// The `(key, value)` pairs of the popup.
    pub fn lines(&self) -> &[(String, String)] {
        &self.lines
    }

    /// The popup as plain text, one `key: value` line per property.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The popup as an HTML fragment with every key and value escaped.
    pub fn to_html(&self) -> String {
        self.lines
            .iter()
            .map(|(k, v)| format!("<b>{}:</b> {}", escape_html(k), escape_html(v)))
            .collect::<Vec<_>>()
            .join("<br>")
    }
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// An open popup.
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    /// The layer of the inspected feature.
    pub layer_id: String,
    /// Where the popup is anchored.
    pub anchor: GeoPos,
    /// The rendered feature properties.
    pub content: PopupContent,
}

/// Tracks which layers can be inspected, and the popup that is currently open.
#[derive(Clone, Debug, Default)]
pub struct PopupInspector {
    bound: Vec<String>,
    open: Option<Popup>,
}

impl PopupInspector {
    /// Creates an inspector with no bound layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes clicks on the features of `layer_id` open a popup.
    pub fn bind(&mut self, layer_id: &str) -> Result<(), ViewerError> {
        if self.is_bound(layer_id) {
            return Err(ViewerError::DuplicateLayer(layer_id.to_string()));
        }
        self.bound.push(layer_id.to_string());
        Ok(())
    }

    /// Whether `layer_id` is bound.
    pub fn is_bound(&self, layer_id: &str) -> bool {
        self.bound.iter().any(|id| id == layer_id)
    }

    /// Opens a popup for the topmost feature under the click, looking at visible bound layers from
    /// the top of the map down. Closes the popup if there is no feature under the click.
    pub fn inspect(&mut self, map: &Map, click: &MapClick) -> Option<&Popup> {
        let open = map
            .layer_ids()
            .rev()
            .filter(|id| self.is_bound(id))
            .filter(|id| map.visibility(id).is_some_and(|v| v.is_visible()))
            .find_map(|id| {
                map.feature_at(id, click.geo_pos).map(|properties| Popup {
                    layer_id: id.to_string(),
                    anchor: click.geo_pos,
                    content: PopupContent::from_properties(properties),
                })
            });
        self.open = open;
        self.open.as_ref()
    }

    /// The open popup.
    pub fn current(&self) -> Option<&Popup> {
        self.open.as_ref()
    }

    /// Closes the open popup.
    pub fn close(&mut self) {
        self.open = None;
    }

    /// Shows the open popup next to its anchor.
    pub fn ui(&mut self, ctx: &egui::Context, map: &Map) {
        let Some(popup) = &self.open else {
            return;
        };
        let Some(projection) = map.projection() else {
            return;
        };

        let mut close = false;
        egui::Area::new(egui::Id::new("feature_popup"))
            .fixed_pos(projection.project(popup.anchor))
            .pivot(Align2::CENTER_BOTTOM)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new(&popup.layer_id).small().weak());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            close = ui.small_button("×").clicked();
                        });
                    });
                    for (key, value) in popup.content.lines() {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(RichText::new(format!("{key}:")).strong());
                            ui.label(value.as_str());
                        });
                    }
                });
            });

        if close {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenStreetMapConfig;
    use crate::layers::fill::FillLayer;
    use crate::source::{GeoJsonSource, PropertyValue, parse_feature_collection};
    use egui::{Color32, pos2};
    use serde_json::json;
    use std::sync::Arc;

    fn properties(pairs: &[(&str, PropertyValue)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn square_source(id: &str, name: &str) -> Arc<GeoJsonSource> {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                },
                "properties": { "name": name, "area_ha": 12.5 }
            }]
        });
        let collection = parse_feature_collection(id, value.to_string().as_bytes()).unwrap();
        Arc::new(GeoJsonSource::new(id, &collection))
    }

    fn click(lon: f64, lat: f64) -> MapClick {
        MapClick {
            screen_pos: pos2(0.0, 0.0),
            geo_pos: GeoPos::from((lon, lat)),
        }
    }

    #[test]
    fn content_has_one_line_per_property() {
        let content = PopupContent::from_properties(&properties(&[
            ("name", PropertyValue::Text("Sheep River Park".into())),
            ("secondaryClass", PropertyValue::Text("OK_PARKS".into())),
            ("area_ha", PropertyValue::from(&json!(4.25))),
        ]));

        assert_eq!(
            content.text(),
            "name: Sheep River Park\nsecondaryClass: OK_PARKS\narea_ha: 4.25"
        );
        assert_eq!(content.lines().len(), 3);
    }

    #[test]
    fn html_is_escaped() {
        let content = PopupContent::from_properties(&properties(&[(
            "<script>",
            PropertyValue::Text("a & \"b\" <i>".into()),
        )]));

        assert_eq!(
            content.to_html(),
            "<b>&lt;script&gt;:</b> a &amp; &quot;b&quot; &lt;i&gt;"
        );
    }

    #[test]
    fn inspect_picks_topmost_visible_bound_layer() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.add_layer("lower", FillLayer::new(square_source("lower", "below"), None, Color32::RED))
            .unwrap();
        map.add_layer("upper", FillLayer::new(square_source("upper", "above"), None, Color32::BLUE))
            .unwrap();

        let mut inspector = PopupInspector::new();
        inspector.bind("lower").unwrap();
        inspector.bind("upper").unwrap();
        assert!(inspector.bind("upper").is_err());

        let popup = inspector.inspect(&map, &click(0.5, 0.5)).unwrap();
        assert_eq!(popup.layer_id, "upper");
        assert!(popup.content.text().contains("name: above"));
        assert!(popup.content.text().contains("area_ha: 12.5"));

        map.set_visibility("upper", crate::layers::Visibility::Hidden).unwrap();
        let popup = inspector.inspect(&map, &click(0.5, 0.5)).unwrap();
        assert_eq!(popup.layer_id, "lower");
        assert_eq!(popup.anchor, GeoPos::from((0.5, 0.5)));
    }

    #[test]
    fn inspect_ignores_unbound_layers_and_closes_on_miss() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.add_layer("parks", FillLayer::new(square_source("parks", "park"), None, Color32::GREEN))
            .unwrap();

        let mut inspector = PopupInspector::new();
        assert!(inspector.inspect(&map, &click(0.5, 0.5)).is_none());

        inspector.bind("parks").unwrap();
        assert!(inspector.inspect(&map, &click(0.5, 0.5)).is_some());
        assert!(inspector.inspect(&map, &click(5.0, 5.0)).is_none());
        assert!(inspector.current().is_none());
    }
}
