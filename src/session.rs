//! The viewer session.
//!
//! A [`Session`] owns everything the registration flow mutates: the map, the registered sources,
//! the color assigner, the legend and the popup bindings. Layer mutating operations are refused
//! until the map has finished loading.

use std::collections::HashMap;

use egui::Color32;

use crate::error::ViewerError;
use crate::layers::Layer;
use crate::legend::{Legend, ToggleGroup};
use crate::palette::ColorAssigner;
use crate::popup::PopupInspector;
use crate::source::Source;
use crate::{Map, MapClick};

/// The state of one viewer.
pub struct Session {
    map: Map,
    sources: HashMap<String, Source>,
    colors: ColorAssigner,
    layers: Vec<String>,
    legend: Legend,
    popups: PopupInspector,
}

impl Session {
    /// Creates a session around a map.
    pub fn new(map: Map) -> Self {
        Self {
            map,
            sources: HashMap::new(),
            colors: ColorAssigner::new(),
            layers: Vec::new(),
            legend: Legend::new(),
            popups: PopupInspector::new(),
        }
    }

    /// The map.
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The map, for drawing it and for view changes. Layer visibility can only be changed through
    /// the session.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// The legend.
    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    /// The popup inspector.
    pub fn popups(&self) -> &PopupInspector {
        &self.popups
    }

    /// The ids of the layers registered through this session, in registration order.
    pub fn layer_ids(&self) -> &[String] {
        &self.layers
    }

    /// Returns a registered source.
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.get(id)
    }

    fn ensure_loaded(&self) -> Result<(), ViewerError> {
        if self.map.is_loaded() {
            Ok(())
        } else {
            Err(ViewerError::MapNotLoaded)
        }
    }

    /// Registers a data source. Source ids are unique.
    pub fn add_source(&mut self, source: Source) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        if self.sources.contains_key(source.id()) {
            return Err(ViewerError::DuplicateLayer(source.id().to_string()));
        }
        self.sources.insert(source.id().to_string(), source);
        Ok(())
    }

    /// Adds a layer on top of the map.
    pub fn add_layer(&mut self, id: &str, layer: impl Layer) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        self.map.add_layer(id, layer)?;
        self.layers.push(id.to_string());
        Ok(())
    }

    /// Whether a layer id is taken, either on the map or by a toggle.
    pub fn is_layer_id_taken(&self, id: &str) -> bool {
        self.map.has_layer(id) || self.legend.entry(id).is_some()
    }

    /// Adds a toggle for a layer, applying its initial state.
    pub fn add_toggle(
        &mut self,
        layer_id: &str,
        label: impl Into<String>,
        group: ToggleGroup,
        checked: bool,
    ) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        self.legend
            .add_toggle(&mut self.map, layer_id, label, group, checked)
    }

    /// Handles a checkbox change.
    pub fn set_layer_checked(&mut self, layer_id: &str, checked: bool) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        self.legend.set_checked(&mut self.map, layer_id, checked)
    }

    /// Checks every toggle and shows every toggled layer.
    pub fn select_all(&mut self) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        self.legend.select_all(&mut self.map);
        Ok(())
    }

    /// Unchecks every toggle and hides every toggled layer.
    pub fn deselect_all(&mut self) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        self.legend.deselect_all(&mut self.map);
        Ok(())
    }

    /// Makes a layer inspectable by clicking.
    pub fn bind_popup(&mut self, layer_id: &str) -> Result<(), ViewerError> {
        self.ensure_loaded()?;
        if !self.map.has_layer(layer_id) {
            return Err(ViewerError::UnknownLayer(layer_id.to_string()));
        }
        self.popups.bind(layer_id)
    }

    /// The fixed color of `category`, or the next fallback color.
    pub fn color_for(&mut self, category: &str) -> Color32 {
        self.colors.color_for(category)
    }

    /// The next fallback color.
    pub fn next_fallback_color(&mut self) -> Color32 {
        self.colors.next_fallback()
    }

    /// Opens or closes the popup for a click on the map.
    pub fn handle_click(&mut self, click: &MapClick) {
        self.popups.inspect(&self.map, click);
    }

    /// Shows the legend panel.
    pub fn legend_ui(&mut self, ui: &mut egui::Ui) {
        self.legend.ui(ui, &mut self.map);
    }

    /// Shows the open popup.
    pub fn popup_ui(&mut self, ctx: &egui::Context) {
        self.popups.ui(ctx, &self.map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OpenStreetMapConfig, TemplateMapConfig};
    use crate::layers::Visibility;
    use crate::layers::tile::TileLayer;
    use crate::source::RasterSource;

    fn tiles() -> TileLayer {
        TileLayer::new(TemplateMapConfig::new("/t/{z}/{x}/{y}.png"))
    }

    #[test]
    fn mutations_wait_for_the_map() {
        let mut session = Session::new(Map::new(OpenStreetMapConfig::default()));

        assert!(matches!(
            session.add_layer("a", tiles()),
            Err(ViewerError::MapNotLoaded)
        ));
        assert!(matches!(session.select_all(), Err(ViewerError::MapNotLoaded)));

        session.map_mut().mark_loaded();
        session.add_layer("a", tiles()).unwrap();
        assert_eq!(session.layer_ids(), ["a".to_string()]);
    }

    #[test]
    fn sources_are_unique() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.mark_loaded();
        let mut session = Session::new(map);
        let source = Source::Raster(RasterSource {
            id: "ndvi".to_string(),
            template: "/tiles/ndvi/{z}/{x}/{y}.png".to_string(),
        });

        session.add_source(source.clone()).unwrap();
        assert!(matches!(
            session.add_source(source),
            Err(ViewerError::DuplicateLayer(_))
        ));
        assert!(session.source("ndvi").is_some());
    }

    #[test]
    fn toggles_go_through_the_legend() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.mark_loaded();
        let mut session = Session::new(map);
        session.add_layer("a", tiles()).unwrap();
        session.add_toggle("a", "A", ToggleGroup::Raster, true).unwrap();

        session.set_layer_checked("a", false).unwrap();
        assert_eq!(session.map().visibility("a"), Some(Visibility::Hidden));
        assert_eq!(session.legend().is_checked("a"), Some(false));

        session.select_all().unwrap();
        assert_eq!(session.map().visibility("a"), Some(Visibility::Visible));
        assert!(session.is_layer_id_taken("a"));
        assert!(!session.is_layer_id_taken("b"));
    }

    #[test]
    fn popups_need_an_existing_layer() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.mark_loaded();
        let mut session = Session::new(map);
        assert!(matches!(
            session.bind_popup("nothing"),
            Err(ViewerError::UnknownLayer(_))
        ));
    }
}
