//! A layer for tile maps on the map.

use egui::{Color32, Context, Painter, Response};
use std::{any::Any, collections::HashMap};

use crate::{
    Tile, TileId, config::MapConfig, draw_tile, layers::Layer, load_tile,
    projection::MapProjection, visible_tiles,
};

/// A layer that manages and renders map tiles on the map view.
pub struct TileLayer {
    tiles: HashMap<TileId, Tile>,
    visible_tiles: Vec<(TileId, egui::Pos2)>,
    /// Color tint applied to the tile images when rendering
    pub tint: Color32,
    config: Box<dyn MapConfig>,
}

impl TileLayer {
    /// Creates a new tile layer with the given map configuration.
    pub fn new(config: impl MapConfig + 'static) -> Self {
        Self {
            tiles: Default::default(),
            visible_tiles: Default::default(),
            tint: Color32::WHITE,
            config: Box::new(config),
        }
    }

    /// Sets the opacity of the layer, from `0.0` (transparent) to `1.0` (opaque).
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    /// Sets the opacity of the layer, from `0.0` (transparent) to `1.0` (opaque).
    pub fn set_opacity(&mut self, opacity: f32) {
        self.tint = Color32::WHITE.gamma_multiply(opacity.clamp(0.0, 1.0));
    }

    /// The configuration the tiles are fetched with.
    pub fn config(&self) -> &dyn MapConfig {
        self.config.as_ref()
    }
}

impl Layer for TileLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, _response: &Response, _projection: &MapProjection) -> bool {
        false
    }

    fn prepare(&mut self, ctx: &Context, projection: &MapProjection) {
        self.visible_tiles = visible_tiles(projection).collect();
        for (tile_id, _) in &self.visible_tiles {
            load_tile(&mut self.tiles, self.config.as_ref(), ctx, *tile_id);
        }
    }

    fn draw(&self, painter: &Painter, _: &MapProjection) {
        for (tile_id, tile_pos) in &self.visible_tiles {
            // Overlays leave missing tiles transparent so the layers below show through.
            draw_tile(&self.tiles, painter, tile_id, *tile_pos, self.tint, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemplateMapConfig;

    #[test]
    fn full_opacity_keeps_white_tint() {
        let layer =
            TileLayer::new(TemplateMapConfig::new("/tiles/a/{z}/{x}/{y}.png")).with_opacity(1.0);
        assert_eq!(layer.tint, Color32::WHITE);
        assert!(layer.tiles.is_empty());
    }

    #[test]
    fn opacity_is_clamped() {
        let mut layer = TileLayer::new(TemplateMapConfig::new("/tiles/a/{z}/{x}/{y}.png"));
        layer.set_opacity(2.0);
        assert_eq!(layer.tint, Color32::WHITE);
        layer.set_opacity(0.0);
        assert_eq!(layer.tint.a(), 0);
    }
}
