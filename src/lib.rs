#![warn(missing_docs)]

//! A manifest driven map viewer for `egui`.
//!
//! This crate provides a `Map` widget that displays a base tile map with an ordered stack of named
//! layers on top of it, and the machinery to populate it from a dataset manifest: GeoJSON datasets
//! become fill layers (one per category of the `secondaryClass` property), raster datasets become
//! tile layers, and every layer gets a checkbox in a legend and, for vector layers, a
//! click-to-inspect popup.
//!
//! # Example
//!
//! ```no_run
//! use eframe::egui;
//! use manifest_map_view::{Map, config::OpenStreetMapConfig};
//!
//! struct MyApp {
//!     map: Map,
//! }
//!
//! impl Default for MyApp {
//!     fn default() -> Self {
//!         Self {
//!             map: Map::new(OpenStreetMapConfig::default()),
//!         }
//!     }
//! }
//!
//! impl eframe::App for MyApp {
//!     fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
//!         egui::CentralPanel::default()
//!             .frame(egui::Frame::NONE)
//!             .show(ctx, |ui| {
//!                 ui.add(&mut self.map);
//!             });
//!     }
//! }
//! ```

/// The viewer application.
pub mod app;

/// Map creation and the staged initialization flow.
pub mod bootstrap;

/// Clients fetching manifests and datasets.
pub mod client;

/// Configuration traits and types for the map widget.
pub mod config;

/// Error types.
pub mod error;

/// Map layers.
pub mod layers;

/// The layer toggle panel.
pub mod legend;

/// The dataset manifest.
pub mod manifest;

/// Layer colors.
pub mod palette;

/// Feature property popups.
pub mod popup;

/// Conversion between geographical and screen coordinates.
pub mod projection;

/// Registration of sources, layers and toggles for manifest datasets.
pub mod registrar;

/// The viewer session state.
pub mod session;

/// Data sources.
pub mod source;

#[cfg(test)]
mod testing;

use eframe::egui;
use egui::{Color32, Painter, Rect, Response, Sense, Ui, Vec2, Widget, pos2};
use eyre::{Context, Result};
use log::{debug, error};
use once_cell::sync::Lazy;
use poll_promise::Promise;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::MapConfig;
use crate::layers::{Layer, Visibility};
use crate::projection::{GeoPos, MapProjection};
use crate::source::Properties;

pub use crate::error::ViewerError;

// The size of a map tile in pixels.
const TILE_SIZE: u32 = 256;
/// The minimum zoom level.
pub const MIN_ZOOM: u8 = 0;
/// The maximum zoom level.
pub const MAX_ZOOM: u8 = 19;

// Reuse the reqwest client for all downloads by making it a static variable.
pub(crate) static CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .expect("Failed to build reqwest client")
});

/// A unique identifier for a map tile.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileId {
    /// The zoom level.
    pub z: u8,

    /// The x-coordinate of the tile.
    pub x: u32,

    /// The y-coordinate of the tile.
    pub y: u32,
}

impl TileId {
    fn to_url(self, config: &dyn MapConfig) -> String {
        config.tile_url(&self)
    }
}

/// The state of a tile in the cache.
pub(crate) enum Tile {
    /// The tile is being downloaded.
    Loading(Promise<Result<egui::ColorImage, Arc<eyre::Report>>>),

    /// The tile is in memory.
    Loaded(egui::TextureHandle),

    /// The tile failed to download. The error has been logged.
    Failed,
}

/// A click on the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapClick {
    /// Where the click happened on screen.
    pub screen_pos: egui::Pos2,
    /// The geographical position under the click.
    pub geo_pos: GeoPos,
}

struct LayerEntry {
    id: String,
    layer: Box<dyn Layer>,
    visibility: Visibility,
}

/// The map widget.
pub struct Map {
    /// The geographical center of the map.
    pub center: GeoPos,

    /// The zoom level of the map.
    pub zoom: u8,

    tiles: HashMap<TileId, Tile>,

    /// The geographical position under the mouse pointer, if any.
    pub mouse_pos: Option<GeoPos>,

    /// Configuration for the map, such as the tile server URL.
    config: Box<dyn MapConfig>,

    /// Layers in draw order.
    layers: Vec<LayerEntry>,

    navigation_control: bool,
    loaded: bool,
    projection: Option<MapProjection>,
    last_click: Option<MapClick>,
}

impl Map {
    /// Creates a new `Map` widget.
    ///
    /// # Arguments
    ///
    /// * `config` - A type that implements `MapConfig`, which provides configuration for the map.
    pub fn new<C: MapConfig + 'static>(config: C) -> Self {
        Self::from_boxed_config(Box::new(config))
    }

    /// Creates a new `Map` widget from an already boxed configuration.
    pub fn from_boxed_config(config: Box<dyn MapConfig>) -> Self {
        let center = config.default_center();
        let zoom = config.default_zoom();
        Self {
            tiles: HashMap::new(),
            mouse_pos: None,
            config,
            center,
            zoom,
            layers: Vec::new(),
            navigation_control: false,
            loaded: false,
            projection: None,
            last_click: None,
        }
    }

    /// Adds zoom in and zoom out buttons to the top right corner of the map.
    pub fn add_navigation_control(&mut self) {
        self.navigation_control = true;
    }

    /// Whether the zoom buttons are shown.
    pub fn has_navigation_control(&self) -> bool {
        self.navigation_control
    }

    /// The configuration the base tiles are fetched with.
    pub fn config(&self) -> &dyn MapConfig {
        self.config.as_ref()
    }

    /// Replaces the base tile configuration. Cached base tiles are dropped.
    pub fn set_config(&mut self, config: Box<dyn MapConfig>) {
        self.config = config;
        self.tiles.clear();
    }

    /// Whether the map has been laid out at least once. Layers can be registered before that, but
    /// the session refuses to until the map is loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Adds a layer on top of the existing ones. Layer ids must be unique.
    pub fn add_layer(
        &mut self,
        id: impl Into<String>,
        layer: impl Layer,
    ) -> Result<(), ViewerError> {
        let id = id.into();
        if self.has_layer(&id) {
            return Err(ViewerError::DuplicateLayer(id));
        }
        debug!("Adding layer {}", id);
        self.layers.push(LayerEntry {
            id,
            layer: Box::new(layer),
            visibility: Visibility::Visible,
        });
        Ok(())
    }

    /// Whether a layer with the given id exists.
    pub fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    /// The ids of all layers, in draw order.
    pub fn layer_ids(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }

    /// Gets a reference to a layer of a concrete type.
    pub fn layer<T: Layer>(&self, id: &str) -> Option<&T> {
        self.layers
            .iter()
            .find(|l| l.id == id)
            .and_then(|l| l.layer.as_any().downcast_ref::<T>())
    }

    /// Gets a mutable reference to a layer of a concrete type.
    pub fn layer_mut<T: Layer>(&mut self, id: &str) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .and_then(|l| l.layer.as_any_mut().downcast_mut::<T>())
    }

    /// The visibility of a layer, or `None` if no such layer exists.
    pub fn visibility(&self, id: &str) -> Option<Visibility> {
        self.layers.iter().find(|l| l.id == id).map(|l| l.visibility)
    }

    /// Sets the visibility of a layer. Only the legend changes visibility, so that checkboxes and
    /// layers never disagree.
    pub(crate) fn set_visibility(
        &mut self,
        id: &str,
        visibility: Visibility,
    ) -> Result<(), ViewerError> {
        let entry = self
            .layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ViewerError::UnknownLayer(id.to_string()))?;
        entry.visibility = visibility;
        Ok(())
    }

    /// Returns the properties of the topmost feature of layer `id` at `pos`.
    pub fn feature_at(&self, id: &str, pos: GeoPos) -> Option<&Properties> {
        self.layers
            .iter()
            .find(|l| l.id == id)
            .and_then(|l| l.layer.feature_at(pos))
    }

    /// Returns the last click on the map that has not been taken yet.
    pub fn take_click(&mut self) -> Option<MapClick> {
        self.last_click.take()
    }

    /// The projection of the last drawn frame.
    pub fn projection(&self) -> Option<&MapProjection> {
        self.projection.as_ref()
    }

    /// Zooms in one level, keeping the center.
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + 1).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Zooms out one level, keeping the center.
    pub fn zoom_out(&mut self) {
        self.zoom = self.zoom.saturating_sub(1).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Handles user input for panning and zooming.
    fn handle_input(&mut self, ui: &Ui, rect: &Rect, response: &Response) {
        // Handle panning
        if response.dragged() {
            let delta = response.drag_delta();
            let center_in_tiles_x = lon_to_x(self.center.lon, self.zoom);
            let center_in_tiles_y = lat_to_y(self.center.lat, self.zoom);

            let mut new_center_x = center_in_tiles_x - (delta.x as f64 / TILE_SIZE as f64);
            let mut new_center_y = center_in_tiles_y - (delta.y as f64 / TILE_SIZE as f64);

            // Clamp the new center to the map boundaries.
            let world_size_in_tiles = 2.0_f64.powi(self.zoom as i32);
            let view_size_in_tiles_x = rect.width() as f64 / TILE_SIZE as f64;
            let view_size_in_tiles_y = rect.height() as f64 / TILE_SIZE as f64;

            let min_center_x = view_size_in_tiles_x / 2.0;
            let max_center_x = world_size_in_tiles - view_size_in_tiles_x / 2.0;
            let min_center_y = view_size_in_tiles_y / 2.0;
            let max_center_y = world_size_in_tiles - view_size_in_tiles_y / 2.0;

            // If the map is smaller than the viewport, center it. Otherwise, clamp the center.
            new_center_x = if min_center_x > max_center_x {
                world_size_in_tiles / 2.0
            } else {
                new_center_x.clamp(min_center_x, max_center_x)
            };
            new_center_y = if min_center_y > max_center_y {
                world_size_in_tiles / 2.0
            } else {
                new_center_y.clamp(min_center_y, max_center_y)
            };

            self.center = GeoPos {
                lon: x_to_lon(new_center_x, self.zoom),
                lat: y_to_lat(new_center_y, self.zoom),
            };
        }

        // Handle double-click to zoom and center
        if response.double_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                let new_zoom = (self.zoom + 1).clamp(MIN_ZOOM, MAX_ZOOM);

                if new_zoom != self.zoom {
                    let target = MapProjection::new(self.zoom, self.center, *rect)
                        .unproject(pointer_pos);

                    // Set the new zoom level and center the map on the clicked location
                    self.zoom = new_zoom;
                    self.center = target;
                }
            }
        }

        // Handle zooming and mouse position
        let Some(mouse_pos) = response.hover_pos() else {
            self.mouse_pos = None;
            return;
        };

        let mouse_rel = mouse_pos - rect.min;
        let widget_center_x = rect.width() as f64 / 2.0;
        let widget_center_y = rect.height() as f64 / 2.0;

        let target = MapProjection::new(self.zoom, self.center, *rect).unproject(mouse_pos);
        self.mouse_pos = Some(target);

        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            let old_zoom = self.zoom;
            let mut new_zoom = (self.zoom as i32 + scroll.signum() as i32)
                .clamp(MIN_ZOOM as i32, MAX_ZOOM as i32) as u8;

            // If we are zooming out, check if the new zoom level is valid.
            if scroll < 0.0 {
                let world_pixel_size = 2.0_f64.powi(new_zoom as i32) * TILE_SIZE as f64;
                // If the world size would become smaller than the widget size, reject the zoom.
                if world_pixel_size < rect.width() as f64 || world_pixel_size < rect.height() as f64
                {
                    new_zoom = old_zoom;
                }
            }

            if new_zoom != old_zoom {
                self.zoom = new_zoom;

                // Adjust the map center so the geo-coordinate under the mouse remains the same
                let new_target_x = lon_to_x(target.lon, new_zoom);
                let new_target_y = lat_to_y(target.lat, new_zoom);

                let new_center_x =
                    new_target_x - (mouse_rel.x as f64 - widget_center_x) / TILE_SIZE as f64;
                let new_center_y =
                    new_target_y - (mouse_rel.y as f64 - widget_center_y) / TILE_SIZE as f64;

                self.center = GeoPos {
                    lon: x_to_lon(new_center_x, new_zoom),
                    lat: y_to_lat(new_center_y, new_zoom),
                };
            }
        }
    }

    /// Draws the map tiles, the visible layers and the attribution.
    fn draw_map_and_attribution(&mut self, ui: &mut Ui, rect: &Rect, projection: &MapProjection) {
        let painter = ui.painter_at(*rect);
        painter.rect_filled(*rect, 0.0, Color32::from_rgb(220, 220, 220)); // Background

        let visible_tiles: Vec<_> = visible_tiles(projection).collect();
        for (tile_id, _) in &visible_tiles {
            load_tile(&mut self.tiles, self.config.as_ref(), ui.ctx(), *tile_id);
        }
        for (tile_id, tile_pos) in &visible_tiles {
            draw_tile(&self.tiles, &painter, tile_id, *tile_pos, Color32::WHITE, true);
        }

        for entry in self.layers.iter().filter(|l| l.visibility.is_visible()) {
            entry.layer.draw(&painter, projection);
        }

        self.draw_attribution(ui, rect);
    }

    /// Draws the attribution text.
    fn draw_attribution(&self, ui: &mut Ui, rect: &Rect) {
        if let Some(attribution) = self.config.attribution() {
            let bg_color = if ui.visuals().dark_mode {
                Color32::from_black_alpha(150)
            } else {
                Color32::from_white_alpha(150)
            };

            let frame = egui::Frame::NONE
                .inner_margin(egui::Margin::same(5)) // A bit of padding
                .fill(bg_color)
                .corner_radius(3.0);

            egui::Area::new(ui.id().with("attribution"))
                .fixed_pos(rect.left_bottom() + egui::vec2(5.0, -5.0))
                .pivot(egui::Align2::LEFT_BOTTOM)
                .show(ui.ctx(), |ui| {
                    frame.show(ui, |ui| {
                        ui.style_mut().override_text_style = Some(egui::TextStyle::Small);
                        // Don't wrap attribution text.
                        ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend);

                        if let Some(url) = self.config.attribution_url() {
                            ui.hyperlink_to(attribution, url);
                        } else {
                            ui.label(attribution);
                        }
                    });
                });
        }
    }

    /// Draws the zoom buttons.
    fn draw_navigation_control(&mut self, ui: &mut Ui, rect: &Rect) {
        egui::Area::new(ui.id().with("navigation"))
            .fixed_pos(rect.right_top() + egui::vec2(-10.0, 10.0))
            .pivot(egui::Align2::RIGHT_TOP)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical(|ui| {
                        if ui.button("+").on_hover_text("Zoom in").clicked() {
                            self.zoom_in();
                        }
                        if ui.button("−").on_hover_text("Zoom out").clicked() {
                            self.zoom_out();
                        }
                    });
                });
            });
    }
}

/// Returns an iterator over the tiles covering the projected area, with their screen positions.
pub(crate) fn visible_tiles(
    projection: &MapProjection,
) -> impl Iterator<Item = (TileId, egui::Pos2)> + use<> {
    let rect = projection.widget_rect;
    let zoom = projection.zoom;
    let center_x = lon_to_x(projection.center.lon, zoom);
    let center_y = lat_to_y(projection.center.lat, zoom);

    let widget_center_x = rect.width() / 2.0;
    let widget_center_y = rect.height() / 2.0;

    let x_min = (center_x - widget_center_x as f64 / TILE_SIZE as f64).floor() as i64;
    let y_min = (center_y - widget_center_y as f64 / TILE_SIZE as f64).floor() as i64;
    let x_max = (center_x + widget_center_x as f64 / TILE_SIZE as f64).ceil() as i64;
    let y_max = (center_y + widget_center_y as f64 / TILE_SIZE as f64).ceil() as i64;

    // Tiles outside of the world do not exist.
    let world_size = 1_i64 << zoom;
    let rect_min = rect.min;
    (x_min.max(0)..=x_max.min(world_size - 1)).flat_map(move |x| {
        (y_min.max(0)..=y_max.min(world_size - 1)).map(move |y| {
            let tile_id = TileId {
                z: zoom,
                x: x as u32,
                y: y as u32,
            };
            let screen_x = widget_center_x + (x as f64 - center_x) as f32 * TILE_SIZE as f32;
            let screen_y = widget_center_y + (y as f64 - center_y) as f32 * TILE_SIZE as f32;
            let tile_pos = rect_min + Vec2::new(screen_x, screen_y);
            (tile_id, tile_pos)
        })
    })
}

/// Downloads and decodes a single tile.
fn download_tile(url: &str) -> Result<egui::ColorImage, ViewerError> {
    debug!("Downloading tile from {}", url);
    let response = CLIENT.get(url).send()?;

    if !response.status().is_success() {
        return Err(ViewerError::TileDownload(response.status().to_string()));
    }

    let bytes = response.bytes()?.to_vec();
    let image = image::load_from_memory(&bytes)?.to_rgba8();

    let size = [image.width() as _, image.height() as _];
    let pixels = image.into_raw();
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
}

/// Starts downloading a tile if it is not cached yet, and turns finished downloads into textures.
pub(crate) fn load_tile(
    tiles: &mut HashMap<TileId, Tile>,
    config: &dyn MapConfig,
    ctx: &egui::Context,
    tile_id: TileId,
) {
    let tile_state = tiles.entry(tile_id).or_insert_with(|| {
        let url = tile_id.to_url(config);
        let promise =
            Promise::spawn_thread("download_tile", move || -> Result<_, Arc<eyre::Report>> {
                download_tile(&url)
                    .with_context(|| format!("Failed to download tile from {}", &url))
                    .map_err(Arc::new)
            });
        Tile::Loading(promise)
    });

    // If the tile is loading, check if the promise is ready and update the state, so that it can
    // be drawn in the same frame it finished loading.
    if let Tile::Loading(promise) = tile_state {
        if let Some(result) = promise.ready() {
            match result {
                Ok(color_image) => {
                    let texture = ctx.load_texture(
                        format!("tile_{}_{}_{}", tile_id.z, tile_id.x, tile_id.y),
                        color_image.clone(),
                        Default::default(),
                    );
                    *tile_state = Tile::Loaded(texture);
                }
                Err(e) => {
                    error!("{:?}", e);
                    *tile_state = Tile::Failed;
                }
            }
        }
    }
}

/// Draws a single map tile. With `placeholder` set, tiles that are not available are drawn as a
/// gray box with a status sign.
pub(crate) fn draw_tile(
    tiles: &HashMap<TileId, Tile>,
    painter: &Painter,
    tile_id: &TileId,
    tile_pos: egui::Pos2,
    tint: Color32,
    placeholder: bool,
) {
    let tile_rect = Rect::from_min_size(tile_pos, Vec2::new(TILE_SIZE as f32, TILE_SIZE as f32));

    let (sign, sign_color) = match tiles.get(tile_id) {
        Some(Tile::Loaded(texture)) => {
            painter.image(
                texture.id(),
                tile_rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                tint,
            );
            return;
        }
        Some(Tile::Loading(_)) | None => {
            // The tile is still loading, so we need to tell egui to repaint.
            painter.ctx().request_repaint();
            ("?", Color32::ORANGE)
        }
        Some(Tile::Failed) => ("!", Color32::RED),
    };

    if !placeholder {
        return;
    }

    // Draw a gray background and a border for the placeholder.
    painter.rect_filled(tile_rect, 0.0, Color32::from_gray(220));
    painter.rect_stroke(
        tile_rect,
        0.0,
        egui::Stroke::new(1.0, Color32::GRAY),
        egui::StrokeKind::Inside,
    );
    painter.text(
        tile_rect.center(),
        egui::Align2::CENTER_CENTER,
        sign,
        egui::FontId::proportional(40.0),
        sign_color,
    );
}

/// Converts longitude to the x-coordinate of a tile at a given zoom level.
fn lon_to_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * (2.0_f64.powi(zoom as i32))
}

/// Converts latitude to the y-coordinate of a tile at a given zoom level.
fn lat_to_y(lat: f64, zoom: u8) -> f64 {
    (1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0
        * (2.0_f64.powi(zoom as i32))
}

/// Converts the x-coordinate of a tile to longitude at a given zoom level.
fn x_to_lon(x: f64, zoom: u8) -> f64 {
    x / (2.0_f64.powi(zoom as i32)) * 360.0 - 180.0
}

/// Converts the y-coordinate of a tile to latitude at a given zoom level.
fn y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / (2.0_f64.powi(zoom as i32));
    n.sinh().atan().to_degrees()
}

impl Widget for &mut Map {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::drag().union(Sense::click()));
        self.mark_loaded();

        let projection = MapProjection::new(self.zoom, self.center, rect);

        if response.clicked() {
            if let Some(screen_pos) = response.interact_pointer_pos() {
                self.last_click = Some(MapClick {
                    screen_pos,
                    geo_pos: projection.unproject(screen_pos),
                });
            }
        }

        let mut input_handled = false;
        for entry in self.layers.iter_mut().filter(|l| l.visibility.is_visible()) {
            input_handled |= entry.layer.handle_input(&response, &projection);
        }
        if !input_handled {
            self.handle_input(ui, &rect, &response);
        }

        // Panning and zooming may have moved the map.
        let projection = MapProjection::new(self.zoom, self.center, rect);
        for entry in self.layers.iter_mut().filter(|l| l.visibility.is_visible()) {
            entry.layer.prepare(ui.ctx(), &projection);
        }

        self.draw_map_and_attribution(ui, &rect, &projection);
        if self.navigation_control {
            self.draw_navigation_control(ui, &rect);
        }
        self.projection = Some(projection);

        response
    }
}
