//! Configuration for tile providers and for the viewer itself.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::TileId;
use crate::projection::GeoPos;

/// Configuration for a map provider.
pub trait MapConfig: Send + Sync {
    /// Returns the URL for a given tile.
    fn tile_url(&self, tile: &TileId) -> String;

    /// Returns the attribution text to be displayed on the map. If returns `None`, no attribution
    /// is shown.
    fn attribution(&self) -> Option<&String>;

    /// Returns the attribution URL to be linked from the attribution text.
    fn attribution_url(&self) -> Option<&String>;

    /// The default geographical center of the map.
    fn default_center(&self) -> GeoPos;

    /// The default zoom level of the map.
    fn default_zoom(&self) -> u8;
}

/// Configuration for the OpenStreetMap tile server.
///
/// # Example
///
/// ```
/// use manifest_map_view::config::OpenStreetMapConfig;
/// let config = OpenStreetMapConfig::default();
/// ```
pub struct OpenStreetMapConfig {
    base_url: String,
    attribution: String,
    attribution_url: String,
    default_center: GeoPos,
    default_zoom: u8,
}

impl Default for OpenStreetMapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tile.openstreetmap.org".to_string(),
            attribution: "© OpenStreetMap".to_string(),
            attribution_url: "https://www.openstreetmap.org/copyright".to_string(),
            default_center: MapView::default().center,
            default_zoom: MapView::default().zoom,
        }
    }
}

impl MapConfig for OpenStreetMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!("{}/{}/{}/{}.png", self.base_url, tile.z, tile.x, tile.y)
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

/// Configuration for the ESRI World Imagery satellite tiles.
///
/// Note that this server orders the path as `{z}/{y}/{x}`.
pub struct EsriImageryConfig {
    base_url: String,
    attribution: String,
}

impl Default for EsriImageryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile"
                .to_string(),
            attribution: "© Esri World Imagery".to_string(),
        }
    }
}

impl EsriImageryConfig {
    /// The tile URL template, in `{z}/{y}/{x}` order.
    pub fn template(&self) -> String {
        format!("{}/{{z}}/{{y}}/{{x}}", self.base_url)
    }
}

impl MapConfig for EsriImageryConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!("{}/{}/{}/{}", self.base_url, tile.z, tile.y, tile.x)
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        MapView::default().center
    }

    fn default_zoom(&self) -> u8 {
        MapView::default().zoom
    }
}

/// A tile provider described by a URL template containing `{z}`, `{x}` and `{y}` placeholders.
///
/// # Example
///
/// ```
/// use manifest_map_view::{TileId, config::{MapConfig, TemplateMapConfig}};
/// let config = TemplateMapConfig::new("http://localhost:8001/tiles/ndvi/{z}/{x}/{y}.png");
/// assert_eq!(
///     config.tile_url(&TileId { z: 3, x: 1, y: 2 }),
///     "http://localhost:8001/tiles/ndvi/3/1/2.png"
/// );
/// ```
#[derive(Clone, Debug)]
pub struct TemplateMapConfig {
    template: String,
    attribution: Option<String>,
}

impl TemplateMapConfig {
    /// Creates a new `TemplateMapConfig` from a URL template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            attribution: None,
        }
    }

    /// Sets the attribution shown for this provider.
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }

    /// The URL template.
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl MapConfig for TemplateMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        self.template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    fn attribution(&self) -> Option<&String> {
        self.attribution.as_ref()
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        MapView::default().center
    }

    fn default_zoom(&self) -> u8 {
        MapView::default().zoom
    }
}

/// A dynamic map configuration that allows defining a custom tile URL function at runtime.
///
/// # Example
///
/// ```
/// use manifest_map_view::config::DynMapConfig;
/// let config = DynMapConfig::new(|tile| {
///     format!("https://my-tile-server/{}/{}/{}.png", tile.z, tile.x, tile.y)
/// });
/// ```
pub struct DynMapConfig {
    tile_url: Box<dyn Fn(&TileId) -> String + Send + Sync>,
}

impl DynMapConfig {
    /// Creates a new `DynMapConfig` with a custom tile URL function.
    pub fn new(tile_url: impl Fn(&TileId) -> String + Send + Sync + 'static) -> Self {
        Self {
            tile_url: Box::new(tile_url),
        }
    }
}

impl MapConfig for DynMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        (self.tile_url)(tile)
    }

    fn attribution(&self) -> Option<&String> {
        None
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        MapView::default().center
    }

    fn default_zoom(&self) -> u8 {
        2
    }
}

/// The initial view of the map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapView {
    /// The initial center of the map.
    pub center: GeoPos,
    /// The initial zoom level.
    pub zoom: u8,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: GeoPos {
                lon: -113.9817,
                lat: 50.7256,
            }, // Okotoks, Alberta
            zoom: 13,
        }
    }
}

/// The base style the map is created with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseStyle {
    /// OpenStreetMap raster tiles.
    #[default]
    InlineRaster,
    /// A remote style or TileJSON document naming a raster tile template.
    Remote {
        /// URL of the style document.
        url: String,
    },
}

/// Where manifests and datasets are read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLocation {
    /// An HTTP server exposing `/manifest.json`, `/data/{file}` and `/tiles/{id}/{z}/{x}/{y}.png`.
    Server(String),
    /// A local directory of `.geojson` files.
    Directory(PathBuf),
}

impl Default for DataLocation {
    fn default() -> Self {
        Self::Server("http://127.0.0.1:8001".to_string())
    }
}

/// Settings for a viewer session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Where to read the manifest and datasets from.
    pub data: DataLocation,
    /// The initial map view.
    pub view: MapView,
    /// The base style.
    pub base_style: BaseStyle,
    /// Raster dataset ids that are expected in the manifest.
    pub raster_ids: Vec<String>,
    /// Whether the satellite overlay starts visible.
    pub show_satellite: bool,
}
