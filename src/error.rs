//! Error types used by the crate.

use thiserror::Error;

/// Errors that can occur while loading data or registering layers.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    Connection(#[from] reqwest::Error),

    /// A request returned a non-success status code.
    #[error("Request to `{url}` failed. HTTP Status: `{status}`")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The status returned by the server.
        status: String,
    },

    /// A map tile failed to download.
    #[error("A map tile failed to download. HTTP Status: `{0}`")]
    TileDownload(String),

    /// The downloaded tile bytes could not be converted to an image.
    #[error("Unable to convert downloaded map tile bytes as image")]
    TileDecode(#[from] image::ImageError),

    /// A JSON document could not be decoded.
    #[error("Unable to decode JSON document")]
    Decode(#[from] serde_json::Error),

    /// A GeoJSON document could not be parsed.
    #[error("Unable to parse GeoJSON document")]
    GeoJson(#[from] geojson::Error),

    /// The payload was not valid UTF-8.
    #[error("Document is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// Reading a local file or directory failed.
    #[error("Failed to read local data")]
    Io(#[from] std::io::Error),

    /// The GeoJSON document parsed, but is not a `FeatureCollection`.
    #[error("`{0}` is not a GeoJSON FeatureCollection")]
    NotAFeatureCollection(String),

    /// The style document did not name a tile source.
    #[error("Style document `{0}` has no raster tile template")]
    NoTileTemplate(String),

    /// A source or layer with the same id is already registered.
    #[error("A layer or source with id `{0}` already exists")]
    DuplicateLayer(String),

    /// No layer with the given id is registered.
    #[error("No layer with id `{0}`")]
    UnknownLayer(String),

    /// A layer was mutated before the map finished loading.
    #[error("The map has not finished loading")]
    MapNotLoaded,
}
