//! Clients that fetch the manifest and the datasets it lists.
//!
//! [`HttpClient`] talks to a server exposing `/manifest.json`, `/data/{file}` and
//! `/tiles/{id}/{z}/{x}/{y}.png`. [`DirectoryClient`] serves the same content from a local
//! directory of `.geojson` files, deriving the manifest from the file names.

use std::path::{Path, PathBuf};

use geojson::FeatureCollection;
use log::debug;

use crate::CLIENT;
use crate::error::ViewerError;
use crate::manifest::{DatasetEntry, Manifest};
use crate::source::parse_feature_collection;

/// Fetches the manifest and datasets. Implementations block, and are called from background
/// threads.
pub trait DataClient: Send + Sync {
    /// Fetches the manifest.
    fn fetch_manifest(&self) -> Result<Manifest, ViewerError>;

    /// Fetches the feature collection stored in `file`.
    fn fetch_collection(&self, file: &str) -> Result<FeatureCollection, ViewerError>;

    /// Returns the tile URL template of the raster dataset `id`, if the client serves tiles.
    fn tile_template(&self, id: &str) -> Option<String>;
}

/// A client for an HTTP backend.
#[derive(Clone, Debug)]
pub struct HttpClient {
    base_url: String,
}

impl HttpClient {
    /// Creates a client for the server at `base_url`, e.g. `http://127.0.0.1:8001`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the manifest.
    pub fn manifest_url(&self) -> String {
        format!("{}/manifest.json", self.base_url)
    }

    /// URL of a dataset file.
    pub fn data_url(&self, file: &str) -> String {
        format!("{}/data/{}", self.base_url, file.trim_start_matches('/'))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, ViewerError> {
        debug!("Fetching {}", url);
        let response = CLIENT.get(url).send()?;
        if !response.status().is_success() {
            return Err(ViewerError::HttpStatus {
                url: url.to_string(),
                status: response.status().to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl DataClient for HttpClient {
    fn fetch_manifest(&self) -> Result<Manifest, ViewerError> {
        Manifest::from_slice(&self.get(&self.manifest_url())?)
    }

    fn fetch_collection(&self, file: &str) -> Result<FeatureCollection, ViewerError> {
        parse_feature_collection(file, &self.get(&self.data_url(file))?)
    }

    fn tile_template(&self, id: &str) -> Option<String> {
        Some(format!("{}/tiles/{}/{{z}}/{{x}}/{{y}}.png", self.base_url, id))
    }
}

/// A client reading `.geojson` files from a local directory.
#[derive(Clone, Debug)]
pub struct DirectoryClient {
    dir: PathBuf,
}

impl DirectoryClient {
    /// Creates a client for the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory the client reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Derives a dataset id from a file name: the extension is stripped and spaces and hyphens become
/// underscores. Returns `None` for files that are not `.geojson`.
pub fn dataset_id(file_name: &str) -> Option<String> {
    let path = Path::new(file_name);
    let is_geojson = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("geojson"));
    if !is_geojson {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    Some(stem.replace([' ', '-'], "_"))
}

impl DataClient for DirectoryClient {
    fn fetch_manifest(&self) -> Result<Manifest, ViewerError> {
        let mut geojsons = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(file) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(id) = dataset_id(&file) {
                geojsons.push(DatasetEntry { id, file });
            }
        }
        geojsons.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Manifest {
            geojsons,
            rasters: Vec::new(),
        })
    }

    fn fetch_collection(&self, file: &str) -> Result<FeatureCollection, ViewerError> {
        let bytes = std::fs::read(self.dir.join(file))?;
        parse_feature_collection(file, &bytes)
    }

    fn tile_template(&self, _id: &str) -> Option<String> {
        None
    }
}
