//! Map construction and the staged initialization flow.
//!
//! The [`Initializer`] fetches the manifest as soon as it is created, waits for the map to finish
//! loading, then registers the satellite overlay, the raster datasets and finally the vector
//! datasets. Vector datasets are fetched one at a time in manifest order, so fallback colors are
//! handed out in a stable order.

use std::sync::Arc;

use eyre::Context;
use geojson::FeatureCollection;
use log::{debug, error, info, warn};
use poll_promise::Promise;
use serde_json::Value as JsonValue;

use crate::client::DataClient;
use crate::config::{BaseStyle, MapView, OpenStreetMapConfig, TemplateMapConfig};
use crate::error::ViewerError;
use crate::manifest::Manifest;
use crate::registrar::{register_rasters, register_satellite, register_vector};
use crate::session::Session;
use crate::{CLIENT, MAX_ZOOM, MIN_ZOOM, Map};

/// Returns the first raster tile template of a style document. Both TileJSON documents
/// (`{"tiles": [...]}`) and style documents with sources (`{"sources": {"x": {"tiles": [...]}}}`)
/// are understood.
pub fn style_template(style: &JsonValue) -> Option<String> {
    if let Some(template) = style["tiles"][0].as_str() {
        return Some(template.to_string());
    }
    style["sources"]
        .as_object()?
        .values()
        .find_map(|source| source["tiles"][0].as_str())
        .map(str::to_string)
}

/// Fetches a remote style document and returns its tile template.
pub fn fetch_style_template(url: &str) -> Result<String, ViewerError> {
    debug!("Fetching style from {}", url);
    let response = CLIENT.get(url).send()?;
    if !response.status().is_success() {
        return Err(ViewerError::HttpStatus {
            url: url.to_string(),
            status: response.status().to_string(),
        });
    }

    let style: JsonValue = serde_json::from_slice(&response.bytes()?)?;
    style_template(&style).ok_or_else(|| ViewerError::NoTileTemplate(url.to_string()))
}

/// Creates the map with OpenStreetMap base tiles, the given initial view and a navigation control.
///
/// For a remote base style the map starts out with OpenStreetMap tiles, and the returned loader
/// swaps in the remote tiles once the style document has been resolved.
pub fn build_map(view: &MapView, style: &BaseStyle) -> (Map, Option<BaseStyleLoader>) {
    let mut map = Map::new(OpenStreetMapConfig::default());
    map.center = view.center;
    map.zoom = view.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    map.add_navigation_control();

    let loader = match style {
        BaseStyle::InlineRaster => None,
        BaseStyle::Remote { url } => Some(BaseStyleLoader::spawn(url.as_str())),
    };
    (map, loader)
}

/// Resolves a remote base style in the background.
pub struct BaseStyleLoader {
    url: String,
    fetch: Option<Fetch<String>>,
}

impl BaseStyleLoader {
    /// Starts fetching the style document at `url`.
    pub fn spawn(url: impl Into<String>) -> Self {
        let url = url.into();
        let style_url = url.clone();
        let fetch = Promise::spawn_thread("fetch_style", move || {
            fetch_style_template(&style_url)
                .with_context(|| format!("Failed to resolve base style {}", style_url))
                .map_err(Arc::new)
        });

        Self {
            url,
            fetch: Some(fetch),
        }
    }

    /// The URL of the style document.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Applies the resolved style to `map`. A style that cannot be resolved is logged and the map
    /// keeps its OpenStreetMap tiles. Returns `true` once the style has been handled.
    pub fn poll(&mut self, map: &mut Map) -> bool {
        let Some(fetch) = self.fetch.take() else {
            return true;
        };

        match fetch.try_take() {
            Ok(Ok(template)) => {
                info!("Using base tiles {}", template);
                map.set_config(Box::new(TemplateMapConfig::new(template)));
                true
            }
            Ok(Err(e)) => {
                error!("{:?}", e);
                warn!("Keeping OpenStreetMap tiles instead of {}", self.url);
                true
            }
            Err(fetch) => {
                self.fetch = Some(fetch);
                false
            }
        }
    }
}

/// Where the initialization flow is at.
#[derive(Clone, Debug)]
pub enum InitStatus {
    /// The manifest or a dataset is still being fetched, or the map has not loaded yet.
    Loading,
    /// Every dataset has been registered or skipped.
    Ready,
    /// The manifest could not be loaded. Only the base map is shown.
    Failed(Arc<eyre::Report>),
}

type Fetch<T> = Promise<Result<T, Arc<eyre::Report>>>;

enum Stage {
    Manifest(Fetch<Manifest>),
    WaitingForMap(Manifest),
    Dataset {
        manifest: Manifest,
        index: usize,
        fetch: Fetch<FeatureCollection>,
    },
    Done,
    Failed(Arc<eyre::Report>),
}

/// Drives the registration of everything the manifest lists. Call [`Initializer::poll`] once per
/// frame.
pub struct Initializer {
    client: Arc<dyn DataClient>,
    raster_ids: Vec<String>,
    show_satellite: bool,
    stage: Stage,
}

impl Initializer {
    /// Starts fetching the manifest.
    pub fn new(client: Arc<dyn DataClient>, raster_ids: Vec<String>, show_satellite: bool) -> Self {
        let manifest_client = client.clone();
        let fetch = Promise::spawn_thread("fetch_manifest", move || {
            manifest_client
                .fetch_manifest()
                .with_context(|| "Failed to load manifest".to_string())
                .map_err(Arc::new)
        });

        Self {
            client,
            raster_ids,
            show_satellite,
            stage: Stage::Manifest(fetch),
        }
    }

    /// The current status.
    pub fn status(&self) -> InitStatus {
        match &self.stage {
            Stage::Done => InitStatus::Ready,
            Stage::Failed(e) => InitStatus::Failed(e.clone()),
            _ => InitStatus::Loading,
        }
    }

    /// Advances the flow as far as finished fetches allow, registering into `session`.
    pub fn poll(&mut self, session: &mut Session) -> InitStatus {
        let was_done = matches!(self.stage, Stage::Done);
        loop {
            let stage = std::mem::replace(&mut self.stage, Stage::Done);
            let (next, progressed) = self.advance(stage, session);
            self.stage = next;
            if !progressed {
                break;
            }
        }

        if !was_done && matches!(self.stage, Stage::Done) {
            info!("Initialization finished");
            debug!("Registered layers: {}", session.layer_ids().join(", "));
        }
        self.status()
    }

    fn advance(&self, stage: Stage, session: &mut Session) -> (Stage, bool) {
        match stage {
            Stage::Manifest(fetch) => match fetch.try_take() {
                Ok(Ok(manifest)) => {
                    info!(
                        "Manifest lists {} vector and {} raster datasets",
                        manifest.geojsons.len(),
                        manifest.rasters.len()
                    );
                    (Stage::WaitingForMap(manifest), true)
                }
                Ok(Err(e)) => {
                    error!("{:?}", e);
                    (Stage::Failed(e), false)
                }
                Err(fetch) => (Stage::Manifest(fetch), false),
            },
            Stage::WaitingForMap(manifest) => {
                if !session.map().is_loaded() {
                    return (Stage::WaitingForMap(manifest), false);
                }
                if let Err(e) = register_satellite(session, self.show_satellite) {
                    warn!("Failed to register satellite imagery: {}", e);
                }
                register_rasters(session, &manifest, &self.raster_ids, self.client.as_ref());
                (self.fetch_dataset(manifest, 0), true)
            }
            Stage::Dataset {
                manifest,
                index,
                fetch,
            } => match fetch.try_take() {
                Ok(result) => {
                    if let Some(entry) = manifest.geojsons.get(index) {
                        match result {
                            Ok(collection) => {
                                if let Err(e) = register_vector(session, entry, &collection) {
                                    error!("Failed to register {}: {}", entry.id, e);
                                }
                            }
                            Err(e) => error!("{:?}", e),
                        }
                    }
                    (self.fetch_dataset(manifest, index + 1), true)
                }
                Err(fetch) => (
                    Stage::Dataset {
                        manifest,
                        index,
                        fetch,
                    },
                    false,
                ),
            },
            stage @ (Stage::Done | Stage::Failed(_)) => (stage, false),
        }
    }

    fn fetch_dataset(&self, manifest: Manifest, index: usize) -> Stage {
        let Some(entry) = manifest.geojsons.get(index) else {
            return Stage::Done;
        };

        let client = self.client.clone();
        let file = entry.file.clone();
        let fetch = Promise::spawn_thread("fetch_dataset", move || {
            client
                .fetch_collection(&file)
                .with_context(|| format!("Failed to load dataset {}", file))
                .map_err(Arc::new)
        });

        Stage::Dataset {
            manifest,
            index,
            fetch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Visibility;
    use crate::layers::fill::FillLayer;
    use crate::legend::ToggleGroup;
    use crate::manifest::DatasetEntry;
    use crate::palette::FALLBACK_PALETTE;
    use crate::TileId;
    use crate::registrar::SATELLITE_LAYER_ID;
    use crate::source::parse_feature_collection;
    use crate::testing::serve_once;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    struct FakeClient {
        manifest: Option<Manifest>,
        files: HashMap<String, JsonValue>,
    }

    impl DataClient for FakeClient {
        fn fetch_manifest(&self) -> Result<Manifest, ViewerError> {
            self.manifest
                .clone()
                .ok_or_else(|| ViewerError::HttpStatus {
                    url: "/manifest.json".to_string(),
                    status: "404 Not Found".to_string(),
                })
        }

        fn fetch_collection(&self, file: &str) -> Result<FeatureCollection, ViewerError> {
            let value = self.files.get(file).ok_or_else(|| ViewerError::HttpStatus {
                url: format!("/data/{file}"),
                status: "500 Internal Server Error".to_string(),
            })?;
            parse_feature_collection(file, value.to_string().as_bytes())
        }

        fn tile_template(&self, id: &str) -> Option<String> {
            Some(format!("/tiles/{id}/{{z}}/{{x}}/{{y}}.png"))
        }
    }

    fn dataset(classes: &[Option<&str>]) -> JsonValue {
        let features: Vec<JsonValue> = classes
            .iter()
            .enumerate()
            .map(|(i, class)| {
                let x = i as f64;
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 0.0]]]
                    },
                    "properties": match class {
                        Some(class) => json!({ "secondaryClass": class }),
                        None => json!({ "name": "plain" }),
                    }
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    fn session(loaded: bool) -> Session {
        let mut map = Map::new(OpenStreetMapConfig::default());
        if loaded {
            map.mark_loaded();
        }
        Session::new(map)
    }

    fn run(initializer: &mut Initializer, session: &mut Session) -> InitStatus {
        let started = Instant::now();
        loop {
            let status = initializer.poll(session);
            if !matches!(status, InitStatus::Loading) {
                return status;
            }
            assert!(started.elapsed() < Duration::from_secs(10), "initialization did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn style_template_reads_tilejson_and_styles() {
        assert_eq!(
            style_template(&json!({ "tiles": ["https://a/{z}/{x}/{y}.png"] })).as_deref(),
            Some("https://a/{z}/{x}/{y}.png")
        );
        assert_eq!(
            style_template(&json!({
                "version": 8,
                "sources": { "osm": { "type": "raster", "tiles": ["https://b/{z}/{x}/{y}.png"] } }
            }))
            .as_deref(),
            Some("https://b/{z}/{x}/{y}.png")
        );
        assert_eq!(style_template(&json!({ "version": 8, "sources": {} })), None);
    }

    fn finish(loader: &mut BaseStyleLoader, map: &mut Map) {
        let started = Instant::now();
        while !loader.poll(map) {
            assert!(started.elapsed() < Duration::from_secs(10), "style did not resolve");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn build_map_applies_view() {
        let view = MapView {
            center: (10.0, 20.0).into(),
            zoom: 30,
        };
        let (map, loader) = build_map(&view, &BaseStyle::InlineRaster);
        assert!(loader.is_none());
        assert_eq!(map.center, view.center);
        assert_eq!(map.zoom, MAX_ZOOM);
        assert!(map.has_navigation_control());
    }

    #[test]
    fn unreachable_style_keeps_openstreetmap() {
        let style = BaseStyle::Remote {
            url: "http://127.0.0.1:1/style.json".to_string(),
        };
        let (mut map, loader) = build_map(&MapView::default(), &style);
        let mut loader = loader.unwrap();
        assert_eq!(loader.url(), "http://127.0.0.1:1/style.json");

        finish(&mut loader, &mut map);
        assert_eq!(map.center, MapView::default().center);
        assert_eq!(map.zoom, 13);
        assert!(map.has_navigation_control());
        assert_eq!(
            map.config().attribution().map(String::as_str),
            Some("© OpenStreetMap")
        );
        assert_eq!(
            map.config().tile_url(&TileId { z: 0, x: 0, y: 0 }),
            "https://tile.openstreetmap.org/0/0/0.png"
        );
        assert!(loader.poll(&mut map));
    }

    #[test]
    fn resolved_style_replaces_base_tiles() {
        let base = serve_once(
            "200 OK",
            json!({ "tiles": ["http://tiles.example/{z}/{x}/{y}.png"] }).to_string(),
        );
        let style = BaseStyle::Remote {
            url: format!("{base}/style.json"),
        };
        let (mut map, loader) = build_map(&MapView::default(), &style);

        finish(&mut loader.unwrap(), &mut map);
        assert_eq!(
            map.config().tile_url(&TileId { z: 3, x: 1, y: 2 }),
            "http://tiles.example/3/1/2.png"
        );
    }

    #[test]
    fn style_error_status_is_reported() {
        let base = serve_once("500 Internal Server Error", "{}");
        assert!(matches!(
            fetch_style_template(&format!("{base}/style.json")),
            Err(ViewerError::HttpStatus { .. })
        ));
    }

    #[test]
    fn registration_waits_for_map() {
        let client = FakeClient {
            manifest: Some(Manifest::default()),
            files: HashMap::new(),
        };
        let mut initializer = Initializer::new(Arc::new(client), vec![], false);
        let mut session = session(false);

        for _ in 0..20 {
            assert!(matches!(initializer.poll(&mut session), InitStatus::Loading));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(session.layer_ids().is_empty());

        session.map_mut().mark_loaded();
        assert!(matches!(run(&mut initializer, &mut session), InitStatus::Ready));
        assert_eq!(session.layer_ids(), [SATELLITE_LAYER_ID.to_string()]);
        assert_eq!(session.map().visibility(SATELLITE_LAYER_ID), Some(Visibility::Hidden));
    }

    #[test]
    fn failed_dataset_is_skipped() {
        let client = FakeClient {
            manifest: Some(Manifest {
                geojsons: vec![
                    DatasetEntry::new("first", "first.geojson"),
                    DatasetEntry::new("broken", "broken.geojson"),
                    DatasetEntry::new("last", "last.geojson"),
                ],
                rasters: vec![DatasetEntry::new("ndvi", "ndvi.tif")],
            }),
            files: HashMap::from([
                ("first.geojson".to_string(), dataset(&[Some("WATER"), Some("ODD")])),
                ("last.geojson".to_string(), dataset(&[None])),
            ]),
        };
        let mut initializer = Initializer::new(Arc::new(client), vec!["ndvi".to_string()], true);
        let mut session = session(true);

        assert!(matches!(run(&mut initializer, &mut session), InitStatus::Ready));
        assert_eq!(
            session.layer_ids(),
            [SATELLITE_LAYER_ID, "ndvi", "first_WATER", "first_ODD", "last"].map(String::from)
        );
        assert!(session.legend().entries().all(|e| e.layer_id != "broken"));
        assert_eq!(session.legend().group(ToggleGroup::Vector).len(), 3);
        assert_eq!(session.legend().group(ToggleGroup::Raster).len(), 2);
        assert_eq!(session.map().visibility(SATELLITE_LAYER_ID), Some(Visibility::Visible));

        assert_eq!(
            session.map().layer::<FillLayer>("first_ODD").unwrap().color,
            FALLBACK_PALETTE[0]
        );
        assert_eq!(session.map().layer::<FillLayer>("last").unwrap().color, FALLBACK_PALETTE[1]);
    }

    #[test]
    fn manifest_failure_leaves_base_map_only() {
        let client = FakeClient {
            manifest: None,
            files: HashMap::new(),
        };
        let mut initializer = Initializer::new(Arc::new(client), vec![], false);
        let mut session = session(true);

        let report = match run(&mut initializer, &mut session) {
            InitStatus::Failed(report) => report,
            status => panic!("expected failure, got {status:?}"),
        };
        assert!(format!("{report:?}").contains("Failed to load manifest"));
        assert!(session.layer_ids().is_empty());
        assert_eq!(session.legend().entries().count(), 0);
    }
}
