//! Turns manifest entries into sources, layers, toggles and popup bindings.
//!
//! Vector datasets are split into one fill layer per distinct value of [`CLASS_PROPERTY`]. Datasets
//! without that property get a single layer named after the dataset.

use std::sync::Arc;

use geojson::FeatureCollection;
use log::{debug, info, warn};

use crate::client::DataClient;
use crate::config::{EsriImageryConfig, TemplateMapConfig};
use crate::error::ViewerError;
use crate::layers::fill::FillLayer;
use crate::layers::tile::TileLayer;
use crate::legend::ToggleGroup;
use crate::manifest::{DatasetEntry, Manifest};
use crate::session::Session;
use crate::source::{GeoJsonSource, PropertyFilter, RasterSource, Source};

/// Layer id of the satellite imagery overlay.
pub const SATELLITE_LAYER_ID: &str = "esri-imagery";

/// Toggle label of the satellite imagery overlay.
pub const SATELLITE_LABEL: &str = "ESRI Satellite";

/// The feature property vector datasets are split by.
pub const CLASS_PROPERTY: &str = "secondaryClass";

/// Replaces every character that is not an ASCII letter, digit or underscore with `_`. Characters
/// outside the Basic Multilingual Plane take two UTF-16 code units and become two underscores.
pub fn sanitize_class(class: &str) -> String {
    let mut id = String::with_capacity(class.len());
    for c in class.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            id.push(c);
        } else {
            id.extend(std::iter::repeat_n('_', c.len_utf16()));
        }
    }
    id
}

/// The id of the layer showing the features of `dataset_id` whose class is `class`.
pub fn sublayer_id(dataset_id: &str, class: &str) -> String {
    format!("{}_{}", dataset_id, sanitize_class(class))
}

/// Registers the satellite imagery overlay with its toggle in the raster group.
pub fn register_satellite(session: &mut Session, visible: bool) -> Result<(), ViewerError> {
    let config = EsriImageryConfig::default();
    session.add_source(Source::Raster(RasterSource {
        id: SATELLITE_LAYER_ID.to_string(),
        template: config.template(),
    }))?;
    session.add_layer(SATELLITE_LAYER_ID, TileLayer::new(config))?;
    session.add_toggle(SATELLITE_LAYER_ID, SATELLITE_LABEL, ToggleGroup::Raster, visible)
}

/// A layer that a vector dataset will get.
struct PlannedLayer {
    id: String,
    label: String,
    class: Option<String>,
}

/// Registers a fetched vector dataset: its source, one fill layer per class, a toggle and a popup
/// binding per layer. Returns the ids of the new layers.
///
/// All ids are checked before anything is registered, so a dataset that collides with existing
/// layers, or whose classes sanitize to the same id, is rejected as a whole.
pub fn register_vector(
    session: &mut Session,
    entry: &DatasetEntry,
    collection: &FeatureCollection,
) -> Result<Vec<String>, ViewerError> {
    let source = Arc::new(GeoJsonSource::new(entry.id.as_str(), collection));
    let classes = source.distinct_values(CLASS_PROPERTY);

    let planned: Vec<PlannedLayer> = if classes.is_empty() {
        vec![PlannedLayer {
            id: entry.id.clone(),
            label: entry.id.clone(),
            class: None,
        }]
    } else {
        classes
            .into_iter()
            .map(|class| PlannedLayer {
                id: sublayer_id(&entry.id, &class),
                label: format!("{} - {}", entry.id, class),
                class: Some(class),
            })
            .collect()
    };

    if session.source(&entry.id).is_some() {
        return Err(ViewerError::DuplicateLayer(entry.id.clone()));
    }
    for (i, layer) in planned.iter().enumerate() {
        if session.is_layer_id_taken(&layer.id) || planned[..i].iter().any(|p| p.id == layer.id) {
            return Err(ViewerError::DuplicateLayer(layer.id.clone()));
        }
    }

    session.add_source(Source::GeoJson(source.clone()))?;

    let mut ids = Vec::with_capacity(planned.len());
    for layer in planned {
        let (filter, color) = match layer.class {
            Some(class) => {
                let color = session.color_for(&class);
                let filter = PropertyFilter::Equals {
                    key: CLASS_PROPERTY.to_string(),
                    value: class,
                };
                (Some(filter), color)
            }
            None => (None, session.next_fallback_color()),
        };

        session.add_layer(&layer.id, FillLayer::new(source.clone(), filter, color))?;
        session.add_toggle(&layer.id, layer.label, ToggleGroup::Vector, true)?;
        session.bind_popup(&layer.id)?;
        debug!("Registered layer {} from {}", layer.id, entry.file);
        ids.push(layer.id);
    }

    info!("Loaded {} ({} layers)", entry.id, ids.len());
    Ok(ids)
}

/// Registers the raster datasets of the manifest that are in `allow_list`, in allow-list order.
/// Returns the ids of the new layers. Failures are logged and the dataset skipped.
pub fn register_rasters<S: AsRef<str>>(
    session: &mut Session,
    manifest: &Manifest,
    allow_list: &[S],
    client: &dyn DataClient,
) -> Vec<String> {
    let mut ids = Vec::new();
    for entry in manifest.expected_rasters(allow_list) {
        match register_raster(session, entry, client) {
            Ok(()) => ids.push(entry.id.clone()),
            Err(e) => warn!("Skipping raster {}: {}", entry.id, e),
        }
    }
    ids
}

fn register_raster(
    session: &mut Session,
    entry: &DatasetEntry,
    client: &dyn DataClient,
) -> Result<(), ViewerError> {
    let template = client
        .tile_template(&entry.id)
        .ok_or_else(|| ViewerError::NoTileTemplate(entry.id.clone()))?;
    if session.is_layer_id_taken(&entry.id) || session.source(&entry.id).is_some() {
        return Err(ViewerError::DuplicateLayer(entry.id.clone()));
    }

    session.add_source(Source::Raster(RasterSource {
        id: entry.id.clone(),
        template: template.clone(),
    }))?;
    session.add_layer(
        &entry.id,
        TileLayer::new(TemplateMapConfig::new(template)).with_opacity(1.0),
    )?;
    session.add_toggle(&entry.id, entry.file.as_str(), ToggleGroup::Raster, true)?;
    info!("Loaded raster {}", entry.id);
    Ok(())
}
