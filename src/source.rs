//! Data sources that layers draw from.
//!
//! A source is created once per manifest entry and never mutated afterwards. Several layers may
//! share the same GeoJSON source, each selecting a subset of its features with a
//! [`PropertyFilter`].

use std::fmt;
use std::sync::Arc;

use geojson::{FeatureCollection, GeoJson};
use serde_json::Value as JsonValue;

use crate::error::ViewerError;
use crate::layers::point_in_ring;
use crate::projection::GeoPos;

/// A single feature property value, kept as a scalar that is safe to display.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number, formatted as it appeared in the document.
    Number(serde_json::Number),
    /// A string, stored verbatim.
    Text(String),
    /// An array or object, stored as compact JSON.
    Structured(String),
}

impl PropertyValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&JsonValue> for PropertyValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => PropertyValue::Null,
            JsonValue::Bool(b) => PropertyValue::Bool(*b),
            JsonValue::Number(n) => PropertyValue::Number(n.clone()),
            JsonValue::String(s) => PropertyValue::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                PropertyValue::Structured(value.to_string())
            }
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => f.write_str("null"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(s) | PropertyValue::Structured(s) => {
                // Control characters would break the one-line-per-property layout.
                for c in s.chars().filter(|c| !c.is_control()) {
                    write!(f, "{c}")?;
                }
                Ok(())
            }
        }
    }
}

/// The properties of a feature, in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the value for `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    /// Iterates over the properties in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no properties.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&geojson::JsonObject> for Properties {
    fn from(object: &geojson::JsonObject) -> Self {
        object
            .iter()
            .map(|(k, v)| (k.clone(), PropertyValue::from(v)))
            .collect()
    }
}

/// A polygon with an exterior ring and optional holes. Rings are not closed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    /// The outer boundary.
    pub exterior: Vec<GeoPos>,
    /// Interior rings cut out of the polygon.
    pub holes: Vec<Vec<GeoPos>>,
}

impl Polygon {
    /// Whether `pos` lies inside the polygon and outside all of its holes.
    pub fn contains(&self, pos: GeoPos) -> bool {
        point_in_ring(pos, &self.exterior) && !self.holes.iter().any(|h| point_in_ring(pos, h))
    }
}

/// A feature of a GeoJSON source, reduced to its fillable geometry and its properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceFeature {
    /// Polygons of the feature. Empty for point and line geometries.
    pub polygons: Vec<Polygon>,
    /// The feature properties.
    pub properties: Properties,
}

impl SourceFeature {
    /// Whether any of the feature's polygons contains `pos`.
    pub fn contains(&self, pos: GeoPos) -> bool {
        self.polygons.iter().any(|p| p.contains(pos))
    }
}

/// A source backed by a fetched GeoJSON feature collection.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoJsonSource {
    id: String,
    features: Vec<SourceFeature>,
}

impl GeoJsonSource {
    /// Creates a source from a feature collection.
    pub fn new(id: impl Into<String>, collection: &FeatureCollection) -> Self {
        Self {
            id: id.into(),
            features: collection.features.iter().map(SourceFeature::from).collect(),
        }
    }

    /// The source id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The features of the source, in document order.
    pub fn features(&self) -> &[SourceFeature] {
        &self.features
    }

    /// Returns the distinct non-empty string values of `key`, in first-seen order.
    pub fn distinct_values(&self, key: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for feature in &self.features {
            if let Some(value) = feature.properties.get_str(key) {
                if !value.is_empty() && !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
            }
        }
        values
    }
}

/// A source of raster tiles addressed by a URL template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterSource {
    /// The source id.
    pub id: String,
    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub template: String,
}

/// A registered data source.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    /// GeoJSON features.
    GeoJson(Arc<GeoJsonSource>),
    /// Raster tiles.
    Raster(RasterSource),
}

impl Source {
    /// The source id.
    pub fn id(&self) -> &str {
        match self {
            Source::GeoJson(source) => source.id(),
            Source::Raster(source) => &source.id,
        }
    }
}

/// Selects the features of a source that a layer draws.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyFilter {
    /// The string property `key` equals `value`.
    Equals {
        /// Property name.
        key: String,
        /// Expected value.
        value: String,
    },
}

impl PropertyFilter {
    /// Whether the feature properties pass the filter.
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            PropertyFilter::Equals { key, value } => {
                properties.get_str(key) == Some(value.as_str())
            }
        }
    }
}

/// Parses a GeoJSON document that must be a `FeatureCollection`.
pub fn parse_feature_collection(
    name: &str,
    bytes: &[u8],
) -> Result<FeatureCollection, ViewerError> {
    let text = std::str::from_utf8(bytes)?;
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => Err(ViewerError::NotAFeatureCollection(name.to_string())),
    }
}
