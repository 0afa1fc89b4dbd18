//! The index of datasets served by the backend.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ViewerError;

/// One dataset listed in the manifest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Unique key, used as the source id and the base layer id.
    pub id: String,
    /// Server relative path of the dataset.
    pub file: String,
}

impl DatasetEntry {
    /// Creates a new entry.
    pub fn new(id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
        }
    }
}

/// The manifest document, `{ "geojsons": [...], "rasters": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Vector datasets, served as GeoJSON feature collections.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub geojsons: Vec<DatasetEntry>,

    /// Raster datasets, served as tiles.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub rasters: Vec<DatasetEntry>,
}

/// Reads a list that may also be given as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    /// Decodes a manifest from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ViewerError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The raster entries whose ids are in `expected`, in the order of `expected`. Expected ids
    /// missing from the manifest are skipped.
    pub fn expected_rasters<'a, S: AsRef<str>>(
        &'a self,
        expected: &'a [S],
    ) -> impl Iterator<Item = &'a DatasetEntry> + 'a {
        expected
            .iter()
            .filter_map(|id| self.rasters.iter().find(|r| r.id == id.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_full_manifest() {
        let manifest = Manifest::from_slice(
            br#"{
                "geojsons": [{"id": "Parks", "file": "Parks.geojson"}],
                "rasters": [{"id": "ndvi", "file": "ndvi.tif"}]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.geojsons, vec![DatasetEntry::new("Parks", "Parks.geojson")]);
        assert_eq!(manifest.rasters, vec![DatasetEntry::new("ndvi", "ndvi.tif")]);
    }

    #[test]
    fn missing_lists_are_empty() {
        let manifest = Manifest::from_slice(b"{}").unwrap();
        assert!(manifest.geojsons.is_empty());
        assert!(manifest.rasters.is_empty());
    }

    #[test]
    fn null_lists_are_empty() {
        let manifest = Manifest::from_slice(br#"{"geojsons": null, "rasters": null}"#).unwrap();
        assert!(manifest.geojsons.is_empty());
        assert!(manifest.rasters.is_empty());

        let json = br#"{"geojsons": [{"id": "a", "file": "a.geojson"}], "rasters": null}"#;
        let manifest = Manifest::from_slice(json).unwrap();
        assert_eq!(manifest.geojsons, vec![DatasetEntry::new("a", "a.geojson")]);
    }

    #[test]
    fn invalid_manifest_is_a_decode_error() {
        let err = Manifest::from_slice(b"<html>not found</html>").unwrap_err();
        assert!(matches!(err, ViewerError::Decode(_)));
    }

    #[test]
    fn expected_rasters_follow_allow_list_order() {
        let manifest = Manifest {
            geojsons: vec![],
            rasters: vec![
                DatasetEntry::new("dem", "dem.tif"),
                DatasetEntry::new("ndvi", "ndvi.tif"),
                DatasetEntry::new("unlisted", "x.tif"),
            ],
        };

        let ids: Vec<&str> = manifest
            .expected_rasters(&["ndvi", "missing", "dem"])
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ndvi", "dem"]);
    }
}
