//! Conversion of GeoJSON features into fillable source features.

use geojson::{Feature, Geometry, PolygonType, Position, Value};
use log::warn;

use crate::projection::GeoPos;
use crate::source::{Polygon, Properties, SourceFeature};

fn vec_to_geo_pos(pos: &Position) -> Option<GeoPos> {
    match pos.as_slice() {
        [lon, lat, ..] => Some(GeoPos {
            lon: *lon,
            lat: *lat,
        }),
        _ => None,
    }
}

fn ring_to_geo_pos(ring: &[Position]) -> Vec<GeoPos> {
    let mut points: Vec<GeoPos> = ring.iter().filter_map(vec_to_geo_pos).collect();

    // GeoJSON rings are closed; drop the closing point.
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn to_polygon(rings: &PolygonType) -> Option<Polygon> {
    let mut rings = rings.iter();
    let exterior = ring_to_geo_pos(rings.next()?);
    if exterior.len() < 3 {
        warn!("Skipping polygon with {} nodes", exterior.len());
        return None;
    }

    Some(Polygon {
        exterior,
        holes: rings
            .map(|r| ring_to_geo_pos(r))
            .filter(|r| r.len() >= 3)
            .collect(),
    })
}

fn collect_polygons(geometry: &Geometry, polygons: &mut Vec<Polygon>) {
    match &geometry.value {
        Value::Polygon(rings) => polygons.extend(to_polygon(rings)),
        Value::MultiPolygon(parts) => polygons.extend(parts.iter().filter_map(to_polygon)),
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_polygons(geometry, polygons);
            }
        }
        // Fill layers only draw areas.
        _ => {}
    }
}

impl From<&Feature> for SourceFeature {
    fn from(feature: &Feature) -> Self {
        let mut polygons = Vec::new();
        if let Some(geometry) = &feature.geometry {
            collect_polygons(geometry, &mut polygons);
        }

        SourceFeature {
            polygons,
            properties: feature
                .properties
                .as_ref()
                .map(Properties::from)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(value: serde_json::Value) -> Feature {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn polygon_drops_closing_point() {
        let f = feature(json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
            },
            "properties": { "secondaryClass": "WATER" }
        }));

        let source_feature = SourceFeature::from(&f);
        assert_eq!(source_feature.polygons.len(), 1);
        assert_eq!(source_feature.polygons[0].exterior.len(), 3);
        assert_eq!(source_feature.properties.get_str("secondaryClass"), Some("WATER"));
    }

    #[test]
    fn multipolygon_and_holes() {
        let f = feature(json!({
            "type": "Feature",
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [
                        [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
                        [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]]
                    ],
                    [[[10.0, 10.0], [11.0, 10.0], [11.0, 11.0], [10.0, 10.0]]]
                ]
            },
            "properties": null
        }));

        let source_feature = SourceFeature::from(&f);
        assert_eq!(source_feature.polygons.len(), 2);
        assert_eq!(source_feature.polygons[0].holes.len(), 1);
        assert!(source_feature.properties.is_empty());
        assert!(source_feature.contains(GeoPos::from((3.0, 3.0))));
        assert!(!source_feature.contains(GeoPos::from((1.5, 1.5))));
    }

    #[test]
    fn points_and_lines_have_no_polygons() {
        let f = feature(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] },
            "properties": { "name": "creek" }
        }));

        let source_feature = SourceFeature::from(&f);
        assert!(source_feature.polygons.is_empty());
        assert_eq!(source_feature.properties.len(), 1);
    }
}
