use geojson::{Feature, GeoJson, Geometry, Value};
use log::LevelFilter;
use serde_json::{Map, Value as JsonValue};

pub mod annotations;
pub mod bbox;
pub mod error;
pub mod generator;
pub mod graph;
pub mod layout;
pub mod names;
pub mod osm_fetcher;
pub mod sampler;
pub mod types;

pub use self::error::{Error, Rejection, Result};
pub use self::generator::{Generator, GeneratorConfig, RunSummary};
pub use self::types::{AdjacencyGraph, BoundingBox, EdgeBBox, NodeName, OsmData};

use self::types::{OsmNodeId, RawNode};

pub fn init_logger(level: LevelFilter) {
    // RUST_LOG wins over the level picked on the command line
    if let Err(e) = env_logger::Builder::new().filter_level(level).parse_default_env().try_init() {
        eprintln!("logger already initialized: {e}");
    }
    log::info!("Logger initialized from library");
}

impl RawNode {
    fn to_vec(&self) -> Vec<f64> {
        vec![self.longitude(), self.latitude()]
    }
}

/// Where a sample came from on the map: its way segments as one
/// MultiLineString feature, with the bounding box of all of them.
pub fn sample_to_geojson(data: &OsmData, sampled: &[OsmNodeId]) -> GeoJson {
    let inside = |id: &OsmNodeId| sampled.binary_search(id).is_ok();

    let lines: Vec<Vec<Vec<f64>>> = data
        .ways
        .iter()
        .flat_map(|way| way.node_ids.windows(2))
        .filter(|pair| inside(&pair[0]) && inside(&pair[1]))
        .filter_map(|pair| Some(vec![data.nodes.get(&pair[0])?.to_vec(), data.nodes.get(&pair[1])?.to_vec()]))
        .collect();

    // [min_x, min_y, max_x, max_y]
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for coord in lines.iter().flatten() {
        min_x = min_x.min(coord[0]);
        min_y = min_y.min(coord[1]);
        max_x = max_x.max(coord[0]);
        max_y = max_y.max(coord[1]);
    }

    let mut properties = Map::new();
    properties.insert("sampled_nodes".to_string(), JsonValue::from(sampled.len()));

    GeoJson::Feature(Feature {
        bbox: if lines.is_empty() { None } else { Some(vec![min_x, min_y, max_x, max_y]) },
        geometry: Some(Geometry::new(Value::MultiLineString(lines))),
        properties: Some(properties),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawWay;

    #[test]
    fn geojson_keeps_only_sampled_segments() {
        let data = OsmData {
            nodes: [(1, RawNode::new(1, 55.0, 37.0)), (2, RawNode::new(2, 55.001, 37.002)), (3, RawNode::new(3, 56.0, 38.0))]
                .into_iter()
                .collect(),
            ways: vec![RawWay { id: 1, node_ids: vec![1, 2, 3] }],
        };
        let GeoJson::Feature(feature) = sample_to_geojson(&data, &[1, 2]) else {
            panic!("expected a feature");
        };
        assert_eq!(feature.bbox, Some(vec![37.0, 55.0, 37.002, 55.001]));
        let Some(Geometry { value: Value::MultiLineString(lines), .. }) = feature.geometry else {
            panic!("expected a multilinestring");
        };
        assert_eq!(lines, vec![vec![vec![37.0, 55.0], vec![37.002, 55.001]]]);
    }
}
