use geo::Coord;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ** OSM data types **

pub type OsmNodeId = u64;

// A single map node. `location.x` is the longitude, `location.y` the latitude.
#[derive(Clone, Debug, PartialEq)]
pub struct RawNode {
    pub id: OsmNodeId,
    pub location: Coord<f64>,
}

impl RawNode {
    pub fn new(id: OsmNodeId, latitude: f64, longitude: f64) -> Self {
        RawNode { id, location: Coord { x: longitude, y: latitude } }
    }

    pub fn latitude(&self) -> f64 {
        self.location.y
    }

    pub fn longitude(&self) -> f64 {
        self.location.x
    }
}

// A whole path as the query service returns it: node ids in traversal order.
#[derive(Clone, Debug, PartialEq)]
pub struct RawWay {
    pub id: u64,
    pub node_ids: Vec<OsmNodeId>,
}

/// Everything fetched once per run and shared read-only by every sample attempt.
#[derive(Clone, Debug, Default)]
pub struct OsmData {
    pub nodes: HashMap<OsmNodeId, RawNode>,
    pub ways: Vec<RawWay>,
}

// ** Graph types **

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Self {
        NodeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Edge kind drawn at random per edge. Only the numeric value is serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Type1 = 1,
    Type2 = 2,
}

impl EdgeType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EdgeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EdgeType::Type1),
            2 => Ok(EdgeType::Type2),
            other => Err(other),
        }
    }
}

impl Serialize for EdgeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for EdgeType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        EdgeType::try_from(raw)
            .map_err(|v| serde::de::Error::custom(format!("edge type must be 1 or 2, got {v}")))
    }
}

// Weight isn't used and is always "1"; downstream readers expect the field.
pub const EDGE_WEIGHT: &str = "1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub weight: String,
}

impl EdgeAttributes {
    pub fn new(edge_type: EdgeType) -> Self {
        EdgeAttributes { edge_type, weight: EDGE_WEIGHT.to_string() }
    }
}

/// Undirected graph stored as a symmetric neighbour mapping keyed by node name.
///
/// The only way to add an edge is [`AdjacencyGraph::insert_edge`], which writes
/// both directions with the same attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjacencyGraph {
    adjacency: BTreeMap<NodeName, BTreeMap<NodeName, EdgeAttributes>>,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_edge(&mut self, a: NodeName, b: NodeName, edge_type: EdgeType) {
        let attributes = EdgeAttributes::new(edge_type);
        self.adjacency
            .entry(a.clone())
            .or_default()
            .insert(b.clone(), attributes.clone());
        self.adjacency.entry(b).or_default().insert(a, attributes);
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeName> {
        self.adjacency.keys()
    }

    pub fn edge(&self, a: &NodeName, b: &NodeName) -> Option<&EdgeAttributes> {
        self.adjacency.get(a).and_then(|adj| adj.get(b))
    }

    /// Every stored direction, so each undirected edge shows up twice.
    pub fn directed_edges(&self) -> impl Iterator<Item = (&NodeName, &NodeName, &EdgeAttributes)> {
        self.adjacency
            .iter()
            .flat_map(|(a, adj)| adj.iter().map(move |(b, attrs)| (a, b, attrs)))
    }
}

// ** Layout types **

/// Per-node output of the layout engine: center in points, size in inches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawNodeLayout {
    pub pos_pt: (f64, f64),
    pub width_in: f64,
    pub height_in: f64,
}

/// Node center and extent in continuous pixels. `y_px` still grows upward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutPosition {
    pub x_px: f64,
    pub y_px: f64,
    pub width_px: f64,
    pub height_px: f64,
}

// Graphviz coordinate transformation, see https://graphviz.org/faq/#FaqCoordTransformation
pub const INCH_TO_PIXEL: f64 = 96.0;
pub const INCH_TO_POINT: f64 = 72.0;
pub const POINT_TO_PIXEL: f64 = INCH_TO_PIXEL / INCH_TO_POINT;

// ** Bounding boxes **

/// Two corners in image pixels. The names are kept for the manifest format:
/// `upper_left` is not guaranteed to be above or left of `lower_right`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub upper_left: (i64, i64),
    pub lower_right: (i64, i64),
}

impl BoundingBox {
    pub fn xyxy(&self) -> [i64; 4] {
        [self.upper_left.0, self.upper_left.1, self.lower_right.0, self.lower_right.1]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EdgeBBox {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

// Values to correct bbox borders.
pub const UPPER_EXPANSION: i64 = 3;
pub const LOWER_EXPANSION: i64 = 9;
pub const SHIFT_FROM_BORDER: i64 = 1;
pub const PUSH_APART: f64 = 20.0;
pub const TOO_CLOSE_PX: f64 = 10.0;

/// Annotation category ids. The edge numbering matches an external labeling
/// convention and is intentionally not in edge-type order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryId {
    Node = 0,
    EdgeType2 = 1,
    EdgeType1 = 2,
}

impl CategoryId {
    pub fn for_edge(edge_type: EdgeType) -> Self {
        match edge_type {
            EdgeType::Type1 => CategoryId::EdgeType1,
            EdgeType::Type2 => CategoryId::EdgeType2,
        }
    }
}

impl Serialize for CategoryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_edge_is_symmetric() {
        let mut graph = AdjacencyGraph::new();
        let a = NodeName::new("A1");
        let b = NodeName::new("B2");
        graph.insert_edge(a.clone(), b.clone(), EdgeType::Type2);
        assert_eq!(graph.edge(&a, &b), graph.edge(&b, &a));
        assert_eq!(graph.edge(&a, &b).map(|e| e.edge_type), Some(EdgeType::Type2));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.directed_edges().count(), 2);
    }

    #[test]
    fn reinserting_replaces_both_directions() {
        let mut graph = AdjacencyGraph::new();
        let a = NodeName::new("A1");
        let b = NodeName::new("B2");
        graph.insert_edge(a.clone(), b.clone(), EdgeType::Type2);
        graph.insert_edge(b.clone(), a.clone(), EdgeType::Type1);
        assert_eq!(graph.edge(&a, &b).map(|e| e.edge_type), Some(EdgeType::Type1));
        assert_eq!(graph.edge(&b, &a).map(|e| e.edge_type), Some(EdgeType::Type1));
    }

    #[test]
    fn category_mapping_is_inverted_for_edges() {
        assert_eq!(CategoryId::Node as u8, 0);
        assert_eq!(CategoryId::for_edge(EdgeType::Type1) as u8, 2);
        assert_eq!(CategoryId::for_edge(EdgeType::Type2) as u8, 1);
    }

    #[test]
    fn graph_serializes_as_nested_mapping() {
        let mut graph = AdjacencyGraph::new();
        graph.insert_edge(NodeName::new("R2"), NodeName::new("D2"), EdgeType::Type1);
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "D2": {"R2": {"type": 1, "weight": "1"}},
                "R2": {"D2": {"type": 1, "weight": "1"}},
            })
        );
    }

    #[test]
    fn unknown_edge_type_is_refused() {
        assert_eq!(EdgeType::try_from(2), Ok(EdgeType::Type2));
        assert_eq!(EdgeType::try_from(3), Err(3));
        let err = serde_json::from_str::<EdgeAttributes>(r#"{"type": 0, "weight": "1"}"#).unwrap_err();
        assert!(err.to_string().contains("edge type must be 1 or 2"));
    }

    #[test]
    fn point_ratio() {
        assert!((POINT_TO_PIXEL - 96.0 / 72.0).abs() < 1e-12);
    }
}
