use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::annotations::with_suffix;
use crate::error::{Error, Result};
use crate::graph::unique_edges;
use crate::types::{
    AdjacencyGraph, EdgeType, LayoutPosition, NodeName, RawNodeLayout, INCH_TO_PIXEL, POINT_TO_PIXEL,
};

/// A laid-out and rendered sample: the image on disk plus node geometry in
/// layout units.
#[derive(Debug, Clone)]
pub struct RenderedLayout {
    pub image_path: PathBuf,
    pub nodes: BTreeMap<NodeName, RawNodeLayout>,
}

/// Lays out `graph`, renders it to `<prefix>.png` and reports where each node ended up.
pub trait LayoutEngine {
    fn render(&self, graph: &AdjacencyGraph, prefix: &Path) -> Result<RenderedLayout>;
}

/// Graphviz, invoked as an external program (sfdp by default).
#[derive(Debug, Clone)]
pub struct GraphvizLayout {
    pub program: String,
}

impl Default for GraphvizLayout {
    fn default() -> Self {
        GraphvizLayout { program: "sfdp".to_string() }
    }
}

impl LayoutEngine for GraphvizLayout {
    fn render(&self, graph: &AdjacencyGraph, prefix: &Path) -> Result<RenderedLayout> {
        let dot_path = with_suffix(prefix, ".dot");
        fs::write(&dot_path, to_dot(graph)).map_err(|e| Error::io(&dot_path, e))?;

        // One layout run, two outputs: <prefix>.dot.png and <prefix>.dot.json
        let output = Command::new(&self.program)
            .arg("-Tpng")
            .arg("-Tjson")
            .arg("-O")
            .arg(&dot_path)
            .output()
            .map_err(|source| Error::LayoutSpawn { program: self.program.clone(), source })?;
        let produced_png = with_suffix(&dot_path, ".png");
        let produced_json = with_suffix(&dot_path, ".json");

        let result = if output.status.success() {
            collect_outputs(prefix, &produced_png, &produced_json)
        } else {
            Err(Error::LayoutFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        };

        for scratch in [&dot_path, &produced_json, &produced_png] {
            let _ = fs::remove_file(scratch);
        }
        result
    }
}

fn collect_outputs(prefix: &Path, png: &Path, json: &Path) -> Result<RenderedLayout> {
    let text = fs::read_to_string(json).map_err(|e| Error::io(json, e))?;
    let nodes = parse_graphviz_json(&text)?;
    let image_path = with_suffix(prefix, ".png");
    fs::rename(png, &image_path).map_err(|e| Error::io(&image_path, e))?;
    Ok(RenderedLayout { image_path, nodes })
}

fn edge_attributes(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::Type1 => " [color=\"black:invis:black\"]",
        EdgeType::Type2 => "",
    }
}

/// Undirected DOT source; every edge written once, type 1 as a double line.
pub fn to_dot(graph: &AdjacencyGraph) -> String {
    let mut dot = String::from("strict graph {\n");
    dot.push_str("  node [shape=circle, fontname=Tahoma, fontcolor=black, color=black];\n");
    for name in graph.nodes() {
        let _ = writeln!(dot, "  \"{name}\";");
    }
    for (a, b, attrs) in unique_edges(graph) {
        let _ = writeln!(dot, "  \"{a}\" -- \"{b}\"{};", edge_attributes(attrs.edge_type));
    }
    dot.push_str("}\n");
    dot
}

#[derive(Deserialize)]
struct GraphvizJson {
    #[serde(default)]
    objects: Vec<GraphvizObject>,
}

// Graphviz writes every attribute value as a string.
#[derive(Deserialize)]
struct GraphvizObject {
    name: String,
    pos: Option<String>,
    width: Option<String>,
    height: Option<String>,
}

fn parse_number(value: &str, what: &str, node: &str) -> Result<f64> {
    value
        .trim()
        .trim_end_matches('!')
        .parse::<f64>()
        .map_err(|_| Error::LayoutOutput(format!("bad {what} `{value}` for node {node}")))
}

/// Reads node positions (points) and sizes (inches) from `-Tjson` output.
/// Objects without a position (subgraphs) are skipped.
pub fn parse_graphviz_json(text: &str) -> Result<BTreeMap<NodeName, RawNodeLayout>> {
    let parsed: GraphvizJson = serde_json::from_str(text)?;
    let mut nodes = BTreeMap::new();
    for object in parsed.objects {
        let Some(pos) = object.pos.as_deref() else {
            continue;
        };
        let (x, y) = pos
            .split_once(',')
            .ok_or_else(|| Error::LayoutOutput(format!("bad pos `{pos}` for node {}", object.name)))?;
        let width = object
            .width
            .as_deref()
            .ok_or_else(|| Error::LayoutOutput(format!("node {} has no width", object.name)))?;
        let height = object
            .height
            .as_deref()
            .ok_or_else(|| Error::LayoutOutput(format!("node {} has no height", object.name)))?;
        let layout = RawNodeLayout {
            pos_pt: (parse_number(x, "pos", &object.name)?, parse_number(y, "pos", &object.name)?),
            width_in: parse_number(width, "width", &object.name)?,
            height_in: parse_number(height, "height", &object.name)?,
        };
        nodes.insert(NodeName::new(object.name), layout);
    }
    Ok(nodes)
}

/// Points and inches to continuous pixels. The y axis is left as is.
pub fn map_layout(raw: &BTreeMap<NodeName, RawNodeLayout>) -> BTreeMap<NodeName, LayoutPosition> {
    raw.iter()
        .map(|(name, layout)| {
            let position = LayoutPosition {
                x_px: layout.pos_pt.0 * POINT_TO_PIXEL,
                y_px: layout.pos_pt.1 * POINT_TO_PIXEL,
                width_px: layout.width_in * INCH_TO_PIXEL,
                height_px: layout.height_in * INCH_TO_PIXEL,
            };
            (name.clone(), position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dot_has_each_edge_once() {
        let mut graph = AdjacencyGraph::new();
        graph.insert_edge(NodeName::new("A0"), NodeName::new("B1"), EdgeType::Type1);
        graph.insert_edge(NodeName::new("B1"), NodeName::new("C2"), EdgeType::Type2);
        let dot = to_dot(&graph);
        assert_eq!(
            dot,
            "strict graph {\n\
             \x20 node [shape=circle, fontname=Tahoma, fontcolor=black, color=black];\n\
             \x20 \"A0\";\n\
             \x20 \"B1\";\n\
             \x20 \"C2\";\n\
             \x20 \"A0\" -- \"B1\" [color=\"black:invis:black\"];\n\
             \x20 \"B1\" -- \"C2\";\n\
             }\n"
        );
    }

    #[test]
    fn parses_nodes_and_skips_subgraphs() {
        let text = r#"{
            "name": "%3",
            "objects": [
                {"_gvid": 0, "name": "cluster", "label": "x"},
                {"_gvid": 1, "name": "A0", "pos": "27,18", "width": "0.75", "height": "0.5"},
                {"_gvid": 2, "name": "B1", "pos": "99.5,117!", "width": "0.5", "height": "0.5"}
            ]
        }"#;
        let nodes = parse_graphviz_json(text).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[&NodeName::new("A0")],
            RawNodeLayout { pos_pt: (27.0, 18.0), width_in: 0.75, height_in: 0.5 }
        );
        assert_eq!(nodes[&NodeName::new("B1")].pos_pt, (99.5, 117.0));
    }

    #[test]
    fn malformed_pos_is_an_error() {
        let text = r#"{"objects": [{"name": "A0", "pos": "27", "width": "1", "height": "1"}]}"#;
        assert!(matches!(parse_graphviz_json(text), Err(Error::LayoutOutput(_))));
    }

    #[test]
    fn converts_points_and_inches_to_pixels() {
        let raw = BTreeMap::from([(
            NodeName::new("A0"),
            RawNodeLayout { pos_pt: (72.0, 36.0), width_in: 0.5, height_in: 0.25 },
        )]);
        let mapped = map_layout(&raw);
        assert_eq!(
            mapped[&NodeName::new("A0")],
            LayoutPosition { x_px: 96.0, y_px: 48.0, width_px: 48.0, height_px: 24.0 }
        );
    }
}
