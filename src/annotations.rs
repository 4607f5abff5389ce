use image::{Rgb, RgbImage};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{AdjacencyGraph, BoundingBox, CategoryId, EdgeBBox};

// detectron2's BoxMode.XYXY_ABS
pub const BBOX_MODE_XYXY_ABS: u8 = 0;

/// `prefix` with `suffix` appended verbatim, e.g. `data/graph_1` + `.png`.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

pub fn adjacency_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, "_src_dict.json")
}

pub fn manifest_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, ".json")
}

pub fn overlay_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, "_bboxes.png")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush().map_err(|e| Error::io(path, e))
}

/// `{name: {neighbour: {"type": 1|2, "weight": "1"}}}`
pub fn write_adjacency(prefix: &Path, graph: &AdjacencyGraph) -> Result<PathBuf> {
    let path = adjacency_path(prefix);
    write_json(&path, graph)?;
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CocoAnnotation {
    pub bbox: [i64; 4],
    pub bbox_mode: u8,
    pub category_id: CategoryId,
}

/// Per-image record in the COCO-like layout detectron2 reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CocoRecord {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub image_id: String,
    pub annotations: Vec<CocoAnnotation>,
}

impl CocoRecord {
    /// Node annotations first, then edges.
    pub fn new(prefix: &Path, width: u32, height: u32, nodes: &[BoundingBox], edges: &[EdgeBBox]) -> Self {
        let node_annotations = nodes.iter().map(|bbox| CocoAnnotation {
            bbox: bbox.xyxy(),
            bbox_mode: BBOX_MODE_XYXY_ABS,
            category_id: CategoryId::Node,
        });
        let edge_annotations = edges.iter().map(|edge| CocoAnnotation {
            bbox: edge.bbox.xyxy(),
            bbox_mode: BBOX_MODE_XYXY_ABS,
            category_id: CategoryId::for_edge(edge.edge_type),
        });
        CocoRecord {
            file_name: with_suffix(prefix, ".png").to_string_lossy().into_owned(),
            width,
            height,
            image_id: prefix
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            annotations: node_annotations.chain(edge_annotations).collect(),
        }
    }
}

pub fn write_manifest(prefix: &Path, record: &CocoRecord) -> Result<PathBuf> {
    let path = manifest_path(prefix);
    write_json(&path, record)?;
    Ok(path)
}

/// Width and height of the rendered image, read from its header.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path).map_err(|source| Error::Image { path: path.to_path_buf(), source })
}

const NODE_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
const EDGE_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);

fn draw_rectangle(img: &mut RgbImage, bbox: &BoundingBox, colour: Rgb<u8>) {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    let [x1, y1, x2, y2] = bbox.xyxy();
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    let mut put = |x: i64, y: i64| {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            img.put_pixel(x as u32, y as u32, colour);
        }
    };
    for x in left..=right {
        put(x, top);
        put(x, bottom);
    }
    for y in top..=bottom {
        put(left, y);
        put(right, y);
    }
}

/// Copy of the rendered image with every box outlined, for eyeballing a sample.
pub fn write_overlay(prefix: &Path, nodes: &[BoundingBox], edges: &[EdgeBBox]) -> Result<PathBuf> {
    let source = with_suffix(prefix, ".png");
    let mut img = image::open(&source)
        .map_err(|e| Error::Image { path: source.clone(), source: e })?
        .to_rgb8();
    for bbox in nodes {
        draw_rectangle(&mut img, bbox, NODE_COLOUR);
    }
    for edge in edges {
        draw_rectangle(&mut img, &edge.bbox, EDGE_COLOUR);
    }
    let path = overlay_path(prefix);
    img.save(&path).map_err(|source| Error::Image { path: path.clone(), source })?;
    Ok(path)
}
