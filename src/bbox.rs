//! Pixel bounding boxes for rendered nodes and edges.
//!
//! Input positions come from [`crate::layout::map_layout`]: pixels, but with the
//! y axis still pointing up. Both derivations flip it against the image height.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{
    AdjacencyGraph, BoundingBox, EdgeBBox, LayoutPosition, NodeName, LOWER_EXPANSION, PUSH_APART,
    SHIFT_FROM_BORDER, TOO_CLOSE_PX, UPPER_EXPANSION,
};

// Truncation toward zero, the same way the positions were always rounded.
fn trunc(value: f64) -> i64 {
    value as i64
}

// Keeps a coordinate at least one pixel away from either image border.
fn clamp_inside(value: i64, dimension: i64) -> i64 {
    (dimension - SHIFT_FROM_BORDER).min(SHIFT_FROM_BORDER.max(value))
}

/// Box around a node glyph, expanded a little and kept inside the image.
///
/// The corrections are applied after the y flip, so `upper_left.y` usually ends
/// up below `lower_right.y`.
pub fn node_bbox(position: &LayoutPosition, width: u32, height: u32) -> BoundingBox {
    let (img_w, img_h) = (i64::from(width), i64::from(height));

    let x1 = trunc(position.x_px - 0.5 * position.width_px);
    let x2 = trunc(position.x_px + 0.5 * position.width_px);
    let y1 = img_h - trunc(position.y_px - 0.5 * position.height_px);
    let y2 = img_h - trunc(position.y_px + 0.5 * position.height_px);

    BoundingBox {
        upper_left: (
            clamp_inside(x1 - UPPER_EXPANSION, img_w),
            clamp_inside(y1 + UPPER_EXPANSION, img_h),
        ),
        lower_right: (
            clamp_inside(x2 + LOWER_EXPANSION, img_w),
            clamp_inside(y2 - LOWER_EXPANSION, img_h),
        ),
    }
}

pub fn node_bboxes(positions: &BTreeMap<NodeName, LayoutPosition>, width: u32, height: u32) -> Vec<BoundingBox> {
    positions.values().map(|p| node_bbox(p, width, height)).collect()
}

fn too_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOO_CLOSE_PX
}

/// Box spanned by the line between two node centers.
///
/// Near-vertical and near-horizontal edges would give a degenerate box, so
/// their ends are pushed apart along the flat axis. No border clamping here.
pub fn edge_bbox(a: &LayoutPosition, b: &LayoutPosition, height: u32) -> BoundingBox {
    let (mut xa, mut ya) = (a.x_px, a.y_px);
    let (mut xb, mut yb) = (b.x_px, b.y_px);

    if too_close(xa, xb) {
        if ya < yb {
            xa -= PUSH_APART;
            xb += PUSH_APART;
        } else {
            xb -= PUSH_APART;
            xa += PUSH_APART;
        }
    }

    if too_close(ya, yb) {
        if xa < xb {
            ya -= PUSH_APART;
            yb += PUSH_APART;
        } else {
            yb -= PUSH_APART;
            ya += PUSH_APART;
        }
    }

    let img_h = i64::from(height);
    BoundingBox {
        upper_left: (trunc(xa), img_h - trunc(ya)),
        lower_right: (trunc(xb), img_h - trunc(yb)),
    }
}

/// One box per stored direction of every edge, so each undirected edge is
/// annotated twice (mirrored corners).
pub fn edge_bboxes(
    graph: &AdjacencyGraph,
    positions: &BTreeMap<NodeName, LayoutPosition>,
    height: u32,
) -> Result<Vec<EdgeBBox>> {
    let lookup = |name: &NodeName| positions.get(name).ok_or_else(|| Error::MissingLayout(name.clone()));
    graph
        .directed_edges()
        .map(|(a, b, attrs)| {
            Ok(EdgeBBox { edge_type: attrs.edge_type, bbox: edge_bbox(lookup(a)?, lookup(b)?, height) })
        })
        .collect()
}
