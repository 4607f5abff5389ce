use rand::seq::SliceRandom;
use rand::Rng;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::{HashMap, HashSet};

use crate::types::{OsmData, OsmNodeId};

pub const NEIGHBOURHOOD_HALF_WIDTH: f64 = 0.001;

// Node location as stored in the R-tree, [longitude, latitude].
#[derive(Clone, Copy, Debug, PartialEq)]
struct IndexedNode {
    id: OsmNodeId,
    position: [f64; 2],
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Picks a random anchor node and everything in a square window around it.
///
/// Latitude and longitude are treated as planar x/y, which only holds at
/// small scale.
pub struct NeighborhoodSampler {
    // sorted so a seeded run picks the same anchors regardless of hash order
    ids: Vec<OsmNodeId>,
    tree: RTree<IndexedNode>,
    positions: HashMap<OsmNodeId, [f64; 2]>,
    half_width: f64,
}

impl NeighborhoodSampler {
    pub fn new(data: &OsmData, half_width: f64) -> Self {
        let mut ids: Vec<OsmNodeId> = data.nodes.keys().copied().collect();
        ids.sort_unstable();
        let indexed: Vec<IndexedNode> = data
            .nodes
            .values()
            .map(|node| IndexedNode { id: node.id, position: [node.longitude(), node.latitude()] })
            .collect();
        let positions = indexed.iter().map(|n| (n.id, n.position)).collect();
        NeighborhoodSampler { ids, tree: RTree::bulk_load(indexed), positions, half_width }
    }

    /// Returns `None` only when there are no nodes at all.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<HashSet<OsmNodeId>> {
        let anchor = *self.ids.choose(rng)?;
        let center = *self.positions.get(&anchor)?;
        Some(self.window(center))
    }

    /// Ids strictly inside the half-width window around `center` ([lon, lat]).
    pub fn window(&self, center: [f64; 2]) -> HashSet<OsmNodeId> {
        let [lon0, lat0] = center;
        let envelope = AABB::from_corners(
            [lon0 - self.half_width, lat0 - self.half_width],
            [lon0 + self.half_width, lat0 + self.half_width],
        );
        // the envelope query is inclusive, the window is not
        self.tree
            .locate_in_envelope(&envelope)
            .filter(|node| {
                (node.position[0] - lon0).abs() < self.half_width
                    && (node.position[1] - lat0).abs() < self.half_width
            })
            .map(|node| node.id)
            .collect()
    }
}
