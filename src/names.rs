use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use crate::types::{NodeName, OsmNodeId};

pub const NAME_POOL_SIZE: usize = 26 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("all {NAME_POOL_SIZE} node names are taken")]
pub struct NameSpaceExhausted;

/// Every "letter + digit" name, in an order shuffled once per run.
#[derive(Debug, Clone)]
pub struct NamePool {
    names: Vec<NodeName>,
}

impl NamePool {
    pub fn ordered() -> Self {
        let names = ('A'..='Z')
            .flat_map(|letter| ('0'..='9').map(move |digit| NodeName::new(format!("{letter}{digit}"))))
            .collect();
        NamePool { names }
    }

    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut pool = Self::ordered();
        pool.names.shuffle(rng);
        pool
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NodeName> {
        self.names.get(index)
    }
}

/// Per-sample id -> name assignment. Names are handed out in pool order and
/// never change once given.
#[derive(Debug)]
pub struct NameAllocator<'a> {
    pool: &'a NamePool,
    assigned: HashMap<OsmNodeId, NodeName>,
}

impl<'a> NameAllocator<'a> {
    pub fn new(pool: &'a NamePool) -> Self {
        NameAllocator { pool, assigned: HashMap::new() }
    }

    pub fn allocate(&mut self, id: OsmNodeId) -> Result<NodeName, NameSpaceExhausted> {
        if let Some(name) = self.assigned.get(&id) {
            return Ok(name.clone());
        }
        let name = self.pool.get(self.assigned.len()).cloned().ok_or(NameSpaceExhausted)?;
        self.assigned.insert(id, name.clone());
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
