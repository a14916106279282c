//! Cached terrain surface heights.
//!
//! The slope filter pads a chunk's height field with real heights from its
//! neighbours, so the same chunk's heights are read many times while a
//! boundary is processed. The cache computes each chunk's field once and
//! supports two invalidation flavours: immediate, and deferred until a
//! processing stage completes so that chunks within one stage all see the
//! pre-stage terrain.

use std::collections::{HashMap, HashSet};

use crate::geom::Coord;
use crate::grid::Grid;
use crate::materials::BlockRoles;
use crate::world::{Chunk, WorldAccess, CHUNK_SIZE};

/// Height of the topmost terrain-role block in each column, -1 where the
/// column holds no terrain at all.
pub fn find_heights(chunk: &Chunk, roles: &BlockRoles) -> Grid<i32> {
    let mut heights = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, -1);
    for x in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            let column = chunk.column(x, z);
            if let Some(y) = (0..column.len())
                .rev()
                .find(|&y| roles.terrain.contains(&column[y]))
            {
                heights.set(x, z, y as i32);
            }
        }
    }
    heights
}

/// Per-chunk height field cache with deferred invalidation.
#[derive(Default)]
pub struct HeightMapCache {
    cache: HashMap<Coord, Grid<i32>>,
    deferred: HashSet<Coord>,
}

impl HeightMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The height field for `coord`, computing and caching it on first use.
    /// Returns `None` when the world has no chunk there.
    pub fn get(
        &mut self,
        world: &impl WorldAccess,
        roles: &BlockRoles,
        coord: Coord,
    ) -> Option<&Grid<i32>> {
        if !self.cache.contains_key(&coord) {
            let chunk = world.chunk(coord)?;
            self.cache.insert(coord, find_heights(chunk, roles));
        }
        self.cache.get(&coord)
    }

    pub fn invalidate(&mut self, coord: Coord) {
        self.cache.remove(&coord);
    }

    /// Queue an invalidation to apply at the next `flush_deferred`. Chunks
    /// reshaped within one stage keep serving their pre-stage heights to
    /// their neighbours until the stage ends.
    pub fn mark_deferred(&mut self, coord: Coord) {
        self.deferred.insert(coord);
    }

    pub fn flush_deferred(&mut self) {
        for coord in std::mem::take(&mut self.deferred) {
            self.cache.remove(&coord);
        }
    }

    /// Drop cached fields further than `padding` (Chebyshev) from every
    /// coordinate in `keep`.
    pub fn prune(&mut self, keep: &HashSet<Coord>, padding: i32) {
        self.cache.retain(|coord, _| {
            keep.iter().any(|k| {
                (coord.0 - k.0).abs() <= padding && (coord.1 - k.1).abs() <= padding
            })
        });
    }

    #[cfg(test)]
    fn cached(&self, coord: Coord) -> bool {
        self.cache.contains_key(&coord)
    }
}
