//! Drives reshaping across a whole contour.
//!
//! Processing runs in fixed stages so slopes settle before rivers carve into
//! them and seam tidying sees the final terrain. Slope stages need real
//! heights from the full neighbourhood, so a chunk is only reshaped when all
//! its neighbours exist; a river fits inside one chunk and needs nothing
//! else. Chunks skipped for missing neighbours keep their contour entries
//! and are picked up by a later run once the world has grown.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::contour::{Contour, EdgeData, Method, MethodSet};
use crate::filter::PADDING;
use crate::geom::{Coord, SURROUNDING};
use crate::grid::Grid;
use crate::heightmap::HeightMapCache;
use crate::materials::{BlockRoles, Materials, MissingMaterial};
use crate::shaper::{ChunkShaper, ShapeError, ShaperParams};
use crate::world::{WorldAccess, CHUNK_SIZE};

/// Stage order: slopes settle first, rivers carve into them, seams tidy last.
pub const PROCESSING_ORDER: [Method; 3] = [Method::Even, Method::River, Method::Tidy];

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error(transparent)]
    Materials(#[from] MissingMaterial),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// What one erode pass accomplished.
pub struct MergeReport {
    /// Coordinates reshaped per stage.
    pub reshaped: HashMap<Method, Vec<Coord>>,
    /// Contour entries whose every stage completed; safe to delete.
    pub completed: Vec<Coord>,
}

pub struct Merger {
    roles: BlockRoles,
    params: ShaperParams,
}

impl Merger {
    pub fn new(materials: &Materials, params: ShaperParams) -> Result<Self, MergeError> {
        Ok(Self {
            roles: BlockRoles::resolve(materials)?,
            params,
        })
    }

    /// Reshape every eligible contour chunk, stage by stage.
    pub fn erode(
        &self,
        world: &mut impl WorldAccess,
        contour: &Contour,
    ) -> Result<MergeReport, MergeError> {
        let mut cache = HeightMapCache::new();
        let mut done: HashMap<Coord, MethodSet> = HashMap::new();
        let mut peripheral_done: HashSet<Coord> = HashSet::new();
        let mut reshaped: HashMap<Method, Vec<Coord>> = HashMap::new();

        let keep: HashSet<Coord> = contour.edges.keys().copied().collect();

        for stage in PROCESSING_ORDER {
            let coords: Vec<Coord> = contour
                .edges
                .iter()
                .filter(|(_, edge)| edge.methods.contains(stage))
                .map(|(coord, _)| *coord)
                .collect();

            for coord in coords {
                let eligible = match stage {
                    Method::River => world.has_chunk(coord),
                    _ => self.have_surrounding(world, coord, PADDING as i32),
                };
                if !eligible {
                    debug!(
                        "skipping {:?} chunk ({}, {}), neighbourhood incomplete",
                        stage, coord.0, coord.1
                    );
                    continue;
                }

                let edge = contour.edges[&coord].clone();
                if self.reshape_one(world, &mut cache, coord, &edge, stage)? {
                    reshaped.entry(stage).or_default().push(coord);
                    done.entry(coord).or_default().insert(stage);
                }

                // Slope stages also pull in surrounding non-contour chunks
                // so the modified terrain blends outward.
                if stage != Method::River {
                    for (dx, dz) in SURROUNDING {
                        let neighbour = (coord.0 + dx, coord.1 + dz);
                        if contour.edges.contains_key(&neighbour)
                            || peripheral_done.contains(&neighbour)
                            || !self.have_surrounding(world, neighbour, PADDING as i32)
                        {
                            continue;
                        }
                        let synthetic = EdgeData::new(MethodSet::of(&[stage]));
                        if self.reshape_one(world, &mut cache, neighbour, &synthetic, stage)? {
                            peripheral_done.insert(neighbour);
                        }
                    }
                }
            }

            // Within a stage every chunk pads with pre-stage heights.
            cache.flush_deferred();
        }

        cache.prune(&keep, PADDING as i32);

        let completed = contour
            .edges
            .iter()
            .filter(|(coord, edge)| {
                let finished = done.get(*coord).copied().unwrap_or_default();
                PROCESSING_ORDER
                    .iter()
                    .all(|stage| !edge.methods.contains(*stage) || finished.contains(*stage))
            })
            .map(|(coord, _)| *coord)
            .collect();

        let total: usize = reshaped.values().map(Vec::len).sum();
        info!("reshaped {} chunks", total);
        Ok(MergeReport { reshaped, completed })
    }

    fn reshape_one(
        &self,
        world: &mut impl WorldAccess,
        cache: &mut HeightMapCache,
        coord: Coord,
        edge: &EdgeData,
        stage: Method,
    ) -> Result<bool, MergeError> {
        let surround = if stage == Method::River {
            None
        } else {
            match self.build_surround(world, cache, coord) {
                Some(surround) => Some(surround),
                None => return Ok(false),
            }
        };

        let seed = world.seed();
        let Some(chunk) = world.chunk(coord) else {
            return Ok(false);
        };
        let mut shaper = ChunkShaper::new(chunk, coord, edge, seed, &self.roles, &self.params);
        if !shaper.reshape(stage, surround.as_ref())? {
            return Ok(false);
        }
        if let Some(chunk) = world.chunk_mut(coord) {
            shaper.apply_to(chunk);
        }
        cache.mark_deferred(coord);
        debug!("reshaped ({}, {}) for {:?}", coord.0, coord.1, stage);
        Ok(true)
    }

    /// Neighbour heights in the padded field layout the slope filter wants.
    /// The centre block is left at zero; the shaper overwrites it with its
    /// own working surface.
    fn build_surround(
        &self,
        world: &impl WorldAccess,
        cache: &mut HeightMapCache,
        coord: Coord,
    ) -> Option<Grid<f64>> {
        let factor = PADDING * 2 + 1;
        let mut out = Grid::new_with(CHUNK_SIZE * factor, CHUNK_SIZE * factor, 0.0);
        let p = PADDING as i32;
        for dz in -p..=p {
            for dx in -p..=p {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let heights = cache.get(world, &self.roles, (coord.0 + dx, coord.1 + dz))?;
                let xoff = ((dx + p) as usize) * CHUNK_SIZE;
                let zoff = ((dz + p) as usize) * CHUNK_SIZE;
                for (x, z, v) in heights.iter() {
                    out.set(xoff + x, zoff + z, f64::from(*v));
                }
            }
        }
        Some(out)
    }

    fn have_surrounding(&self, world: &impl WorldAccess, coord: Coord, radius: i32) -> bool {
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if !world.has_chunk((coord.0 + dx, coord.1 + dz)) {
                    return false;
                }
            }
        }
        true
    }
}
