//! Reshapes a single chunk to its smoothed target terrain.
//!
//! The shaper works on a private copy of the chunk's block ids and data,
//! derives target height fields (sloped, or carved into a river valley),
//! then elevates and removes material to meet them while preserving things
//! worth preserving: supported blocks ride the surface, trees re-root as
//! saplings, immutable blocks stay put, and water below sea level survives.
//! The copy is written back to the chunk in one step at the end.

use crate::contour::{EdgeData, Method};
use crate::filter::{self, FilterKind, PADDING};
use crate::geom::{Coord, Dir};
use crate::grid::Grid;
use crate::mask::{self, MaskParams};
use crate::materials::{Block, BlockId, BlockRoles, ReplacementRun};
use crate::meander::{ChunkSeeder, MeanderParams};
use crate::world::{Chunk, CHUNK_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("'{0}' is not a shaping method")]
    InvalidMethod(Method),
    #[error("slope shaping requires surrounding heights")]
    MissingSurround,
}

/// Tunables for chunk reshaping. Widths are half-widths in cells.
#[derive(Clone, Debug)]
pub struct ShaperParams {
    pub river_width: i32,
    pub valley_width: i32,
    pub valley_height: i32,
    pub river_height: i32,
    pub sea_level: i32,
    /// Surface layers transplanted downward when terrain is stripped.
    pub cover_depth: usize,
    pub filter_river: FilterKind,
    pub filter_even: FilterKind,
    pub filter_factor_river: f64,
    pub filter_factor_even: f64,
    pub mask: MaskParams,
    pub meander: MeanderParams,
}

impl Default for ShaperParams {
    fn default() -> Self {
        Self {
            river_width: 2,
            valley_width: 4,
            valley_height: 65,
            river_height: 58,
            sea_level: 62,
            cover_depth: 3,
            filter_river: FilterKind::Smooth,
            filter_even: FilterKind::Smooth,
            filter_factor_river: 1.7,
            filter_factor_even: 1.0,
            mask: MaskParams::default(),
            meander: MeanderParams::default(),
        }
    }
}

/// Single-chunk reshaping engine.
pub struct ChunkShaper<'a> {
    params: &'a ShaperParams,
    roles: &'a BlockRoles,
    methods: crate::contour::MethodSet,
    directions: Vec<Dir>,
    seeder: ChunkSeeder,
    height: usize,
    ids: Vec<BlockId>,
    data: Vec<u8>,
    surface: Grid<i32>,
    surface_invalid: bool,
    ocean: bool,
}

impl<'a> ChunkShaper<'a> {
    pub fn new(
        chunk: &Chunk,
        coord: Coord,
        edge: &EdgeData,
        world_seed: u64,
        roles: &'a BlockRoles,
        params: &'a ShaperParams,
    ) -> Self {
        let height = chunk.height();
        let mut ids = vec![0; CHUNK_SIZE * CHUNK_SIZE * height];
        let mut data = vec![0; CHUNK_SIZE * CHUNK_SIZE * height];
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for y in 0..height {
                    let block = chunk.block(x, z, y);
                    let i = (x * CHUNK_SIZE + z) * height + y;
                    ids[i] = block.id;
                    data[i] = block.data;
                }
            }
        }
        let mut shaper = Self {
            params,
            roles,
            methods: edge.methods,
            directions: edge.directions.iter().copied().collect(),
            seeder: ChunkSeeder::new(world_seed, coord, params.meander.clone()),
            height,
            ids,
            data,
            surface: Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, -1),
            surface_invalid: true,
            ocean: false,
        };
        shaper.surface();
        shaper
    }

    /// Reshape for one method. Returns false when this chunk's edge does not
    /// carry the method, leaving the copy untouched.
    pub fn reshape(
        &mut self,
        method: Method,
        surround: Option<&Grid<f64>>,
    ) -> Result<bool, ShapeError> {
        if !self.methods.contains(method) {
            return Ok(false);
        }
        self.ocean = self.methods.contains(Method::Ocean);
        match method {
            Method::River => {
                let (smoothed, valley_mask) = self.erode_valley();
                self.remove(&smoothed, Some(&valley_mask));
            }
            Method::Even | Method::Tidy => {
                let surround = surround.ok_or(ShapeError::MissingSurround)?;
                let smoothed = self.erode_slope(surround);
                self.elevate(&smoothed);
                self.remove(&smoothed, None);
            }
            other => return Err(ShapeError::InvalidMethod(other)),
        }
        Ok(true)
    }

    /// Write the reshaped copy back into the chunk.
    pub fn apply_to(&self, chunk: &mut Chunk) {
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for y in 0..self.height {
                    let i = (x * CHUNK_SIZE + z) * self.height + y;
                    chunk.set_block(x, z, y, Block::new(self.ids[i], self.data[i]));
                }
            }
        }
        chunk.mark_dirty();
    }

    /// Current terrain surface of the working copy.
    pub fn surface(&mut self) -> &Grid<i32> {
        if self.surface_invalid {
            for x in 0..CHUNK_SIZE {
                for z in 0..CHUNK_SIZE {
                    let top = (0..self.height)
                        .rev()
                        .find(|&y| self.roles.terrain.contains(&self.id_at(x, z, y)))
                        .map(|y| y as i32)
                        .unwrap_or(-1);
                    self.surface.set(x, z, top);
                }
            }
            self.surface_invalid = false;
        }
        &self.surface
    }

    /// Carve the unsmoothed river bed into a height field: a narrow band
    /// down to the river bed and a one-cell-wider band one step higher.
    pub fn with_river(&self, height: &Grid<i32>) -> Grid<i32> {
        let shape = (height.width, height.depth);
        let inner = mask::make_mask(
            shape,
            &self.directions,
            self.params.river_width as f64,
            Some(&self.seeder),
            &self.params.mask,
        );
        let outer = mask::make_mask(
            shape,
            &self.directions,
            (self.params.river_width + 1) as f64,
            Some(&self.seeder),
            &self.params.mask,
        );
        let mut res = height.clone();
        for (x, z, v) in res.iter_mut() {
            if *inner.get(x, z) {
                *v = self.params.river_height;
            } else if *outer.get(x, z) {
                *v = self.params.river_height + 1;
            }
        }
        res
    }

    /// Flatten the valley area that will slope down toward the river.
    pub fn with_valley(&self, height: &Grid<i32>) -> (Grid<i32>, Grid<bool>) {
        let mask = mask::make_mask(
            (height.width, height.depth),
            &self.directions,
            self.params.valley_width as f64,
            None,
            &self.params.mask,
        );
        let mut res = height.clone();
        for (x, z, v) in res.iter_mut() {
            if *mask.get(x, z) {
                *v = self.params.valley_height;
            }
        }
        (res, mask)
    }

    /// Smoothed height field sloping toward the surrounding terrain. The
    /// `surround` grid holds neighbour heights in a full padded layout; its
    /// centre block is replaced with this chunk's current surface.
    pub fn erode_slope(&mut self, surround: &Grid<f64>) -> Grid<i32> {
        let field = self.surface().clone();
        let padder = |inner: &Grid<i32>| -> Grid<f64> {
            let mut out = surround.clone();
            let off = CHUNK_SIZE * PADDING;
            for (x, z, v) in inner.iter() {
                out.set(off + x, off + z, f64::from(*v));
            }
            out
        };
        filter::apply(
            self.params.filter_even,
            &field,
            self.params.filter_factor_even,
            &padder,
        )
    }

    /// Smoothed height field with the river valley carved in. Also returns
    /// the valley mask used for water placement.
    pub fn erode_valley(&mut self) -> (Grid<i32>, Grid<bool>) {
        let field = self.surface().clone();
        let (valley, mask) = self.with_valley(&field);
        let carved = self.with_river(&valley);
        let smoothed = filter::apply(
            self.params.filter_river,
            &carved,
            self.params.filter_factor_river,
            &filter::replicate_pad,
        );
        (smoothed, mask)
    }

    /// Raise columns until they meet the smoothed height field.
    pub fn elevate(&mut self, smoothed: &Grid<i32>) {
        let my = self.height;
        self.surface();
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let initial = *self.surface.get(x, z);
                if initial < 0 {
                    continue;
                }
                let target = (*smoothed.get(x, z)).max(initial).min(my as i32 - 1);

                let below = self.block_at(x, z, initial as usize);
                let mut above = if ((initial + 1) as usize) < my {
                    Some(self.block_at(x, z, (initial + 1) as usize))
                } else {
                    None
                };

                // Only supported blocks ride up to the new surface.
                let supportable = self.roles.terrain.contains(&below.id)
                    || self.roles.tree_trunks.contains(&below.id)
                    || self.roles.tree_leaves.contains(&below.id);
                if !above.map_or(false, |a| self.roles.supported.contains(&a.id)) || !supportable {
                    above = None;
                }

                // Extend the surface downward from the target: the old
                // surface block on top, subsoil beneath.
                let deep = if below == self.roles.grass {
                    self.roles.dirt
                } else {
                    below
                };
                self.replace(x, z, target, initial - target - 1, None, &[below, deep]);

                if target + 1 < my as i32 {
                    let top = self.block_at(x, z, (target + 1) as usize);
                    if target > initial && self.roles.tree_trunks.contains(&top.id) {
                        // A tree base got buried; re-root it.
                        if !self.place_sapling(x, z, (target + 1) as usize, top) {
                            let empty = self.empty_block(target + 1);
                            self.place(x, z, (target + 1) as usize, empty);
                        }
                    } else if let Some(above) = above {
                        self.place(x, z, (target + 1) as usize, above);
                    }
                }
                self.surface.set(x, z, target);
            }
        }
    }

    /// Strip columns down to the smoothed height field, then dress the
    /// exposed surfaces and flood the river valley.
    pub fn remove(&mut self, smoothed: &Grid<i32>, valley_mask: Option<&Grid<bool>>) {
        let my = self.height as i32;
        let mut removed = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, false);
        self.surface();

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let initial = *self.surface.get(x, z);
                let target = (*smoothed.get(x, z)).min(initial);
                let start = (target + 1).max(0);
                for (n, y) in (start..my).enumerate() {
                    let curr = self.block_at(x, z, y as usize);
                    let below = if y > 0 { self.id_at(x, z, (y - 1) as usize) } else { 0 };
                    let empty = self.empty_block(y);

                    let rooted = self.roles.terrain.contains(&below)
                        || self.roles.tree_trunks.contains(&below)
                        || self.roles.tree_leaves.contains(&below);

                    if n == 0 && self.roles.supported.contains(&curr.id) && rooted {
                        // Keep a supported block sitting on the new surface,
                        // dissolving it when the surface is underwater.
                        if self.roles.solvent.contains(&empty.id) {
                            if let Some(replace) = self.roles.dissolve.get(&curr.id) {
                                let block = replace.unwrap_or(empty);
                                self.place(x, z, y as usize, block);
                            }
                        }
                    } else if n > 0 && self.roles.tree_trunks.contains(&curr.id) {
                        if !self.roles.tree_trunks.contains(&below) {
                            // Hovering trunk: fell it and re-root a sapling.
                            self.place(x, z, y as usize, empty);
                            if target + 1 >= 0 {
                                self.place_sapling(x, z, (target + 1) as usize, curr);
                            }
                        }
                    } else if self.roles.tree_leaves.contains(&curr.id) {
                        // Mark for decay when the world next loads.
                        let i = self.index(x, z, y as usize);
                        self.data[i] |= 8;
                    } else if self.roles.tree_trunks.contains(&curr.id) {
                        // Rooted trunk at the surface stays.
                    } else if curr.id != empty.id {
                        let mut top: Vec<Block> = Vec::new();

                        if !self.roles.immutable.contains(&curr.id) {
                            if n == 0 {
                                // Remember the old cover layers before they go.
                                let by = *self.surface.get(x, z);
                                top = (0..self.params.cover_depth as i32)
                                    .map(|d| by - d)
                                    .filter(|yi| *yi >= 0)
                                    .map(|yi| self.block_at(x, z, yi as usize))
                                    .collect();

                                // An underwater seabed dissolves its subsoil.
                                if self.roles.solvent.contains(&empty.id) && top.len() > 1 {
                                    if let Some(Some(replace)) =
                                        self.roles.dissolve.get(&top[1].id)
                                    {
                                        top[1] = *replace;
                                    }
                                }
                            }

                            let new = if n == 0 {
                                let by = *self.surface.get(x, z) + 1;
                                let mut new = empty;
                                if by < my {
                                    let supported_id = self.id_at(x, z, by as usize);
                                    if self.roles.supported.contains(&supported_id) {
                                        if self.roles.solvent.contains(&empty.id)
                                            && self.roles.dissolve.contains_key(&supported_id)
                                        {
                                            new = self.roles.dissolve[&supported_id]
                                                .unwrap_or(empty);
                                        } else if y == self.params.sea_level {
                                            // Strip at the waterline so the
                                            // shore reads clean.
                                            new = empty;
                                        } else {
                                            new = self.block_at(x, z, by as usize);
                                        }
                                    }
                                }
                                Some(new)
                            } else if y <= self.params.sea_level
                                && self.roles.water.contains(&curr.id)
                            {
                                // Water below sea level survives.
                                None
                            } else {
                                Some(empty)
                            };

                            if let Some(new) = new {
                                self.place(x, z, y as usize, new);
                            }
                        }

                        // Dress the freshly exposed surface.
                        if n == 0 {
                            removed.set(x, z, true);
                            if y - 1 >= 0 {
                                if valley_mask.is_some() && y - 1 <= self.params.sea_level {
                                    self.replace(x, z, y - 1, -2, None, &[self.roles.sand]);
                                } else if !top.is_empty() {
                                    self.replace(x, z, y - 1, -(top.len() as i32), None, &top);
                                }
                                if below == self.roles.dirt.id {
                                    let grass = self.roles.grass;
                                    self.place(x, z, (y - 1) as usize, grass);
                                }
                            }
                        }
                    }
                }
            }
        }

        // Flood the valley up to sea level, unless this edge is dry land.
        let suppress_water =
            self.methods.contains(Method::Desert) || self.methods.contains(Method::Dry);
        if let Some(mask) = valley_mask {
            if !suppress_water {
                for x in 0..CHUNK_SIZE {
                    for z in 0..CHUNK_SIZE {
                        if !*mask.get(x, z) && !*removed.get(x, z) {
                            continue;
                        }
                        let y = (*smoothed.get(x, z)).min(*self.surface.get(x, z)) + 1;
                        if y <= self.params.sea_level {
                            let water = self.roles.water_block;
                            self.replace(x, z, y, self.params.sea_level - y + 1, None, &[water]);
                        }
                    }
                }
            }
        }

        self.surface_invalid = true;
    }

    #[inline]
    fn index(&self, x: usize, z: usize, y: usize) -> usize {
        (x * CHUNK_SIZE + z) * self.height + y
    }

    fn id_at(&self, x: usize, z: usize, y: usize) -> BlockId {
        self.ids[self.index(x, z, y)]
    }

    fn block_at(&self, x: usize, z: usize, y: usize) -> Block {
        let i = self.index(x, z, y);
        Block::new(self.ids[i], self.data[i])
    }

    fn place(&mut self, x: usize, z: usize, y: usize, block: Block) {
        let i = self.index(x, z, y);
        self.ids[i] = block.id;
        self.data[i] = block.data;
    }

    /// What lives where terrain was removed: ocean water below sea level on
    /// an ocean edge, air otherwise.
    fn empty_block(&self, y: i32) -> Block {
        if self.ocean && y <= self.params.sea_level {
            self.roles.water_block
        } else {
            self.roles.air
        }
    }

    /// Fill `count` cells of a column starting at `y_start` (negative count
    /// walks downward) with the replacement sequence, skipping immutable
    /// blocks and stopping at the chunk bounds.
    fn replace(
        &mut self,
        x: usize,
        z: usize,
        y_start: i32,
        count: i32,
        from: Option<&[BlockId]>,
        blocks: &[Block],
    ) {
        let mut run = ReplacementRun::new(blocks);
        let step = count.signum();
        if step == 0 {
            return;
        }
        let mut y = y_start;
        for _ in 0..count.abs() {
            if y < 0 || y >= self.height as i32 {
                return;
            }
            let curr = self.id_at(x, z, y as usize);
            if from.map_or(true, |ids| ids.contains(&curr))
                && !self.roles.immutable.contains(&curr)
            {
                if let Some(block) = run.next() {
                    self.place(x, z, y as usize, block);
                }
            }
            y += step;
        }
    }

    /// Replace a felled trunk with the sapling that regrows its species.
    fn place_sapling(&mut self, x: usize, z: usize, y: usize, trunk: Block) -> bool {
        if y >= self.height {
            return false;
        }
        match self.roles.sapling_for(trunk) {
            Some(sapling) => {
                self.place(x, z, y, sapling);
                let i = self.index(x, z, y);
                self.data[i] |= 8;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::MethodSet;
    use crate::materials::Materials;

    const HEIGHT: usize = 128;

    fn roles() -> BlockRoles {
        BlockRoles::resolve(&Materials::classic()).unwrap()
    }

    fn flat_chunk(surface: i32, top: Block) -> Chunk {
        let stone = Block::new(1, 0);
        let mut chunk = Chunk::new(HEIGHT);
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for y in 0..=surface as usize {
                    chunk.set_block(x, z, y, stone);
                }
                chunk.set_block(x, z, surface as usize, top);
            }
        }
        chunk
    }

    fn east_river_edge() -> EdgeData {
        let mut edge = EdgeData::new(MethodSet::of(&[Method::River]));
        edge.directions.insert((1, 0));
        edge
    }

    fn still_params() -> ShaperParams {
        // Zero meander ranges make the carve bands exact.
        let mut params = ShaperParams::default();
        params.meander.centre_range = (0, 0);
        params.meander.width_range = (0, 0);
        params
    }

    fn shaper<'a>(
        chunk: &Chunk,
        edge: &EdgeData,
        roles: &'a BlockRoles,
        params: &'a ShaperParams,
    ) -> ChunkShaper<'a> {
        ChunkShaper::new(chunk, (0, 0), edge, 1234, roles, params)
    }

    #[test]
    fn test_with_river_carves_two_bands() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(64, Block::new(2, 0));
        let edge = east_river_edge();
        let s = shaper(&chunk, &edge, &roles, &params);

        let field = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, 64);
        let carved = s.with_river(&field);
        for z in 0..CHUNK_SIZE {
            assert_eq!(*carved.get(15, z), 58);
            assert_eq!(*carved.get(14, z), 58);
            assert_eq!(*carved.get(13, z), 59);
            assert_eq!(*carved.get(12, z), 64);
            assert_eq!(*carved.get(0, z), 64);
        }
    }

    #[test]
    fn test_with_valley_flattens_band() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(70, Block::new(1, 0));
        let edge = east_river_edge();
        let s = shaper(&chunk, &edge, &roles, &params);

        let field = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, 70);
        let (valley, mask) = s.with_valley(&field);
        assert_eq!(*valley.get(15, 8), 65);
        assert_eq!(*valley.get(12, 8), 65);
        assert_eq!(*valley.get(11, 8), 70);
        assert!(*mask.get(15, 8));
        assert!(!*mask.get(11, 8));
    }

    #[test]
    fn test_remove_strips_and_transplants_cover() {
        let roles = roles();
        let params = still_params();
        let grass = Block::new(2, 0);
        let chunk = flat_chunk(10, grass);
        let edge = east_river_edge();
        let mut s = shaper(&chunk, &edge, &roles, &params);

        let smoothed = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, 5);
        s.remove(&smoothed, None);

        // Stripped above the target...
        assert_eq!(s.block_at(4, 4, 10), roles.air);
        assert_eq!(s.block_at(4, 4, 6), roles.air);
        // ...and the old cover (grass over stone) transplanted down.
        assert_eq!(s.block_at(4, 4, 5), grass);
        assert_eq!(s.block_at(4, 4, 4), Block::new(1, 0));
    }

    #[test]
    fn test_elevate_raises_grass_over_dirt() {
        let roles = roles();
        let params = still_params();
        let grass = Block::new(2, 0);
        let chunk = flat_chunk(5, grass);
        let edge = east_river_edge();
        let mut s = shaper(&chunk, &edge, &roles, &params);

        let smoothed = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, 8);
        s.elevate(&smoothed);

        assert_eq!(s.block_at(3, 3, 8), grass);
        assert_eq!(s.block_at(3, 3, 7), roles.dirt);
        assert_eq!(s.block_at(3, 3, 6), roles.dirt);
        assert_eq!(*s.surface().get(3, 3), 8);
    }

    #[test]
    fn test_elevate_keeps_supported_block_on_surface() {
        let roles = roles();
        let params = still_params();
        let mut chunk = flat_chunk(5, Block::new(2, 0));
        let flower = Block::new(37, 0);
        chunk.set_block(3, 3, 6, flower);
        let edge = east_river_edge();
        let mut s = shaper(&chunk, &edge, &roles, &params);

        let smoothed = Grid::new_with(CHUNK_SIZE, CHUNK_SIZE, 9);
        s.elevate(&smoothed);
        assert_eq!(s.block_at(3, 3, 10), flower);
    }

    #[test]
    fn test_river_reshape_floods_channel() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(64, Block::new(2, 0));
        let edge = east_river_edge();
        let mut s = shaper(&chunk, &edge, &roles, &params);

        assert!(s.reshape(Method::River, None).unwrap());

        // The channel bed sits below sea level under water.
        let bed = (0..=params.sea_level as usize)
            .rev()
            .find(|&y| s.block_at(15, 8, y) != roles.water_block)
            .unwrap();
        assert!(bed < params.sea_level as usize);
        assert_eq!(s.block_at(15, 8, params.sea_level as usize), roles.water_block);
        // The river bed was dressed with sand.
        assert_eq!(s.block_at(15, 8, bed), roles.sand);
    }

    #[test]
    fn test_dry_edge_gets_no_water() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(64, Block::new(2, 0));
        let mut edge = east_river_edge();
        edge.methods.insert(Method::Dry);
        let mut s = shaper(&chunk, &edge, &roles, &params);

        assert!(s.reshape(Method::River, None).unwrap());
        for y in 0..HEIGHT {
            assert_ne!(s.block_at(15, 8, y), roles.water_block);
        }
    }

    #[test]
    fn test_reshape_skips_unmarked_method() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(64, Block::new(2, 0));
        let edge = east_river_edge();
        let mut s = shaper(&chunk, &edge, &roles, &params);
        assert!(!s.reshape(Method::Even, None).unwrap());
    }

    #[test]
    fn test_reshape_rejects_non_stage_method() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(64, Block::new(2, 0));
        let mut edge = east_river_edge();
        edge.methods.insert(Method::Ocean);
        let mut s = shaper(&chunk, &edge, &roles, &params);
        assert!(matches!(
            s.reshape(Method::Ocean, None),
            Err(ShapeError::InvalidMethod(Method::Ocean))
        ));
    }

    #[test]
    fn test_even_reshape_slopes_toward_neighbours() {
        let roles = roles();
        let params = still_params();
        let chunk = flat_chunk(80, Block::new(1, 0));
        let mut edge = EdgeData::new(MethodSet::of(&[Method::Even]));
        edge.directions.insert((1, 0));
        let mut s = shaper(&chunk, &edge, &roles, &params);

        // Neighbours all sit much lower than this chunk.
        let factor = CHUNK_SIZE * (PADDING * 2 + 1);
        let surround = Grid::new_with(factor, factor, 40.0);
        assert!(s.reshape(Method::Even, Some(&surround)).unwrap());

        // Surface must have dropped toward the neighbours but not below them.
        let surface = *s.surface().get(8, 8);
        assert!(surface < 80, "surface {} did not drop", surface);
        assert!(surface >= 40);
    }
}
