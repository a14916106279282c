//! Vertical displacement of map regions and relighting.
//!
//! Shifting is used to line up the sea level of two map generations before
//! their boundary is merged. A shift can cover the whole world or just the
//! chunks marked in a contour; either way the world's players and spawn move
//! with the terrain.

use log::{debug, info};

use crate::contour::Contour;
use crate::geom::Coord;
use crate::world::{WorldAccess, WorldError};

/// Moves chunk columns up or down.
pub struct Shifter {
    pub relight: bool,
}

impl Default for Shifter {
    fn default() -> Self {
        Self { relight: true }
    }
}

impl Shifter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `distance` for every chunk in the contour instead of shifting
    /// now; a later merge run applies it.
    pub fn mark(&self, world: &impl WorldAccess, contour: &mut Contour, distance: i32) {
        for coord in world.coords() {
            contour.shift.insert(coord, distance);
        }
    }

    /// Shift every chunk in the world by the same distance.
    pub fn shift_all(&self, world: &mut impl WorldAccess, distance: i32) -> usize {
        let targets: Vec<(Coord, i32)> = world
            .coords()
            .into_iter()
            .map(|coord| (coord, distance))
            .collect();
        let count = self.shift(world, &targets);
        // One uniform distance also moves the world anchors.
        self.displace_anchors(world, distance);
        count
    }

    /// Apply the per-chunk shift distances recorded in the contour. The
    /// contour keeps entries for chunks the world does not have.
    pub fn shift_marked(&self, world: &mut impl WorldAccess, contour: &Contour) -> usize {
        let targets: Vec<(Coord, i32)> = contour
            .shift
            .iter()
            .map(|(coord, distance)| (*coord, *distance))
            .collect();
        let count = self.shift(world, &targets);
        // Marking records one distance for the whole world; as long as that
        // still holds, players and the spawn move with the terrain.
        let mut distances = targets.iter().map(|&(_, distance)| distance);
        if let Some(first) = distances.next() {
            if first != 0 && distances.all(|d| d == first) {
                self.displace_anchors(world, first);
            }
        }
        count
    }

    fn shift(&self, world: &mut impl WorldAccess, targets: &[(Coord, i32)]) -> usize {
        let air = world
            .materials()
            .get("Air")
            .unwrap_or_default();
        let mut shifted = 0;
        for &(coord, distance) in targets {
            if distance == 0 {
                continue;
            }
            let Some(chunk) = world.chunk_mut(coord) else {
                continue;
            };
            debug!("shifting chunk ({}, {}) by {}", coord.0, coord.1, distance);
            chunk.shift_vertically(distance, air);
            shifted += 1;
        }
        info!("shifted {} chunks", shifted);
        shifted
    }

    fn displace_anchors(&self, world: &mut impl WorldAccess, distance: i32) {
        let mut spawn = world.spawn_position();
        spawn[1] += distance;
        world.set_spawn_position(spawn);
        for name in world.player_names() {
            if let Some(mut pos) = world.player_position(&name) {
                pos[1] += f64::from(distance);
                world.set_player_position(&name, pos);
            }
        }
    }

    /// Save the world, relighting first unless disabled.
    pub fn commit(&self, world: &mut impl WorldAccess) -> Result<(), WorldError> {
        if self.relight {
            world.relight();
        }
        world.save()
    }
}

/// Marks every chunk dirty and relights the whole world, clearing dark
/// patches left by external edits.
pub struct Relighter;

impl Relighter {
    pub fn relight(world: &mut impl WorldAccess) -> usize {
        let coords = world.coords();
        for &coord in &coords {
            if let Some(chunk) = world.chunk_mut(coord) {
                chunk.mark_dirty();
            }
        }
        world.relight();
        info!("relit {} chunks", coords.len());
        coords.len()
    }

    pub fn commit(world: &mut impl WorldAccess) -> Result<(), WorldError> {
        world.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Block;
    use crate::world::{Chunk, MemoryWorld};
    use tempfile::tempdir;

    fn world_with_columns() -> MemoryWorld {
        let dir = tempdir().unwrap();
        let mut world = MemoryWorld::create(dir.path(), 7, 16);
        for coord in [(0, 0), (1, 0)] {
            let mut chunk = Chunk::new(16);
            chunk.set_block(0, 0, 4, Block::new(1, 0));
            world.insert_chunk(coord, chunk);
        }
        world.set_player_position("sam", [3.0, 5.0, 3.0]);
        world
    }

    #[test]
    fn test_shift_all_moves_blocks_and_anchors() {
        let mut world = world_with_columns();
        let spawn_before = world.spawn_position();
        let shifted = Shifter::new().shift_all(&mut world, -2);
        assert_eq!(shifted, 2);
        let chunk = world.chunk((0, 0)).unwrap();
        assert_eq!(chunk.block(0, 0, 2), Block::new(1, 0));
        assert_eq!(world.spawn_position()[1], spawn_before[1] - 2);
        assert_eq!(world.player_position("sam").unwrap()[1], 3.0);
    }

    #[test]
    fn test_shift_marked_touches_only_marked() {
        let mut world = world_with_columns();
        let mut contour = Contour::new();
        contour.shift.insert((0, 0), 3);
        contour.shift.insert((9, 9), 3); // not in the world

        let shifted = Shifter::new().shift_marked(&mut world, &contour);
        assert_eq!(shifted, 1);
        assert_eq!(world.chunk((0, 0)).unwrap().block(0, 0, 7), Block::new(1, 0));
        // The unmarked chunk is untouched.
        assert_eq!(world.chunk((1, 0)).unwrap().block(0, 0, 4), Block::new(1, 0));
    }

    #[test]
    fn test_shift_marked_moves_players_and_spawn() {
        let mut world = world_with_columns();
        world.set_spawn_position([0, 8, 0]);
        let mut contour = Contour::new();
        Shifter::new().mark(&world, &mut contour, -3);

        Shifter::new().shift_marked(&mut world, &contour);
        let chunk = world.chunk((0, 0)).unwrap();
        assert_eq!(chunk.block(0, 0, 1), Block::new(1, 0));
        // Anchors follow the uniform marked distance.
        assert_eq!(world.spawn_position()[1], 5);
        assert_eq!(world.player_position("sam").unwrap()[1], 2.0);
    }

    #[test]
    fn test_mark_records_all_chunks() {
        let world = world_with_columns();
        let mut contour = Contour::new();
        Shifter::new().mark(&world, &mut contour, -4);
        assert_eq!(contour.shift.len(), 2);
        assert_eq!(contour.shift[&(1, 0)], -4);
    }

    #[test]
    fn test_relight_counts_chunks() {
        let mut world = world_with_columns();
        assert_eq!(Relighter::relight(&mut world), 2);
    }
}
