//! Chunk storage and the world access seam.
//!
//! Reshaping only needs a narrow view of a world: enumerate chunks, read and
//! mutate their block columns, know the build height and seed, and save. The
//! `WorldAccess` trait captures that view. The crate ships one
//! implementation, a `serde_json`-backed store useful for demos and tests;
//! adapters for real world formats implement the same trait.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geom::Coord;
use crate::materials::{Block, BlockId, Materials};

/// Side length of a chunk in cells.
pub const CHUNK_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("world io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("world store error: {0}")]
    Store(#[from] serde_json::Error),
    #[error("no chunk at ({0}, {1})")]
    MissingChunk(i32, i32),
}

/// A mobile object anchored to a chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub pos: [f64; 3],
}

/// A block-anchored data record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileEntity {
    pub kind: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One 16 by 16 column of the world, `height` cells tall.
///
/// Arrays are indexed `(x * CHUNK_SIZE + z) * height + y`, keeping each
/// vertical column contiguous.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    height: usize,
    blocks: Vec<BlockId>,
    data: Vec<u8>,
    block_light: Vec<u8>,
    sky_light: Vec<u8>,
    pub entities: Vec<Entity>,
    pub tile_entities: Vec<TileEntity>,
    #[serde(default, skip)]
    dirty: bool,
}

impl Chunk {
    pub fn new(height: usize) -> Self {
        let volume = CHUNK_SIZE * CHUNK_SIZE * height;
        Self {
            height,
            blocks: vec![0; volume],
            data: vec![0; volume],
            block_light: vec![0; volume],
            sky_light: vec![15; volume],
            entities: Vec::new(),
            tile_entities: Vec::new(),
            dirty: false,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, z: usize, y: usize) -> usize {
        (x * CHUNK_SIZE + z) * self.height + y
    }

    pub fn block(&self, x: usize, z: usize, y: usize) -> Block {
        let i = self.index(x, z, y);
        Block::new(self.blocks[i], self.data[i])
    }

    pub fn set_block(&mut self, x: usize, z: usize, y: usize, block: Block) {
        let i = self.index(x, z, y);
        self.blocks[i] = block.id;
        self.data[i] = block.data;
    }

    /// The block-id column at (x, z), bottom to top.
    pub fn column(&self, x: usize, z: usize) -> &[BlockId] {
        let start = (x * CHUNK_SIZE + z) * self.height;
        &self.blocks[start..start + self.height]
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Move every column's contents by `distance` cells vertically, layer 0
    /// excluded. Shifting down fills the vacated top band with air and takes
    /// lighting from the old top layer; shifting up repeats the old bottom
    /// layer upward.
    pub fn shift_vertically(&mut self, distance: i32, air: Block) {
        if distance == 0 {
            return;
        }
        let h = self.height as i32;
        let d = distance.clamp(-(h - 1), h - 1);

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let start = (x * CHUNK_SIZE + z) * self.height;
                let col = start..start + self.height;
                shift_column(&mut self.blocks[col.clone()], d, Some(air.id));
                shift_column(&mut self.data[col.clone()], d, Some(air.data));
                shift_column(&mut self.block_light[col.clone()], d, None);
                shift_column(&mut self.sky_light[col], d, None);
            }
        }

        for entity in &mut self.entities {
            entity.pos[1] += f64::from(distance);
        }
        for tile in &mut self.tile_entities {
            tile.y += distance;
        }
        self.dirty = true;
    }

    /// Crude skylight recomputation: full light above the topmost non-air
    /// block of each column, darkness below it.
    pub fn recompute_sky_light(&mut self, air: Block) {
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let start = (x * CHUNK_SIZE + z) * self.height;
                let top = (0..self.height)
                    .rev()
                    .find(|y| self.blocks[start + y] != air.id)
                    .map(|y| y + 1)
                    .unwrap_or(0);
                for y in 0..self.height {
                    self.sky_light[start + y] = if y >= top { 15 } else { 0 };
                }
            }
        }
    }
}

/// Move the cells above layer 0 of one column by `d`. `fill` supplies the
/// value for the band vacated by a downward shift; `None` copies from the
/// layer that used to be on top.
fn shift_column<T: Copy>(col: &mut [T], d: i32, fill: Option<T>) {
    let h = col.len();
    if d < 0 {
        let d = (-d) as usize;
        let top_value = fill.unwrap_or(col[h - 1]);
        col.copy_within(1 + d..h, 1);
        for cell in &mut col[h - d..h] {
            *cell = top_value;
        }
    } else {
        let d = d as usize;
        let bottom_value = col[0];
        col.copy_within(1..h - d, 1 + d);
        for cell in &mut col[1..1 + d] {
            *cell = bottom_value;
        }
    }
}

/// The view of a world that reshaping needs.
pub trait WorldAccess {
    fn coords(&self) -> Vec<Coord>;
    fn has_chunk(&self, coord: Coord) -> bool;
    fn chunk(&self, coord: Coord) -> Option<&Chunk>;
    fn chunk_mut(&mut self, coord: Coord) -> Option<&mut Chunk>;
    fn height(&self) -> usize;
    fn seed(&self) -> u64;
    fn materials(&self) -> &Materials;

    fn spawn_position(&self) -> [i32; 3];
    fn set_spawn_position(&mut self, pos: [i32; 3]);
    fn player_names(&self) -> Vec<String>;
    fn player_position(&self, name: &str) -> Option<[f64; 3]>;
    fn set_player_position(&mut self, name: &str, pos: [f64; 3]);

    fn relight(&mut self);
    fn save(&mut self) -> Result<(), WorldError>;
}

#[derive(Serialize, Deserialize)]
struct WorldFile {
    seed: u64,
    height: usize,
    spawn: [i32; 3],
    players: HashMap<String, [f64; 3]>,
    chunks: Vec<(Coord, Chunk)>,
}

/// In-memory world backed by a JSON file.
pub struct MemoryWorld {
    path: PathBuf,
    seed: u64,
    height: usize,
    spawn: [i32; 3],
    players: HashMap<String, [f64; 3]>,
    chunks: HashMap<Coord, Chunk>,
    materials: Materials,
}

impl MemoryWorld {
    pub const FILE_NAME: &'static str = "world.json";

    pub fn create(dir: &Path, seed: u64, height: usize) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
            seed,
            height,
            spawn: [0, height as i32 / 2, 0],
            players: HashMap::new(),
            chunks: HashMap::new(),
            materials: Materials::classic(),
        }
    }

    pub fn load(dir: &Path) -> Result<Self, WorldError> {
        let path = dir.join(Self::FILE_NAME);
        let file: WorldFile = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
        Ok(Self {
            path,
            seed: file.seed,
            height: file.height,
            spawn: file.spawn,
            players: file.players,
            chunks: file.chunks.into_iter().collect(),
            materials: Materials::classic(),
        })
    }

    pub fn insert_chunk(&mut self, coord: Coord, chunk: Chunk) {
        self.chunks.insert(coord, chunk);
    }
}

impl WorldAccess for MemoryWorld {
    fn coords(&self) -> Vec<Coord> {
        let mut coords: Vec<Coord> = self.chunks.keys().copied().collect();
        coords.sort();
        coords
    }

    fn has_chunk(&self, coord: Coord) -> bool {
        self.chunks.contains_key(&coord)
    }

    fn chunk(&self, coord: Coord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    fn chunk_mut(&mut self, coord: Coord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    fn height(&self) -> usize {
        self.height
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn materials(&self) -> &Materials {
        &self.materials
    }

    fn spawn_position(&self) -> [i32; 3] {
        self.spawn
    }

    fn set_spawn_position(&mut self, pos: [i32; 3]) {
        self.spawn = pos;
    }

    fn player_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.players.keys().cloned().collect();
        names.sort();
        names
    }

    fn player_position(&self, name: &str) -> Option<[f64; 3]> {
        self.players.get(name).copied()
    }

    fn set_player_position(&mut self, name: &str, pos: [f64; 3]) {
        self.players.insert(name.to_string(), pos);
    }

    fn relight(&mut self) {
        let air = self.materials.get("Air").unwrap_or_default();
        for chunk in self.chunks.values_mut() {
            chunk.recompute_sky_light(air);
            chunk.clear_dirty();
        }
    }

    fn save(&mut self) -> Result<(), WorldError> {
        let mut chunks: Vec<(Coord, Chunk)> =
            self.chunks.iter().map(|(c, ch)| (*c, ch.clone())).collect();
        chunks.sort_by_key(|(c, _)| *c);
        let file = WorldFile {
            seed: self.seed,
            height: self.height,
            spawn: self.spawn,
            players: self.players.clone(),
            chunks,
        };
        serde_json::to_writer(BufWriter::new(File::create(&self.path)?), &file)?;
        for chunk in self.chunks.values_mut() {
            chunk.clear_dirty();
        }
        Ok(())
    }
}
