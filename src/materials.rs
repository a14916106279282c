//! Block identity and the role tables driving terrain reshaping.
//!
//! Blocks are identified by a numeric id plus a small data value. Reshaping
//! does not care about most block identities individually; it groups them
//! into roles (terrain, supported, immutable and so on) resolved once from
//! name tables against the world's material registry. Names the registry
//! does not know are skipped, so one table serves worlds with different
//! block palettes.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub type BlockId = u16;

/// A block identity: numeric id plus the data nibble.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub data: u8,
}

impl Block {
    pub const fn new(id: BlockId, data: u8) -> Self {
        Self { id, data }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("material registry is missing required block '{0}'")]
pub struct MissingMaterial(&'static str);

/// Named block registry for a world's material palette.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Materials {
    by_name: HashMap<String, Block>,
}

impl Materials {
    /// The classic block palette.
    pub fn classic() -> Self {
        let mut by_name = HashMap::new();
        let mut put = |name: &str, id: BlockId, data: u8| {
            by_name.insert(name.to_string(), Block::new(id, data));
        };
        put("Air", 0, 0);
        put("Stone", 1, 0);
        put("Grass", 2, 0);
        put("Dirt", 3, 0);
        put("Cobblestone", 4, 0);
        put("WoodPlanks", 5, 0);
        put("Sapling", 6, 0);
        put("SpruceSapling", 6, 1);
        put("BirchSapling", 6, 2);
        put("Bedrock", 7, 0);
        put("WaterActive", 8, 0);
        put("Water", 9, 0);
        put("LavaActive", 10, 0);
        put("Lava", 11, 0);
        put("Sand", 12, 0);
        put("Gravel", 13, 0);
        put("GoldOre", 14, 0);
        put("IronOre", 15, 0);
        put("CoalOre", 16, 0);
        put("Wood", 17, 0);
        put("Ironwood", 17, 1);
        put("BirchWood", 17, 2);
        put("Leaves", 18, 0);
        put("BirchLeaves", 18, 2);
        put("Glass", 20, 0);
        put("Sandstone", 24, 0);
        put("TallGrass", 31, 1);
        put("Shrub", 32, 0);
        put("Flower", 37, 0);
        put("Rose", 38, 0);
        put("BrownMushroom", 39, 0);
        put("RedMushroom", 40, 0);
        put("MossStone", 48, 0);
        put("Obsidian", 49, 0);
        put("Crops", 59, 0);
        put("Farmland", 60, 0);
        put("Sign", 63, 0);
        put("Rail", 66, 0);
        put("SnowLayer", 78, 0);
        put("Ice", 79, 0);
        put("Snow", 80, 0);
        put("Cactus", 81, 0);
        put("Clay", 82, 0);
        put("SugarCane", 83, 0);
        put("Fence", 85, 0);
        put("Pumpkin", 86, 0);
        put("Netherrack", 87, 0);
        put("Glowstone", 89, 0);
        put("Vines", 106, 0);
        put("Mycelium", 110, 0);
        put("Lilypad", 111, 0);
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<Block> {
        self.by_name.get(name).copied()
    }

    fn require(&self, name: &'static str) -> Result<Block, MissingMaterial> {
        self.get(name).ok_or(MissingMaterial(name))
    }
}

// Height map basis.
const TERRAIN: &[&str] = &[
    "Bedrock", "Clay", "CoalOre", "Cobblestone", "Dirt", "GoldOre", "Grass", "Gravel",
    "Glowstone", "IronOre", "Lava", "LavaActive", "MossStone", "Mycelium", "Netherrack",
    "Obsidian", "Sand", "Sandstone", "Snow", "Stone", "WoodPlanks",
];

// Retained in place when terrain beneath supports them.
const SUPPORTED: &[&str] = &[
    "BirchSapling", "BrownMushroom", "Crops", "Farmland", "Fence", "Flower", "Glass",
    "Lilypad", "Pumpkin", "Rail", "RedMushroom", "Rose", "Sapling", "Shrub", "Sign",
    "SnowLayer", "SpruceSapling", "TallGrass",
];

// Never removed.
const IMMUTABLE: &[&str] = &["Bedrock"];

// Able to dissolve other blocks.
const SOLVENT: &[&str] = &["Water", "WaterActive"];

// Replaced as specified when underwater; None removes outright.
const DISSOLVE: &[(&str, Option<&str>)] = &[
    ("Grass", Some("Dirt")),
    ("Lava", Some("Obsidian")),
    ("LavaActive", Some("Cobblestone")),
    ("Mycelium", Some("Dirt")),
    ("Snow", Some("Dirt")),
    ("SnowLayer", None),
];

// Ignored when reshaping land.
const WATER: &[&str] = &["Ice", "Water", "WaterActive"];

const TREE_TRUNKS: &[&str] = &[
    "BirchWood", "Cactus", "Ironwood", "SugarCane", "Vines", "Wood",
];

const TREE_LEAVES: &[&str] = &["BirchLeaves", "Leaves"];

// Trunk species to the sapling that regrows it.
const TREE_TRUNKS_REPLACE: &[(&str, &str)] = &[
    ("BirchWood", "BirchSapling"),
    ("Ironwood", "SpruceSapling"),
    ("Wood", "Sapling"),
];

/// Role tables resolved to numeric ids for one material palette.
#[derive(Clone, Debug)]
pub struct BlockRoles {
    pub terrain: HashSet<BlockId>,
    pub supported: HashSet<BlockId>,
    pub immutable: HashSet<BlockId>,
    pub solvent: HashSet<BlockId>,
    pub dissolve: HashMap<BlockId, Option<Block>>,
    pub water: HashSet<BlockId>,
    pub tree_trunks: HashSet<BlockId>,
    pub tree_leaves: HashSet<BlockId>,
    /// Trunk (id, species) to replacement sapling.
    pub tree_trunks_replace: HashMap<(BlockId, u8), Block>,

    pub air: Block,
    pub water_block: Block,
    pub sand: Block,
    pub dirt: Block,
    pub grass: Block,
}

impl BlockRoles {
    pub fn resolve(materials: &Materials) -> Result<Self, MissingMaterial> {
        let ids = |names: &[&str]| -> HashSet<BlockId> {
            names.iter().filter_map(|n| materials.get(n)).map(|b| b.id).collect()
        };

        let dissolve = DISSOLVE
            .iter()
            .filter_map(|(from, to)| {
                let from = materials.get(from)?;
                let to = match to {
                    Some(name) => Some(materials.get(name)?),
                    None => None,
                };
                Some((from.id, to))
            })
            .collect();

        let tree_trunks_replace = TREE_TRUNKS_REPLACE
            .iter()
            .filter_map(|(trunk, sapling)| {
                let trunk = materials.get(trunk)?;
                let sapling = materials.get(sapling)?;
                Some(((trunk.id, trunk.data & 3), sapling))
            })
            .collect();

        Ok(Self {
            terrain: ids(TERRAIN),
            supported: ids(SUPPORTED),
            immutable: ids(IMMUTABLE),
            solvent: ids(SOLVENT),
            dissolve,
            water: ids(WATER),
            tree_trunks: ids(TREE_TRUNKS),
            tree_leaves: ids(TREE_LEAVES),
            tree_trunks_replace,
            air: materials.require("Air")?,
            water_block: materials.require("Water")?,
            sand: materials.require("Sand")?,
            dirt: materials.require("Dirt")?,
            grass: materials.require("Grass")?,
        })
    }

    /// The sapling that regrows a trunk block, if any. Matches on trunk id
    /// and the species bits of its data value.
    pub fn sapling_for(&self, trunk: Block) -> Option<Block> {
        self.tree_trunks_replace
            .get(&(trunk.id, trunk.data & 3))
            .copied()
    }
}

/// A restartable block sequence that repeats its final element forever.
///
/// Used when filling a column from a template: once the template runs out,
/// the deepest material continues downward.
pub struct ReplacementRun<'a> {
    blocks: &'a [Block],
    next: usize,
}

impl<'a> ReplacementRun<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        Self { blocks, next: 0 }
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for ReplacementRun<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.blocks.is_empty() {
            return None;
        }
        let i = self.next.min(self.blocks.len() - 1);
        self.next += 1;
        Some(self.blocks[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_resolve_against_classic() {
        let roles = BlockRoles::resolve(&Materials::classic()).unwrap();
        assert!(roles.terrain.contains(&1)); // Stone
        assert!(roles.terrain.contains(&2)); // Grass
        assert!(roles.supported.contains(&6)); // Sapling
        assert!(roles.immutable.contains(&7)); // Bedrock
        assert!(roles.water.contains(&9));
        assert!(roles.solvent.contains(&8));
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let materials = Materials::default();
        // Resolution fails only on the required key blocks.
        assert!(BlockRoles::resolve(&materials).is_err());
    }

    #[test]
    fn test_dissolve_map() {
        let roles = BlockRoles::resolve(&Materials::classic()).unwrap();
        let grass = Materials::classic().get("Grass").unwrap();
        let dirt = Materials::classic().get("Dirt").unwrap();
        assert_eq!(roles.dissolve[&grass.id], Some(dirt));
        let layer = Materials::classic().get("SnowLayer").unwrap();
        assert_eq!(roles.dissolve[&layer.id], None);
    }

    #[test]
    fn test_sapling_matches_species() {
        let roles = BlockRoles::resolve(&Materials::classic()).unwrap();
        let birch = Block::new(17, 2);
        assert_eq!(roles.sapling_for(birch), Some(Block::new(6, 2)));
        // Leaf decay bits above the species bits do not break the match.
        assert_eq!(roles.sapling_for(Block::new(17, 2 | 4)), Some(Block::new(6, 2)));
        assert_eq!(roles.sapling_for(Block::new(81, 0)), None); // Cactus
    }

    #[test]
    fn test_replacement_run_repeats_last() {
        let blocks = [Block::new(12, 0), Block::new(24, 0)];
        let mut run = ReplacementRun::new(&blocks);
        let taken: Vec<Block> = run.by_ref().take(4).collect();
        assert_eq!(taken, vec![blocks[0], blocks[1], blocks[1], blocks[1]]);
        run.restart();
        assert_eq!(run.next(), Some(blocks[0]));
    }
}
