//! Boundary stitching for chunked voxel worlds
//!
//! Re-exports modules for use by the command line binary and tools.

pub mod contour;
pub mod filter;
pub mod geom;
pub mod grid;
pub mod heightmap;
pub mod mask;
pub mod materials;
pub mod meander;
pub mod merge;
pub mod shaper;
pub mod shift;
pub mod world;
