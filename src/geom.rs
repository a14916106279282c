//! 2D integer vector helpers for boundary directions.
//!
//! A direction is an (x, z) pair with components in {-1, 0, 1} pointing at
//! one of the eight neighbouring chunks, or at an axis-aligned component of
//! such an offset. All functions here are pure.

/// Chunk coordinate in the world grid.
pub type Coord = (i32, i32);

/// Compass offset toward an adjacent chunk, or one axis of it.
pub type Dir = (i32, i32);

/// Split a vector into its non-zero axis-aligned components.
///
/// A diagonal like (1, -1) yields [(1, 0), (0, -1)]; an axis-aligned vector
/// yields itself; the zero vector yields nothing.
pub fn decompose(v: Dir) -> Vec<Dir> {
    let mut parts = Vec::with_capacity(2);
    if v.0 != 0 {
        parts.push((v.0, 0));
    }
    if v.1 != 0 {
        parts.push((0, v.1));
    }
    parts
}

/// Check whether the collection contains the given vector.
pub fn inside(v: Dir, vecs: &[Dir]) -> bool {
    vecs.contains(&v)
}

/// Keep only the first occurrence of each vector, preserving order.
pub fn uniques(vecs: impl IntoIterator<Item = Dir>) -> Vec<Dir> {
    let mut out = Vec::new();
    for v in vecs {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

pub fn negate(v: Dir) -> Dir {
    (-v.0, -v.1)
}

/// True for a non-zero axis-aligned vector.
pub fn is_straight(v: Dir) -> bool {
    (v.0 == 0) != (v.1 == 0)
}

/// True for a vector with both components non-zero.
pub fn is_diagonal(v: Dir) -> bool {
    v.0 != 0 && v.1 != 0
}

/// The eight compass offsets surrounding a cell.
pub const SURROUNDING: [Dir; 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
