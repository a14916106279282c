//! Boolean occupancy masks for terrain features.
//!
//! A mask marks which cells of a chunk belong to a feature: a band along a
//! boundary edge, a rounded corner where two boundaries meet, or a winding
//! river channel. Masks are built per chunk from the chunk's boundary
//! direction set and unioned into one footprint.
//!
//! Corner geometry walks a quarter-ellipse cell by cell and rasterises the
//! resulting per-row span limits with horizontal-run writes; all spans clip
//! to the chunk extent.

use crate::geom::{self, Dir};
use crate::grid::Grid;
use crate::meander::ChunkSeeder;

/// Mask-shape tunables.
#[derive(Clone, Debug)]
pub struct MaskParams {
    /// Band width divisor applied when the opposite side of the chunk is
    /// also a boundary, so facing channels do not fuse into one wide one.
    pub narrowing_factor: f64,
    /// Inset subtracted from ellipse axes to soften corner rounding.
    pub corner_radius_offset: f64,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            narrowing_factor: 1.5,
            corner_radius_offset: 0.9,
        }
    }
}

/// Walk the boundary of a quarter-ellipse, yielding at most one point per
/// row: the furthest in-ellipse column, which shrinks monotonically as the
/// row offset grows. Points outside `bound` are dropped.
fn trace_ellipse(
    centre: (i32, i32),
    axes: (f64, f64),
    bound: ((i32, i32), (i32, i32)),
    radius_offset: f64,
) -> Vec<(i32, i32)> {
    let ax = axes.0.abs() - radius_offset;
    let az = axes.1.abs() - radius_offset;
    let (ax2, az2) = (ax * ax, az * az);
    let in_ellipse = |x: i32, z: i32| {
        (x * x) as f64 / ax2 + (z * z) as f64 / az2 < 1.0
    };

    let sign = (axes.0.signum() as i32, axes.1.signum() as i32);
    let mut points = Vec::new();
    let mut upper = az.floor() as i32;
    for x in 0..=(ax.floor() as i32) {
        for z in (0..=upper).rev() {
            if in_ellipse(x, z) {
                upper = z;
                let point = (centre.0 + sign.0 * x, centre.1 + sign.1 * z);
                if point.0 >= bound.0 .0
                    && point.1 >= bound.0 .1
                    && point.0 <= bound.1 .0
                    && point.1 <= bound.1 .1
                {
                    points.push(point);
                }
                break;
            }
        }
    }
    points
}

/// Rasterise per-row (start, end) column spans into a mask. Rows begin at
/// `start` and advance by `step`; spans clip to the grid and iteration stops
/// at the grid boundary.
fn mask_lines(
    shape: (usize, usize),
    limits: impl IntoIterator<Item = (i32, i32)>,
    start: i32,
    step: i32,
) -> Grid<bool> {
    let mut mask = Grid::new_with(shape.0, shape.1, false);
    let mut x = start;
    for (z_start, z_end) in limits {
        if x < 0 || x >= shape.0 as i32 {
            break;
        }
        let lo = z_start.clamp(0, shape.1 as i32) as usize;
        let hi = z_end.clamp(0, shape.1 as i32) as usize;
        mask.set_span(x as usize, lo, hi, true);
        x += step;
    }
    mask
}

/// Rectangular mask with the given corner coordinates (outer exclusive).
fn mask_square(shape: (usize, usize), inner: (i32, i32), outer: (i32, i32)) -> Grid<bool> {
    let mut mask = Grid::new_with(shape.0, shape.1, false);
    let x0 = inner.0.clamp(0, shape.0 as i32) as usize;
    let x1 = outer.0.clamp(0, shape.0 as i32) as usize;
    let z0 = inner.1.clamp(0, shape.1 as i32) as usize;
    let z1 = outer.1.clamp(0, shape.1 as i32) as usize;
    for x in x0..x1 {
        mask.set_span(x, z0, z1, true);
    }
    mask
}

/// Band of constant width along one straight side of the chunk.
fn mask_edge(shape: (usize, usize), width: i32, v: Dir) -> Grid<bool> {
    debug_assert!(geom::is_straight(v));
    let (mx, mz) = (shape.0 as i32, shape.1 as i32);
    if v.0 < 0 || v.1 < 0 {
        let outer = (mx + v.0 * (mx - width), mz + v.1 * (mz - width));
        mask_square(shape, (0, 0), outer)
    } else {
        let inner = (v.0 * (mx - width), v.1 * (mz - width));
        mask_square(shape, inner, (mx, mz))
    }
}

/// Band of per-cell varying width along one straight side, for rivers.
/// `widths[i]` is the channel penetration at boundary cell `i`.
fn mask_edge_meander(shape: (usize, usize), widths: &[i32], v: Dir) -> Grid<bool> {
    debug_assert!(geom::is_straight(v));
    let (mx, mz) = (shape.0 as i32, shape.1 as i32);
    let mut mask = Grid::new_with(shape.0, shape.1, false);
    if v.0 != 0 {
        // Band along an x side; the sequence runs along z.
        for z in 0..shape.1 {
            let w = widths[z].clamp(1, mx);
            let (x0, x1) = if v.0 < 0 { (0, w) } else { (mx - w, mx) };
            for x in x0..x1 {
                mask.set(x as usize, z, true);
            }
        }
    } else {
        for x in 0..shape.0 {
            let w = widths[x].clamp(1, mz);
            let (z0, z1) = if v.1 < 0 { (0, w) } else { (mz - w, mz) };
            mask.set_span(x, z0 as usize, z1 as usize, true);
        }
    }
    mask
}

/// Corner cell of the chunk pointed at by diagonal `v`.
fn corner_cell(shape: (usize, usize), v: Dir) -> (i32, i32) {
    (
        (v.0 + 1) / 2 * (shape.0 as i32 - 1),
        (v.1 + 1) / 2 * (shape.1 as i32 - 1),
    )
}

/// Quarter-ellipse fill hugging the chunk corner, for concave joins.
fn mask_concave_corner(
    shape: (usize, usize),
    widths: (i32, i32),
    v: Dir,
    params: &MaskParams,
) -> Grid<bool> {
    let centre = corner_cell(shape, v);
    let bound = ((0, 0), (shape.0 as i32 - 1, shape.1 as i32 - 1));
    let axes = (-(v.0 * widths.0) as f64, -(v.1 * widths.1) as f64);
    let ellipse = trace_ellipse(centre, axes, bound, params.corner_radius_offset);
    let limits = ellipse.into_iter().map(|(_, z)| {
        let (lo, hi) = (centre.1.min(z), centre.1.max(z));
        (lo, hi + 1)
    });
    mask_lines(shape, limits, centre.0, -v.0)
}

/// Rounded interior fill between two meeting edge bands, for convex corners.
/// Rows with no ellipse point continue as straight clipped spans.
fn mask_convex_corner(
    shape: (usize, usize),
    widths: (i32, i32),
    v: Dir,
    params: &MaskParams,
) -> Grid<bool> {
    let corner = corner_cell(shape, v);
    let centre = (
        corner.0 - 2 * v.0 * widths.0 + v.0,
        corner.1 - 2 * v.1 * widths.1 + v.1,
    );
    let bound = ((0, 0), (shape.0 as i32 - 1, shape.1 as i32 - 1));
    let axes = ((v.0 * widths.0) as f64, (v.1 * widths.1) as f64);
    let ellipse = trace_ellipse(centre, axes, bound, params.corner_radius_offset);
    let clipped = (
        centre.0.clamp(0, shape.0 as i32 - 1),
        centre.1.clamp(0, shape.1 as i32 - 1),
    );

    let arc: Vec<(i32, i32)> = ellipse
        .iter()
        .map(|&(_, z)| {
            let edge = z + v.1;
            let (lo, hi) = (corner.1.min(edge), corner.1.max(edge));
            (lo, hi + 1)
        })
        .collect();
    let tail_rows = shape.0.saturating_sub(arc.len());
    let tail = std::iter::repeat({
        let (lo, hi) = (corner.1.min(clipped.1), corner.1.max(clipped.1));
        (lo, hi + 1)
    })
    .take(tail_rows);

    mask_lines(shape, arc.into_iter().chain(tail), clipped.0, v.0)
}

/// Diagonals implied by pairs of straight edges: the corner where two
/// straight boundaries meet is a join even when the diagonal neighbour
/// itself was never traced.
fn induced_corners(edge: &[Dir]) -> Vec<Dir> {
    let mut corners = Vec::new();
    for x in [-1, 1] {
        for z in [-1, 1] {
            let corner = (x, z);
            if geom::decompose(corner)
                .iter()
                .all(|c| geom::inside(*c, edge))
            {
                corners.push(corner);
            }
        }
    }
    corners
}

/// Split diagonal candidates into concave and convex corners. A diagonal
/// whose straight components are both boundary edges is convex; one with
/// neither component present is concave; anything else is not a corner.
fn classify_corners(candidates: &[Dir], straights: &[Dir]) -> (Vec<Dir>, Vec<Dir>) {
    let mut concave = Vec::new();
    let mut convex = Vec::new();
    for &corner in candidates.iter().filter(|v| geom::is_diagonal(**v)) {
        let in_straight: Vec<bool> = geom::decompose(corner)
            .iter()
            .map(|c| geom::inside(*c, straights))
            .collect();
        if in_straight.iter().all(|b| *b) {
            convex.push(corner);
        } else if !in_straight.iter().any(|b| *b) {
            concave.push(corner);
        }
    }
    (concave, convex)
}

fn narrowed(width: f64, narrow: bool, params: &MaskParams) -> i32 {
    let w = if narrow {
        width / params.narrowing_factor
    } else {
        width
    };
    w.round() as i32
}

/// Union of edge-band masks for every straight boundary direction.
fn make_mask_straights(
    shape: (usize, usize),
    width: f64,
    components: &[Dir],
    straights: &[Dir],
    river: Option<&ChunkSeeder>,
    params: &MaskParams,
) -> Grid<bool> {
    let mut mask = Grid::new_with(shape.0, shape.1, false);
    for &v in straights {
        let rwidth = narrowed(width, geom::inside(geom::negate(v), components), params);
        let edge = match river {
            Some(seeder) => {
                let len = if v.0 != 0 { shape.1 } else { shape.0 };
                let widths = seeder.edge_widths(v, rwidth, len);
                mask_edge_meander(shape, &widths, v)
            }
            None => mask_edge(shape, rwidth, v),
        };
        mask.union(&edge);
    }
    mask
}

/// Union of rounded corner masks for every concave and convex corner.
fn make_mask_corners(
    shape: (usize, usize),
    width: f64,
    components: &[Dir],
    concave: &[Dir],
    convex: &[Dir],
    river: Option<&ChunkSeeder>,
    params: &MaskParams,
) -> Grid<bool> {
    let mut mask = Grid::new_with(shape.0, shape.1, false);
    let corner_sets = [(concave, false), (convex, true)];
    for (corners, is_convex) in corner_sets {
        for &v in corners.iter() {
            let xwidth = narrowed(width, geom::inside((-v.0, 0), components), params);
            let zwidth = narrowed(width, geom::inside((0, -v.1), components), params);
            let widths = match river {
                Some(seeder) => (
                    corner_meander_width(seeder, shape, v, xwidth, 0),
                    corner_meander_width(seeder, shape, v, zwidth, 1),
                ),
                None => (xwidth, zwidth),
            };
            let corner = if is_convex {
                mask_convex_corner(shape, widths, v, params)
            } else {
                mask_concave_corner(shape, widths, v, params)
            };
            mask.union(&corner);
        }
    }
    mask
}

/// Channel width at the chunk-corner end of the straight edge adjacent to
/// corner `v` on the given axis, keeping corner rounding continuous with the
/// meandering bands it joins.
fn corner_meander_width(
    seeder: &ChunkSeeder,
    shape: (usize, usize),
    v: Dir,
    base_width: i32,
    axis: u8,
) -> i32 {
    let (dir, len, end_positive) = if axis == 0 {
        ((v.0, 0), shape.1, v.1 > 0)
    } else {
        ((0, v.1), shape.0, v.0 > 0)
    };
    let widths = seeder.edge_widths(dir, base_width, len);
    if end_positive {
        widths[len - 1]
    } else {
        widths[0]
    }
}

/// Build the full feature mask for a chunk from its boundary direction set.
///
/// With a seeder the straight bands meander as river channels; without one
/// they are constant-width (the valley footprint).
pub fn make_mask(
    shape: (usize, usize),
    edge: &[Dir],
    width: f64,
    river: Option<&ChunkSeeder>,
    params: &MaskParams,
) -> Grid<bool> {
    let straights: Vec<Dir> = edge.iter().copied().filter(|v| geom::is_straight(*v)).collect();

    let mut candidates: Vec<Dir> = edge.to_vec();
    for corner in induced_corners(edge) {
        if !geom::inside(corner, edge) {
            candidates.push(corner);
        }
    }
    let (concave, convex) = classify_corners(&candidates, &straights);

    let components = geom::uniques(
        straights
            .iter()
            .chain(concave.iter())
            .chain(convex.iter())
            .flat_map(|v| geom::decompose(*v)),
    );

    let mut mask = make_mask_straights(shape, width, &components, &straights, river, params);
    mask.union(&make_mask_corners(
        shape,
        width,
        &components,
        &concave,
        &convex,
        river,
        params,
    ));
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: (usize, usize) = (16, 16);

    fn plain_mask(edge: &[Dir], width: f64) -> Grid<bool> {
        make_mask(SHAPE, edge, width, None, &MaskParams::default())
    }

    #[test]
    fn test_single_straight_edge_band() {
        let mask = plain_mask(&[(1, 0)], 4.0);
        for (x, z, &v) in mask.iter() {
            assert_eq!(v, x >= 12, "cell ({}, {})", x, z);
        }
    }

    #[test]
    fn test_straight_bands_fill_exact_widths() {
        let mask = plain_mask(&[(0, -1), (1, 0)], 3.0);
        for (x, z, &v) in mask.iter() {
            let expect = z < 3 || x >= 13;
            assert_eq!(v, expect, "cell ({}, {})", x, z);
        }
    }

    #[test]
    fn test_point_reflection_symmetry() {
        let width = 4.0;
        for edge in [vec![(1, 0)], vec![(0, 1), (1, 0)], vec![(1, 1)]] {
            let mask = plain_mask(&edge, width);
            let reflected_edge: Vec<Dir> = edge.iter().map(|v| geom::negate(*v)).collect();
            let reflected = plain_mask(&reflected_edge, width);
            for (x, z, &v) in mask.iter() {
                let rv = *reflected.get(15 - x, 15 - z);
                assert_eq!(v, rv, "asymmetry at ({}, {}) for {:?}", x, z, edge);
            }
        }
    }

    #[test]
    fn test_opposite_edges_narrow() {
        // River on both sides: bands shrink by the narrowing factor so the
        // two channels stay distinct.
        let mask = plain_mask(&[(1, 0), (-1, 0)], 6.0);
        // 6.0 / 1.5 = 4 cells per side.
        for (x, _, &v) in mask.iter() {
            assert_eq!(v, x < 4 || x >= 12);
        }
    }

    #[test]
    fn test_concave_corner_rounds_the_join() {
        // Lone diagonal: a quarter-ellipse hugging the corner.
        let mask = plain_mask(&[(1, 1)], 5.0);
        assert!(*mask.get(15, 15));
        assert!(*mask.get(12, 15));
        // Far corner untouched, and the diagonal extent is bounded.
        assert!(!*mask.get(0, 0));
        assert!(!*mask.get(10, 10));
        // Rounding: the full bounding square of the corner is not filled.
        assert!(mask.count() < 25);
    }

    #[test]
    fn test_convex_corner_fills_between_bands() {
        let mask = plain_mask(&[(1, 0), (0, 1), (1, 1)], 4.0);
        // Both bands present.
        assert!(*mask.get(15, 0) && *mask.get(0, 15));
        // The interior corner between the bands is rounded, not square:
        // cells inside the arc remain clear.
        assert!(!*mask.get(8, 8));
        // Cells tight against the band junction are filled.
        assert!(*mask.get(11, 11));
    }

    #[test]
    fn test_induced_corner_from_two_straights() {
        // Straight edges east and south imply a rounded join at the shared
        // corner even though (1, 1) was never traced.
        let with_induced = plain_mask(&[(1, 0), (0, 1)], 4.0);
        let straight_only = {
            let mut m = mask_edge(SHAPE, 4, (1, 0));
            m.union(&mask_edge(SHAPE, 4, (0, 1)));
            m
        };
        assert!(with_induced.count() > straight_only.count());
    }

    #[test]
    fn test_meander_band_stays_against_edge() {
        use crate::meander::{ChunkSeeder, MeanderParams};
        let seeder = ChunkSeeder::new(1234, (0, 0), MeanderParams::default());
        let mask = make_mask(SHAPE, &[(1, 0)], 3.0, Some(&seeder), &MaskParams::default());
        // Every boundary row keeps at least one cell against the east edge.
        for z in 0..16 {
            assert!(*mask.get(15, z), "row {} lost contact with the edge", z);
        }
        // And nothing leaks to the opposite side.
        for z in 0..16 {
            assert!(!*mask.get(0, z));
        }
    }
}
