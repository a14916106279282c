//! Deterministic meander sequences for river carving.
//!
//! A river channel along a chunk boundary winds by offsetting its centreline
//! and varying its width. Both offsets are smooth pseudo-random sequences:
//! uniform control samples drawn at a fixed spacing, Catmull-Rom interpolated
//! to one value per boundary cell.
//!
//! The central correctness property: a sequence is seeded purely from the
//! world seed and the *physical boundary* it describes, so the two chunks on
//! either side of that boundary, processed in any order and in any run,
//! derive coherent channel geometry. Sequences for consecutive boundary
//! segments are endpoint-matched so the channel does not jump between chunks.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::geom::{Coord, Dir};

/// Attempts at nudging the final control sample onto the required endpoint.
const MATCH_ATTEMPTS: usize = 20;

/// Acceptable endpoint mismatch, as a fraction of the value range span.
const MATCH_TOLERANCE: f64 = 0.1;

/// Tunables for river meandering.
#[derive(Clone, Debug)]
pub struct MeanderParams {
    /// Lower and upper bound on centreline deviation, in cells.
    pub centre_range: (i32, i32),
    /// Lower and upper bound on width deviation, in cells.
    pub width_range: (i32, i32),
    /// Average distance between centreline direction changes, in cells.
    pub centre_step: f64,
    /// Average distance between width changes, in cells.
    pub width_step: f64,
}

impl Default for MeanderParams {
    fn default() -> Self {
        Self {
            centre_range: (-2, 2),
            width_range: (-1, 1),
            centre_step: 5.0,
            width_step: 3.0,
        }
    }
}

/// Which of the two sequences describing a channel is wanted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Channel {
    Centre,
    Width,
}

/// Per-chunk source of meander sequences.
///
/// Cheap to construct; holds no state beyond the seed and tunables.
#[derive(Clone, Debug)]
pub struct ChunkSeeder {
    world_seed: u64,
    coord: Coord,
    params: MeanderParams,
}

impl ChunkSeeder {
    pub fn new(world_seed: u64, coord: Coord, params: MeanderParams) -> Self {
        Self {
            world_seed,
            coord,
            params,
        }
    }

    pub fn params(&self) -> &MeanderParams {
        &self.params
    }

    /// Offset sequence for the boundary on side `dir` of this chunk, one
    /// value per cell along the boundary.
    ///
    /// Centre offsets are reported from this chunk's point of view: a
    /// positive value pushes the channel deeper into this chunk, so the
    /// opposite chunk sees the same physical wobble negated.
    pub fn channel_offsets(&self, dir: Dir, channel: Channel, len: usize) -> Vec<i32> {
        let (range, step) = match channel {
            Channel::Centre => (self.params.centre_range, self.params.centre_step),
            Channel::Width => (self.params.width_range, self.params.width_step),
        };
        let segment = BoundarySegment::new(self.coord, dir);
        let raw = segment.sequence(self.world_seed, channel, range, step, len);
        if channel == Channel::Centre && !segment.owned {
            raw.into_iter().map(|v| -v).collect()
        } else {
            raw
        }
    }

    /// Per-cell channel penetration for a straight river edge: the base band
    /// width adjusted by the width and centre sequences, at least one cell.
    pub fn edge_widths(&self, dir: Dir, base_width: i32, len: usize) -> Vec<i32> {
        let widths = self.channel_offsets(dir, Channel::Width, len);
        let centres = self.channel_offsets(dir, Channel::Centre, len);
        widths
            .iter()
            .zip(&centres)
            .map(|(w, c)| (base_width + w + c).max(1))
            .collect()
    }
}

/// One chunk-length stretch of the boundary between two adjacent chunks.
///
/// The segment is identified by the lexicographically smaller of the two
/// chunk coordinates plus the boundary axis, so both chunks name it
/// identically. `owned` records whether the viewing chunk is that canonical
/// side; the centre sequence flips sign for the other side.
struct BoundarySegment {
    canonical: Coord,
    axis: u8,
    owned: bool,
}

impl BoundarySegment {
    fn new(coord: Coord, dir: Dir) -> Self {
        let neighbour = (coord.0 + dir.0, coord.1 + dir.1);
        let canonical = coord.min(neighbour);
        Self {
            canonical,
            axis: if dir.0 != 0 { 0 } else { 1 },
            owned: canonical == coord,
        }
    }

    /// The boundary segment one chunk further along the boundary line.
    fn successor(&self) -> BoundarySegment {
        let canonical = if self.axis == 0 {
            (self.canonical.0, self.canonical.1 + 1)
        } else {
            (self.canonical.0 + 1, self.canonical.1)
        };
        BoundarySegment {
            canonical,
            axis: self.axis,
            owned: self.owned,
        }
    }

    fn seed(&self, world_seed: u64, channel: Channel) -> u64 {
        let mut hasher = DefaultHasher::new();
        world_seed.hash(&mut hasher);
        self.canonical.hash(&mut hasher);
        self.axis.hash(&mut hasher);
        match channel {
            Channel::Centre => "centre",
            Channel::Width => "width",
        }
        .hash(&mut hasher);
        hasher.finish()
    }

    /// Raw control samples for this segment. The first sample is also the
    /// opening value of the interpolated sequence.
    fn samples(&self, world_seed: u64, channel: Channel, range: (i32, i32), count: usize) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed(world_seed, channel));
        (0..count)
            .map(|_| rng.gen_range(range.0..=range.1) as f64)
            .collect()
    }

    fn sequence(
        &self,
        world_seed: u64,
        channel: Channel,
        range: (i32, i32),
        step: f64,
        len: usize,
    ) -> Vec<i32> {
        let count = sample_count(len, step);
        let mut samples = self.samples(world_seed, channel, range, count);

        // Pin the endpoint to the next segment's opening value so the
        // channel flows continuously from chunk to chunk. A feedback nudge
        // on the last control sample converges in a couple of iterations;
        // the clamp keeps it honest when the target sits at a range bound.
        let target = self.successor().samples(world_seed, channel, range, 1)[0];
        let span = (range.1 - range.0).max(1) as f64;
        for _ in 0..MATCH_ATTEMPTS {
            let end = interpolate_at(&samples, step, (len - 1) as f64);
            if (end - target).abs() <= MATCH_TOLERANCE * span {
                break;
            }
            let last = samples.len() - 1;
            samples[last] =
                (samples[last] + (target - end)).clamp(range.0 as f64, range.1 as f64);
        }

        (0..len)
            .map(|i| interpolate_at(&samples, step, i as f64).round() as i32)
            .collect()
    }
}

fn sample_count(len: usize, step: f64) -> usize {
    (((len - 1) as f64 / step).ceil() as usize + 1).max(2)
}

/// Catmull-Rom evaluation of the control samples at position `pos` (in
/// cells; control points sit `step` cells apart, endpoints duplicated).
fn interpolate_at(samples: &[f64], step: f64, pos: f64) -> f64 {
    let t = (pos / step).min((samples.len() - 1) as f64);
    let i = (t.floor() as usize).min(samples.len() - 2);
    let f = t - i as f64;

    let at = |n: i64| -> f64 {
        let idx = n.clamp(0, samples.len() as i64 - 1) as usize;
        samples[idx]
    };
    catmull_rom(at(i as i64 - 1), at(i as i64), at(i as i64 + 1), at(i as i64 + 2), f)
}

/// Catmull-Rom spline interpolation
fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeder(coord: Coord) -> ChunkSeeder {
        ChunkSeeder::new(9000, coord, MeanderParams::default())
    }

    #[test]
    fn test_sequences_are_deterministic() {
        let a = seeder((3, -2)).channel_offsets((1, 0), Channel::Centre, 16);
        let b = seeder((3, -2)).channel_offsets((1, 0), Channel::Centre, 16);
        assert_eq!(a, b);
    }

    #[test]
    fn test_offsets_stay_in_range_roughly() {
        let params = MeanderParams::default();
        for z in -4..4 {
            let offs = seeder((0, z)).channel_offsets((1, 0), Channel::Width, 16);
            assert_eq!(offs.len(), 16);
            for v in offs {
                // Catmull-Rom can overshoot the control range slightly.
                assert!(v >= params.width_range.0 - 1 && v <= params.width_range.1 + 1);
            }
        }
    }

    #[test]
    fn test_opposite_sides_see_negated_centres() {
        // Boundary between (0,0) and (1,0): east edge of one, west of other.
        let here = seeder((0, 0)).channel_offsets((1, 0), Channel::Centre, 16);
        let there = seeder((1, 0)).channel_offsets((-1, 0), Channel::Centre, 16);
        let negated: Vec<i32> = there.iter().map(|v| -v).collect();
        assert_eq!(here, negated);
    }

    #[test]
    fn test_opposite_sides_agree_on_width() {
        let here = seeder((5, 5)).channel_offsets((0, 1), Channel::Width, 16);
        let there = seeder((5, 6)).channel_offsets((0, -1), Channel::Width, 16);
        assert_eq!(here, there);
    }

    #[test]
    fn test_cross_chunk_continuity() {
        // The east boundary of (0,0) continues as the east boundary of (0,1).
        // The first sequence's final value must approximate the second's
        // opening value.
        let params = MeanderParams::default();
        let span = (params.centre_range.1 - params.centre_range.0) as f64;
        let first = seeder((0, 0)).channel_offsets((1, 0), Channel::Centre, 16);
        let second = seeder((0, 1)).channel_offsets((1, 0), Channel::Centre, 16);
        let gap = (first[15] - second[0]).abs() as f64;
        // Rounding adds at most half a cell on each side of the tolerance.
        assert!(
            gap <= MATCH_TOLERANCE * span + 1.0,
            "endpoint gap {} too large",
            gap
        );
    }

    #[test]
    fn test_edge_widths_never_vanish() {
        for x in -3..3 {
            let widths = seeder((x, 7)).edge_widths((0, -1), 2, 16);
            assert!(widths.iter().all(|w| *w >= 1));
        }
    }
}
