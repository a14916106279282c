//! 2D low-pass smoothing of height fields.
//!
//! Two interchangeable filters: `smooth` cuts high frequencies out of the
//! field's 2D discrete Fourier spectrum; `gauss` convolves with a separable
//! Gaussian kernel. Both operate on a padded copy of the field and crop back
//! to the original size, and both accept a caller-supplied padder so that
//! smoothing at a chunk boundary can see real neighbouring terrain instead
//! of a mirrored edge.
//!
//! Fields are at most one padded chunk neighbourhood (48x48), so the
//! spectral path uses a direct separable DFT rather than pulling in an FFT.

use std::fmt;
use std::str::FromStr;

use crate::grid::Grid;

/// Chunks of padding added on every side before filtering.
pub const PADDING: usize = 1;

#[derive(Debug, thiserror::Error)]
#[error("unknown filter '{0}', expected one of: smooth, gauss")]
pub struct UnknownFilter(String);

/// Selects the smoothing algorithm.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FilterKind {
    /// Frequency-domain cutoff.
    Smooth,
    /// Gaussian convolution.
    Gauss,
}

impl FromStr for FilterKind {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smooth" => Ok(FilterKind::Smooth),
            "gauss" => Ok(FilterKind::Gauss),
            other => Err(UnknownFilter(other.to_string())),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Smooth => write!(f, "smooth"),
            FilterKind::Gauss => write!(f, "gauss"),
        }
    }
}

/// A padder produces the enlarged field the filter actually runs on; the
/// centre block must hold the input field.
pub type Padder<'a> = &'a dyn Fn(&Grid<i32>) -> Grid<f64>;

/// Replicate-edge padding: each side is extended with copies of the nearest
/// edge value, `PADDING` field-sizes in every direction.
pub fn replicate_pad(field: &Grid<i32>) -> Grid<f64> {
    let (mx, mz) = (field.width, field.depth);
    let factor = PADDING * 2 + 1;
    let mut out = Grid::new_with(mx * factor, mz * factor, 0.0);
    let samp = |c: usize, cm: usize| -> usize {
        (c as i64 - (cm * PADDING) as i64).clamp(0, cm as i64 - 1) as usize
    };
    for x in 0..mx * factor {
        for z in 0..mz * factor {
            out.set(x, z, *field.get(samp(x, mx), samp(z, mz)) as f64);
        }
    }
    out
}

/// Apply the chosen filter to a height field, returning integer heights.
pub fn apply(kind: FilterKind, field: &Grid<i32>, factor: f64, padder: Padder) -> Grid<i32> {
    match kind {
        FilterKind::Smooth => smooth(field, factor, padder),
        FilterKind::Gauss => gauss(field, factor, padder),
    }
}

/// Smooth by zeroing spectral components above a cutoff frequency. The
/// cutoff scales with the padding factor so `factor` keeps its meaning on
/// the unpadded field.
pub fn smooth(field: &Grid<i32>, factor: f64, padder: Padder) -> Grid<i32> {
    let padded = padder(field);
    let cut = factor * (PADDING * 2 + 1) as f64;
    let spectrum = dft_2d(&complexify(&padded), false);
    let trimmed = trim_spectrum(&spectrum, cut);
    let restored = dft_2d(&trimmed, true);
    crop_rounded(&restored, field.width, field.depth)
}

/// Smooth with a separable Gaussian kernel of the given sigma.
pub fn gauss(field: &Grid<i32>, sigma: f64, padder: Padder) -> Grid<i32> {
    let padded = padder(field);
    let kernel = gaussian_kernel(sigma);
    let rows = convolve_rows(&padded, &kernel);
    let blurred = convolve_cols(&rows, &kernel);
    crop_rounded(&complexify(&blurred), field.width, field.depth)
}

#[derive(Clone, Copy, Default)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn mul(self, other: Complex) -> Complex {
        Complex {
            re: self.re * other.re - self.im * other.im,
            im: self.re * other.im + self.im * other.re,
        }
    }

    fn add(self, other: Complex) -> Complex {
        Complex {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }
}

fn complexify(real: &Grid<f64>) -> Grid<Complex> {
    let mut out = Grid::new_with(real.width, real.depth, Complex::default());
    for (x, z, v) in real.iter() {
        out.set(x, z, Complex { re: *v, im: 0.0 });
    }
    out
}

/// Separable direct DFT over both axes. `inverse` flips the twiddle sign
/// and applies 1/N normalisation.
fn dft_2d(input: &Grid<Complex>, inverse: bool) -> Grid<Complex> {
    let rows = dft_axis(input, inverse, true);
    dft_axis(&rows, inverse, false)
}

fn dft_axis(input: &Grid<Complex>, inverse: bool, along_z: bool) -> Grid<Complex> {
    let (mx, mz) = (input.width, input.depth);
    let n = if along_z { mz } else { mx };
    let sign = if inverse { 1.0 } else { -1.0 };
    let scale = if inverse { 1.0 / n as f64 } else { 1.0 };
    let mut out = Grid::new_with(mx, mz, Complex::default());

    for outer in 0..(if along_z { mx } else { mz }) {
        for k in 0..n {
            let mut acc = Complex::default();
            for j in 0..n {
                let angle = sign * std::f64::consts::TAU * (k * j) as f64 / n as f64;
                let twiddle = Complex {
                    re: angle.cos(),
                    im: angle.sin(),
                };
                let v = if along_z {
                    *input.get(outer, j)
                } else {
                    *input.get(j, outer)
                };
                acc = acc.add(v.mul(twiddle));
            }
            acc.re *= scale;
            acc.im *= scale;
            if along_z {
                out.set(outer, k, acc);
            } else {
                out.set(k, outer, acc);
            }
        }
    }
    out
}

/// Zero all spectral components whose frequency magnitude (distance to the
/// nearest spectrum corner, accounting for conjugate symmetry) exceeds the
/// cutoff.
fn trim_spectrum(spectrum: &Grid<Complex>, cut: f64) -> Grid<Complex> {
    let (mx, mz) = (spectrum.width, spectrum.depth);
    let mut out = spectrum.clone();
    for x in 0..mx {
        for z in 0..mz {
            let fx = x.min(mx - x) as f64;
            let fz = z.min(mz - z) as f64;
            let f = (fx * fx + fz * fz).sqrt();
            if f > cut {
                out.set(x, z, Complex::default());
            }
        }
    }
    out
}

fn crop_rounded(padded: &Grid<Complex>, mx: usize, mz: usize) -> Grid<i32> {
    let mut out = Grid::new_with(mx, mz, 0);
    for x in 0..mx {
        for z in 0..mz {
            let v = padded.get(mx * PADDING + x, mz * PADDING + z).re;
            out.set(x, z, v.round() as i32);
        }
    }
    out
}

/// Normalised Gaussian kernel truncated at four sigma.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma).round().max(1.0) as usize;
    let mut kernel = Vec::with_capacity(radius * 2 + 1);
    let denom = 2.0 * sigma * sigma;
    for i in 0..=(radius * 2) {
        let d = i as f64 - radius as f64;
        kernel.push((-d * d / denom).exp());
    }
    let total: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }
    kernel
}

fn convolve_rows(field: &Grid<f64>, kernel: &[f64]) -> Grid<f64> {
    let (mx, mz) = (field.width, field.depth);
    let radius = kernel.len() as i64 / 2;
    let mut out = Grid::new_with(mx, mz, 0.0);
    for x in 0..mx {
        for z in 0..mz {
            let mut acc = 0.0;
            for (i, w) in kernel.iter().enumerate() {
                let zz = (z as i64 + i as i64 - radius).clamp(0, mz as i64 - 1) as usize;
                acc += w * field.get(x, zz);
            }
            out.set(x, z, acc);
        }
    }
    out
}

fn convolve_cols(field: &Grid<f64>, kernel: &[f64]) -> Grid<f64> {
    let (mx, mz) = (field.width, field.depth);
    let radius = kernel.len() as i64 / 2;
    let mut out = Grid::new_with(mx, mz, 0.0);
    for x in 0..mx {
        for z in 0..mz {
            let mut acc = 0.0;
            for (i, w) in kernel.iter().enumerate() {
                let xx = (x as i64 + i as i64 - radius).clamp(0, mx as i64 - 1) as usize;
                acc += w * field.get(xx, z);
            }
            out.set(x, z, acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(height: i32) -> Grid<i32> {
        Grid::new_with(16, 16, height)
    }

    #[test]
    fn test_replicate_pad_extends_edges() {
        let mut field = Grid::new_with(4, 4, 1);
        field.set(0, 0, 9);
        let padded = replicate_pad(&field);
        assert_eq!(padded.width, 12);
        // Top-left padding replicates the (0, 0) corner value.
        assert_eq!(*padded.get(0, 0), 9.0);
        assert_eq!(*padded.get(3, 3), 9.0);
        // Centre block holds the original.
        assert_eq!(*padded.get(4, 4), 9.0);
        assert_eq!(*padded.get(5, 5), 1.0);
    }

    #[test]
    fn test_smooth_flat_field_unchanged() {
        let field = flat(64);
        for factor in [0.5, 1.0, 1.7, 8.0] {
            let out = smooth(&field, factor, &replicate_pad);
            assert_eq!(out, field, "factor {}", factor);
        }
    }

    #[test]
    fn test_gauss_flat_field_unchanged() {
        let field = flat(64);
        for sigma in [0.5, 1.0, 2.5] {
            let out = gauss(&field, sigma, &replicate_pad);
            assert_eq!(out, field, "sigma {}", sigma);
        }
    }

    #[test]
    fn test_smooth_reduces_a_step() {
        let mut field = flat(60);
        for x in 8..16 {
            for z in 0..16 {
                field.set(x, z, 70);
            }
        }
        let out = smooth(&field, 1.0, &replicate_pad);
        // The cliff midpoint is pulled toward the mean.
        let mid = *out.get(8, 8);
        assert!(mid > 60 && mid < 70, "midpoint {}", mid);
        // Values stay within the original range, give or take ringing.
        for (_, _, &v) in out.iter() {
            assert!(v >= 55 && v <= 75);
        }
    }

    #[test]
    fn test_gauss_monotone_across_step() {
        let mut field = flat(60);
        for x in 8..16 {
            for z in 0..16 {
                field.set(x, z, 70);
            }
        }
        let out = gauss(&field, 1.5, &replicate_pad);
        for x in 1..16 {
            assert!(out.get(x, 8) >= out.get(x - 1, 8));
        }
    }

    #[test]
    fn test_custom_padding_is_honoured() {
        // Pad a flat 60 field with a 70 ring; smoothing should pull the
        // edges of the output up toward the neighbours.
        let field = flat(60);
        let padder = |f: &Grid<i32>| {
            let factor = PADDING * 2 + 1;
            let mut padded = Grid::new_with(16 * factor, 16 * factor, 70.0);
            for (x, z, &v) in f.iter() {
                padded.set(16 * PADDING + x, 16 * PADDING + z, v as f64);
            }
            padded
        };
        let out = gauss(&field, 2.0, &padder);
        assert!(*out.get(0, 8) > 60);
        assert_eq!(*out.get(8, 8), 60);
    }

    #[test]
    fn test_filter_kind_parsing() {
        assert_eq!("smooth".parse::<FilterKind>().unwrap(), FilterKind::Smooth);
        assert_eq!("gauss".parse::<FilterKind>().unwrap(), FilterKind::Gauss);
        assert!("box".parse::<FilterKind>().is_err());
    }

    #[test]
    fn test_dft_round_trip() {
        let mut field = Grid::new_with(8, 8, 0.0);
        for (x, z, v) in field.iter_mut() {
            *v = ((x * 31 + z * 7) % 13) as f64;
        }
        let spectrum = dft_2d(&complexify(&field), false);
        let back = dft_2d(&spectrum, true);
        for (x, z, &v) in field.iter() {
            assert!((back.get(x, z).re - v).abs() < 1e-9, "({}, {})", x, z);
        }
    }
}
