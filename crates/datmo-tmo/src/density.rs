//! Luminance contrast statistics.
//!
//! The optimizer does not look at pixels. It looks at how often each
//! contrast step occurs at each luminance level: for every pair of adjacent
//! pixels, the darker-or-brighter neighbour relation is recorded as a
//! (luminance bin, contrast step) count. Together with per-bin pixel counts
//! and mean log luminance this is the whole description of the image the
//! tone curve depends on.
//!
//! # Grid
//!
//! | Axis | Range | Step | Count |
//! |------|-------|------|-------|
//! | log10 luminance `x` | `[-8, 8]` | `0.1` | 161 |
//! | contrast `g` | `[-0.7, 0.7]` | `0.1` | 15 |
//!
//! Steps larger than `G_MAX` saturate into the edge contrast bins.

use std::fmt;
use std::sync::LazyLock;

use datmo_core::{Error, LuminanceMap, Progress, Result};
use tracing::{debug, trace};

/// Lower end of the log10 luminance grid.
pub const L_MIN: f64 = -8.0;

/// Upper end of the log10 luminance grid.
pub const L_MAX: f64 = 8.0;

/// Grid spacing in log10 units, for both luminance and contrast.
pub const DELTA: f64 = 0.1;

/// Number of luminance bins.
pub const X_COUNT: usize = 161;

/// Largest represented contrast step in log10 units.
pub const G_MAX: f64 = 0.7;

/// Contrast bins on each side of zero.
pub const G_STEPS: usize = 7;

/// Number of contrast bins, including zero.
pub const G_COUNT: usize = 2 * G_STEPS + 1;

/// Tap count of the temporal curve filter used for video sequences.
///
/// Reserved; single images never filter over time.
pub const TEMPORAL_FILTER_TAPS: usize = 26;

/// Rows between cancellation checks.
const ROW_CHECK: usize = 16;

static X_SCALE: LazyLock<Vec<f64>> =
    LazyLock::new(|| (0..X_COUNT).map(|i| L_MIN + i as f64 * DELTA).collect());

/// The shared log10 luminance grid, `X_COUNT` samples from `L_MIN` to `L_MAX`.
pub fn x_scale() -> &'static [f64] {
    &X_SCALE
}

/// Nearest grid bin of a log10 luminance.
#[inline]
fn bin_of(log_lum: f64) -> usize {
    let pos = ((log_lum - L_MIN) / DELTA).round();
    (pos.max(0.0) as usize).min(X_COUNT - 1)
}

/// log10 of a luminance, clamped into the grid.
#[inline]
fn grid_log(l: f32) -> f64 {
    (l as f64).max(10f64.powf(L_MIN)).log10().clamp(L_MIN, L_MAX)
}

/// Contrast statistics consumed by the tone curve optimizer.
///
/// `probability` is normalized over all `(x, g)` pairs, so it carries both
/// how common a luminance level is and how its contrasts are distributed.
/// Implementations are read-only after construction and may be shared by
/// concurrent curve computations.
pub trait ConditionalDensity: Send + Sync + fmt::Debug {
    /// log10 luminance of each bin.
    fn x_scale(&self) -> &[f64];

    /// Contrast bins on each side of zero.
    fn g_steps(&self) -> usize;

    /// Frequency of contrast step `g` (in grid steps) at luminance bin `x`.
    ///
    /// Zero outside the grid.
    fn probability(&self, x: usize, g: isize) -> f64;

    /// Fraction of pixels in luminance bin `x`.
    fn bin_weight(&self, x: usize) -> f64;

    /// Mean log10 luminance of the pixels in bin `x`, `None` when empty.
    fn bin_mean_log(&self, x: usize) -> Option<f64>;

    /// First and last bin holding any pixels.
    fn populated_range(&self) -> Option<(usize, usize)> {
        let n = self.x_scale().len();
        let first = (0..n).find(|&x| self.bin_weight(x) > 0.0)?;
        let last = (0..n).rev().find(|&x| self.bin_weight(x) > 0.0)?;
        Some((first, last))
    }
}

/// Neighbour-pair statistics of one luminance map.
///
/// Built by [`estimate_density`].
pub struct NeighborDensity {
    /// Directed pair counts, `X_COUNT * G_COUNT`, row-major by bin.
    pairs: Vec<u64>,
    pair_total: u64,
    pixels: Vec<u64>,
    pixel_total: u64,
    log_sums: Vec<f64>,
}

impl NeighborDensity {
    fn empty() -> Self {
        Self {
            pairs: vec![0; X_COUNT * G_COUNT],
            pair_total: 0,
            pixels: vec![0; X_COUNT],
            pixel_total: 0,
            log_sums: vec![0.0; X_COUNT],
        }
    }

    #[inline]
    fn add_pixel(&mut self, log_lum: f64) {
        let x = bin_of(log_lum);
        self.pixels[x] += 1;
        self.log_sums[x] += log_lum;
        self.pixel_total += 1;
    }

    /// Records the pair in both directions.
    #[inline]
    fn add_pair(&mut self, a: f64, b: f64) {
        let (xa, xb) = (bin_of(a), bin_of(b));
        let g = (xb as isize - xa as isize).clamp(-(G_STEPS as isize), G_STEPS as isize);
        self.pairs[xa * G_COUNT + (G_STEPS as isize + g) as usize] += 1;
        self.pairs[xb * G_COUNT + (G_STEPS as isize - g) as usize] += 1;
        self.pair_total += 2;
    }

    /// Number of directed neighbour pairs counted.
    pub fn pair_count(&self) -> u64 {
        self.pair_total
    }

    /// Number of pixels counted.
    pub fn pixel_count(&self) -> u64 {
        self.pixel_total
    }
}

impl fmt::Debug for NeighborDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighborDensity")
            .field("pixels", &self.pixel_total)
            .field("pairs", &self.pair_total)
            .field("populated", &self.populated_range())
            .finish()
    }
}

impl ConditionalDensity for NeighborDensity {
    fn x_scale(&self) -> &[f64] {
        x_scale()
    }

    fn g_steps(&self) -> usize {
        G_STEPS
    }

    fn probability(&self, x: usize, g: isize) -> f64 {
        if x >= X_COUNT || g.unsigned_abs() > G_STEPS || self.pair_total == 0 {
            return 0.0;
        }
        let idx = x * G_COUNT + (G_STEPS as isize + g) as usize;
        self.pairs[idx] as f64 / self.pair_total as f64
    }

    fn bin_weight(&self, x: usize) -> f64 {
        match self.pixels.get(x) {
            Some(&n) if self.pixel_total > 0 => n as f64 / self.pixel_total as f64,
            _ => 0.0,
        }
    }

    fn bin_mean_log(&self, x: usize) -> Option<f64> {
        let n = *self.pixels.get(x)?;
        (n > 0).then(|| self.log_sums[x] / n as f64)
    }
}

/// Gathers contrast statistics from a luminance map.
///
/// Every horizontally and vertically adjacent pixel pair contributes in both
/// directions. Luminance at or below `1e-8` lands in the lowest bin, above
/// `1e8` in the highest. Cancellation is polled every 16 rows.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if any luminance is NaN or infinite
/// - [`Error::Aborted`] if `progress` is canceled
///
/// # Example
///
/// ```rust
/// use datmo_core::{LuminanceMap, Progress};
/// use datmo_tmo::density::estimate_density;
///
/// let lum = LuminanceMap::from_fn(8, 8, |x, _| 1.0 + x as f32 * 10.0).unwrap();
/// let density = estimate_density(&lum, &Progress::new()).unwrap();
/// assert!(density.populated_range().is_some());
/// ```
pub fn estimate_density(
    lum: &LuminanceMap,
    progress: &Progress,
) -> Result<Box<dyn ConditionalDensity>> {
    let (width, height) = lum.dims();
    trace!(width, height, "estimate_density");

    if let Some(i) = lum.as_slice().iter().position(|l| !l.is_finite()) {
        return Err(Error::invalid_input(format!(
            "non-finite luminance at pixel ({}, {})",
            i % width,
            i / width
        )));
    }
    progress.checkpoint()?;

    let mut density = NeighborDensity::empty();
    let mut above: Vec<f64> = Vec::with_capacity(width);
    let mut row: Vec<f64> = Vec::with_capacity(width);

    for y in 0..height {
        if y % ROW_CHECK == 0 {
            progress.checkpoint()?;
            progress.set_value(y as f32 / height as f32);
        }
        row.clear();
        row.extend(lum.row(y).iter().map(|&l| grid_log(l)));

        for x in 0..width {
            density.add_pixel(row[x]);
            if x + 1 < width {
                density.add_pair(row[x], row[x + 1]);
            }
            if y > 0 {
                density.add_pair(above[x], row[x]);
            }
        }
        std::mem::swap(&mut above, &mut row);
    }

    progress.set_value(1.0);
    debug!(
        pixels = density.pixel_total,
        pairs = density.pair_total,
        range = ?density.populated_range(),
        "Density estimated"
    );
    Ok(Box::new(density))
}
