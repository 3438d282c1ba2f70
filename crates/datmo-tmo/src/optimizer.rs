//! Tone curve optimization.
//!
//! The curve is parameterized by its non-negative increments
//! `d_i = y_{i+1} - y_i`, which makes monotonicity a box constraint. For
//! every `(x, g)` cell of the density, the displayed contrast across the `g`
//! increments starting at `x` should look like the enhanced input contrast:
//! the input step is scaled by the ratio of input-side to display-side
//! contrast sensitivity, capped at 1 so the display never exaggerates a
//! contrast beyond the enhancement. Cells are weighted by their frequency.
//!
//! ```text
//! E(d) = sum p(x,g) * ( sum_{span(x,g)} d_i  -  e * min(S_in(x) / S_out(x), 1) * |G| )^2
//!
//! subject to  d_i >= 0,  sum d_i <= log10(L_peak / L_black)
//! ```
//!
//! Each outer iteration re-evaluates `S_out` on the current placed curve,
//! solves the constrained quadratic with accelerated projected gradient and
//! places the curve vertically. Nothing is written to the caller's curve
//! until the last iteration succeeds.
//!
//! # Compression policy
//!
//! The range constraint is enforced by projection in a metric that charges
//! increments far from the image's mid-tone bin less per unit of change, so
//! when the optimum is not unique the extremes give up range first and the
//! mid-tone gradient is kept.

use datmo_core::{Error, Progress, Result};
use datmo_display::{DisplayFunction, DisplaySize};
use tracing::{debug, trace};

use crate::csf::ContrastSensitivity;
use crate::curve::{ToneCurve, interp_samples};
use crate::density::ConditionalDensity;

/// Sensitivity re-evaluations.
pub const OUTER_ITERATIONS: usize = 8;

/// Projected gradient steps per outer iteration.
pub const INNER_ITERATIONS: usize = 200;

/// Inner steps between cancellation checks.
const INNER_CHECK: usize = 50;

/// Bisection steps for the compression threshold.
const BISECTION_STEPS: usize = 64;

/// Remoteness of the mid-tone increment; keeps it compressible.
const REMOTENESS_FLOOR: f64 = 0.1;

/// Upper bound of `S_in / S_out`.
pub const MAX_SENSITIVITY_GAIN: f64 = 1.0;

/// Allowed mismatch between curve and density grids.
const GRID_TOLERANCE: f64 = 1e-9;

/// Scene luminance pinned to the display peak.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WhiteAnchor {
    /// Curve placed by the mean log luminance of the image.
    #[default]
    None,
    /// This luminance (cd/m2) maps exactly to the display's peak.
    Luminance(f32),
}

impl WhiteAnchor {
    /// Value meaning "no anchor" in sentinel form.
    pub const SENTINEL: f32 = -1.0;

    /// Any negative value means no anchor.
    ///
    /// ```rust
    /// use datmo_tmo::WhiteAnchor;
    ///
    /// assert_eq!(WhiteAnchor::from_sentinel(-1.0), WhiteAnchor::None);
    /// assert_eq!(WhiteAnchor::from_sentinel(250.0), WhiteAnchor::Luminance(250.0));
    /// ```
    pub fn from_sentinel(value: f32) -> Self {
        if value < 0.0 {
            Self::None
        } else {
            Self::Luminance(value)
        }
    }

    /// Inverse of [`from_sentinel`](Self::from_sentinel).
    pub fn to_sentinel(self) -> f32 {
        match self {
            Self::None => Self::SENTINEL,
            Self::Luminance(l) => l,
        }
    }
}

/// One weighted contrast target over increments `start..end`.
#[derive(Debug, Clone, Copy)]
struct Term {
    bin: usize,
    start: usize,
    end: usize,
    p: f64,
    g_in: f64,
}

/// Everything the optimizer reads from the density, validated up front.
struct Problem {
    xs: Vec<f64>,
    terms: Vec<Term>,
    weights: Vec<f64>,
    means: Vec<Option<f64>>,
    populated: (usize, usize),
    /// Weighted mean bin of the image.
    mid: f64,
}

impl Problem {
    fn gather(density: &dyn ConditionalDensity) -> Result<Self> {
        let xs = density.x_scale().to_vec();
        let n = xs.len();
        if n < 2 {
            return Err(Error::degenerate("density grid has fewer than 2 bins"));
        }

        let populated = density
            .populated_range()
            .ok_or_else(|| Error::degenerate("no populated luminance bins"))?;

        let weights: Vec<f64> = (0..n).map(|x| density.bin_weight(x)).collect();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::degenerate("non-finite or negative bin weight"));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(Error::degenerate("zero total bin weight"));
        }
        let means: Vec<Option<f64>> = (0..n).map(|x| density.bin_mean_log(x)).collect();
        if means.iter().flatten().any(|m| !m.is_finite()) {
            return Err(Error::degenerate("non-finite bin mean"));
        }
        let mid = weights.iter().enumerate().map(|(i, w)| i as f64 * w).sum::<f64>() / total;

        let gs = density.g_steps() as isize;
        let mut terms = Vec::new();
        for x in 0..n {
            for g in (-gs..=gs).filter(|&g| g != 0) {
                let p = density.probability(x, g);
                if !p.is_finite() || p < 0.0 {
                    return Err(Error::degenerate(format!("invalid probability at ({x}, {g})")));
                }
                let target = x as isize + g;
                if p == 0.0 || target < 0 || target >= n as isize {
                    continue;
                }
                let (start, end) = if g > 0 { (x, target as usize) } else { (target as usize, x) };
                terms.push(Term {
                    bin: x,
                    start,
                    end,
                    p,
                    g_in: xs[end] - xs[start],
                });
            }
        }

        Ok(Self {
            xs,
            terms,
            weights,
            means,
            populated,
            mid,
        })
    }

    fn increments(&self) -> usize {
        self.xs.len() - 1
    }
}

/// Distance of each increment from the mid-tone bin, scaled into `(0, 1]`.
///
/// Increments not marked `active` do not stretch the scale.
fn remoteness(mid: f64, active: &[bool]) -> Vec<f64> {
    let dist = |i: usize| ((i as f64 + 0.5) - mid).abs();
    let max_dist = active
        .iter()
        .enumerate()
        .filter(|(_, a)| **a)
        .map(|(i, _)| dist(i))
        .fold(0.0, f64::max);
    (0..active.len())
        .map(|i| {
            let rel = if max_dist > 0.0 { (dist(i) / max_dist).min(1.0) } else { 0.0 };
            (REMOTENESS_FLOOR + rel) / (1.0 + REMOTENESS_FLOOR)
        })
        .collect()
}

/// Projects `d` onto `{d >= 0, sum d <= budget}`, shrinking each increment
/// by `tau * scale_i` with `tau` found by bisection.
///
/// Entries with zero scale are pinned to zero.
fn compress_to_range(d: &mut [f64], budget: f64, scale: &[f64]) {
    for (v, s) in d.iter_mut().zip(scale) {
        *v = if *s > 0.0 { v.max(0.0) } else { 0.0 };
    }
    let total: f64 = d.iter().sum();
    if total <= budget {
        return;
    }

    let shrunk = |tau: f64| -> f64 {
        d.iter()
            .zip(scale)
            .map(|(v, s)| (v - tau * s).max(0.0))
            .sum()
    };

    let mut lo = 0.0;
    let mut hi = d
        .iter()
        .zip(scale)
        .filter(|(_, s)| **s > 0.0)
        .map(|(v, s)| v / s)
        .fold(0.0, f64::max);
    for _ in 0..BISECTION_STEPS {
        let tau = 0.5 * (lo + hi);
        if shrunk(tau) > budget {
            lo = tau;
        } else {
            hi = tau;
        }
    }

    for (v, s) in d.iter_mut().zip(scale) {
        *v = (*v - hi * s).max(0.0);
    }
}

/// Minimizes the frequency-weighted quadratic over the feasible set, with
/// increments at and after `free` held at zero.
///
/// FISTA in a diagonal metric: increment `i` steps by `r_i / h_i`, where
/// `h_i` is its Hessian row sum and `r_i <= 1` its remoteness. The metric
/// bounds the Hessian from above and its projection is [`compress_to_range`].
fn solve_increments(
    problem: &Problem,
    targets: &[f64],
    free: usize,
    budget: f64,
    d: &mut [f64],
    progress: &Progress,
) -> Result<()> {
    let m = d.len();
    let mut row = vec![0.0; m];
    for term in &problem.terms {
        let h = 2.0 * term.p * (term.end - term.start) as f64;
        for r in &mut row[term.start..term.end] {
            *r += h;
        }
    }
    let active: Vec<bool> = row.iter().enumerate().map(|(i, &r)| i < free && r > 0.0).collect();
    let remote = remoteness(problem.mid, &active);
    let step: Vec<f64> = (0..m)
        .map(|i| if active[i] { remote[i] / row[i] } else { 0.0 })
        .collect();

    compress_to_range(d, budget, &step);

    let mut z = d.to_vec();
    let mut prev = d.to_vec();
    let mut next = vec![0.0; m];
    let mut grad = vec![0.0; m];
    let mut momentum = 1.0f64;

    for k in 0..INNER_ITERATIONS {
        if k % INNER_CHECK == 0 {
            progress.checkpoint()?;
        }

        grad.iter_mut().for_each(|g| *g = 0.0);
        for (term, target) in problem.terms.iter().zip(targets) {
            let span: f64 = z[term.start..term.end].iter().sum();
            let r = 2.0 * term.p * (span - target);
            for g in &mut grad[term.start..term.end] {
                *g += r;
            }
        }

        for i in 0..m {
            next[i] = z[i] - step[i] * grad[i];
        }
        compress_to_range(&mut next, budget, &step);

        let momentum_next = 0.5 * (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt());
        let beta = (momentum - 1.0) / momentum_next;
        for i in 0..m {
            z[i] = next[i] + beta * (next[i] - prev[i]);
        }
        std::mem::swap(&mut prev, &mut next);
        momentum = momentum_next;
    }

    d.copy_from_slice(&prev);
    Ok(())
}

/// Integrates increments and places the curve inside `[l_lo, l_hi]`.
fn place_curve(
    problem: &Problem,
    d: &[f64],
    l_lo: f64,
    l_hi: f64,
    anchor: Option<(f64, usize)>,
) -> Vec<f64> {
    let xs = &problem.xs;
    let n = xs.len();
    let mut y = vec![0.0; n];
    for i in 1..n {
        y[i] = y[i - 1] + d[i - 1];
    }

    match anchor {
        Some((x_white, frozen)) => {
            let offset = l_hi - interp_samples(xs, &y, x_white);
            for v in &mut y {
                *v = (*v + offset).clamp(l_lo, l_hi);
            }
            // Flat from the anchor bin on, so the anchor lands on the peak exactly
            for v in &mut y[frozen..] {
                *v = l_hi;
            }
        }
        None => {
            let (lo, hi) = problem.populated;
            let (mut num, mut den) = (0.0, 0.0);
            for b in lo..=hi {
                if let Some(m) = problem.means[b] {
                    let w = problem.weights[b];
                    num += w * (m - interp_samples(xs, &y, m));
                    den += w;
                }
            }
            let min_off = l_lo - y[lo];
            let max_off = l_hi - y[hi];
            let raw = if den > 0.0 { num / den } else { min_off };
            let offset = if min_off <= max_off {
                raw.clamp(min_off, max_off)
            } else {
                min_off
            };
            for v in &mut y {
                *v = (*v + offset).clamp(l_lo, l_hi);
            }
        }
    }
    y
}

/// Computes the display adaptive tone curve for `density` into `curve`.
///
/// `curve` must be sampled on the density's grid. Its output samples are
/// replaced only on success; on any error it is left untouched.
///
/// # Arguments
///
/// * `enhancement_factor` - contrast gain, 1.0 preserves perceived contrast
/// * `white` - optional scene luminance mapped to the display peak
/// * `progress` - polled between and inside outer iterations
///
/// # Errors
///
/// - [`Error::InvalidInput`] if the curve grid differs from the density grid
/// - [`Error::InvalidParameter`] for a negative or non-finite enhancement,
///   an invalid white anchor, or a display without usable range
/// - [`Error::DegenerateDensity`] if the density holds no usable statistics
/// - [`Error::Aborted`] if `progress` is canceled
/// - [`Error::Numerical`] if the result is not finite and monotone
pub fn compute_tone_curve(
    curve: &mut ToneCurve<'_>,
    density: &dyn ConditionalDensity,
    display: &dyn DisplayFunction,
    size: &DisplaySize,
    enhancement_factor: f32,
    white: WhiteAnchor,
    progress: &Progress,
) -> Result<()> {
    trace!(enhancement = enhancement_factor, ?white, "compute_tone_curve");

    let grid = density.x_scale();
    if curve.len() != grid.len()
        || curve.x().iter().zip(grid).any(|(a, b)| (a - b).abs() > GRID_TOLERANCE)
    {
        return Err(Error::invalid_input(format!(
            "tone curve grid ({} samples) differs from the density grid ({} samples)",
            curve.len(),
            grid.len()
        )));
    }
    if !(enhancement_factor.is_finite() && enhancement_factor >= 0.0) {
        return Err(Error::invalid_parameter(
            "enhancement_factor",
            format!("{enhancement_factor} must be finite and >= 0"),
        ));
    }
    let (l_lo, l_hi) = display.log_range();
    if !(l_lo.is_finite() && l_hi.is_finite() && l_hi > l_lo) {
        return Err(Error::invalid_parameter(
            "display_function",
            format!("unusable log range [{l_lo}, {l_hi}]"),
        ));
    }
    progress.checkpoint()?;

    let problem = Problem::gather(density)?;
    let xs = &problem.xs;
    let m = problem.increments();

    let anchor = match white {
        WhiteAnchor::None => None,
        WhiteAnchor::Luminance(l) => {
            if !(l.is_finite() && l > 0.0) {
                return Err(Error::invalid_parameter("white", format!("{l} cd/m2 must be > 0")));
            }
            let x_white = (l as f64).log10();
            if x_white < xs[0] || x_white > xs[m] {
                return Err(Error::invalid_parameter(
                    "white",
                    format!("{l} cd/m2 is outside the luminance grid"),
                ));
            }
            // Last sample at or below the anchor
            let frozen = xs.partition_point(|&v| v <= x_white).saturating_sub(1);
            Some((x_white, frozen))
        }
    };
    let free = anchor.map_or(m, |(_, frozen)| frozen.min(m));

    let csf = ContrastSensitivity::new(size);
    let s_in: Vec<f64> = xs.iter().map(|&x| csf.at_log_luminance(x)).collect();
    let e = enhancement_factor as f64;

    let budget = l_hi - l_lo;
    let mut d = vec![0.0; m];
    let mut y: Vec<f64> = xs.iter().map(|&x| x.clamp(l_lo, l_hi)).collect();
    let mut targets = vec![0.0; problem.terms.len()];

    for iteration in 0..OUTER_ITERATIONS {
        progress.checkpoint()?;
        progress.set_value(iteration as f32 / OUTER_ITERATIONS as f32);

        for (target, term) in targets.iter_mut().zip(&problem.terms) {
            let gain = s_in[term.bin] / csf.at_log_luminance(y[term.bin]);
            *target = e * gain.min(MAX_SENSITIVITY_GAIN) * term.g_in;
        }

        solve_increments(&problem, &targets, free, budget, &mut d, progress)?;
        y = place_curve(&problem, &d, l_lo, l_hi, anchor);

        trace!(iteration, span = d.iter().sum::<f64>(), "tone curve iteration");
    }

    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(Error::numerical(format!("non-finite tone curve sample {i}")));
    }
    if let Some(i) = y.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::numerical(format!("tone curve decreases at sample {}", i + 1)));
    }

    curve.set_y(y);
    progress.set_value(1.0);
    debug!(
        display_range = budget,
        terms = problem.terms.len(),
        populated = ?problem.populated,
        "Tone curve computed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::{G_STEPS, X_COUNT, estimate_density, x_scale};
    use approx::assert_relative_eq;
    use datmo_core::LuminanceMap;
    use datmo_display::GogDisplay;

    /// Hand-built density for exercising the optimizer directly.
    #[derive(Debug)]
    struct TableDensity {
        p: Vec<(usize, isize, f64)>,
        weights: Vec<f64>,
        means: Vec<Option<f64>>,
    }

    impl TableDensity {
        fn empty() -> Self {
            Self {
                p: Vec::new(),
                weights: vec![0.0; X_COUNT],
                means: vec![None; X_COUNT],
            }
        }
    }

    impl ConditionalDensity for TableDensity {
        fn x_scale(&self) -> &[f64] {
            x_scale()
        }
        fn g_steps(&self) -> usize {
            G_STEPS
        }
        fn probability(&self, x: usize, g: isize) -> f64 {
            self.p
                .iter()
                .filter(|(px, pg, _)| *px == x && *pg == g)
                .map(|(_, _, v)| v)
                .sum()
        }
        fn bin_weight(&self, x: usize) -> f64 {
            self.weights[x]
        }
        fn bin_mean_log(&self, x: usize) -> Option<f64> {
            self.means[x]
        }
    }

    fn gradient_image() -> LuminanceMap {
        // Five decades, left to right, with some vertical texture
        LuminanceMap::from_fn(64, 16, |x, y| {
            let base = 10f32.powf(-1.0 + 5.0 * x as f32 / 63.0);
            base * if y % 2 == 0 { 1.0 } else { 1.3 }
        })
        .unwrap()
    }

    fn compute(lum: &LuminanceMap, white: WhiteAnchor) -> Result<ToneCurve<'static>> {
        let density = estimate_density(lum, &Progress::new())?;
        let mut curve = ToneCurve::standard();
        compute_tone_curve(
            &mut curve,
            density.as_ref(),
            &GogDisplay::default(),
            &DisplaySize::default(),
            1.0,
            white,
            &Progress::new(),
        )?;
        Ok(curve)
    }

    #[test]
    fn test_monotone_and_in_range() {
        let curve = compute(&gradient_image(), WhiteAnchor::None).unwrap();
        let (lo, hi) = GogDisplay::default().log_range();
        assert!(curve.is_monotonic());
        for &y in curve.y() {
            assert!(y >= lo - 1e-12 && y <= hi + 1e-12, "{y} outside [{lo}, {hi}]");
        }
        // Five decades onto ~2.3: the curve uses the whole display
        assert_relative_eq!(curve.y()[X_COUNT - 1], hi, epsilon = 1e-6);
        assert_relative_eq!(curve.y()[0], lo, epsilon = 1e-6);
    }

    #[test]
    fn test_flat_image_identity() {
        let lum = LuminanceMap::filled(4, 4, 100.0).unwrap();
        let curve = compute(&lum, WhiteAnchor::None).unwrap();
        assert_relative_eq!(curve.interp(2.0), 2.0, epsilon = 1e-12);
        let (_, hi) = GogDisplay::default().log_range();
        assert!(curve.y().iter().all(|&y| y < hi));
    }

    #[test]
    fn test_white_anchor_exact() {
        let lum = gradient_image();
        let (_, hi) = GogDisplay::default().log_range();
        for white in [50.0f32, 1000.0, 3333.0] {
            let curve = compute(&lum, WhiteAnchor::Luminance(white)).unwrap();
            assert_eq!(curve.interp((white as f64).log10()), hi);
            assert!(curve.is_monotonic());
        }
    }

    #[test]
    fn test_white_anchor_invalid() {
        let lum = gradient_image();
        assert!(matches!(
            compute(&lum, WhiteAnchor::Luminance(0.0)),
            Err(Error::InvalidParameter { name: "white", .. })
        ));
        assert!(compute(&lum, WhiteAnchor::Luminance(1e12)).is_err());
        assert!(compute(&lum, WhiteAnchor::Luminance(f32::NAN)).is_err());
    }

    #[test]
    fn test_sentinel() {
        assert_eq!(WhiteAnchor::from_sentinel(-0.5), WhiteAnchor::None);
        assert_eq!(WhiteAnchor::from_sentinel(0.0), WhiteAnchor::Luminance(0.0));
        assert_eq!(WhiteAnchor::None.to_sentinel(), WhiteAnchor::SENTINEL);
        assert_eq!(WhiteAnchor::Luminance(80.0).to_sentinel(), 80.0);
    }

    #[test]
    fn test_more_enhancement_more_contrast() {
        let density = estimate_density(&gradient_image(), &Progress::new()).unwrap();
        // A display with plenty of range, so compression does not equalize
        let df = GogDisplay::new(2.2, 10000.0, 0.001, 0.0, 0.0).unwrap();
        let slope_at = |e: f32| {
            let mut c = ToneCurve::standard();
            compute_tone_curve(
                &mut c,
                density.as_ref(),
                &df,
                &DisplaySize::default(),
                e,
                WhiteAnchor::None,
                &Progress::new(),
            )
            .unwrap();
            c.y()[100] - c.y()[90]
        };
        assert!(slope_at(2.0) > slope_at(0.5));
    }

    #[test]
    fn test_zero_enhancement_flat() {
        let density = estimate_density(&gradient_image(), &Progress::new()).unwrap();
        let mut c = ToneCurve::standard();
        compute_tone_curve(
            &mut c,
            density.as_ref(),
            &GogDisplay::default(),
            &DisplaySize::default(),
            0.0,
            WhiteAnchor::None,
            &Progress::new(),
        )
        .unwrap();
        let first = c.y()[0];
        assert!(c.y().iter().all(|&y| y == first));
    }

    #[test]
    fn test_degenerate_density() {
        let mut c = ToneCurve::standard();
        let err = compute_tone_curve(
            &mut c,
            &TableDensity::empty(),
            &GogDisplay::default(),
            &DisplaySize::default(),
            1.0,
            WhiteAnchor::None,
            &Progress::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DegenerateDensity(_)));
    }

    #[test]
    fn test_non_finite_statistics_degenerate() {
        let mut table = TableDensity::empty();
        table.weights[80] = 1.0;
        table.means[80] = Some(f64::NAN);
        let mut c = ToneCurve::standard();
        let err = compute_tone_curve(
            &mut c,
            &table,
            &GogDisplay::default(),
            &DisplaySize::default(),
            1.0,
            WhiteAnchor::None,
            &Progress::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DegenerateDensity(_)));
    }

    #[test]
    fn test_invalid_parameters_leave_curve() {
        let density = estimate_density(&gradient_image(), &Progress::new()).unwrap();
        let mut c = ToneCurve::standard();
        let err = compute_tone_curve(
            &mut c,
            density.as_ref(),
            &GogDisplay::default(),
            &DisplaySize::default(),
            -1.0,
            WhiteAnchor::None,
            &Progress::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "enhancement_factor", .. }));
        assert!(c.y().iter().all(|&y| y == 0.0));

        let mut wrong = ToneCurve::new(vec![0.0, 1.0, 2.0]).unwrap();
        assert!(matches!(
            compute_tone_curve(
                &mut wrong,
                density.as_ref(),
                &GogDisplay::default(),
                &DisplaySize::default(),
                1.0,
                WhiteAnchor::None,
                &Progress::new(),
            ),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_canceled_leaves_curve() {
        let density = estimate_density(&gradient_image(), &Progress::new()).unwrap();
        let mut c = ToneCurve::standard();
        let progress = Progress::new();
        progress.cancel();
        let err = compute_tone_curve(
            &mut c,
            density.as_ref(),
            &GogDisplay::default(),
            &DisplaySize::default(),
            1.0,
            WhiteAnchor::None,
            &progress,
        )
        .unwrap_err();
        assert_eq!(err, Error::Aborted);
        assert!(c.y().iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_shared_density_concurrent() {
        let density = estimate_density(&gradient_image(), &Progress::new()).unwrap();
        let density: &dyn ConditionalDensity = density.as_ref();
        let curves: Vec<Vec<f64>> = std::thread::scope(|s| {
            let handles: Vec<_> = [0.8f32, 1.0, 1.5]
                .into_iter()
                .map(|e| {
                    s.spawn(move || {
                        let mut c = ToneCurve::standard();
                        compute_tone_curve(
                            &mut c,
                            density,
                            &GogDisplay::default(),
                            &DisplaySize::default(),
                            e,
                            WhiteAnchor::None,
                            &Progress::new(),
                        )
                        .unwrap();
                        c.y().to_vec()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(curves.len(), 3);
        assert!(curves.iter().all(|y| y.windows(2).all(|w| w[1] >= w[0])));
    }

    #[test]
    fn test_compression_takes_extremes_first() {
        let mut d = vec![1.0; 10];
        let remote = remoteness(4.5, &[true; 10]);
        compress_to_range(&mut d, 5.0, &remote);
        let total: f64 = d.iter().sum();
        assert!(total <= 5.0 + 1e-9);
        assert_relative_eq!(total, 5.0, epsilon = 1e-6);
        // Symmetric around the middle, shrinking outwards
        assert_relative_eq!(d[4], d[5], epsilon = 1e-12);
        assert!(d[4] > d[2] && d[2] > d[0]);
        assert!(d.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_compression_within_budget_only_clamps() {
        let mut d = vec![0.1, -0.2, 0.3, 0.4];
        compress_to_range(&mut d, 1.0, &[1.0, 1.0, 1.0, 0.0]);
        assert_eq!(d, vec![0.1, 0.0, 0.3, 0.0]);
    }

    #[test]
    fn test_remoteness_scale() {
        let r = remoteness(2.0, &[true, true, true, true, false, false]);
        assert!(r.iter().all(|&v| v > 0.0 && v <= 1.0));
        assert_relative_eq!(r[0], 1.0, epsilon = 1e-12);
        assert!(r[2] < r[1] && r[1] < r[0]);
    }

    #[test]
    fn test_solver_hits_target_when_unconstrained() {
        // One contrast cell one bin wide: the increment matches the target
        let mut table = TableDensity::empty();
        table.p.push((80, 1, 1.0));
        table.weights[80] = 1.0;
        table.means[80] = Some(0.0);
        let problem = Problem::gather(&table).unwrap();
        assert_eq!(problem.terms.len(), 1);

        let mut d = vec![0.0; problem.increments()];
        let free = problem.increments();
        solve_increments(&problem, &[0.1], free, 10.0, &mut d, &Progress::new()).unwrap();
        assert_relative_eq!(d[80], 0.1, epsilon = 1e-9);
        assert_eq!(d[79], 0.0);
        assert_eq!(d[81], 0.0);
    }

    #[test]
    fn test_solver_respects_budget() {
        let mut table = TableDensity::empty();
        table.p.push((80, 1, 0.5));
        table.p.push((81, 1, 0.5));
        table.weights[80] = 0.5;
        table.weights[81] = 0.5;
        table.means[80] = Some(0.0);
        table.means[81] = Some(0.1);
        let problem = Problem::gather(&table).unwrap();

        let mut d = vec![0.0; problem.increments()];
        let free = problem.increments();
        solve_increments(&problem, &[1.0, 1.0], free, 0.5, &mut d, &Progress::new()).unwrap();
        let total: f64 = d.iter().sum();
        assert!(total <= 0.5 + 1e-9);
        assert_relative_eq!(d[80], d[81], epsilon = 1e-6);
    }
}
