//! Piecewise-linear tone curve in log10 luminance.
//!
//! A [`ToneCurve`] maps input log luminance `x_i` to displayed log luminance
//! `y_i`. The input grid is either owned or borrowed: curves computed from
//! a density usually share the density's static grid, while curves loaded
//! from elsewhere own theirs. Only the optimizer writes `y_i`.

use std::borrow::Cow;

use datmo_core::{Error, Result};

use crate::density::x_scale;

/// Sampled monotone mapping `x_i -> y_i`, both log10 cd/m2.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve<'a> {
    x_i: Cow<'a, [f64]>,
    y_i: Vec<f64>,
}

/// Linear interpolation of `ys` over the increasing grid `xs`, clamped to
/// the end samples. NaN maps to the first sample.
pub(crate) fn interp_samples(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if x.is_nan() || x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let hi = xs.partition_point(|&v| v <= x);
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + (ys[hi] - ys[lo]) * t
}

/// Input grids need at least two finite, strictly increasing samples.
fn check_grid(x_i: &[f64]) -> Result<()> {
    if x_i.len() < 2 {
        return Err(Error::invalid_input(format!(
            "tone curve needs at least 2 samples, got {}",
            x_i.len()
        )));
    }
    if let Some(index) = x_i.iter().position(|v| !v.is_finite()) {
        return Err(Error::invalid_input(format!("non-finite curve input at sample {index}")));
    }
    match x_i.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => Err(Error::NonMonotonicCurve { index: i + 1 }),
        None => Ok(()),
    }
}

impl ToneCurve<'static> {
    /// Owns `x_i`, with `y_i` zeroed until a curve is computed.
    pub fn new(x_i: Vec<f64>) -> Result<Self> {
        check_grid(&x_i)?;
        let y_i = vec![0.0; x_i.len()];
        Ok(Self {
            x_i: Cow::Owned(x_i),
            y_i,
        })
    }

    /// Curve on the shared density grid.
    pub fn standard() -> Self {
        let x_i = x_scale();
        Self {
            x_i: Cow::Borrowed(x_i),
            y_i: vec![0.0; x_i.len()],
        }
    }

    /// Fully specified curve. `y_i` must be finite and non-decreasing.
    ///
    /// ```rust
    /// use datmo_tmo::ToneCurve;
    ///
    /// let curve = ToneCurve::from_samples(vec![0.0, 1.0, 2.0], vec![0.5, 1.0, 1.5]).unwrap();
    /// assert_eq!(curve.interp(1.5), 1.25);
    /// assert_eq!(curve.interp(9.0), 1.5);
    /// ```
    pub fn from_samples(x_i: Vec<f64>, y_i: Vec<f64>) -> Result<Self> {
        check_grid(&x_i)?;
        if y_i.len() != x_i.len() {
            return Err(Error::invalid_input(format!(
                "{} output samples for {} input samples",
                y_i.len(),
                x_i.len()
            )));
        }
        let curve = Self {
            x_i: Cow::Owned(x_i),
            y_i,
        };
        curve.validate()?;
        Ok(curve)
    }
}

impl<'a> ToneCurve<'a> {
    /// Borrows `x_i` from the caller; owns `y_i`.
    pub fn with_shared_x(x_i: &'a [f64]) -> Result<Self> {
        check_grid(x_i)?;
        Ok(Self {
            x_i: Cow::Borrowed(x_i),
            y_i: vec![0.0; x_i.len()],
        })
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.y_i.len()
    }

    /// Always false for a constructed curve.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y_i.is_empty()
    }

    /// Input log luminance samples.
    #[inline]
    pub fn x(&self) -> &[f64] {
        &self.x_i
    }

    /// Output log luminance samples.
    #[inline]
    pub fn y(&self) -> &[f64] {
        &self.y_i
    }

    /// Whether the input grid is owned by this curve.
    pub fn owns_x(&self) -> bool {
        matches!(self.x_i, Cow::Owned(_))
    }

    /// Output at log luminance `x`, linear between samples and clamped to
    /// the end samples outside the grid.
    pub fn interp(&self, x: f64) -> f64 {
        interp_samples(&self.x_i, &self.y_i, x)
    }

    /// Whether `y_i` is finite and non-decreasing.
    pub fn is_monotonic(&self) -> bool {
        self.validate().is_ok()
    }

    /// Checks `y_i` is finite and non-decreasing.
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.y_i.iter().position(|v| !v.is_finite()) {
            return Err(Error::numerical(format!("non-finite tone curve output at sample {index}")));
        }
        match self.y_i.windows(2).position(|w| w[1] < w[0]) {
            Some(i) => Err(Error::NonMonotonicCurve { index: i + 1 }),
            None => Ok(()),
        }
    }

    /// Same curve with the input grid copied if borrowed.
    pub fn into_owned(self) -> ToneCurve<'static> {
        ToneCurve {
            x_i: Cow::Owned(self.x_i.into_owned()),
            y_i: self.y_i,
        }
    }

    /// Replaces the output samples. Length must match.
    pub(crate) fn set_y(&mut self, y_i: Vec<f64>) {
        debug_assert_eq!(y_i.len(), self.x_i.len());
        self.y_i = y_i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_borrows_grid() {
        let curve = ToneCurve::standard();
        assert!(!curve.owns_x());
        assert_eq!(curve.len(), crate::density::X_COUNT);
        assert!(std::ptr::eq(curve.x(), x_scale()));
    }

    #[test]
    fn test_shared_and_owned() {
        let grid = vec![0.0, 1.0, 2.0];
        let shared = ToneCurve::with_shared_x(&grid).unwrap();
        assert!(!shared.owns_x());
        assert!(std::ptr::eq(shared.x(), grid.as_slice()));

        let owned = shared.into_owned();
        assert!(owned.owns_x());
        assert_eq!(owned.x(), &[0.0, 1.0, 2.0]);

        assert!(ToneCurve::new(vec![0.0, 1.0]).unwrap().owns_x());
    }

    #[test]
    fn test_interp() {
        let c = ToneCurve::from_samples(vec![-1.0, 0.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap();
        assert_eq!(c.interp(-5.0), 0.0);
        assert_eq!(c.interp(-1.0), 0.0);
        assert_relative_eq!(c.interp(-0.5), 0.5);
        assert_eq!(c.interp(0.0), 1.0);
        assert_relative_eq!(c.interp(1.0), 1.5);
        assert_eq!(c.interp(2.0), 2.0);
        assert_eq!(c.interp(7.0), 2.0);
        assert_eq!(c.interp(f64::NAN), 0.0);
    }

    #[test]
    fn test_interp_samples_on_raw_grid() {
        let xs = [-8.0, 0.0, 0.5, 8.0];
        let ys = [-2.0, 0.0, 1.0, 2.0];
        assert_eq!(interp_samples(&xs, &ys, -9.0), -2.0);
        assert_relative_eq!(interp_samples(&xs, &ys, -4.0), -1.0);
        assert_relative_eq!(interp_samples(&xs, &ys, 0.25), 0.5);
        assert_eq!(interp_samples(&xs, &ys, 0.5), 1.0);
        assert_eq!(interp_samples(&xs, &ys, 8.5), 2.0);
        // Same answer through the curve type
        let curve = ToneCurve::from_samples(xs.to_vec(), ys.to_vec()).unwrap();
        assert_eq!(curve.interp(0.25), interp_samples(&xs, &ys, 0.25));
    }

    #[test]
    fn test_interp_flat_exact() {
        let c = ToneCurve::from_samples(vec![0.0, 0.1, 0.2], vec![2.0, 2.0, 2.0]).unwrap();
        assert_eq!(c.interp(0.137), 2.0);
    }

    #[test]
    fn test_rejects_bad_grid() {
        assert!(ToneCurve::new(vec![1.0]).is_err());
        assert!(matches!(
            ToneCurve::new(vec![0.0, 1.0, 1.0]),
            Err(Error::NonMonotonicCurve { index: 2 })
        ));
        assert!(ToneCurve::new(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_rejects_decreasing_output() {
        let err = ToneCurve::from_samples(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.5]).unwrap_err();
        assert_eq!(err, Error::NonMonotonicCurve { index: 2 });
        assert!(ToneCurve::from_samples(vec![0.0, 1.0], vec![0.0]).is_err());
        assert!(ToneCurve::from_samples(vec![0.0, 1.0], vec![0.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_flat_is_monotonic() {
        assert!(ToneCurve::standard().is_monotonic());
    }
}
