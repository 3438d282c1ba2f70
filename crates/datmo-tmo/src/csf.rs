//! Contrast sensitivity of the human visual system.
//!
//! Daly's CSF model evaluated at a single spatial frequency, the one the
//! target display reproduces at half its angular resolution. Sensitivity
//! falls towards dark adaptation levels, which is what lets the optimizer
//! spend less display range on contrast in the shadows.

use datmo_display::DisplaySize;

/// Peak sensitivity scale.
pub const CSF_PEAK: f64 = 250.0;

/// Luminance floor for the adaptation terms, in cd/m2.
const MIN_ADAPTATION: f64 = 1e-5;

/// Sensitivity floor, keeps optimizer weights positive.
const MIN_SENSITIVITY: f64 = 1e-6;

/// Daly's `S1` band sensitivity at frequency `rho` (cycles per degree).
///
/// `exp(-b) * sqrt(1 + 0.06 exp(b))` is folded into a single square root so
/// large frequencies underflow to zero instead of overflowing.
fn daly_s1(rho: f64, lum: f64) -> f64 {
    const EPS: f64 = 0.9;
    const I2: f64 = 1.0;

    let a = 0.801 * (1.0 + 0.7 / lum).powf(-0.2);
    let b = 0.3 * (1.0 + 100.0 / lum).powf(0.15);
    let be = b * EPS * rho;

    let low = ((3.23 * (rho * rho * I2).powf(-0.3)).powi(5) + 1.0).powf(-0.2);
    let high = ((-2.0 * be).exp() + 0.06 * (-be).exp()).sqrt();
    low * a * EPS * rho * high
}

/// Daly CSF at frequency `rho`, adaptation luminance `lum` (cd/m2) and
/// viewing distance `view_d` (m).
///
/// ```rust
/// use datmo_tmo::csf::csf_daly;
///
/// // More sensitive in daylight than at night
/// assert!(csf_daly(15.0, 100.0, 0.5) > csf_daly(15.0, 0.01, 0.5));
/// ```
pub fn csf_daly(rho: f64, lum: f64, view_d: f64) -> f64 {
    let lum = if lum.is_finite() { lum.max(MIN_ADAPTATION) } else { MIN_ADAPTATION };
    let r_a = 0.856 * view_d.powf(0.14);
    CSF_PEAK * daly_s1(rho / r_a, lum).min(daly_s1(rho, lum))
}

/// Sensitivity model bound to one display geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastSensitivity {
    rho: f64,
    view_d: f64,
}

impl ContrastSensitivity {
    /// Evaluates at half the display's pixels per degree.
    pub fn new(size: &DisplaySize) -> Self {
        Self {
            rho: size.pix_per_deg() as f64 / 2.0,
            view_d: size.view_distance() as f64,
        }
    }

    /// Spatial frequency in cycles per degree.
    pub fn frequency(&self) -> f64 {
        self.rho
    }

    /// Sensitivity at log10 luminance `x`.
    #[inline]
    pub fn at_log_luminance(&self, x: f64) -> f64 {
        csf_daly(self.rho, 10f64.powf(x), self.view_d).max(MIN_SENSITIVITY)
    }
}
