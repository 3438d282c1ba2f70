//! Viewing geometry of the target display.
//!
//! Contrast visibility depends on spatial frequency in cycles per visual
//! degree, so the tone curve optimizer needs to know how many pixels fall
//! into one degree of visual angle, and how far the viewer sits.

use datmo_core::{Error, Result};

/// Default viewing distance in metres.
pub const DEFAULT_VIEW_DISTANCE: f32 = 0.5;

/// Default angular resolution in pixels per visual degree.
pub const DEFAULT_PIX_PER_DEG: f32 = 30.0;

/// Angular resolution and viewing distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pix_per_deg: f32,
    view_d: f32,
}

impl DisplaySize {
    /// From vertical resolution and distance expressed in screen heights.
    ///
    /// # Arguments
    ///
    /// * `vres` - vertical resolution in pixels
    /// * `vd_screen_heights` - viewing distance as a multiple of screen height
    /// * `view_d` - viewing distance in metres
    ///
    /// # Example
    ///
    /// ```rust
    /// use datmo_display::DisplaySize;
    ///
    /// // 1080 lines watched from 3 screen heights
    /// let ds = DisplaySize::from_screen_heights(1080, 3.0, 0.5).unwrap();
    /// assert!(ds.pix_per_deg() > 50.0 && ds.pix_per_deg() < 60.0);
    /// ```
    pub fn from_screen_heights(vres: u32, vd_screen_heights: f32, view_d: f32) -> Result<Self> {
        if vres == 0 {
            return Err(Error::invalid_parameter("vres", "must be > 0"));
        }
        if !(vd_screen_heights.is_finite() && vd_screen_heights > 0.0) {
            return Err(Error::invalid_parameter(
                "vd_screen_heights",
                format!("{vd_screen_heights} must be > 0"),
            ));
        }
        let angle_deg = 2.0 * (0.5 / vd_screen_heights).atan().to_degrees();
        Self::from_pix_per_deg(vres as f32 / angle_deg, view_d)
    }

    /// From angular resolution directly.
    pub fn from_pix_per_deg(pix_per_deg: f32, view_d: f32) -> Result<Self> {
        if !(pix_per_deg.is_finite() && pix_per_deg > 0.0) {
            return Err(Error::invalid_parameter(
                "pix_per_deg",
                format!("{pix_per_deg} must be > 0"),
            ));
        }
        if !(view_d.is_finite() && view_d > 0.0) {
            return Err(Error::invalid_parameter("view_d", format!("{view_d} must be > 0")));
        }
        Ok(Self { pix_per_deg, view_d })
    }

    /// Pixels per visual degree.
    #[inline]
    pub fn pix_per_deg(&self) -> f32 {
        self.pix_per_deg
    }

    /// Viewing distance in metres.
    #[inline]
    pub fn view_distance(&self) -> f32 {
        self.view_d
    }
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self {
            pix_per_deg: DEFAULT_PIX_PER_DEG,
            view_d: DEFAULT_VIEW_DISTANCE,
        }
    }
}
