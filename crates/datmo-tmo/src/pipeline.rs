//! End-to-end tone mapping driver.
//!
//! [`ToneMapper`] bundles the settings of one tone mapping job and runs the
//! three stages in order: density estimation, curve optimization and curve
//! application. The progress fraction covers the whole run.

use std::sync::Arc;

use datmo_core::{LuminanceMap, Progress, Result, RgbPlanes};
use datmo_display::{DisplayFunction, DisplaySize, GogDisplay};
use tracing::{debug, info};

use crate::apply::{ColorCorrection, apply_tone_curve, apply_tone_curve_cc};
use crate::curve::ToneCurve;
use crate::density::{ConditionalDensity, estimate_density};
use crate::optimizer::{WhiteAnchor, compute_tone_curve};

/// Share of the progress fraction taken by density estimation.
const DENSITY_SHARE: f32 = 0.6;

/// Share taken by curve optimization; application takes the rest.
const CURVE_SHARE: f32 = 0.3;

/// Result of a tone mapping run.
#[derive(Debug, Clone)]
pub struct ToneMapped {
    /// Display pixel values in `[0, 1]`.
    pub image: RgbPlanes,
    /// The curve that produced them.
    pub curve: ToneCurve<'static>,
}

/// Settings for display adaptive tone mapping.
///
/// ```rust
/// use datmo_core::{Progress, RgbPlanes};
/// use datmo_display::DisplayPreset;
/// use datmo_tmo::ToneMapper;
///
/// let hdr = RgbPlanes::filled(4, 4, [100.0, 100.0, 100.0]).unwrap();
/// let mapper = ToneMapper::new().with_display(DisplayPreset::Lcd.model());
/// let result = mapper.run(&hdr, &Progress::new()).unwrap();
/// assert_eq!(result.image.dims(), (4, 4));
/// ```
#[derive(Debug, Clone)]
pub struct ToneMapper {
    display: Arc<dyn DisplayFunction>,
    size: DisplaySize,
    enhancement: f32,
    white: WhiteAnchor,
    saturation: f32,
    correction: ColorCorrection,
}

impl Default for ToneMapper {
    fn default() -> Self {
        Self {
            display: Arc::new(GogDisplay::default()),
            size: DisplaySize::default(),
            enhancement: 1.0,
            white: WhiteAnchor::None,
            saturation: 1.0,
            correction: ColorCorrection::Corrected,
        }
    }
}

impl ToneMapper {
    /// Default settings: `lcd` display, 30 ppd at 0.5 m, enhancement 1
    /// (contrast preserved), no white anchor, corrected color at saturation 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target display.
    pub fn with_display(mut self, display: impl DisplayFunction + 'static) -> Self {
        self.display = Arc::new(display);
        self
    }

    /// Sets an already shared target display.
    pub fn with_shared_display(mut self, display: Arc<dyn DisplayFunction>) -> Self {
        self.display = display;
        self
    }

    /// Sets the viewing geometry.
    pub fn with_display_size(mut self, size: DisplaySize) -> Self {
        self.size = size;
        self
    }

    /// Sets the contrast enhancement factor.
    pub fn with_enhancement(mut self, enhancement: f32) -> Self {
        self.enhancement = enhancement;
        self
    }

    /// Sets the white anchor.
    pub fn with_white_anchor(mut self, white: WhiteAnchor) -> Self {
        self.white = white;
        self
    }

    /// Sets the saturation factor for the active color rule.
    pub fn with_saturation(mut self, saturation: f32) -> Self {
        self.saturation = saturation;
        self
    }

    /// Sets the color reconstruction rule.
    pub fn with_color_correction(mut self, correction: ColorCorrection) -> Self {
        self.correction = correction;
        self
    }

    /// Target display.
    pub fn display(&self) -> &dyn DisplayFunction {
        self.display.as_ref()
    }

    /// Viewing geometry.
    pub fn display_size(&self) -> DisplaySize {
        self.size
    }

    /// Contrast enhancement factor.
    pub fn enhancement(&self) -> f32 {
        self.enhancement
    }

    /// White anchor.
    pub fn white_anchor(&self) -> WhiteAnchor {
        self.white
    }

    /// Saturation factor.
    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    /// Color reconstruction rule.
    pub fn color_correction(&self) -> ColorCorrection {
        self.correction
    }

    /// Contrast statistics of `lum`.
    pub fn density(
        &self,
        lum: &LuminanceMap,
        progress: &Progress,
    ) -> Result<Box<dyn ConditionalDensity>> {
        estimate_density(lum, progress)
    }

    /// Tone curve for a previously estimated density.
    ///
    /// The density is only read, so one density can serve repeated calls
    /// with different settings.
    pub fn curve_for(
        &self,
        density: &dyn ConditionalDensity,
        progress: &Progress,
    ) -> Result<ToneCurve<'static>> {
        let mut curve = ToneCurve::new(density.x_scale().to_vec())?;
        compute_tone_curve(
            &mut curve,
            density,
            self.display.as_ref(),
            &self.size,
            self.enhancement,
            self.white,
            progress,
        )?;
        Ok(curve)
    }

    /// Maps `input` through `curve` into a new image.
    pub fn apply(
        &self,
        input: &RgbPlanes,
        lum: &LuminanceMap,
        curve: &ToneCurve<'_>,
    ) -> Result<RgbPlanes> {
        let (width, height) = input.dims();
        let mut out = RgbPlanes::zeros(width, height)?;
        let display = self.display.as_ref();
        match self.correction {
            ColorCorrection::Corrected => {
                apply_tone_curve_cc(&mut out, input, lum, curve, display, self.saturation)?
            }
            ColorCorrection::Legacy => {
                apply_tone_curve(&mut out, input, lum, curve, display, self.saturation)?
            }
        }
        Ok(out)
    }

    /// Runs all three stages on `input`.
    ///
    /// `input` is never modified. On error or abort nothing is returned.
    pub fn run(&self, input: &RgbPlanes, progress: &Progress) -> Result<ToneMapped> {
        let (width, height) = input.dims();
        info!(
            width,
            height,
            enhancement = self.enhancement,
            white = ?self.white,
            correction = ?self.correction,
            "Tone mapping"
        );

        let lum = input.luminance();

        progress.set_stage(0.0, DENSITY_SHARE);
        let density = self.density(&lum, progress)?;

        progress.set_stage(DENSITY_SHARE, DENSITY_SHARE + CURVE_SHARE);
        let curve = self.curve_for(density.as_ref(), progress)?;
        debug!(lo = curve.y()[0], hi = curve.y()[curve.len() - 1], "Curve range");

        progress.set_stage(DENSITY_SHARE + CURVE_SHARE, 1.0);
        progress.checkpoint()?;
        let image = self.apply(input, &lum, &curve)?;
        progress.set_value(1.0);

        Ok(ToneMapped { image, curve })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::LEGACY_SATURATION;
    use approx::assert_relative_eq;
    use datmo_core::Error;
    use datmo_display::DisplayPreset;

    #[test]
    fn test_flat_gray_end_to_end() {
        let input = RgbPlanes::filled(4, 4, [100.0, 100.0, 100.0]).unwrap();
        let mapper = ToneMapper::new();
        let progress = Progress::new();
        let out = mapper.run(&input, &progress).unwrap();

        let df = GogDisplay::default();
        for &p in &out.image.r {
            assert!((0.0..=1.0).contains(&p));
            assert_relative_eq!(df.display(p), 100.0, max_relative = 1e-3);
        }
        assert_eq!(out.image.r, out.image.g);
        assert_eq!(out.image.g, out.image.b);
        assert_eq!(progress.value(), 1.0);
    }

    #[test]
    fn test_defaults() {
        let m = ToneMapper::new();
        assert_eq!(m.enhancement(), 1.0);
        assert_eq!(m.white_anchor(), WhiteAnchor::None);
        assert_eq!(m.saturation(), 1.0);
        assert!(!m.color_correction().is_legacy());
        assert_eq!(m.display_size().pix_per_deg(), 30.0);
        assert_eq!(m.display_size().view_distance(), 0.5);
    }

    #[test]
    fn test_builder() {
        let m = ToneMapper::new()
            .with_display(DisplayPreset::Crt.model())
            .with_enhancement(1.5)
            .with_white_anchor(WhiteAnchor::Luminance(400.0))
            .with_saturation(0.4)
            .with_color_correction(ColorCorrection::Legacy);
        assert_eq!(m.enhancement(), 1.5);
        assert_eq!(m.white_anchor(), WhiteAnchor::Luminance(400.0));
        assert_eq!(m.saturation(), 0.4);
        assert!(m.color_correction().is_legacy());
        assert_relative_eq!(m.display().display(1.0), DisplayPreset::Crt.model().display(1.0));
    }

    #[test]
    fn test_abort_returns_nothing() {
        let input = RgbPlanes::filled(8, 8, [1.0, 2.0, 3.0]).unwrap();
        let before = input.clone();
        let progress = Progress::new();
        progress.cancel();
        let err = ToneMapper::new().run(&input, &progress).unwrap_err();
        assert_eq!(err, Error::Aborted);
        assert_eq!(input, before);
    }

    #[test]
    fn test_curve_for_reuses_density() {
        let lum = LuminanceMap::from_fn(32, 8, |x, _| 10f32.powf(x as f32 / 8.0)).unwrap();
        let mapper = ToneMapper::new();
        let density = mapper.density(&lum, &Progress::new()).unwrap();
        let a = mapper.curve_for(density.as_ref(), &Progress::new()).unwrap();
        let b = mapper
            .clone()
            .with_enhancement(0.5)
            .curve_for(density.as_ref(), &Progress::new())
            .unwrap();
        assert!(a.is_monotonic() && b.is_monotonic());
        assert_eq!(a.len(), b.len());
        assert!(a.owns_x());
    }

    #[test]
    fn test_legacy_rule_used() {
        let rgb = [40.0, 20.0, 10.0, 10.0, 20.0, 40.0];
        let input = RgbPlanes::from_interleaved(2, 1, &rgb).unwrap();
        let base = ToneMapper::new().with_saturation(LEGACY_SATURATION);
        let cc = base.clone().run(&input, &Progress::new()).unwrap();
        let legacy = base
            .with_color_correction(ColorCorrection::Legacy)
            .run(&input, &Progress::new())
            .unwrap();
        assert_eq!(cc.curve, legacy.curve);
        assert_ne!(cc.image, legacy.image);
    }
}
