//! Tone curve application and color reconstruction.
//!
//! Every pixel's luminance is mapped through the curve, converted to a
//! display luminance and turned back into color by scaling the original
//! color relative to its luminance. Two reconstructions are provided:
//!
//! - [`apply_tone_curve`]: `(C / L)^s * L_out`. `s < 1` desaturates,
//!   usually with [`LEGACY_SATURATION`].
//! - [`apply_tone_curve_cc`]: `((C / L - 1) * s + 1) * L_out`. `s` multiplies
//!   chroma directly and `1.0` keeps it.
//!
//! The corrected variant scales chroma linearly around the luminance axis,
//! so hue is unchanged for every `s` and `s = 1` reproduces the input
//! chromaticity exactly. New code should use it.
//!
//! Output values are display pixel values in `[0, 1]` from
//! [`DisplayFunction::inv_display`]. Pixels with non-positive or non-finite
//! luminance, or any non-finite channel, come out black.
//!
//! All inputs are validated before any pixel is written. The `_in_place`
//! functions read and write the same planes.

use datmo_core::{Error, LuminanceMap, Result, RgbPlanes};
use datmo_display::DisplayFunction;
use tracing::trace;

use crate::curve::ToneCurve;

/// Saturation exponent historically used with [`apply_tone_curve`].
pub const LEGACY_SATURATION: f32 = 0.4;

/// Pixels per work item.
const CHUNK: usize = 4096;

/// Color reconstruction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorCorrection {
    /// Linear chroma scaling around the luminance axis.
    #[default]
    Corrected,
    /// Power-law ratio scaling.
    Legacy,
}

impl ColorCorrection {
    /// Whether this rule is [`ColorCorrection::Legacy`].
    pub fn is_legacy(self) -> bool {
        self == Self::Legacy
    }
}

/// Maps one pixel.
#[inline]
fn map_pixel(
    rule: ColorCorrection,
    rgb: [f32; 3],
    l: f32,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    s: f32,
) -> [f32; 3] {
    if !(l.is_finite() && l > 0.0) || rgb.iter().any(|c| !c.is_finite()) {
        return [0.0; 3];
    }
    let l_out = 10f64.powf(curve.interp((l as f64).log10())) as f32;
    match rule {
        ColorCorrection::Legacy => {
            rgb.map(|c| display.inv_display((c / l).max(0.0).powf(s) * l_out))
        }
        ColorCorrection::Corrected => {
            rgb.map(|c| display.inv_display(((c / l - 1.0) * s + 1.0).max(0.0) * l_out))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn map_chunk(
    rule: ColorCorrection,
    r: &mut [f32],
    g: &mut [f32],
    b: &mut [f32],
    lum: &[f32],
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    s: f32,
) {
    for i in 0..lum.len() {
        let [ro, go, bo] = map_pixel(rule, [r[i], g[i], b[i]], lum[i], curve, display, s);
        r[i] = ro;
        g[i] = go;
        b[i] = bo;
    }
}

#[cfg(feature = "parallel")]
fn map_planes(
    rule: ColorCorrection,
    planes: &mut RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    s: f32,
) {
    use rayon::prelude::*;

    let (r, g, b) = planes.planes_mut();
    r.par_chunks_mut(CHUNK)
        .zip(g.par_chunks_mut(CHUNK))
        .zip(b.par_chunks_mut(CHUNK))
        .zip(lum.as_slice().par_chunks(CHUNK))
        .for_each(|(((r, g), b), l)| map_chunk(rule, r, g, b, l, curve, display, s));
}

#[cfg(not(feature = "parallel"))]
fn map_planes(
    rule: ColorCorrection,
    planes: &mut RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    s: f32,
) {
    let (r, g, b) = planes.planes_mut();
    r.chunks_mut(CHUNK)
        .zip(g.chunks_mut(CHUNK))
        .zip(b.chunks_mut(CHUNK))
        .zip(lum.as_slice().chunks(CHUNK))
        .for_each(|(((r, g), b), l)| map_chunk(rule, r, g, b, l, curve, display, s));
}

/// Shared validation and dispatch. `input` of `None` maps `out` in place.
fn apply_with(
    rule: ColorCorrection,
    out: &mut RgbPlanes,
    input: Option<&RgbPlanes>,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    saturation: f32,
) -> Result<()> {
    trace!(?rule, width = lum.width(), height = lum.height(), saturation, "apply_tone_curve");

    if let Some(input) = input {
        if input.dims() != lum.dims() {
            return Err(Error::dimension_mismatch(input.dims(), lum.dims()));
        }
    }
    if out.dims() != lum.dims() {
        return Err(Error::dimension_mismatch(out.dims(), lum.dims()));
    }
    if !(saturation.is_finite() && saturation >= 0.0) {
        return Err(Error::invalid_parameter(
            "saturation_factor",
            format!("{saturation} must be finite and >= 0"),
        ));
    }
    curve.validate()?;

    if let Some(input) = input {
        out.copy_from(input)?;
    }
    map_planes(rule, out, lum, curve, display, saturation);
    Ok(())
}

/// Maps `input` through `curve` into `out` with power-law color scaling.
///
/// # Arguments
///
/// * `out` - receives display pixel values, same size as `lum`
/// * `input` - scene-referred linear RGB
/// * `lum` - luminance of `input`
/// * `curve` - a computed tone curve
/// * `display` - target display, for the final inverse EOTF
/// * `saturation_factor` - exponent on `C / L`, usually [`LEGACY_SATURATION`]
///
/// # Errors
///
/// - [`Error::DimensionMismatch`] if sizes disagree
/// - [`Error::InvalidParameter`] for a negative or non-finite saturation
/// - [`Error::NonMonotonicCurve`] or [`Error::Numerical`] for a bad curve
pub fn apply_tone_curve(
    out: &mut RgbPlanes,
    input: &RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    saturation_factor: f32,
) -> Result<()> {
    apply_with(ColorCorrection::Legacy, out, Some(input), lum, curve, display, saturation_factor)
}

/// [`apply_tone_curve`] reading and writing the same planes.
pub fn apply_tone_curve_in_place(
    planes: &mut RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    saturation_factor: f32,
) -> Result<()> {
    apply_with(ColorCorrection::Legacy, planes, None, lum, curve, display, saturation_factor)
}

/// Maps `input` through `curve` into `out` with linear chroma scaling.
///
/// `saturation_factor` multiplies chroma directly: `1.0` keeps the input
/// chromaticity, `0.0` yields gray, larger values saturate.
///
/// ```rust
/// use datmo_core::RgbPlanes;
/// use datmo_display::GogDisplay;
/// use datmo_tmo::{ToneCurve, apply_tone_curve_cc};
///
/// // Identity curve over [0, 2]
/// let curve = ToneCurve::from_samples(vec![0.0, 2.0], vec![0.0, 2.0]).unwrap();
/// let input = RgbPlanes::filled(2, 2, [10.0, 10.0, 10.0]).unwrap();
/// let lum = input.luminance();
/// let mut out = RgbPlanes::zeros(2, 2).unwrap();
///
/// apply_tone_curve_cc(&mut out, &input, &lum, &curve, &GogDisplay::default(), 1.0).unwrap();
/// assert!(out.r.iter().all(|&v| v > 0.0 && v < 1.0));
/// ```
///
/// # Errors
///
/// Same as [`apply_tone_curve`].
pub fn apply_tone_curve_cc(
    out: &mut RgbPlanes,
    input: &RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    saturation_factor: f32,
) -> Result<()> {
    apply_with(ColorCorrection::Corrected, out, Some(input), lum, curve, display, saturation_factor)
}

/// [`apply_tone_curve_cc`] reading and writing the same planes.
pub fn apply_tone_curve_cc_in_place(
    planes: &mut RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
    saturation_factor: f32,
) -> Result<()> {
    apply_with(ColorCorrection::Corrected, planes, None, lum, curve, display, saturation_factor)
}
