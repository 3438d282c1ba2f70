//! CLI command implementations

pub mod curve;
pub mod display;
pub mod tonemap;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use datmo_core::RgbPlanes;
use datmo_display::{DisplayFunction, DisplayPreset, DisplaySize, GogDisplay, LutDisplay};
use datmo_io::png::BitDepth;
use datmo_tmo::{ToneCurve, ToneMapper, WhiteAnchor};

use crate::{CurveShape, DisplayArgs, ViewArgs};

/// Load image from path
pub fn load_image(path: &Path) -> Result<RgbPlanes> {
    datmo_io::read(path).with_context(|| format!("Failed to load: {}", path.display()))
}

/// Save image to path
pub fn save_image(path: &Path, image: &RgbPlanes, depth: BitDepth) -> Result<()> {
    datmo_io::write(path, image, depth)
        .with_context(|| format!("Failed to save: {}", path.display()))
}

/// Builds the display model named by the options.
pub fn build_display(args: &DisplayArgs) -> Result<Arc<dyn DisplayFunction>> {
    if let Some(path) = &args.display_lut {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read display table: {}", path.display()))?;
        let lut = LutDisplay::parse(&text)
            .with_context(|| format!("Bad display table: {}", path.display()))?;
        return Ok(Arc::new(lut));
    }

    let preset: DisplayPreset = args.display.parse()?;
    let (gamma, peak, black, ambient, refl) = preset.parameters();
    let model = GogDisplay::new(
        args.gamma.unwrap_or(gamma),
        args.peak.unwrap_or(peak),
        args.black.unwrap_or(black),
        args.ambient.unwrap_or(ambient),
        args.reflectivity.unwrap_or(refl),
    )
    .context("Invalid display parameters")?;
    Ok(Arc::new(model))
}

/// Builds the viewing geometry named by the options.
pub fn build_size(args: &ViewArgs) -> Result<DisplaySize> {
    let size = match (args.ppd, args.vres) {
        (Some(ppd), _) => DisplaySize::from_pix_per_deg(ppd, args.view_distance)?,
        (None, Some(vres)) => {
            DisplaySize::from_screen_heights(vres, args.screen_heights, args.view_distance)?
        }
        (None, None) => {
            DisplaySize::from_pix_per_deg(datmo_display::DEFAULT_PIX_PER_DEG, args.view_distance)?
        }
    };
    Ok(size)
}

/// Tone mapper configured from shared options.
pub fn build_mapper(
    display: &DisplayArgs,
    view: &ViewArgs,
    shape: &CurveShape,
) -> Result<ToneMapper> {
    let white = shape.white.map_or(WhiteAnchor::None, WhiteAnchor::from_sentinel);
    Ok(ToneMapper::new()
        .with_shared_display(build_display(display)?)
        .with_display_size(build_size(view)?)
        .with_enhancement(shape.enhancement)
        .with_white_anchor(white))
}

/// Writes `x y pixel` rows: input and output log10 luminance and the
/// display pixel value producing the output.
pub fn write_curve_table<W: Write>(
    out: &mut W,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
) -> Result<()> {
    writeln!(out, "# log10_in log10_out pixel")?;
    for (x, y) in curve.x().iter().zip(curve.y()) {
        let pixel = display.inv_display(10f64.powf(*y) as f32);
        writeln!(out, "{x:.2} {y:.6} {pixel:.6}")?;
    }
    Ok(())
}

/// Writes the curve table to a file.
pub fn save_curve_table(
    path: &Path,
    curve: &ToneCurve<'_>,
    display: &dyn DisplayFunction,
) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_curve_table(&mut out, curve, display)?;
    out.flush().with_context(|| format!("Failed to write: {}", path.display()))
}
