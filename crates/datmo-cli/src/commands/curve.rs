//! Tone curve inspection command.

use std::io::{self, Write};

use anyhow::{Context, Result};
use datmo_core::Progress;

use crate::CurveArgs;

pub fn run(args: CurveArgs, verbose: u8) -> Result<()> {
    let input = super::load_image(&args.input)?;
    let mapper = super::build_mapper(&args.display, &args.view, &args.shape)?;
    let progress = Progress::new();

    let lum = input.luminance();
    let density = mapper.density(&lum, &progress)?;
    let curve = mapper
        .curve_for(density.as_ref(), &progress)
        .with_context(|| format!("Failed to compute tone curve for {}", args.input.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if verbose > 0 {
        let (lo, hi) = mapper.display().log_range();
        writeln!(out, "# {} display range [{lo:.3}, {hi:.3}] log10 cd/m2", args.input.display())?;
    }
    super::write_curve_table(&mut out, &curve, mapper.display())?;
    Ok(())
}
