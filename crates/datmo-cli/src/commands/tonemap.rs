//! Tone mapping command.
//!
//! The pipeline runs on a worker thread while this thread reports progress
//! and cancels the run once the timeout passes.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use datmo_core::{Error, Progress};
use datmo_io::png::BitDepth;
use datmo_tmo::{ColorCorrection, LEGACY_SATURATION};
use tracing::{debug, info, trace};

use crate::TonemapArgs;

const POLL: Duration = Duration::from_millis(50);

pub fn run(args: TonemapArgs, verbose: u8) -> Result<()> {
    let depth = BitDepth::from_bits(args.bits)?;
    if let Some(t) = args.timeout {
        if !(t.is_finite() && t > 0.0) {
            bail!("--timeout must be a positive number of seconds");
        }
    }

    let input = super::load_image(&args.input)?;
    let (width, height) = input.dims();

    let (correction, default_saturation) = if args.legacy_color {
        (ColorCorrection::Legacy, LEGACY_SATURATION)
    } else {
        (ColorCorrection::Corrected, 1.0)
    };
    let mapper = super::build_mapper(&args.display, &args.view, &args.shape)?
        .with_color_correction(correction)
        .with_saturation(args.saturation.unwrap_or(default_saturation));

    if verbose > 0 {
        println!("Tone mapping {} ({}x{})", args.input.display(), width, height);
    }
    debug!(display = ?mapper.display(), size = ?mapper.display_size(), "Target");

    let progress = Progress::new();
    let started = Instant::now();
    let timeout = args.timeout.map(Duration::from_secs_f64);

    let result = thread::scope(|s| {
        let worker = s.spawn(|| mapper.run(&input, &progress));
        let mut reported = 0;
        while !worker.is_finished() {
            thread::sleep(POLL);
            if timeout.is_some_and(|t| started.elapsed() > t) && !progress.canceled() {
                info!("Timeout reached, canceling");
                progress.cancel();
            }
            let percent = progress.percent();
            if percent >= reported + 10 {
                reported = percent - percent % 10;
                trace!(percent, "Progress");
            }
        }
        worker.join().map_err(|_| anyhow!("Tone mapping worker panicked"))
    })?;

    let mapped = match result {
        Ok(mapped) => mapped,
        Err(Error::Aborted) => bail!("Aborted after {:.1}s", started.elapsed().as_secs_f64()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to tone map {}", args.input.display()));
        }
    };
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "Tone mapped");

    super::save_image(&args.output, &mapped.image, depth)?;

    if let Some(path) = &args.curve_out {
        super::save_curve_table(path, &mapped.curve, mapper.display())?;
    }

    if verbose > 0 {
        println!("Wrote {}", args.output.display());
    }
    Ok(())
}
