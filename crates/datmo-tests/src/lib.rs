//! Integration tests for the datmo crates.
//!
//! These exercise the stages together: files in and out, a density shared
//! between concurrent curve computations, and cancellation from another
//! thread.

use datmo_core::{Result, RgbPlanes};

/// Horizontal log ramp over `decades` decades starting at `base` cd/m2,
/// gray unless `tint` is set.
pub fn log_ramp(
    width: usize,
    height: usize,
    base: f32,
    decades: f32,
    tint: [f32; 3],
) -> Result<RgbPlanes> {
    let mut rgb = Vec::with_capacity(width * height * 3);
    for _ in 0..height {
        for x in 0..width {
            let l = base * 10f32.powf(decades * x as f32 / (width - 1).max(1) as f32);
            rgb.extend_from_slice(&[l * tint[0], l * tint[1], l * tint[2]]);
        }
    }
    RgbPlanes::from_interleaved(width, height, &rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use datmo_core::{Error, LuminanceMap, Progress, Status};
    use datmo_display::{DisplayFunction, DisplayPreset, DisplaySize, GogDisplay};
    use datmo_io::png::BitDepth;
    use datmo_tmo::{
        ColorCorrection, ConditionalDensity, ToneCurve, ToneMapper, WhiteAnchor,
        apply_tone_curve_cc, compute_tone_curve, estimate_density,
    };
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    /// HDR file in, PNG file out, every pixel sensible.
    #[test]
    fn test_hdr_to_png() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("ramp.hdr");
        let output_path = dir.path().join("ramp.png");

        let ramp = log_ramp(64, 8, 0.01, 5.0, [1.0, 1.0, 1.0]).unwrap();
        datmo_io::write(&input_path, &ramp, BitDepth::Eight).unwrap();
        let hdr = datmo_io::read(&input_path).unwrap();
        assert_eq!(hdr.dims(), (64, 8));

        let mapped = ToneMapper::new().run(&hdr, &Progress::new()).unwrap();
        datmo_io::write(&output_path, &mapped.image, BitDepth::Sixteen).unwrap();

        let png = datmo_io::read(&output_path).unwrap();
        assert_eq!(png.dims(), (64, 8));
        for row in png.r.chunks(64) {
            for w in row.windows(2) {
                assert!(w[1] >= w[0] - 1e-4, "ramp must stay monotone: {w:?}");
            }
        }
        assert!(png.r.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(png.r[63] > png.r[0]);
    }

    /// Display pixel values survive a PFM round trip bit exact.
    #[test]
    fn test_pfm_output_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.pfm");
        let hdr = log_ramp(16, 4, 1.0, 3.0, [1.0, 0.6, 0.3]).unwrap();
        let mapped = ToneMapper::new().run(&hdr, &Progress::new()).unwrap();
        datmo_io::write(&path, &mapped.image, BitDepth::Eight).unwrap();
        assert_eq!(datmo_io::read(&path).unwrap(), mapped.image);
    }

    /// One density feeds several optimizations at once.
    #[test]
    fn test_shared_density_concurrent_curves() {
        let hdr = log_ramp(128, 16, 0.001, 6.0, [1.0, 1.0, 1.0]).unwrap();
        let density: Arc<dyn ConditionalDensity> =
            Arc::from(estimate_density(&hdr.luminance(), &Progress::new()).unwrap());

        let curves: Vec<ToneCurve<'static>> = thread::scope(|s| {
            let handles: Vec<_> = [0.5f32, 1.0, 1.5, 1.0]
                .into_iter()
                .map(|e| {
                    let density = Arc::clone(&density);
                    s.spawn(move || {
                        ToneMapper::new()
                            .with_enhancement(e)
                            .curve_for(density.as_ref(), &Progress::new())
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for curve in &curves {
            assert!(curve.is_monotonic());
        }
        // Same settings on the same density give the same curve
        assert_eq!(curves[1], curves[3]);
    }

    /// Canceling from another thread stops estimation and leaves nothing behind.
    #[test]
    fn test_cancel_during_estimation() {
        let lum = LuminanceMap::from_fn(512, 8192, |x, y| 1.0 + ((x * 31 + y * 17) % 1000) as f32)
            .unwrap();
        let progress = Progress::new();

        let result = thread::scope(|s| {
            let worker = s.spawn(|| estimate_density(&lum, &progress));
            while progress.value() == 0.0 && !worker.is_finished() {
                thread::yield_now();
            }
            progress.cancel();
            worker.join().unwrap()
        });

        assert_eq!(Status::of(&result), Status::Aborted);
        assert!(matches!(result, Err(Error::Aborted)));
    }

    /// An aborted optimization keeps the caller's previous curve.
    #[test]
    fn test_cancel_keeps_previous_curve() {
        let hdr = log_ramp(32, 8, 0.1, 4.0, [1.0, 1.0, 1.0]).unwrap();
        let density = estimate_density(&hdr.luminance(), &Progress::new()).unwrap();
        let display = DisplayPreset::LcdBright.model();
        let size = DisplaySize::default();

        let mut curve = ToneCurve::standard();
        compute_tone_curve(
            &mut curve,
            density.as_ref(),
            &display,
            &size,
            1.0,
            WhiteAnchor::None,
            &Progress::new(),
        )
        .unwrap();
        let before = curve.clone();

        let canceled = Progress::new();
        canceled.cancel();
        let err = compute_tone_curve(
            &mut curve,
            density.as_ref(),
            &display,
            &size,
            2.0,
            WhiteAnchor::Luminance(500.0),
            &canceled,
        )
        .unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(curve, before);
    }

    /// Canceling while the optimizer iterates aborts it and leaves the curve as it was.
    #[test]
    fn test_cancel_during_optimization() {
        // Twelve decades populate most of the luminance grid
        let hdr = log_ramp(1024, 16, 1e-5, 12.0, [1.0, 1.0, 1.0]).unwrap();
        let density = estimate_density(&hdr.luminance(), &Progress::new()).unwrap();
        let display = DisplayPreset::LcdBright.model();
        let size = DisplaySize::default();
        let mut curve = ToneCurve::standard();
        let before = curve.clone();
        let progress = Progress::new();

        let result = thread::scope(|s| {
            let worker = s.spawn(|| {
                compute_tone_curve(
                    &mut curve,
                    density.as_ref(),
                    &display,
                    &size,
                    1.0,
                    WhiteAnchor::None,
                    &progress,
                )
            });
            while progress.value() == 0.0 && !worker.is_finished() {
                thread::yield_now();
            }
            progress.cancel();
            worker.join().unwrap()
        });

        assert_eq!(Status::of(&result), Status::Aborted);
        assert!(matches!(result, Err(Error::Aborted)));
        assert_eq!(curve, before);
    }

    /// The white anchor maps exactly to display peak through the whole pipeline.
    #[test]
    fn test_white_anchor_reaches_peak() {
        let hdr = log_ramp(64, 4, 0.01, 5.0, [1.0, 1.0, 1.0]).unwrap();
        let display = GogDisplay::new(2.2, 300.0, 0.3, 0.0, 0.0).unwrap();
        let mapper = ToneMapper::new()
            .with_display(display)
            .with_white_anchor(WhiteAnchor::Luminance(100.0));
        let mapped = mapper.run(&hdr, &Progress::new()).unwrap();

        let (_, hi) = display.log_range();
        assert_relative_eq!(mapped.curve.interp(2.0), hi, epsilon = 1e-9);
        // Everything above the anchor saturates
        assert_relative_eq!(*mapped.image.g.last().unwrap(), 1.0, epsilon = 1e-4);
    }

    /// Legacy and corrected rules agree on gray and differ on color.
    #[test]
    fn test_color_rules_on_file_data() {
        let gray = log_ramp(16, 2, 1.0, 2.0, [1.0, 1.0, 1.0]).unwrap();
        let tinted = log_ramp(16, 2, 1.0, 2.0, [1.2, 0.9, 0.5]).unwrap();
        let cc = ToneMapper::new();
        let legacy = ToneMapper::new().with_color_correction(ColorCorrection::Legacy);

        let a = cc.run(&gray, &Progress::new()).unwrap();
        let b = legacy.run(&gray, &Progress::new()).unwrap();
        for (x, y) in a.image.g.iter().zip(&b.image.g) {
            assert_relative_eq!(x, y, epsilon = 1e-4);
        }

        let c = cc.run(&tinted, &Progress::new()).unwrap();
        let d = legacy.with_saturation(0.4).run(&tinted, &Progress::new()).unwrap();
        assert_ne!(c.image, d.image);
    }

    /// Applying into a caller buffer matches the pipeline output.
    #[test]
    fn test_stage_functions_match_pipeline() {
        let hdr = log_ramp(24, 6, 0.05, 4.0, [1.0, 0.8, 0.6]).unwrap();
        let mapper = ToneMapper::new();
        let mapped = mapper.run(&hdr, &Progress::new()).unwrap();

        let lum = hdr.luminance();
        let density = estimate_density(&lum, &Progress::new()).unwrap();
        let mut curve = ToneCurve::standard();
        compute_tone_curve(
            &mut curve,
            density.as_ref(),
            mapper.display(),
            &mapper.display_size(),
            mapper.enhancement(),
            mapper.white_anchor(),
            &Progress::new(),
        )
        .unwrap();
        assert_eq!(curve.y(), mapped.curve.y());

        let mut out = RgbPlanes::zeros(24, 6).unwrap();
        apply_tone_curve_cc(&mut out, &hdr, &lum, &curve, mapper.display(), 1.0).unwrap();
        assert_eq!(out, mapped.image);
        assert!(mapper.display().display(out.g[0]) > 0.0);
    }
}
