//! Benchmark inputs for datmo.
//!
//! Run with: `cargo bench -p datmo-bench`

use datmo_core::{Result, RgbPlanes};

/// Synthetic scene spanning `decades` of luminance: a diagonal ramp with
/// a repeating texture so neighbouring pixels differ.
pub fn scene(width: usize, height: usize, decades: f32) -> Result<RgbPlanes> {
    let n = width * height;
    let mut r = Vec::with_capacity(n);
    let mut g = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    let span = (width + height).max(2) as f32 - 2.0;
    for y in 0..height {
        for x in 0..width {
            let ramp = decades * (x + y) as f32 / span.max(1.0);
            let texture = 0.2 * (((x * 7 + y * 13) % 11) as f32 / 10.0);
            let l = 10f32.powf(ramp - 2.0 + texture);
            r.push(l * 1.1);
            g.push(l);
            b.push(l * 0.8);
        }
    }
    RgbPlanes::new(width, height, r, g, b)
}
