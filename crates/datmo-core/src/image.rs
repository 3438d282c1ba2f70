//! Planar image buffers handed to the tone mapping core.
//!
//! - [`LuminanceMap`] - width x height scalar luminance
//! - [`RgbPlanes`] - three same-size planes of linear radiance
//!
//! # Memory Layout
//!
//! Both types store samples in **row-major** order, top-to-bottom, one
//! plane per channel:
//!
//! ```text
//! r: [R R R R ...]   g: [G G G G ...]   b: [B B B B ...]
//! ```
//!
//! The luminance map paired with a color image must be the weighted sum
//! of its planes (see [`LUMA_WEIGHTS`]); [`RgbPlanes::luminance`] builds it.
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::{RgbPlanes, luminance};
//!
//! let rgb = RgbPlanes::filled(4, 4, [2.0, 1.0, 0.5]).unwrap();
//! let lum = rgb.luminance();
//! assert_eq!(lum.width(), 4);
//! assert!((lum.as_slice()[0] - luminance([2.0, 1.0, 0.5])).abs() < 1e-6);
//! ```

use crate::{Error, Result};

/// Luminance weight of the red channel.
pub const LUMA_R: f32 = 0.212656;

/// Luminance weight of the green channel.
pub const LUMA_G: f32 = 0.715158;

/// Luminance weight of the blue channel.
pub const LUMA_B: f32 = 0.072186;

/// Luminance weights `[R, G, B]` used to pair a color image with its map.
pub const LUMA_WEIGHTS: [f32; 3] = [LUMA_R, LUMA_G, LUMA_B];

/// Luminance of a linear RGB triplet: `0.212656*R + 0.715158*G + 0.072186*B`.
#[inline]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_R + rgb[1] * LUMA_G + rgb[2] * LUMA_B
}

/// Validates an extent and returns its pixel count.
fn pixel_count(width: usize, height: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_dimensions(width, height, "width and height must be > 0"));
    }
    width
        .checked_mul(height)
        .ok_or_else(|| Error::invalid_dimensions(width, height, "pixel count overflows"))
}

fn check_len(width: usize, height: usize, len: usize, what: &str) -> Result<()> {
    let expected = pixel_count(width, height)?;
    if len != expected {
        return Err(Error::invalid_dimensions(
            width,
            height,
            format!("{what} has {len} samples, expected {expected}"),
        ));
    }
    Ok(())
}

/// Dense width x height map of scalar luminance.
///
/// Values are expected to be positive; stages document how they treat
/// zero, negative and non-finite samples.
#[derive(Debug, Clone, PartialEq)]
pub struct LuminanceMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl LuminanceMap {
    /// Wraps a row-major buffer.
    ///
    /// Fails on zero extent or when `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        check_len(width, height, data.len(), "luminance map")?;
        Ok(Self { width, height, data })
    }

    /// Map with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Result<Self> {
        let n = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![value; n],
        })
    }

    /// Map built from a function of pixel coordinates.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Result<Self> {
        let n = pixel_count(width, height)?;
        let mut data = Vec::with_capacity(n);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(Self { width, height, data })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: zero-extent maps cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major samples.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One row of samples.
    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Sample at `(x, y)`, `None` outside the map.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Consumes the map and returns its buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Three same-size planes of linear radiance.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbPlanes {
    width: usize,
    height: usize,
    /// Red plane, row-major.
    pub r: Vec<f32>,
    /// Green plane, row-major.
    pub g: Vec<f32>,
    /// Blue plane, row-major.
    pub b: Vec<f32>,
}

impl RgbPlanes {
    /// Wraps three row-major planes.
    pub fn new(width: usize, height: usize, r: Vec<f32>, g: Vec<f32>, b: Vec<f32>) -> Result<Self> {
        check_len(width, height, r.len(), "red plane")?;
        check_len(width, height, g.len(), "green plane")?;
        check_len(width, height, b.len(), "blue plane")?;
        Ok(Self { width, height, r, g, b })
    }

    /// Image with every pixel set to `rgb`.
    pub fn filled(width: usize, height: usize, rgb: [f32; 3]) -> Result<Self> {
        let n = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            r: vec![rgb[0]; n],
            g: vec![rgb[1]; n],
            b: vec![rgb[2]; n],
        })
    }

    /// Image with every plane zeroed.
    pub fn zeros(width: usize, height: usize) -> Result<Self> {
        Self::filled(width, height, [0.0; 3])
    }

    /// Splits an interleaved `[R G B R G B ...]` buffer into planes.
    pub fn from_interleaved(width: usize, height: usize, rgb: &[f32]) -> Result<Self> {
        let n = pixel_count(width, height)?;
        if rgb.len() != n * 3 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("interleaved buffer has {} samples, expected {}", rgb.len(), n * 3),
            ));
        }
        let mut r = Vec::with_capacity(n);
        let mut g = Vec::with_capacity(n);
        let mut b = Vec::with_capacity(n);
        for px in rgb.chunks_exact(3) {
            r.push(px[0]);
            g.push(px[1]);
            b.push(px[2]);
        }
        Ok(Self { width, height, r, g, b })
    }

    /// Interleaves the planes as `[R G B R G B ...]`.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.r.len() * 3);
        for i in 0..self.r.len() {
            out.extend_from_slice(&[self.r[i], self.g[i], self.b[i]]);
        }
        out
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.r.len()
    }

    /// Always `false`: zero-extent images cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Pixel at `(x, y)` as `[R, G, B]`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[f32; 3]> {
        if x < self.width && y < self.height {
            let i = y * self.width + x;
            Some([self.r[i], self.g[i], self.b[i]])
        } else {
            None
        }
    }

    /// Luminance map with [`LUMA_WEIGHTS`].
    pub fn luminance(&self) -> LuminanceMap {
        let data = self
            .r
            .iter()
            .zip(&self.g)
            .zip(&self.b)
            .map(|((&r, &g), &b)| luminance([r, g, b]))
            .collect();
        LuminanceMap {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Overwrites all planes with `other`'s content. Sizes must match.
    pub fn copy_from(&mut self, other: &RgbPlanes) -> Result<()> {
        if self.dims() != other.dims() {
            return Err(Error::dimension_mismatch(self.dims(), other.dims()));
        }
        self.r.copy_from_slice(&other.r);
        self.g.copy_from_slice(&other.g);
        self.b.copy_from_slice(&other.b);
        Ok(())
    }

    /// Mutable access to the three planes at once.
    #[inline]
    pub fn planes_mut(&mut self) -> (&mut [f32], &mut [f32], &mut [f32]) {
        (&mut self.r, &mut self.g, &mut self.b)
    }
}
