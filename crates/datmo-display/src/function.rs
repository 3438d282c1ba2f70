//! Display photometric response.
//!
//! A display function maps a driving pixel value in `[0, 1]` to the
//! luminance (cd/m2) the viewer sees, including light reflected from the
//! screen. Its inverse maps a requested luminance back to a pixel value.
//!
//! ## Gamma-Gain-Offset
//!
//! [`GogDisplay`] models a display as
//!
//! ```text
//! L(p) = p^gamma * (L_max - L_black) + L_black + L_refl
//! L_refl = k / pi * E_amb
//! ```
//!
//! where `E_amb` is ambient illuminance (lux) and `k` screen reflectivity.
//!
//! ## Measured
//!
//! [`LutDisplay`] interpolates measured `(pixel value, luminance)` pairs in
//! log-luminance.
//!
//! # Example
//!
//! ```rust
//! use datmo_display::{DisplayFunction, DisplayPreset};
//!
//! let lcd = DisplayPreset::Lcd.model();
//! let p = lcd.inv_display(50.0);
//! assert!((lcd.display(p) - 50.0).abs() < 1e-3);
//!
//! let (lo, hi) = lcd.log_range();
//! assert!(hi > lo);
//! ```

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use datmo_core::{Error, Result};

/// Photometric response of a target display.
///
/// Implementations are immutable and shareable across threads.
pub trait DisplayFunction: Send + Sync + fmt::Debug {
    /// Luminance (cd/m2) produced by pixel value `p` in `[0, 1]`.
    fn display(&self, p: f32) -> f32;

    /// Pixel value in `[0, 1]` that produces luminance `l`.
    ///
    /// Luminance outside the reproducible range clamps to 0 or 1.
    fn inv_display(&self, l: f32) -> f32;

    /// `(log10 L_min, log10 L_max)` of the reproducible range.
    fn log_range(&self) -> (f64, f64) {
        (
            (self.display(0.0) as f64).log10(),
            (self.display(1.0) as f64).log10(),
        )
    }

    /// Reproducible range in log10 units.
    fn dynamic_range(&self) -> f64 {
        let (lo, hi) = self.log_range();
        hi - lo
    }
}

/// Power-law EOTF `p^gamma` with zero below black.
#[inline]
fn gamma_eotf(p: f32, gamma: f32) -> f32 {
    if p <= 0.0 { 0.0 } else { p.powf(gamma) }
}

/// Inverse of [`gamma_eotf`].
#[inline]
fn gamma_oetf(l: f32, gamma: f32) -> f32 {
    if l <= 0.0 { 0.0 } else { l.powf(1.0 / gamma) }
}

/// Gamma-gain-offset display with ambient reflections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GogDisplay {
    gamma: f32,
    l_max: f32,
    l_black: f32,
    e_amb: f32,
    k_refl: f32,
    l_refl: f32,
}

impl GogDisplay {
    /// Builds the model.
    ///
    /// # Arguments
    ///
    /// * `gamma` - display gamma, typically 2.2
    /// * `l_max` - peak luminance in cd/m2
    /// * `l_black` - black level in cd/m2
    /// * `e_amb` - ambient illuminance in lux
    /// * `k_refl` - screen reflectivity, 0.01 for LCDs
    pub fn new(gamma: f32, l_max: f32, l_black: f32, e_amb: f32, k_refl: f32) -> Result<Self> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(Error::invalid_parameter("gamma", format!("{gamma} must be > 0")));
        }
        if !(l_black.is_finite() && l_black >= 0.0) {
            return Err(Error::invalid_parameter("l_black", format!("{l_black} must be >= 0")));
        }
        if !(l_max.is_finite() && l_max > l_black) {
            return Err(Error::invalid_parameter(
                "l_max",
                format!("{l_max} must exceed black level {l_black}"),
            ));
        }
        if !(e_amb.is_finite() && e_amb >= 0.0) {
            return Err(Error::invalid_parameter("e_amb", format!("{e_amb} must be >= 0")));
        }
        if !(k_refl.is_finite() && k_refl >= 0.0) {
            return Err(Error::invalid_parameter("k_refl", format!("{k_refl} must be >= 0")));
        }
        let l_refl = k_refl / PI * e_amb;
        if l_black + l_refl <= 0.0 {
            return Err(Error::invalid_parameter(
                "l_black",
                "black level plus reflections must be > 0 for a finite range",
            ));
        }
        Ok(Self {
            gamma,
            l_max,
            l_black,
            e_amb,
            k_refl,
            l_refl,
        })
    }

    /// Display gamma.
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Peak luminance in cd/m2.
    pub fn peak(&self) -> f32 {
        self.l_max
    }

    /// Black level in cd/m2.
    pub fn black(&self) -> f32 {
        self.l_black
    }

    /// Ambient illuminance in lux.
    pub fn ambient(&self) -> f32 {
        self.e_amb
    }

    /// Screen reflectivity.
    pub fn reflectivity(&self) -> f32 {
        self.k_refl
    }

    /// Luminance reflected from the screen in cd/m2.
    pub fn reflected(&self) -> f32 {
        self.l_refl
    }
}

impl Default for GogDisplay {
    /// The `lcd` preset.
    fn default() -> Self {
        DisplayPreset::Lcd.model()
    }
}

impl DisplayFunction for GogDisplay {
    fn display(&self, p: f32) -> f32 {
        let p = p.clamp(0.0, 1.0);
        gamma_eotf(p, self.gamma) * (self.l_max - self.l_black) + self.l_black + self.l_refl
    }

    fn inv_display(&self, l: f32) -> f32 {
        if l.is_nan() {
            return 0.0;
        }
        let floor = self.l_black + self.l_refl;
        if l <= floor {
            return 0.0;
        }
        gamma_oetf((l - floor) / (self.l_max - self.l_black), self.gamma).clamp(0.0, 1.0)
    }
}

/// Named gamma-gain-offset displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayPreset {
    /// LCD in a bright office: 100 cd/m2, 400 lux.
    LcdOffice,
    /// Typical LCD: 200 cd/m2, dim room.
    #[default]
    Lcd,
    /// Bright LCD: 500 cd/m2, dark room.
    LcdBright,
    /// CRT monitor: 80 cd/m2.
    Crt,
}

impl DisplayPreset {
    /// All presets.
    pub const ALL: [DisplayPreset; 4] = [
        DisplayPreset::LcdOffice,
        DisplayPreset::Lcd,
        DisplayPreset::LcdBright,
        DisplayPreset::Crt,
    ];

    /// Preset name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::LcdOffice => "lcd_office",
            Self::Lcd => "lcd",
            Self::LcdBright => "lcd_bright",
            Self::Crt => "crt",
        }
    }

    /// `(gamma, l_max, l_black, e_amb, k_refl)`.
    pub fn parameters(self) -> (f32, f32, f32, f32, f32) {
        match self {
            Self::LcdOffice => (2.2, 100.0, 0.8, 400.0, 0.01),
            Self::Lcd => (2.2, 200.0, 0.8, 60.0, 0.01),
            Self::LcdBright => (2.6, 500.0, 0.5, 10.0, 0.01),
            Self::Crt => (2.2, 80.0, 1.0, 60.0, 0.02),
        }
    }

    /// The display model.
    pub fn model(self) -> GogDisplay {
        let (gamma, l_max, l_black, e_amb, k_refl) = self.parameters();
        let l_refl = k_refl / PI * e_amb;
        GogDisplay {
            gamma,
            l_max,
            l_black,
            e_amb,
            k_refl,
            l_refl,
        }
    }
}

impl fmt::Display for DisplayPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisplayPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "lcd_office" => Ok(Self::LcdOffice),
            "lcd" => Ok(Self::Lcd),
            "lcd_bright" => Ok(Self::LcdBright),
            "crt" => Ok(Self::Crt),
            other => Err(Error::invalid_parameter(
                "display",
                format!("unknown preset '{other}' (lcd_office, lcd, lcd_bright, crt)"),
            )),
        }
    }
}

/// Display measured as `(pixel value, luminance)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct LutDisplay {
    pix: Vec<f32>,
    log_lum: Vec<f32>,
}

impl LutDisplay {
    /// Builds the model from measurements.
    ///
    /// Needs at least two samples, pixel values and luminance strictly
    /// increasing, luminance > 0.
    pub fn from_samples(samples: &[(f32, f32)]) -> Result<Self> {
        if samples.len() < 2 {
            return Err(Error::invalid_parameter("display_lut", "needs at least two samples"));
        }
        for (i, &(p, l)) in samples.iter().enumerate() {
            if !p.is_finite() || !(l.is_finite() && l > 0.0) {
                return Err(Error::invalid_parameter(
                    "display_lut",
                    format!("sample {i} ({p}, {l}) is not a finite positive measurement"),
                ));
            }
        }
        for (i, w) in samples.windows(2).enumerate() {
            if w[1].0 <= w[0].0 || w[1].1 <= w[0].1 {
                return Err(Error::invalid_parameter(
                    "display_lut",
                    format!("samples must be strictly increasing (at row {})", i + 1),
                ));
            }
        }
        Ok(Self {
            pix: samples.iter().map(|s| s.0).collect(),
            log_lum: samples.iter().map(|s| s.1.log10()).collect(),
        })
    }

    /// Parses a two-column text table: `pixel_value luminance` per line.
    ///
    /// Columns may be separated by whitespace or commas; `#` starts a
    /// comment.
    pub fn parse(text: &str) -> Result<Self> {
        let mut samples = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            if cols.len() != 2 {
                return Err(Error::invalid_parameter(
                    "display_lut",
                    format!("line {}: expected 2 columns, got {}", line_no + 1, cols.len()),
                ));
            }
            let parse = |s: &str| {
                s.parse::<f32>().map_err(|e| {
                    Error::invalid_parameter("display_lut", format!("line {}: {e}", line_no + 1))
                })
            };
            samples.push((parse(cols[0])?, parse(cols[1])?));
        }
        Self::from_samples(&samples)
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.pix.len()
    }

    /// Always `false`: construction requires two samples.
    pub fn is_empty(&self) -> bool {
        self.pix.is_empty()
    }
}

/// Piecewise linear lookup of `xs -> ys`, clamped at both ends.
fn lookup(xs: &[f32], ys: &[f32], v: f32) -> f32 {
    let last = xs.len() - 1;
    if v <= xs[0] {
        return ys[0];
    }
    if v >= xs[last] {
        return ys[last];
    }
    let hi = xs.partition_point(|&x| x <= v);
    let lo = hi - 1;
    let t = (v - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + (ys[hi] - ys[lo]) * t
}

impl DisplayFunction for LutDisplay {
    fn display(&self, p: f32) -> f32 {
        10f32.powf(lookup(&self.pix, &self.log_lum, p))
    }

    fn inv_display(&self, l: f32) -> f32 {
        if l.is_nan() || l <= 0.0 {
            return self.pix[0].clamp(0.0, 1.0);
        }
        lookup(&self.log_lum, &self.pix, l.log10()).clamp(0.0, 1.0)
    }

    fn log_range(&self) -> (f64, f64) {
        (
            self.log_lum[0] as f64,
            self.log_lum[self.log_lum.len() - 1] as f64,
        )
    }
}
