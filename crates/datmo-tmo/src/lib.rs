//! # datmo-tmo
//!
//! Display adaptive tone mapping.
//!
//! A high dynamic range luminance map is reduced to contrast statistics,
//! a monotone tone curve is optimized against the target display and the
//! human contrast sensitivity, and the curve is applied back onto color.
//!
//! | Stage | Function | Module |
//! |-------|----------|--------|
//! | Contrast statistics | [`estimate_density`] | [`density`] |
//! | Curve optimization | [`compute_tone_curve`] | [`optimizer`] |
//! | Application | [`apply_tone_curve_cc`], [`apply_tone_curve`] | [`apply`] |
//! | All of the above | [`ToneMapper::run`] | [`pipeline`] |
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::{LuminanceMap, Progress, RgbPlanes};
//! use datmo_display::{DisplaySize, GogDisplay};
//! use datmo_tmo::{
//!     ToneCurve, WhiteAnchor, apply_tone_curve_cc, compute_tone_curve, estimate_density,
//! };
//!
//! let hdr = RgbPlanes::filled(16, 16, [20.0, 15.0, 10.0]).unwrap();
//! let lum: LuminanceMap = hdr.luminance();
//! let progress = Progress::new();
//! let display = GogDisplay::default();
//!
//! let density = estimate_density(&lum, &progress).unwrap();
//! let mut curve = ToneCurve::standard();
//! compute_tone_curve(
//!     &mut curve,
//!     density.as_ref(),
//!     &display,
//!     &DisplaySize::default(),
//!     1.0,
//!     WhiteAnchor::None,
//!     &progress,
//! )
//! .unwrap();
//!
//! let mut out = RgbPlanes::zeros(16, 16).unwrap();
//! apply_tone_curve_cc(&mut out, &hdr, &lum, &curve, &display, 1.0).unwrap();
//! ```
//!
//! # Features
//!
//! - `parallel` (default) - apply the curve on the rayon thread pool

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod apply;
pub mod csf;
pub mod curve;
pub mod density;
pub mod optimizer;
pub mod pipeline;

pub use apply::{
    ColorCorrection, LEGACY_SATURATION, apply_tone_curve, apply_tone_curve_cc,
    apply_tone_curve_cc_in_place, apply_tone_curve_in_place,
};
pub use curve::ToneCurve;
pub use density::{ConditionalDensity, NeighborDensity, estimate_density, x_scale};
pub use optimizer::{WhiteAnchor, compute_tone_curve};
pub use pipeline::{ToneMapped, ToneMapper};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::apply::{ColorCorrection, apply_tone_curve, apply_tone_curve_cc};
    pub use crate::curve::ToneCurve;
    pub use crate::density::{ConditionalDensity, estimate_density};
    pub use crate::optimizer::{WhiteAnchor, compute_tone_curve};
    pub use crate::pipeline::{ToneMapped, ToneMapper};
}
