//! # datmo-display
//!
//! Display models for display adaptive tone mapping.
//!
//! The tone curve optimizer needs two things about the target display:
//!
//! - its photometric response ([`DisplayFunction`]): which luminance each
//!   pixel value produces, and the resulting reproducible log-luminance
//!   range
//! - its viewing geometry ([`DisplaySize`]): pixels per visual degree and
//!   viewing distance
//!
//! | Model | Use Case |
//! |-------|----------|
//! | [`GogDisplay`] | Parametric gamma-gain-offset display with ambient light |
//! | [`DisplayPreset`] | Named `lcd_office`, `lcd`, `lcd_bright`, `crt` models |
//! | [`LutDisplay`] | Measured display response |
//!
//! # Usage
//!
//! ```rust
//! use datmo_display::{DisplayFunction, DisplaySize, GogDisplay};
//!
//! let df = GogDisplay::new(2.2, 120.0, 0.5, 50.0, 0.01).unwrap();
//! let ds = DisplaySize::from_screen_heights(1080, 2.0, 0.6).unwrap();
//!
//! let range = df.dynamic_range();
//! assert!(range > 2.0);
//! assert!(ds.pix_per_deg() > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod function;
pub mod size;

pub use function::{DisplayFunction, DisplayPreset, GogDisplay, LutDisplay};
pub use size::{DEFAULT_PIX_PER_DEG, DEFAULT_VIEW_DISTANCE, DisplaySize};
