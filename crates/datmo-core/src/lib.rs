//! # datmo-core
//!
//! Core types shared by the display adaptive tone mapping crates.
//!
//! - [`LuminanceMap`], [`RgbPlanes`] - planar image buffers
//! - [`Progress`] - progress fraction and cancellation flag
//! - [`Error`], [`Result`], [`Status`] - error taxonomy and status codes
//!
//! ## Crate Structure
//!
//! ```text
//! datmo-core (this crate)
//!    ^
//!    |
//!    +-- datmo-display (display models)
//!    +-- datmo-tmo (density, tone curve, apply)
//!    +-- datmo-io (file I/O)
//!    +-- datmo-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod progress;

pub use error::{Error, Result, Status};
pub use image::{LUMA_B, LUMA_G, LUMA_R, LUMA_WEIGHTS, LuminanceMap, RgbPlanes, luminance};
pub use progress::Progress;

/// Prelude module for convenient imports.
///
/// ```
/// use datmo_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result, Status};
    pub use crate::image::{LUMA_WEIGHTS, LuminanceMap, RgbPlanes, luminance};
    pub use crate::progress::Progress;
}
