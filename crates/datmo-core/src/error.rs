//! Error types and status codes for the tone mapping pipeline.
//!
//! Every stage of the pipeline (density estimation, curve optimization,
//! curve application) returns [`Result`]. Nothing panics across a stage
//! boundary: a long running worker surfaces failure to its controller by
//! value.
//!
//! # Taxonomy
//!
//! - **Aborted**: [`Error::Aborted`], the caller asked for early
//!   termination through a [`crate::Progress`] handle. Not a failure.
//! - **Invalid input**: [`InvalidDimensions`](Error::InvalidDimensions),
//!   [`DimensionMismatch`](Error::DimensionMismatch),
//!   [`InvalidInput`](Error::InvalidInput),
//!   [`InvalidParameter`](Error::InvalidParameter),
//!   [`DegenerateDensity`](Error::DegenerateDensity),
//!   [`NonMonotonicCurve`](Error::NonMonotonicCurve). Detected at stage
//!   entry, before any output is touched.
//! - **Numerical**: [`Error::Numerical`], a guard tripped inside a solver.
//!
//! Callers that need the closed three-value status of the C-style
//! interface use [`Status::of`]:
//!
//! ```rust
//! use datmo_core::{Error, Result, Status};
//!
//! let done: Result<()> = Ok(());
//! let stopped: Result<()> = Err(Error::Aborted);
//! let failed: Result<()> = Err(Error::invalid_input("NaN at pixel 3"));
//!
//! assert_eq!(Status::of(&done), Status::Ok);
//! assert_eq!(Status::of(&stopped), Status::Aborted);
//! assert_eq!(Status::of(&failed), Status::Error);
//! ```

use std::fmt;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the tone mapping stages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Termination was requested through the progress handle.
    #[error("operation aborted by request")]
    Aborted,

    /// Width or height is zero, or the buffer size overflows.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: usize,
        /// Requested height
        height: usize,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Two buffers that must share a size do not.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First buffer width
        a_width: usize,
        /// First buffer height
        a_height: usize,
        /// Second buffer width
        b_width: usize,
        /// Second buffer height
        b_height: usize,
    },

    /// Pixel data the stage cannot work with (non-finite luminance, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A scalar parameter is out of its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The luminance statistics carry no usable information.
    #[error("degenerate density: {0}")]
    DegenerateDensity(String),

    /// Tone curve samples violate the ordering invariant.
    #[error("non-monotonic tone curve at sample {index}")]
    NonMonotonicCurve {
        /// First sample index where ordering breaks
        index: usize,
    },

    /// A numerical guard tripped (non-finite intermediate, no convergence).
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: usize, height: usize, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::DimensionMismatch`] error.
    #[inline]
    pub fn dimension_mismatch(a: (usize, usize), b: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::InvalidInput`] error.
    #[inline]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an [`Error::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::DegenerateDensity`] error.
    #[inline]
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateDensity(msg.into())
    }

    /// Creates an [`Error::Numerical`] error.
    #[inline]
    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    /// Returns `true` if the caller requested termination.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Maps this error onto the three-value status set.
    #[inline]
    pub fn status(&self) -> Status {
        if self.is_aborted() {
            Status::Aborted
        } else {
            Status::Error
        }
    }
}

/// Closed status set of the stage interface: success, abort, failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Stage completed and its output is valid.
    Ok,
    /// Stage stopped on request; outputs were not modified.
    Aborted,
    /// Stage failed; outputs were not modified.
    Error,
}

impl Status {
    /// Status of a stage result.
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.status(),
        }
    }

    /// Returns `true` for [`Status::Ok`].
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Aborted => f.write_str("aborted"),
            Self::Error => f.write_str("error"),
        }
    }
}
