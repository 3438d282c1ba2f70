//! # datmo-io
//!
//! Image files for the tone mapping tools.
//!
//! | Format | Read | Write | Samples |
//! |--------|------|-------|---------|
//! | HDR | Yes | Yes | RGBE, scene radiance |
//! | PFM | Yes | Yes | 32f, scene radiance |
//! | PNG | Yes | Yes | 8, 16 bit display values |
//!
//! [`read`] and [`write`] pick the codec from magic bytes or the extension.
//!
//! ```rust,no_run
//! use datmo_io::{png::BitDepth, read, write};
//!
//! let hdr = read("scene.hdr").unwrap();
//! write("copy.pfm", &hdr, BitDepth::Eight).unwrap();
//! ```

#![warn(missing_docs)]

mod error;
pub mod hdr;
pub mod pfm;
pub mod png;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use datmo_core::RgbPlanes;

pub use error::{IoError, IoResult};

/// Largest pixel count a file header may declare.
pub const MAX_PIXELS: usize = 1 << 28;

/// Rejects header extents that are empty or too large to allocate.
pub(crate) fn check_extent(width: usize, height: usize) -> IoResult<()> {
    match width.checked_mul(height) {
        Some(n) if n > 0 && n <= MAX_PIXELS => Ok(()),
        _ => Err(IoError::invalid(format!(
            "image size {width}x{height} is empty or exceeds {MAX_PIXELS} pixels"
        ))),
    }
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Radiance RGBE.
    Hdr,
    /// Portable float map.
    Pfm,
    /// PNG.
    Png,
}

impl Format {
    /// Format implied by the file extension.
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("hdr") | Some("pic") | Some("rgbe") => Some(Self::Hdr),
            Some("pfm") => Some(Self::Pfm),
            Some("png") => Some(Self::Png),
            _ => None,
        }
    }

    /// Format implied by leading file bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"#?") {
            Some(Self::Hdr)
        } else if bytes.starts_with(b"PF") || bytes.starts_with(b"Pf") {
            Some(Self::Pfm)
        } else {
            None
        }
    }

    /// Detects the format of an existing file, magic bytes first.
    pub fn detect<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        let mut header = [0u8; 8];
        let n = File::open(path)?.read(&mut header)?;
        Self::from_bytes(&header[..n])
            .or_else(|| Self::from_extension(path))
            .ok_or_else(|| IoError::UnsupportedFormat(path.display().to_string()))
    }
}

/// Reads an image of any supported format.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbPlanes> {
    let path = path.as_ref();
    match Format::detect(path)? {
        Format::Hdr => hdr::read(path),
        Format::Pfm => pfm::read(path),
        Format::Png => png::read(path),
    }
}

/// Writes an image in the format named by the extension.
///
/// `depth` only applies to PNG.
pub fn write<P: AsRef<Path>>(path: P, planes: &RgbPlanes, depth: png::BitDepth) -> IoResult<()> {
    let path = path.as_ref();
    match Format::from_extension(path) {
        Some(Format::Hdr) => hdr::write(path, planes),
        Some(Format::Pfm) => pfm::write(path, planes),
        Some(Format::Png) => png::write(path, planes, depth),
        None => Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_extension("a.HDR"), Some(Format::Hdr));
        assert_eq!(Format::from_extension("dir/b.pfm"), Some(Format::Pfm));
        assert_eq!(Format::from_extension("c.png"), Some(Format::Png));
        assert_eq!(Format::from_extension("d.exr"), None);
        assert_eq!(Format::from_extension("noext"), None);
    }

    #[test]
    fn test_extent_limits() {
        assert!(check_extent(1, 1).is_ok());
        assert!(check_extent(1 << 14, 1 << 14).is_ok());
        assert!(check_extent(0, 5).is_err());
        assert!(check_extent(MAX_PIXELS, 2).is_err());
        assert!(check_extent(usize::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_magic_wins_over_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mislabeled.png");
        pfm::write(&path, &RgbPlanes::filled(2, 2, [1.0, 2.0, 3.0]).unwrap()).unwrap();
        assert_eq!(Format::detect(&path).unwrap(), Format::Pfm);
        assert_eq!(read(&path).unwrap().pixel(1, 1), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_write_dispatch() {
        let dir = tempdir().unwrap();
        let planes = RgbPlanes::filled(9, 2, [0.5, 0.25, 0.125]).unwrap();
        for name in ["x.hdr", "x.pfm", "x.png"] {
            let path = dir.path().join(name);
            write(&path, &planes, png::BitDepth::Eight).unwrap();
            assert_eq!(read(&path).unwrap().dims(), (9, 2));
        }
        assert!(matches!(
            write(dir.path().join("x.tif"), &planes, png::BitDepth::Eight),
            Err(IoError::UnsupportedFormat(_))
        ));
    }
}
