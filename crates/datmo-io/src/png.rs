//! PNG output of display pixel values.
//!
//! Tone mapped images hold display-referred values in `[0, 1]`; they are
//! quantized to 8 or 16 bits without further encoding since the display
//! model already includes the response curve. Reading returns the same
//! normalized range, which is mostly useful for inspecting results.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use datmo_core::RgbPlanes;
use tracing::debug;

use crate::{IoError, IoResult};

/// Sample depth of a written PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 8 bits per channel.
    #[default]
    Eight,
    /// 16 bits per channel, big endian.
    Sixteen,
}

impl BitDepth {
    /// Depth for a bit count, `8` or `16`.
    pub fn from_bits(bits: u8) -> IoResult<Self> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(IoError::UnsupportedFormat(format!("{other}-bit PNG"))),
        }
    }
}

fn quantize(v: f32, max: f32) -> f32 {
    if v.is_finite() {
        (v.clamp(0.0, 1.0) * max).round()
    } else {
        0.0
    }
}

/// Writes `planes` as an RGB PNG, clamping values into `[0, 1]`.
pub fn write<P: AsRef<Path>>(path: P, planes: &RgbPlanes, depth: BitDepth) -> IoResult<()> {
    let (width, height) = planes.dims();
    let (w, h) = (
        u32::try_from(width).map_err(|_| IoError::invalid("width exceeds PNG limits"))?,
        u32::try_from(height).map_err(|_| IoError::invalid("height exceeds PNG limits"))?,
    );

    let data: Vec<u8> = match depth {
        BitDepth::Eight => planes
            .to_interleaved()
            .into_iter()
            .map(|v| quantize(v, 255.0) as u8)
            .collect(),
        BitDepth::Sixteen => planes
            .to_interleaved()
            .into_iter()
            .flat_map(|v| (quantize(v, 65535.0) as u16).to_be_bytes())
            .collect(),
    };

    let writer = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder = png::Encoder::new(writer, w, h);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(match depth {
        BitDepth::Eight => png::BitDepth::Eight,
        BitDepth::Sixteen => png::BitDepth::Sixteen,
    });
    encoder.set_compression(png::Compression::default());

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    writer.finish()?;

    debug!(width, height, ?depth, path = %path.as_ref().display(), "Wrote PNG");
    Ok(())
}

/// Reads a PNG into planes normalized to `[0, 1]`. Alpha is dropped.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbPlanes> {
    let file = File::open(path.as_ref())?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info()?;

    let size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::invalid("cannot determine PNG buffer size"))?;
    let mut buf = vec![0u8; size];
    let info = reader.next_frame(&mut buf)?;
    let bytes = &buf[..info.buffer_size()];

    let samples: Vec<f32> = match info.bit_depth {
        png::BitDepth::Eight => bytes.iter().map(|&b| b as f32 / 255.0).collect(),
        png::BitDepth::Sixteen => bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]) as f32 / 65535.0)
            .collect(),
        other => return Err(IoError::UnsupportedFormat(format!("PNG bit depth {other:?}"))),
    };

    let rgb: Vec<f32> = match info.color_type {
        png::ColorType::Rgb => samples,
        png::ColorType::Rgba => samples.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        png::ColorType::Grayscale => samples.iter().flat_map(|&v| [v, v, v]).collect(),
        png::ColorType::GrayscaleAlpha => {
            samples.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0]]).collect()
        }
        other => return Err(IoError::UnsupportedFormat(format!("PNG color type {other:?}"))),
    };

    Ok(RgbPlanes::from_interleaved(info.width as usize, info.height as usize, &rgb)?)
}
