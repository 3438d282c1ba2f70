//! Portable float map (PFM).
//!
//! `PF` holds RGB and `Pf` grayscale 32-bit floats. A negative scale in the
//! header marks little endian data. Rows are stored bottom to top.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use datmo_core::RgbPlanes;
use tracing::debug;

use crate::{IoError, IoResult, check_extent};

/// Reads one whitespace delimited header token and the single byte after it.
fn token<R: BufRead>(reader: &mut R) -> IoResult<String> {
    let mut out = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte.is_ascii_whitespace() {
            if out.is_empty() {
                continue;
            }
            break;
        }
        out.push(byte);
        if out.len() > 64 {
            return Err(IoError::invalid("PFM header token too long"));
        }
    }
    String::from_utf8(out).map_err(|_| IoError::invalid("PFM header is not ASCII"))
}

fn number<T: std::str::FromStr, R: BufRead>(reader: &mut R, what: &str) -> IoResult<T> {
    let text = token(reader)?;
    text.parse()
        .map_err(|_| IoError::invalid(format!("bad PFM {what} '{text}'")))
}

/// Decodes a PFM stream. Grayscale maps are replicated into all three planes.
pub fn read_from<R: BufRead>(reader: &mut R) -> IoResult<RgbPlanes> {
    let channels = match token(reader)?.as_str() {
        "PF" => 3,
        "Pf" => 1,
        other => return Err(IoError::invalid(format!("bad PFM signature '{other}'"))),
    };
    let width: usize = number(reader, "width")?;
    let height: usize = number(reader, "height")?;
    check_extent(width, height)?;
    let scale: f32 = number(reader, "scale")?;
    if scale == 0.0 || !scale.is_finite() {
        return Err(IoError::invalid("PFM scale must be non-zero"));
    }
    let little = scale < 0.0;

    let mut planes = RgbPlanes::zeros(width, height)?;
    let mut row = vec![0f32; width * channels];
    for file_row in 0..height {
        if little {
            reader.read_f32_into::<LittleEndian>(&mut row)?;
        } else {
            reader.read_f32_into::<BigEndian>(&mut row)?;
        }
        let y = height - 1 - file_row;
        for (x, px) in row.chunks_exact(channels).enumerate() {
            let i = y * width + x;
            let [r, g, b] = if channels == 3 { [px[0], px[1], px[2]] } else { [px[0]; 3] };
            planes.r[i] = r;
            planes.g[i] = g;
            planes.b[i] = b;
        }
    }

    debug!(width, height, channels, little, "Read PFM");
    Ok(planes)
}

/// Reads a PFM file.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbPlanes> {
    let file = File::open(path)?;
    read_from(&mut BufReader::new(file))
}

/// Encodes planes as a little endian RGB PFM.
pub fn write_to<W: Write>(writer: &mut W, planes: &RgbPlanes) -> IoResult<()> {
    let (width, height) = planes.dims();
    write!(writer, "PF\n{width} {height}\n-1.0\n")?;
    for y in (0..height).rev() {
        for i in y * width..(y + 1) * width {
            writer.write_f32::<LittleEndian>(planes.r[i])?;
            writer.write_f32::<LittleEndian>(planes.g[i])?;
            writer.write_f32::<LittleEndian>(planes.b[i])?;
        }
    }
    Ok(())
}

/// Writes a PFM file.
pub fn write<P: AsRef<Path>>(path: P, planes: &RgbPlanes) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(&mut writer, planes)?;
    writer.flush()?;
    Ok(())
}
