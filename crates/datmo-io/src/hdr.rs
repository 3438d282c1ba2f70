//! Radiance HDR (RGBE) images.
//!
//! Pixels are stored as an 8-bit mantissa per channel with a shared 8-bit
//! exponent. Scanlines are either flat or run-length encoded per channel;
//! both are read, and run-length encoding is written whenever the width
//! allows it. Only the standard `-Y h +X w` orientation and the RGBE
//! primaries are supported.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use datmo_core::RgbPlanes;
use tracing::debug;

use crate::{IoError, IoResult, check_extent};

const MAGIC: &str = "#?";
const FORMAT_RGBE: &str = "32-bit_rle_rgbe";
const FORMAT_XYZE: &str = "32-bit_rle_xyze";

/// Scanline widths that can be run-length encoded.
const RLE_WIDTHS: std::ops::RangeInclusive<usize> = 8..=0x7fff;

/// Shortest repeat worth a run packet.
const MIN_RUN: usize = 4;
const MAX_RUN: usize = 127;
const MAX_LITERAL: usize = 128;

/// Header fields that matter for decoding.
#[derive(Debug, Clone, PartialEq)]
struct Header {
    width: usize,
    height: usize,
    /// Product of all `EXPOSURE=` lines.
    exposure: f32,
}

impl Header {
    fn parse<R: BufRead>(reader: &mut R) -> IoResult<Self> {
        let mut line = Vec::new();
        let mut next_line = |reader: &mut R| -> IoResult<Option<String>> {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(None);
            }
            Ok(Some(String::from_utf8_lossy(&line).trim_end().to_string()))
        };

        let first = next_line(reader)?.unwrap_or_default();
        if !first.starts_with(MAGIC) {
            return Err(IoError::invalid("missing #? signature"));
        }

        let mut exposure = 1.0f32;
        loop {
            let Some(text) = next_line(reader)? else {
                return Err(IoError::invalid("header ends before the resolution line"));
            };
            if text.is_empty() {
                break;
            }
            if text.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = text.split_once('=') {
                match key.trim().to_ascii_uppercase().as_str() {
                    "FORMAT" if value.trim() == FORMAT_XYZE => {
                        return Err(IoError::UnsupportedFormat("XYZE primaries".into()));
                    }
                    "FORMAT" if value.trim() != FORMAT_RGBE => {
                        return Err(IoError::UnsupportedFormat(value.trim().to_string()));
                    }
                    "EXPOSURE" => {
                        let value = value.trim();
                        let v: f32 = value
                            .parse()
                            .map_err(|_| IoError::invalid(format!("bad EXPOSURE '{value}'")))?;
                        exposure *= v;
                    }
                    _ => {}
                }
            }
        }

        let resolution =
            next_line(reader)?.ok_or_else(|| IoError::invalid("missing resolution line"))?;
        let (width, height) = parse_resolution(&resolution)?;
        Ok(Self {
            width,
            height,
            exposure,
        })
    }
}

/// `-Y <height> +X <width>`.
fn parse_resolution(line: &str) -> IoResult<(usize, usize)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        ["-Y", h, "+X", w] => {
            let height: usize = h
                .parse()
                .map_err(|_| IoError::invalid(format!("bad height '{h}'")))?;
            let width: usize = w
                .parse()
                .map_err(|_| IoError::invalid(format!("bad width '{w}'")))?;
            check_extent(width, height)?;
            Ok((width, height))
        }
        [_, _, _, _] => Err(IoError::UnsupportedFormat(format!("orientation '{line}'"))),
        _ => Err(IoError::invalid(format!("bad resolution line '{line}'"))),
    }
}

/// Splits a float triple into mantissa bytes and a shared exponent.
fn encode_rgbe(rgb: [f32; 3]) -> [u8; 4] {
    let [r, g, b] = rgb.map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });
    let max = r.max(g).max(b);
    if max < 1e-32 {
        return [0; 4];
    }
    // max = mant * 2^exp with mant in [0.5, 1)
    let bits = max.to_bits();
    let exp = ((bits >> 23) & 0xff) as i32 - 126;
    let mant = f32::from_bits((bits & 0x807f_ffff) | (126 << 23));
    let scale = mant * 256.0 / max;
    [
        (r * scale) as u8,
        (g * scale) as u8,
        (b * scale) as u8,
        (exp + 128).clamp(1, 255) as u8,
    ]
}

fn decode_rgbe(px: [u8; 4]) -> [f32; 3] {
    if px[3] == 0 {
        return [0.0; 3];
    }
    let f = 2f32.powi(px[3] as i32 - 136);
    [
        (px[0] as f32 + 0.5) * f,
        (px[1] as f32 + 0.5) * f,
        (px[2] as f32 + 0.5) * f,
    ]
}

/// Reads one scanline, flat or run-length encoded.
fn read_scanline<R: Read>(reader: &mut R, out: &mut [[u8; 4]]) -> IoResult<()> {
    let width = out.len();
    let mut first = [0u8; 4];
    reader.read_exact(&mut first)?;

    let encoded =
        RLE_WIDTHS.contains(&width) && first[0] == 2 && first[1] == 2 && first[2] & 0x80 == 0;
    if !encoded {
        out[0] = first;
        for px in &mut out[1..] {
            reader.read_exact(px)?;
        }
        return Ok(());
    }

    let stated = BigEndian::read_u16(&first[2..]) as usize;
    if stated != width {
        return Err(IoError::invalid(format!("scanline width {stated}, expected {width}")));
    }

    for c in 0..4 {
        let mut x = 0;
        while x < width {
            let code = reader.read_u8()? as usize;
            if code > 128 {
                let n = code - 128;
                if x + n > width {
                    return Err(IoError::invalid("run overflows scanline"));
                }
                let v = reader.read_u8()?;
                out[x..x + n].iter_mut().for_each(|px| px[c] = v);
                x += n;
            } else {
                if code == 0 || x + code > width {
                    return Err(IoError::invalid("bad literal packet"));
                }
                for px in &mut out[x..x + code] {
                    px[c] = reader.read_u8()?;
                }
                x += code;
            }
        }
    }
    Ok(())
}

/// Appends the run-length packets of one channel to `out`.
fn pack_runs(data: &[u8], out: &mut Vec<u8>) {
    let run_at = |i: usize| {
        data[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&v| v == data[i])
            .count()
    };

    let mut i = 0;
    while i < data.len() {
        let mut start = i;
        let mut len = 0;
        while start < data.len() {
            len = run_at(start);
            if len >= MIN_RUN {
                break;
            }
            start += 1;
        }

        for literal in data[i..start].chunks(MAX_LITERAL) {
            out.push(literal.len() as u8);
            out.extend_from_slice(literal);
        }
        if start < data.len() {
            out.push((128 + len) as u8);
            out.push(data[start]);
            i = start + len;
        } else {
            i = start;
        }
    }
}

/// Decodes an HDR stream into linear radiance planes.
pub fn read_from<R: BufRead>(reader: &mut R) -> IoResult<RgbPlanes> {
    let header = Header::parse(reader)?;
    let (width, height) = (header.width, header.height);
    let mut planes = RgbPlanes::zeros(width, height)?;

    let inv_exposure = if header.exposure.is_finite() && header.exposure > 0.0 {
        1.0 / header.exposure
    } else {
        1.0
    };

    let mut scan = vec![[0u8; 4]; width];
    for y in 0..height {
        read_scanline(reader, &mut scan)?;
        for (x, px) in scan.iter().enumerate() {
            let [r, g, b] = decode_rgbe(*px);
            let i = y * width + x;
            planes.r[i] = r * inv_exposure;
            planes.g[i] = g * inv_exposure;
            planes.b[i] = b * inv_exposure;
        }
    }

    debug!(width, height, exposure = header.exposure, "Read HDR");
    Ok(planes)
}

/// Reads a Radiance HDR file.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<RgbPlanes> {
    let file = File::open(path)?;
    read_from(&mut BufReader::new(file))
}

/// Encodes planes as an HDR stream.
///
/// Negative and non-finite values are stored as zero.
pub fn write_to<W: Write>(writer: &mut W, planes: &RgbPlanes) -> IoResult<()> {
    let (width, height) = planes.dims();
    writeln!(writer, "{MAGIC}RADIANCE")?;
    writeln!(writer, "# datmo")?;
    writeln!(writer, "FORMAT={FORMAT_RGBE}")?;
    writeln!(writer)?;
    writeln!(writer, "-Y {height} +X {width}")?;

    let encode = RLE_WIDTHS.contains(&width);
    let mut scan = vec![[0u8; 4]; width];
    let mut channel = Vec::with_capacity(width);
    let mut packed = Vec::with_capacity(width * 2);

    for y in 0..height {
        for (x, px) in scan.iter_mut().enumerate() {
            let i = y * width + x;
            *px = encode_rgbe([planes.r[i], planes.g[i], planes.b[i]]);
        }

        if encode {
            let mut marker = [2u8, 2, 0, 0];
            BigEndian::write_u16(&mut marker[2..], width as u16);
            writer.write_all(&marker)?;
            for c in 0..4 {
                channel.clear();
                channel.extend(scan.iter().map(|px| px[c]));
                packed.clear();
                pack_runs(&channel, &mut packed);
                writer.write_all(&packed)?;
            }
        } else {
            for px in &scan {
                writer.write_all(px)?;
            }
        }
    }
    Ok(())
}

/// Writes a Radiance HDR file.
pub fn write<P: AsRef<Path>>(path: P, planes: &RgbPlanes) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(&mut writer, planes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn roundtrip(planes: &RgbPlanes) -> RgbPlanes {
        let mut bytes = Vec::new();
        write_to(&mut bytes, planes).unwrap();
        read_from(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_resolution_line() {
        assert_eq!(parse_resolution("-Y 2 +X 3").unwrap(), (3, 2));
        assert!(matches!(parse_resolution("+X 4 -Y 5"), Err(IoError::UnsupportedFormat(_))));
        assert!(parse_resolution("-Y 0 +X 5").is_err());
        assert!(parse_resolution("-Y 2").is_err());
    }

    #[test]
    fn test_rejects_oversized_extent() {
        assert!(parse_resolution("-Y 4611686018427387904 +X 4611686018427387904").is_err());
        let huge = b"#?RADIANCE\n\n-Y 1 +X 4611686018427387904\n".to_vec();
        assert!(matches!(read_from(&mut Cursor::new(huge)), Err(IoError::InvalidFile(_))));
    }

    #[test]
    fn test_rgbe_precision() {
        for v in [1e-3f32, 0.37, 1.0, 100.0, 54321.0] {
            let [r, g, b] = decode_rgbe(encode_rgbe([v, v, v]));
            assert_relative_eq!(r, v, max_relative = 1.0 / 128.0);
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
        assert_eq!(encode_rgbe([0.0, -1.0, f32::NAN]), [0; 4]);
        assert_eq!(decode_rgbe([0, 0, 0, 0]), [0.0; 3]);
    }

    #[test]
    fn test_roundtrip_rle() {
        let planes = RgbPlanes::from_interleaved(
            16,
            2,
            &(0..16 * 2)
                .flat_map(|i| {
                    let v = if i % 5 == 0 { 3.0 } else { 0.25 + i as f32 };
                    [v, v * 0.5, v * 0.25]
                })
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let back = roundtrip(&planes);
        assert_eq!(back.dims(), (16, 2));
        for (a, b) in planes.r.iter().zip(&back.r) {
            assert_relative_eq!(a, b, max_relative = 1.0 / 128.0);
        }
    }

    #[test]
    fn test_roundtrip_flat_narrow() {
        let planes = RgbPlanes::filled(3, 2, [10.0, 5.0, 2.5]).unwrap();
        let back = roundtrip(&planes);
        assert_eq!(back.dims(), (3, 2));
        assert_relative_eq!(back.r[4], 10.0, max_relative = 1.0 / 128.0);
        assert_relative_eq!(back.b[4], 2.5, max_relative = 1.0 / 64.0);
    }

    #[test]
    fn test_pack_runs_decodes() {
        let mut data: Vec<u8> = (0..40).collect();
        data.extend(std::iter::repeat_n(7, 300));
        data.extend([1, 2, 2, 2, 3]);
        let width = data.len();

        let mut packed = vec![2u8, 2, (width >> 8) as u8, (width & 0xff) as u8];
        for _ in 0..4 {
            pack_runs(&data, &mut packed);
        }
        let mut scan = vec![[0u8; 4]; width];
        read_scanline(&mut Cursor::new(packed), &mut scan).unwrap();
        for c in 0..4 {
            assert!(scan.iter().map(|px| px[c]).eq(data.iter().copied()));
        }
    }

    #[test]
    fn test_exposure_applied() {
        let mut bytes = b"#?RADIANCE\nEXPOSURE=2\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 1\n".to_vec();
        bytes.extend_from_slice(&encode_rgbe([4.0, 4.0, 4.0]));
        let back = read_from(&mut Cursor::new(bytes)).unwrap();
        assert_relative_eq!(back.r[0], 2.0, max_relative = 1.0 / 128.0);
    }

    #[test]
    fn test_rejects_bad_streams() {
        assert!(read_from(&mut Cursor::new(b"P6\n".to_vec())).is_err());
        assert!(matches!(
            read_from(&mut Cursor::new(
                b"#?RADIANCE\nFORMAT=32-bit_rle_xyze\n\n-Y 1 +X 1\n".to_vec()
            )),
            Err(IoError::UnsupportedFormat(_))
        ));
        // Truncated pixel data
        let truncated = b"#?RADIANCE\n\n-Y 2 +X 2\n\x01\x02".to_vec();
        let err = read_from(&mut Cursor::new(truncated)).unwrap_err();
        assert!(matches!(err, IoError::Io(_)));
    }
}
