//! Portable float map (PFM) reading and writing.
//!
//! ## Layout
//!
//! ```text
//! PF | Pf          identifier: PF = 3 channels, Pf = 1 channel
//! <w> <h>          dimensions, both positive
//! <scale>          scale/endianness line, read but ignored
//! <payload>        w * h * c native-endian f32, row-major (row, column, channel)
//! ```
//!
//! Rows are stored top to bottom on both load and save. Many external
//! tools expect bottom-to-top storage; use [`Raster::flip_vertical`] when
//! exchanging files with them.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::raster::{Channels, Raster, sample_count};

const COLOR_IDENTIFIER: &str = "PF";
const SCALAR_IDENTIFIER: &str = "Pf";
const SCALE_LINE: &[u8] = b"1\n";
const MAX_HEADER_LINE: usize = 256;
const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Load a PFM file.
pub fn load(path: impl AsRef<Path>) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::format(path, format!("cannot open: {e}")))?;
    read(BufReader::new(file), path)
}

/// Decode a PFM stream. `origin` names the source in errors and on the raster.
pub fn read<R: BufRead>(mut reader: R, origin: &Path) -> Result<Raster> {
    let identifier = read_header_line(&mut reader, origin, "identifier")?;
    let channels = match identifier.as_str() {
        COLOR_IDENTIFIER => Channels::Color,
        SCALAR_IDENTIFIER => Channels::Scalar,
        other => {
            return Err(Error::format(
                origin,
                format!("unrecognized identifier line [{other}]"),
            ));
        }
    };

    let dimensions = read_header_line(&mut reader, origin, "dimensions")?;
    let (width, height) = parse_dimensions(&dimensions)
        .ok_or_else(|| Error::format(origin, format!("bad dimensions line [{dimensions}]")))?;

    // The scale/endianness value is not interpreted, but the line must exist.
    read_header_line(&mut reader, origin, "scale")?;

    let expected_bytes = sample_count(&[width, height, channels.count(), F32_BYTES])
        .ok_or_else(|| Error::format(origin, format!("dimensions overflow: {width}x{height}")))?;

    // The buffer only grows with bytes actually present in the stream.
    let mut payload = Vec::new();
    reader
        .take(expected_bytes as u64)
        .read_to_end(&mut payload)
        .map_err(|e| Error::format(origin, format!("payload read failed: {e}")))?;
    if payload.len() != expected_bytes {
        return Err(Error::format(
            origin,
            format!(
                "truncated payload: expected {expected_bytes} bytes for {width}x{height}x{}, got {}",
                channels.count(),
                payload.len()
            ),
        ));
    }
    let data: Vec<f32> = payload
        .chunks_exact(F32_BYTES)
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect();

    Raster::new(width, height, channels, data, origin.display().to_string())
}

/// Write a raster to a PFM file.
pub fn save(path: impl AsRef<Path>, raster: &Raster) -> Result<()> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "writing PFM");
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer, raster)?;
    writer.flush()?;
    Ok(())
}

/// Encode a raster as PFM.
pub fn write<W: Write>(writer: &mut W, raster: &Raster) -> Result<()> {
    let identifier = match raster.channels() {
        Channels::Color => COLOR_IDENTIFIER,
        Channels::Scalar => SCALAR_IDENTIFIER,
    };
    writeln!(writer, "{identifier}")?;
    writeln!(writer, "{} {}", raster.width(), raster.height())?;
    writer.write_all(SCALE_LINE)?;
    writer.write_all(bytemuck::cast_slice(raster.data()))?;
    Ok(())
}

fn read_header_line<R: BufRead>(reader: &mut R, origin: &Path, what: &str) -> Result<String> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_HEADER_LINE as u64)
        .read_until(b'\n', &mut buf)?;
    if read == 0 || buf.last() != Some(&b'\n') {
        return Err(Error::format(
            origin,
            format!("unexpected end of header while reading {what} line"),
        ));
    }
    let line = std::str::from_utf8(&buf)
        .map_err(|_| Error::format(origin, format!("{what} line is not valid text")))?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

fn parse_dimensions(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace();
    let width: usize = parts.next()?.parse().ok()?;
    let height: usize = parts.next()?.parse().ok()?;
    if parts.next().is_some() || width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
