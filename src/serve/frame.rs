//! Fixed-size binary frames of the streaming protocol.
//!
//! ```text
//! request   intensity R*R*3 f32 | normals R*R*3 f32 | distance R*R*1 f32
//! response  prediction R*R*3 f32 | 'x' '\n'
//! ```
//!
//! Rasters are row-major `(row, column, channel)`, native-endian, with no
//! header or length prefix. `R` is agreed out of band.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, ProtocolError, Result};
use crate::raster::{Channels, Raster};

/// End-of-frame marker written after every response.
pub const SENTINEL: &[u8; 2] = b"x\n";

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Byte sizes of the frames for a tile resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    resolution: usize,
}

impl FrameLayout {
    /// Layout for `resolution x resolution` tiles.
    pub fn new(resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidShape(
                "tile resolution must be positive".to_string(),
            ));
        }
        if crate::raster::sample_count(&[resolution, resolution, 7, F32_BYTES]).is_none() {
            return Err(Error::InvalidShape(format!(
                "tile resolution {resolution} overflows the frame size"
            )));
        }
        Ok(Self { resolution })
    }

    /// Tile side in pixels.
    #[must_use]
    pub fn resolution(self) -> usize {
        self.resolution
    }

    /// Pixels per tile.
    #[must_use]
    pub fn pixels(self) -> usize {
        self.resolution * self.resolution
    }

    /// Request size: 7 floats per pixel.
    #[must_use]
    pub fn request_bytes(self) -> usize {
        self.pixels() * 7 * F32_BYTES
    }

    /// Response size including the sentinel.
    #[must_use]
    pub fn response_bytes(self) -> usize {
        self.pixels() * 3 * F32_BYTES + SENTINEL.len()
    }
}

/// One decoded request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Radiance estimate (3 channels).
    pub intensity: Raster,
    /// Surface normals (3 channels).
    pub normals: Raster,
    /// Distance (1 channel).
    pub distance: Raster,
}

/// Read exactly one request frame.
///
/// Zero bytes before end of stream is [`ProtocolError::StreamClosed`];
/// anything between zero and the frame size is [`ProtocolError::ShortRead`].
pub fn read_request<R: Read>(reader: &mut R, layout: FrameLayout) -> Result<Request> {
    let mut samples = vec![0.0f32; layout.pixels() * 7];
    read_frame(reader, bytemuck::cast_slice_mut(&mut samples))?;

    let r = layout.resolution();
    let mut normals = samples.split_off(layout.pixels() * 3);
    let distance = normals.split_off(layout.pixels() * 3);
    Ok(Request {
        intensity: Raster::new(r, r, Channels::Color, samples, "request:intensity")?,
        normals: Raster::new(r, r, Channels::Color, normals, "request:normals")?,
        distance: Raster::new(r, r, Channels::Scalar, distance, "request:distance")?,
    })
}

fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        n if n == buf.len() => Ok(()),
        0 => Err(ProtocolError::StreamClosed.into()),
        received => Err(ProtocolError::ShortRead {
            expected: buf.len(),
            received,
        }
        .into()),
    }
}

/// Write one response frame and flush.
///
/// The prediction must be a `resolution x resolution` color raster.
pub fn write_response<W: Write>(writer: &mut W, layout: FrameLayout, prediction: &Raster) -> Result<()> {
    let r = layout.resolution();
    let expected = (r, r, 3);
    if prediction.shape() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: prediction.shape(),
        });
    }
    writer.write_all(bytemuck::cast_slice(prediction.data()))?;
    writer.write_all(SENTINEL)?;
    writer.flush()?;
    Ok(())
}
