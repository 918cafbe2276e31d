//! Streaming inference server.
//!
//! A strictly sequential request/response loop over two byte streams
//! (typically stdin/stdout of a renderer subprocess). Each iteration reads
//! one fixed-size request frame, produces one prediction and writes one
//! response frame before the next read. See [`frame`] for the wire layout.
//!
//! Any framing failure is fatal: [`InferenceServer::run`] returns the error
//! and the caller is expected to terminate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use iispt::serve::{InferenceServer, ServeConfig, ServeMode};
//!
//! let config = ServeConfig::default().mode(ServeMode::GaussianBlur);
//! let mut server = InferenceServer::new(config, iispt::serve::Passthrough)?;
//! let err = server.run(&mut std::io::stdin().lock(), &mut std::io::stdout().lock());
//! ```

pub mod frame;

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use frame::{FrameLayout, Request, SENTINEL, read_request, write_response};

use crate::error::{Error, Result};
use crate::metrics::gaussian_blur;
use crate::raster::{Raster, Tensor};

/// Default tile side in pixels.
pub const DEFAULT_RESOLUTION: usize = 32;

/// Default blur standard deviation for [`ServeMode::GaussianBlur`].
pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

/// External inference capability.
///
/// Takes the 7-channel channel-first network input and returns a 3-channel
/// channel-first prediction of the same spatial size.
pub trait Inference {
    /// Run one prediction.
    fn infer(&mut self, input: &Tensor) -> Result<Tensor>;
}

impl<F> Inference for F
where
    F: FnMut(&Tensor) -> Result<Tensor>,
{
    fn infer(&mut self, input: &Tensor) -> Result<Tensor> {
        self(input)
    }
}

/// Run `inference` on a normalized network input and map the prediction
/// back to radiance with [`Raster::intensity_upstream`].
///
/// The prediction must have 3 channels and the spatial size of `input`.
pub fn infer_radiance<I: Inference + ?Sized>(
    inference: &mut I,
    input: &Tensor,
    mean: f32,
) -> Result<Raster> {
    let (_, height, width) = input.shape();
    let output = inference.infer(input)?;
    if output.shape() != (3, height, width) {
        return Err(Error::Inference(format!(
            "expected a 3x{height}x{width} prediction, got {:?}",
            output.shape()
        )));
    }
    let mut prediction = Raster::from_channel_first(&output)?;
    prediction.intensity_upstream(mean);
    Ok(prediction)
}

/// Returns the first three input channels (the normalized intensity).
///
/// Useful for protocol checks: the served prediction is the request
/// intensity after a downstream/upstream round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Inference for Passthrough {
    fn infer(&mut self, input: &Tensor) -> Result<Tensor> {
        let (_, height, width) = input.shape();
        let data = (0..3).flat_map(|c| input.plane(c).iter().copied()).collect();
        Tensor::new(3, height, width, data)
    }
}

/// How predictions are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServeMode {
    /// Normalize, run the inference capability, denormalize.
    #[default]
    Inference,
    /// Blur the raw intensity; normals and distance are ignored.
    GaussianBlur,
}

impl fmt::Display for ServeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inference => write!(f, "inference"),
            Self::GaussianBlur => write!(f, "blur"),
        }
    }
}

impl FromStr for ServeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inference" => Ok(Self::Inference),
            "blur" | "gaussian-blur" => Ok(Self::GaussianBlur),
            other => Err(format!("unknown serve mode '{other}' (expected inference or blur)")),
        }
    }
}

/// Process-wide server settings, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServeConfig {
    /// Tile side in pixels, shared with the client out of band.
    pub resolution: usize,
    /// Prediction mode.
    pub mode: ServeMode,
    /// Standard deviation for [`ServeMode::GaussianBlur`].
    pub blur_sigma: f32,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            mode: ServeMode::default(),
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

impl ServeConfig {
    /// Set the tile resolution.
    #[must_use]
    pub fn resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the prediction mode.
    #[must_use]
    pub fn mode(mut self, mode: ServeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the blur standard deviation.
    #[must_use]
    pub fn blur_sigma(mut self, sigma: f32) -> Self {
        self.blur_sigma = sigma;
        self
    }
}

/// The request/response loop.
pub struct InferenceServer<I> {
    config: ServeConfig,
    layout: FrameLayout,
    inference: I,
    frames: u64,
}

impl<I: Inference> InferenceServer<I> {
    /// Create a server. Fails if the resolution is zero.
    pub fn new(config: ServeConfig, inference: I) -> Result<Self> {
        Ok(Self {
            layout: FrameLayout::new(config.resolution)?,
            config,
            inference,
            frames: 0,
        })
    }

    /// Frame sizes in use.
    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Number of frames answered so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Serve frames until the inbound stream fails or closes.
    ///
    /// Only returns on error; a closed stream is
    /// [`ProtocolError::StreamClosed`](crate::error::ProtocolError::StreamClosed).
    pub fn run<R: Read, W: Write>(&mut self, reader: &mut R, writer: &mut W) -> Result<()> {
        tracing::info!(
            resolution = self.config.resolution,
            mode = %self.config.mode,
            request_bytes = self.layout.request_bytes(),
            "inference server ready"
        );
        loop {
            self.serve_frame(reader, writer)?;
        }
    }

    /// Answer exactly one request.
    ///
    /// Nothing is written unless a full request was read and a prediction
    /// was produced.
    pub fn serve_frame<R: Read, W: Write>(&mut self, reader: &mut R, writer: &mut W) -> Result<()> {
        let request = read_request(reader, self.layout)?;
        let prediction = self.predict(request)?;
        write_response(writer, self.layout, &prediction)?;
        self.frames += 1;
        tracing::debug!(frame = self.frames, "response written");
        Ok(())
    }

    /// Produce the prediction for one request.
    pub fn predict(&mut self, request: Request) -> Result<Raster> {
        match self.config.mode {
            ServeMode::GaussianBlur => Ok(gaussian_blur(&request.intensity, self.config.blur_sigma)),
            ServeMode::Inference => {
                let Request {
                    mut intensity,
                    mut normals,
                    mut distance,
                } = request;
                let mean = intensity.intensity_downstream_full();
                normals.normalize_normals();
                distance.distance_downstream();

                let input = Tensor::concat(&[&intensity, &normals, &distance])?;
                infer_radiance(&mut self.inference, &input, mean)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::ProtocolError;

    fn request_bytes(layout: FrameLayout, intensity: f32) -> Vec<u8> {
        let p = layout.pixels();
        let mut samples = vec![intensity; p * 3];
        samples.extend(std::iter::repeat_n(0.5f32, p * 3));
        samples.extend(std::iter::repeat_n(2.0f32, p));
        bytemuck::cast_slice(&samples).to_vec()
    }

    fn decode_floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("blur".parse::<ServeMode>().unwrap(), ServeMode::GaussianBlur);
        assert_eq!("Inference".parse::<ServeMode>().unwrap(), ServeMode::Inference);
        assert!("onnx".parse::<ServeMode>().is_err());
        assert_eq!(ServeMode::GaussianBlur.to_string(), "blur");
    }

    #[test]
    fn test_passthrough_roundtrip_restores_intensity() {
        let config = ServeConfig::default().resolution(4);
        let mut server = InferenceServer::new(config, Passthrough).unwrap();
        let layout = server.layout();
        let mut input = Cursor::new(request_bytes(layout, 3.0));
        let mut output = Vec::new();
        server.serve_frame(&mut input, &mut output).unwrap();

        assert_eq!(output.len(), layout.response_bytes());
        let floats = decode_floats(&output[..output.len() - 2]);
        for v in &floats {
            assert!((v - 3.0).abs() < 1e-3, "{v}");
        }
        assert_eq!(server.frames(), 1);
    }

    #[test]
    fn test_inference_receives_seven_channels() {
        let config = ServeConfig::default().resolution(2);
        let mut seen = None;
        let mut server = InferenceServer::new(config, |input: &Tensor| {
            seen = Some(input.shape());
            Passthrough.infer(input)
        })
        .unwrap();
        let layout = server.layout();
        server
            .serve_frame(&mut Cursor::new(request_bytes(layout, 1.0)), &mut Vec::new())
            .unwrap();
        drop(server);
        assert_eq!(seen, Some((7, 2, 2)));
    }

    #[test]
    fn test_wrong_prediction_shape_is_error() {
        let config = ServeConfig::default().resolution(2);
        let mut server = InferenceServer::new(config, |_: &Tensor| Tensor::new(1, 2, 2, vec![0.0; 4]))
            .unwrap();
        let layout = server.layout();
        let mut output = Vec::new();
        let err = server
            .serve_frame(&mut Cursor::new(request_bytes(layout, 1.0)), &mut output)
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert!(output.is_empty());
    }

    #[test]
    fn test_blur_mode_ignores_other_rasters() {
        let config = ServeConfig::default().resolution(3).mode(ServeMode::GaussianBlur);
        let mut server = InferenceServer::new(config, |_: &Tensor| -> Result<Tensor> {
            Err(Error::Inference("must not be called".to_string()))
        })
        .unwrap();
        let layout = server.layout();
        let mut output = Vec::new();
        server
            .serve_frame(&mut Cursor::new(request_bytes(layout, 0.25)), &mut output)
            .unwrap();
        let floats = decode_floats(&output[..output.len() - 2]);
        assert!(floats.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_run_stops_on_closed_stream() {
        let config = ServeConfig::default().resolution(2);
        let mut server = InferenceServer::new(config, Passthrough).unwrap();
        let layout = server.layout();
        let mut bytes = request_bytes(layout, 1.0);
        bytes.extend(request_bytes(layout, 2.0));
        let mut output = Vec::new();
        let err = server.run(&mut Cursor::new(bytes), &mut output).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::StreamClosed)));
        assert_eq!(server.frames(), 2);
        assert_eq!(output.len(), 2 * layout.response_bytes());
    }
}
