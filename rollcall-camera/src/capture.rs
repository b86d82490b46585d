use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::CaptureError;
use crate::session::{lock_device, CaptureSession};

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// A compressed still, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub const MIME: &'static str = "image/jpeg";
}

/// Snapshots the live stream of a session into a JPEG.
#[derive(Debug, Clone, Copy)]
pub struct FrameCapturer {
    quality: u8,
}

impl Default for FrameCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCapturer {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Grab the current frame and encode it off the async thread.
    ///
    /// Dimensions are read from the stream at call time; a stream that has
    /// none yet yields [`CaptureError::NotReady`].
    pub async fn capture(&self, session: &CaptureSession) -> Result<EncodedImage, CaptureError> {
        let device = session.device().ok_or(CaptureError::NoSession)?;
        let quality = self.quality;
        tokio::task::spawn_blocking(move || {
            let frame = {
                let mut device = lock_device(&device);
                match device.dimensions() {
                    Some((w, h)) if w > 0 && h > 0 => {}
                    _ => return Err(CaptureError::NotReady),
                }
                device.grab()?
            };
            encode_jpeg(&frame, quality)
        })
        .await
        .map_err(|e| CaptureError::Join(e.to_string()))?
    }
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<EncodedImage, CaptureError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CaptureError::NotReady);
    }
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(frame)?;
    log::debug!(
        "encoded {}x{} frame into {} bytes",
        frame.width(),
        frame.height(),
        bytes.len()
    );
    Ok(EncodedImage {
        bytes,
        width: frame.width(),
        height: frame.height(),
    })
}
