use image::RgbImage;

use crate::error::{CaptureError, DeviceError};

/// Requested stream shape. The device may negotiate something else; captured
/// frames always carry the size the stream actually delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Constraints {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }
}

/// An opened video stream.
pub trait CaptureDevice: Send {
    /// Frame size reported by the live stream, `None` while it has none.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Pull the next frame as RGB.
    fn grab(&mut self) -> Result<RgbImage, CaptureError>;

    /// Stop streaming and let go of the hardware. Called at most once.
    fn stop(&mut self);
}

/// Opens capture devices.
pub trait DeviceProvider: Send + Sync {
    fn open(&self, constraints: &Constraints) -> Result<Box<dyn CaptureDevice>, DeviceError>;
}
