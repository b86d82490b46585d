use thiserror::Error;

/// Failure to obtain a capture device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no capture device available at {0}")]
    Unavailable(String),

    #[error("permission denied opening {0}")]
    PermissionDenied(String),

    #[error("device {device} does not offer a usable pixel format ({fourcc})")]
    UnsupportedFormat { device: String, fourcc: String },

    #[error("device i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("device open task failed: {0}")]
    Join(String),
}

impl DeviceError {
    /// Classify an open() failure the way the OS reported it.
    pub fn from_open(device: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Unavailable(device.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(device.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Failure to turn the live stream into a still image.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no active capture session")]
    NoSession,

    #[error("video stream has not produced a frame yet")]
    NotReady,

    #[error("frame grab failed: {0}")]
    Grab(String),

    #[error("jpeg encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("capture task failed: {0}")]
    Join(String),
}
