pub mod capture;
pub mod device;
pub mod error;
pub mod session;
pub mod video;

// Re-export commonly used types
pub use capture::{EncodedImage, FrameCapturer};
pub use device::{CaptureDevice, Constraints, DeviceProvider};
pub use error::{CaptureError, DeviceError};
pub use session::{CameraSessionManager, CaptureSession, SessionCounters};
pub use video::V4lProvider;
