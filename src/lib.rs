pub mod api;
pub mod attendance;
pub mod config;
pub mod error;
pub mod kiosk;
pub mod service;
pub mod verify;
pub mod workflow;

// Re-export camera types for convenience
pub use rollcall_camera::{
    CameraSessionManager, CaptureSession, Constraints, EncodedImage, FrameCapturer, V4lProvider,
};

pub use attendance::AttendanceRecorder;
pub use error::{ServiceError, WorkflowError};
pub use service::ServiceClient;
pub use workflow::{Collaborators, Step, Transition, WorkflowController, WorkflowState};
