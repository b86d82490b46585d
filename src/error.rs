use rollcall_camera::{CaptureError, DeviceError};
use thiserror::Error;

use crate::workflow::Step;

/// Failure talking to the attendance service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("service answered {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cannot {action} while on {step}")]
    InvalidTransition { action: &'static str, step: Step },

    #[error("a verification is already in progress")]
    Busy,

    #[error("camera is not open")]
    NoSession,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
