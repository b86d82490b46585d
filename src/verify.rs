//! Verification client: one instance per [`VerificationKind`].

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use rollcall_camera::EncodedImage;

use crate::api::{FaceVerificationResult, IdVerificationResult, VerificationKind, VerificationReply};
use crate::error::ServiceError;
use crate::service::{read_json, ServiceClient};

/// Submits a captured image for one kind of check.
///
/// Never fails: transport and service faults come back as a negative result
/// carrying a human-readable message.
#[async_trait]
pub trait Verify<R: VerificationReply>: Send + Sync {
    async fn verify(&self, image: EncodedImage) -> R;
}

pub type FaceVerifier = dyn Verify<FaceVerificationResult>;
pub type IdVerifier = dyn Verify<IdVerificationResult>;

pub struct VerificationClient<R> {
    service: ServiceClient,
    _reply: PhantomData<fn() -> R>,
}

impl<R: VerificationReply> VerificationClient<R> {
    pub fn new(service: ServiceClient) -> Self {
        Self {
            service,
            _reply: PhantomData,
        }
    }

    /// Upload without folding errors into a result.
    pub async fn submit(&self, image: EncodedImage) -> Result<R, ServiceError> {
        let kind = R::KIND;
        let part = Part::bytes(image.bytes)
            .file_name(kind.upload_name())
            .mime_str(EncodedImage::MIME)?;
        let form = Form::new().part("file", part);

        let resp = self
            .service
            .http()
            .post(self.service.url(kind.endpoint()))
            .multipart(form)
            .send()
            .await?;
        read_json(resp).await
    }
}

#[async_trait]
impl<R: VerificationReply> Verify<R> for VerificationClient<R> {
    async fn verify(&self, image: EncodedImage) -> R {
        let kind = R::KIND;
        log::info!(
            "submitting {}x{} image for {} verification",
            image.width,
            image.height,
            kind
        );
        match self.submit(image).await {
            Ok(reply) => {
                if reply.is_success() {
                    log::info!("{} verification passed: {}", kind, reply.message());
                } else {
                    log::warn!("{} verification rejected: {}", kind, reply.message());
                }
                reply
            }
            Err(err) => {
                log::warn!("{} verification failed: {}", kind, err);
                R::failure(fault_message(kind, &err))
            }
        }
    }
}

fn fault_message(kind: VerificationKind, err: &ServiceError) -> String {
    match (kind, err) {
        (VerificationKind::Face, _) => format!("Error processing image: {err}"),
        (VerificationKind::Id, ServiceError::Status { detail, .. }) => {
            format!("Error processing ID card ({detail}). Please try again.")
        }
        (VerificationKind::Id, _) => "Error processing ID card. Please try again.".to_string(),
    }
}

impl ServiceClient {
    pub fn face_verifier(&self) -> VerificationClient<FaceVerificationResult> {
        VerificationClient::new(self.clone())
    }

    pub fn id_verifier(&self) -> VerificationClient<IdVerificationResult> {
        VerificationClient::new(self.clone())
    }
}
