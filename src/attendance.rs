//! Attendance recording and dashboard statistics.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{
    Ack, AttendanceStats, AttendanceSubmission, Banner, FaceVerificationResult,
    IdVerificationResult, RecordList,
};
use crate::error::ServiceError;
use crate::service::{read_json, ServiceClient};

/// Where attendance submissions go.
#[async_trait]
pub trait AttendanceSink: Send + Sync {
    async fn submit(&self, submission: &AttendanceSubmission) -> Result<Ack, ServiceError>;
}

/// Where dashboard numbers come from.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch_stats(&self) -> Result<AttendanceStats, ServiceError>;
}

#[async_trait]
impl AttendanceSink for ServiceClient {
    async fn submit(&self, submission: &AttendanceSubmission) -> Result<Ack, ServiceError> {
        let resp = self
            .http()
            .post(self.url("/api/attendance/record"))
            .json(submission)
            .send()
            .await?;
        read_json(resp).await
    }
}

#[async_trait]
impl StatsSource for ServiceClient {
    async fn fetch_stats(&self) -> Result<AttendanceStats, ServiceError> {
        let resp = self
            .http()
            .get(self.url("/api/attendance/stats"))
            .send()
            .await?;
        read_json(resp).await
    }
}

impl ServiceClient {
    pub async fn records(&self) -> Result<RecordList, ServiceError> {
        let resp = self
            .http()
            .get(self.url("/api/attendance/records"))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn banner(&self) -> Result<Banner, ServiceError> {
        let resp = self.http().get(self.url("/api/")).send().await?;
        read_json(resp).await
    }
}

/// Merges a face and an ID result into one submission and sends it once.
#[derive(Clone)]
pub struct AttendanceRecorder {
    sink: Arc<dyn AttendanceSink>,
}

impl AttendanceRecorder {
    pub fn new(sink: Arc<dyn AttendanceSink>) -> Self {
        Self { sink }
    }

    pub async fn record(
        &self,
        face: Option<&FaceVerificationResult>,
        id: &IdVerificationResult,
    ) -> Result<Ack, ServiceError> {
        let submission = AttendanceSubmission::derive(face, id);
        log::info!(
            "recording attendance for {} (verified={})",
            submission.student_name,
            submission.verified
        );
        self.sink.submit(&submission).await
    }
}
