//! Wire types exchanged with the attendance service.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Which remote check an image is submitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationKind {
    Face,
    Id,
}

impl VerificationKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Face => "/api/face-recognition",
            Self::Id => "/api/id-card-ocr",
        }
    }

    /// File name of the uploaded multipart part.
    pub fn upload_name(self) -> &'static str {
        match self {
            Self::Face => "frame.jpg",
            Self::Id => "idcard.jpg",
        }
    }

    pub fn not_recognized(self) -> &'static str {
        match self {
            Self::Face => "Face not recognized",
            Self::Id => "ID card not recognized",
        }
    }
}

impl std::fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Face => f.write_str("face"),
            Self::Id => f.write_str("id"),
        }
    }
}

/// Common surface of the per-kind verification results.
pub trait VerificationReply: DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: VerificationKind;

    /// A locally built negative result.
    fn failure(message: impl Into<String>) -> Self;

    fn is_success(&self) -> bool;

    fn message(&self) -> &str;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceVerificationResult {
    pub success: bool,
    #[serde(default)]
    pub name: Option<String>,
    /// Match confidence, 0-100.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub message: String,
}

impl VerificationReply for FaceVerificationResult {
    const KIND: VerificationKind = VerificationKind::Face;

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    fn is_success(&self) -> bool {
        self.success
    }

    fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedIdCard {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdVerificationResult {
    pub success: bool,
    #[serde(default, rename = "text")]
    pub raw_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parsed: ParsedIdCard,
    #[serde(default)]
    pub message: String,
}

impl VerificationReply for IdVerificationResult {
    const KIND: VerificationKind = VerificationKind::Id;

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    fn is_success(&self) -> bool {
        self.success
    }

    fn message(&self) -> &str {
        &self.message
    }
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

pub const UNKNOWN_STUDENT: &str = "Unknown";

/// Body of `POST /api/attendance/record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSubmission {
    pub student_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_number: Option<String>,
    pub verified: bool,
}

impl AttendanceSubmission {
    /// `verified` holds only when both checks succeeded; a missing face
    /// result records the student as `Unknown`.
    pub fn derive(face: Option<&FaceVerificationResult>, id: &IdVerificationResult) -> Self {
        let student_name = face
            .and_then(|f| f.name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_STUDENT)
            .to_string();
        Self {
            student_name,
            face_confidence: face.and_then(|f| f.confidence),
            id_card_text: id.raw_text.clone(),
            id_card_name: id.parsed.name.clone(),
            id_card_number: id.parsed.id_number.clone(),
            verified: face.is_some_and(|f| f.success) && id.success,
        }
    }
}

/// Acknowledgement of a recorded attendance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total_students: u32,
    pub on_time_percentage: f64,
    pub on_time_today: u32,
    pub late_today: u32,
    pub present_today: u32,
}

/// Shown on the dashboard until the service answers.
pub const DEFAULT_STATS: AttendanceStats = AttendanceStats {
    total_students: 120,
    on_time_percentage: 92.0,
    on_time_today: 110,
    late_today: 10,
    present_today: 110,
};

impl Default for AttendanceStats {
    fn default() -> Self {
        DEFAULT_STATS
    }
}

/// A stored attendance row as listed by `GET /api/attendance/records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default)]
    pub id: String,
    pub student_name: String,
    #[serde(default)]
    pub face_match_confidence: Option<f64>,
    #[serde(default)]
    pub id_card_name: Option<String>,
    #[serde(default)]
    pub id_card_number: Option<String>,
    pub verified: bool,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub records: Vec<StoredRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Banner {
    pub message: String,
}

/// Error body the service sends with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: String,
}
