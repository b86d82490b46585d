//! Talks to an in-process stand-in for the attendance service.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rollcall::api::{
    AttendanceSubmission, FaceVerificationResult, IdVerificationResult, VerificationReply,
    DEFAULT_STATS,
};
use rollcall::attendance::{AttendanceSink, StatsSource};
use rollcall::verify::Verify;
use rollcall::{AttendanceRecorder, EncodedImage, ServiceClient, ServiceError};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
struct Upload {
    field: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

#[derive(Clone, Default)]
struct Seen {
    uploads: Arc<Mutex<Vec<Upload>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn collect_uploads(seen: &Seen, mut multipart: Multipart) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let upload = Upload {
            field: field.name().map(str::to_owned),
            file_name: field.file_name().map(str::to_owned),
            content_type: field.content_type().map(str::to_owned),
            len: 0,
        };
        let len = field.bytes().await.unwrap().len();
        seen.uploads.lock().unwrap().push(Upload { len, ..upload });
    }
}

async fn face_ok(State(seen): State<Seen>, multipart: Multipart) -> Json<Value> {
    collect_uploads(&seen, multipart).await;
    Json(json!({
        "success": true,
        "name": "Alice",
        "confidence": 97,
        "message": "✅ Face recognized: Alice"
    }))
}

async fn id_ok(State(seen): State<Seen>, multipart: Multipart) -> Json<Value> {
    collect_uploads(&seen, multipart).await;
    Json(json!({
        "success": true,
        "text": "STUDENT ID\nAlice\nX123",
        "parsed": { "name": "Alice", "id_number": "X123" },
        "message": "ID card processed"
    }))
}

async fn boom() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "model not loaded" })),
    )
}

async fn garbage() -> &'static str {
    "<html>proxy error</html>"
}

async fn record(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.bodies.lock().unwrap().push(body.clone());
    Json(json!({ "success": true, "record": body }))
}

async fn stats() -> Json<Value> {
    Json(json!({
        "total_students": 120,
        "on_time_percentage": 2.5,
        "on_time_today": 3,
        "late_today": 1,
        "present_today": 4
    }))
}

async fn records() -> Json<Value> {
    Json(json!({
        "success": true,
        "count": 1,
        "records": [{
            "id": "5f2b7c1e-0000-4000-8000-000000000001",
            "student_name": "Alice",
            "face_match_confidence": 97.0,
            "id_card_text": "STUDENT ID",
            "id_card_name": "Alice",
            "id_card_number": "X123",
            "verified": true,
            "timestamp": "2026-10-19T08:01:02+00:00"
        }]
    }))
}

async fn banner() -> Json<Value> {
    Json(json!({ "message": "🤖 Student Attendance System API" }))
}

async fn serve(app: Router) -> Result<ServiceClient> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok(ServiceClient::new(&format!("http://{addr}/"), None)?)
}

fn happy_service(seen: Seen) -> Router {
    Router::new()
        .route("/api/", get(banner))
        .route("/api/face-recognition", post(face_ok))
        .route("/api/id-card-ocr", post(id_ok))
        .route("/api/attendance/record", post(record))
        .route("/api/attendance/stats", get(stats))
        .route("/api/attendance/records", get(records))
        .with_state(seen)
}

fn jpeg() -> EncodedImage {
    EncodedImage {
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, 0xFF, 0xD9],
        width: 2,
        height: 2,
    }
}

#[tokio::test]
async fn face_image_is_uploaded_as_single_jpeg_part() -> Result<()> {
    let seen = Seen::default();
    let client = serve(happy_service(seen.clone())).await?;

    let result = client.face_verifier().verify(jpeg()).await;

    assert_eq!(
        result,
        FaceVerificationResult {
            success: true,
            name: Some("Alice".into()),
            confidence: Some(97.0),
            message: "✅ Face recognized: Alice".into(),
        }
    );
    assert_eq!(
        *seen.uploads.lock().unwrap(),
        vec![Upload {
            field: Some("file".into()),
            file_name: Some("frame.jpg".into()),
            content_type: Some("image/jpeg".into()),
            len: 8,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn id_card_reply_is_parsed() -> Result<()> {
    let seen = Seen::default();
    let client = serve(happy_service(seen.clone())).await?;

    let result = client.id_verifier().verify(jpeg()).await;

    assert!(result.success);
    assert_eq!(result.raw_text.as_deref(), Some("STUDENT ID\nAlice\nX123"));
    assert_eq!(result.parsed.id_number.as_deref(), Some("X123"));
    assert_eq!(
        seen.uploads.lock().unwrap()[0].file_name.as_deref(),
        Some("idcard.jpg")
    );
    Ok(())
}

#[tokio::test]
async fn server_error_becomes_failure_result() -> Result<()> {
    let client = serve(Router::new().route("/api/face-recognition", post(boom))).await?;

    let result = client.face_verifier().verify(jpeg()).await;
    assert!(!result.success);
    assert!(result.message.starts_with("Error processing image"));
    assert!(result.message.contains("model not loaded"));

    let err = client.face_verifier().submit(jpeg()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 500, .. }));
    Ok(())
}

#[tokio::test]
async fn id_server_error_keeps_detail() -> Result<()> {
    let client = serve(Router::new().route("/api/id-card-ocr", post(boom))).await?;

    let result = client.id_verifier().verify(jpeg()).await;
    assert!(!result.success);
    assert_eq!(
        result.message,
        "Error processing ID card (model not loaded). Please try again."
    );
    Ok(())
}

#[tokio::test]
async fn malformed_body_becomes_failure_result() -> Result<()> {
    let client = serve(Router::new().route("/api/id-card-ocr", post(garbage))).await?;

    let result = client.id_verifier().verify(jpeg()).await;
    assert_eq!(
        result,
        <IdVerificationResult as VerificationReply>::failure("Error processing ID card. Please try again.")
    );
    assert!(matches!(
        client.id_verifier().submit(jpeg()).await,
        Err(ServiceError::Malformed(_))
    ));
    Ok(())
}

#[tokio::test]
async fn unreachable_service_becomes_failure_result() -> Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let client = ServiceClient::new(&format!("http://{addr}"), None)?;

    let result = client.face_verifier().verify(jpeg()).await;
    assert!(!result.success);
    assert!(result.message.starts_with("Error processing image"));
    assert!(matches!(client.fetch_stats().await, Err(ServiceError::Network(_))));
    Ok(())
}

#[tokio::test]
async fn recorder_posts_derived_submission() -> Result<()> {
    let seen = Seen::default();
    let client = serve(happy_service(seen.clone())).await?;
    let recorder = AttendanceRecorder::new(Arc::new(client.clone()));

    let face = client.face_verifier().verify(jpeg()).await;
    let id = client.id_verifier().verify(jpeg()).await;
    let ack = recorder.record(Some(&face), &id).await?;

    assert!(ack.success);
    assert_eq!(
        seen.bodies.lock().unwrap()[0],
        json!({
            "student_name": "Alice",
            "face_confidence": 97.0,
            "id_card_text": "STUDENT ID\nAlice\nX123",
            "id_card_name": "Alice",
            "id_card_number": "X123",
            "verified": true
        })
    );
    Ok(())
}

#[tokio::test]
async fn record_failure_is_a_service_error() -> Result<()> {
    let client = serve(Router::new().route("/api/attendance/record", post(boom))).await?;
    let submission = AttendanceSubmission::derive(None, &IdVerificationResult::default());

    let err = client.submit(&submission).await.unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 500, ref detail } if detail == "model not loaded"));
    Ok(())
}

#[tokio::test]
async fn stats_records_and_banner_are_read() -> Result<()> {
    let client = serve(happy_service(Seen::default())).await?;

    let stats = client.fetch_stats().await?;
    assert_eq!(stats.present_today, 4);
    assert_ne!(stats, DEFAULT_STATS);

    let list = client.records().await?;
    assert_eq!(list.count, 1);
    assert_eq!(list.records[0].student_name, "Alice");
    assert_eq!(list.records[0].id_card_number.as_deref(), Some("X123"));

    assert_eq!(client.banner().await?.message, "🤖 Student Attendance System API");
    Ok(())
}
