//! HTTP plumbing shared by the verification and attendance clients.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::ErrorDetail;
use crate::config::Config;
use crate::error::ServiceError;

/// Handle on the remote attendance service rooted at a base URL.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base: String,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ServiceError> {
        Self::new(
            &cfg.base_url,
            cfg.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Read a JSON body, turning non-2xx answers into [`ServiceError::Status`].
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    Ok(serde_json::from_slice(&body)?)
}

fn status_error(status: StatusCode, body: &[u8]) -> ServiceError {
    let detail = serde_json::from_slice::<ErrorDetail>(body)
        .map(|d| d.detail)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
    ServiceError::Status {
        status: status.as_u16(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ServiceClient::new("http://kiosk.local:5000/", None).unwrap();
        assert_eq!(
            client.url("/api/attendance/stats"),
            "http://kiosk.local:5000/api/attendance/stats"
        );
    }

    #[test]
    fn status_error_prefers_detail_field() {
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, br#"{"detail":"boom"}"#);
        assert!(matches!(err, ServiceError::Status { status: 500, ref detail } if detail == "boom"));
    }

    #[test]
    fn status_error_falls_back_to_raw_body() {
        let err = status_error(StatusCode::BAD_GATEWAY, b" upstream down \n");
        assert!(matches!(err, ServiceError::Status { status: 502, ref detail } if detail == "upstream down"));
    }
}
