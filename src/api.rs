use crate::collectors::ProcessRecord;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const SESSION_KEY_HEADER: &str = "x-session-key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    #[serde(default)]
    pub interviewer_connected: bool,
    #[serde(default)]
    pub interviewee_connected: bool,
}

impl RoomStatus {
    pub fn both_online(&self) -> bool {
        self.interviewer_connected && self.interviewee_connected
    }

    pub fn offline() -> Self {
        Self::default()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("room not found")]
    RoomNotFound,
    #[error("session key rejected")]
    InvalidSessionKey,
    #[error("server returned status {0}")]
    Server(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    // 404 and 403 carry meaning for the gating logic and surface immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Server(_) | ApiError::Network(_))
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    session_key: String,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        session_key: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("interview-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_key: session_key.to_string(),
        })
    }

    pub async fn room_status(&self, room_id: &str) -> Result<RoomStatus, ApiError> {
        let url = format!("{}/room-status/{}", self.base_url, room_id);
        let response = self
            .http
            .get(&url)
            .header(SESSION_KEY_HEADER, &self.session_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::RoomNotFound),
            StatusCode::FORBIDDEN => Err(ApiError::InvalidSessionKey),
            status if status.is_success() => Ok(response.json::<RoomStatus>().await?),
            status => Err(ApiError::Server(status.as_u16())),
        }
    }

    pub async fn send_processes(
        &self,
        room_id: &str,
        records: &[ProcessRecord],
    ) -> Result<(), ApiError> {
        let url = format!("{}/send_processes/{}", self.base_url, room_id);
        let response = self
            .http
            .post(&url)
            .header(SESSION_KEY_HEADER, &self.session_key)
            .json(records)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Server(status.as_u16()))
        }
    }
}

// Bounded retry for any fallible call; only transient errors are retried.
pub async fn with_retries<T, F, Fut>(
    max_attempts: u32,
    delay: Duration,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %err, "transient request error, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_status_parses_camel_case_body() {
        let status: RoomStatus =
            serde_json::from_str(r#"{"interviewerConnected":true,"intervieweeConnected":false}"#)
                .expect("parse");
        assert!(status.interviewer_connected);
        assert!(!status.interviewee_connected);
        assert!(!status.both_online());
    }

    #[test]
    fn room_status_missing_fields_default_to_offline() {
        let status: RoomStatus = serde_json::from_str("{}").expect("parse");
        assert!(!status.interviewer_connected);
        assert!(!status.interviewee_connected);
    }

    #[test]
    fn only_server_and_network_errors_are_transient() {
        assert!(ApiError::Server(500).is_transient());
        assert!(!ApiError::RoomNotFound.is_transient());
        assert!(!ApiError::InvalidSessionKey.is_transient());
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_limit() {
        let mut calls = 0_u32;
        let result: Result<u32, ApiError> = with_retries(3, Duration::ZERO, || {
            calls += 1;
            async { Err(ApiError::Server(502)) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::Server(502))));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn does_not_retry_room_not_found() {
        let mut calls = 0_u32;
        let result: Result<u32, ApiError> = with_retries(3, Duration::ZERO, || {
            calls += 1;
            async { Err(ApiError::RoomNotFound) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::RoomNotFound)));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn stops_retrying_on_first_success() {
        let mut calls = 0_u32;
        let result = with_retries(5, Duration::ZERO, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(ApiError::Server(503))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert!(matches!(result, Ok(3)));
        assert_eq!(calls, 3);
    }
}
