//! The `reqwest`-backed [`StorageUploader`]: a
//! single `PUT {server}/upload` with the raw bytes as body. Status-code
//! mapping is the caller's retry/idempotence policy's responsibility —
//! this only translates HTTP into [`UploadTransportError`] variants.

use crate::transport::{StorageUploader, UploadRequest, UploadResponse, UploadTransportError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct UploadResponseBody {
    url: String,
    #[allow(dead_code)]
    sha256: String,
    #[allow(dead_code)]
    size: u64,
    #[allow(dead_code)]
    #[serde(rename = "type")]
    content_type: String,
}

pub struct ReqwestUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestUploader {
    /// `connect_timeout` is fixed at client construction — `reqwest` has no
    /// per-request connect-timeout override, only a client-wide one — while
    /// `send_timeout` on each [`UploadRequest`] is applied per call.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl StorageUploader for ReqwestUploader {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadTransportError> {
        let url = format!("{}/upload", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .put(&url)
            .timeout(request.send_timeout)
            .header(reqwest::header::CONTENT_TYPE, request.content_type)
            .header(reqwest::header::AUTHORIZATION, request.authorization_header)
            .body(request.bytes)
            .send()
            .await
            .map_err(|e| UploadTransportError::Io(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UploadTransportError::AuthRejected);
        }
        if status.is_client_error() {
            return Err(UploadTransportError::ClientError(status.as_u16()));
        }
        if status.is_server_error() {
            return Err(UploadTransportError::ServerError(status.as_u16()));
        }

        let body: UploadResponseBody = response
            .json()
            .await
            .map_err(|e| UploadTransportError::Io(e.to_string()))?;

        Ok(UploadResponse {
            url: body.url,
            fallback_url: None,
            streaming_mp4: None,
            streaming_hls: None,
            thumbnail_url: None,
            already_existed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_normalized() {
        let uploader = ReqwestUploader::new("https://cdn.example.com/", Duration::from_secs(5));
        assert_eq!(uploader.endpoint.trim_end_matches('/'), "https://cdn.example.com");
    }
}
