//! HTTP side of a conversion: one `POST`, one streamed answer.
//!
//! ```text
//! POST {base_url}/convert/{from}/to/{to}
//! Authorization: Bearer <token>
//! Accept: multipart/mixed
//! Content-Type: multipart/form-data; boundary=...
//! ```
//!
//! A 2xx answer of type `multipart/mixed` is handed back as a
//! [`MultipartReader`] over the still-open body. Any other status or content
//! type is read as text and returned as [`ConvertApiError::Api`]. Nothing is
//! retried.

use crate::config::ClientConfig;
use crate::error::ConvertApiError;
use crate::pipeline::disposition::media_type_and_boundary;
use crate::pipeline::form::build_form;
use crate::pipeline::multipart::{ByteStream, MultipartReader};
use crate::request::ConversionRequest;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info};

const MULTIPART_MIXED: &str = "multipart/mixed";

/// Client for the conversion endpoint.
#[derive(Debug, Clone)]
pub struct ConvertApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ConvertApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConvertApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConvertApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload `request` and return a reader over the response parts.
    pub async fn send(
        &self,
        request: &ConversionRequest,
    ) -> Result<MultipartReader<ByteStream>, ConvertApiError> {
        let url = self
            .config
            .endpoint(&request.from_format, &request.to_format);

        let (form, file_count) = build_form(request).await?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_upload_start(file_count);
        }
        info!("POST {} ({} file parts)", url, file_count);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&request.api_token)
            .header(ACCEPT, MULTIPART_MIXED)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_response(status.as_u16());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let (media_type, boundary) = media_type_and_boundary(&content_type);
        debug!("Response {} ({})", status, content_type);

        if !status.is_success() || media_type != MULTIPART_MIXED {
            let body = response.text().await.map_err(|e| self.map_error(e))?;
            return Err(ConvertApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let boundary = boundary.ok_or_else(|| {
            ConvertApiError::MalformedResponse(
                "multipart/mixed response without a boundary parameter".into(),
            )
        })?;

        let secs = self.config.timeout_secs;
        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| transport_error(e, secs))),
        );
        Ok(MultipartReader::new(stream, &boundary))
    }

    fn map_error(&self, e: reqwest::Error) -> ConvertApiError {
        transport_error(e, self.config.timeout_secs)
    }
}

fn transport_error(e: reqwest::Error, secs: u64) -> ConvertApiError {
    if e.is_timeout() {
        ConvertApiError::Timeout { secs }
    } else {
        ConvertApiError::from(e)
    }
}
