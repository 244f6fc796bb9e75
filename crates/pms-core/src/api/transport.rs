use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use tracing::{debug, warn};

use super::request::{ApiRequest, ApiResponse, FormValue, RequestBody};
use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Sends one request and yields the response.
///
/// Non-2xx responses are returned as `Err(ApiError)` carrying the status and
/// body. Pipeline stages implement this trait by wrapping another transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// The real HTTP transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    api_base: String,
}

impl ReqwestTransport {
    pub fn new(api_base: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, api_base))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.api_base, path)
        } else {
            format!("{}/{}", self.api_base, path)
        }
    }

    fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut headers = request.headers.clone();
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    header::HeaderValue::from_static("application/json"),
                );
                builder.body(serde_json::to_vec(value).map_err(|e| {
                    ApiError::InvalidRequest(format!("failed to encode JSON body: {}", e))
                })?)
            }
            RequestBody::Multipart(parts) => {
                // reqwest writes the content type with the generated boundary
                headers.remove(header::CONTENT_TYPE);
                builder.multipart(multipart_form(parts)?)
            }
        };

        Ok(builder.headers(headers))
    }
}

fn multipart_form(parts: &[(String, FormValue)]) -> Result<multipart::Form, ApiError> {
    let mut form = multipart::Form::new();
    for (name, value) in parts {
        form = match value {
            FormValue::Text(text) => form.text(name.clone(), text.clone()),
            FormValue::File(file) => {
                let mut part =
                    multipart::Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
                if let Some(ref mime) = file.mime_type {
                    part = part.mime_str(mime).map_err(|e| {
                        ApiError::InvalidRequest(format!("invalid MIME type {}: {}", mime, e))
                    })?;
                }
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.build(&request)?.send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            debug!(method = %request.method, path = %request.path, status = status.as_u16(), "Response received");

            if status.is_success() {
                return Ok(ApiResponse::new(status, body));
            }
            if status.as_u16() != 429 {
                return Err(ApiError::from_status(status, &body));
            }

            // Rate limited
            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(path = %request.path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }
}
