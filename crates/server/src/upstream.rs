//! South-side HTTP client: POSTs a Responses request to the configured
//! OpenAI-compatible endpoint and classifies transport failures.

use std::{sync::OnceLock, time::Duration};

use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::ProxyError;

const BATCH_TIMEOUT: Duration = Duration::from_secs(60);

fn default_client_builder() -> reqwest::ClientBuilder {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
}

/// The shared client. No default request timeout: streaming calls need
/// unbounded reads, so each caller applies its own timeout per request.
pub(crate) fn http_client() -> reqwest::Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT
        .get_or_init(|| default_client_builder().build().expect("failed to build upstream HTTP client"))
        .clone()
}

/// `<base_url>/responses`, tolerating a base URL that already carries the
/// suffix.
pub fn responses_url(base_url: &str) -> String {
    if base_url.ends_with("/responses") { base_url.to_string() } else { format!("{base_url}/responses") }
}

fn auth_header(key: &SecretString) -> String {
    format!("Bearer {}", key.expose_secret())
}

/// POST the non-streaming path with a bounded timeout. Returns the parsed
/// JSON body, or a [`ProxyError`] classifying the failure.
pub async fn post_batch(url: &str, key: &SecretString, body: &Value) -> Result<Value, ProxyError> {
    let response = http_client()
        .post(url)
        .timeout(BATCH_TIMEOUT)
        .header(header::AUTHORIZATION, auth_header(key))
        .json(body)
        .send()
        .await
        .map_err(classify_send_error)?;

    read_json(response).await
}

/// POST the streaming path with no request timeout; the upstream controls
/// stream duration. Returns the raw response for the caller to frame as SSE.
pub async fn post_stream(url: &str, key: &SecretString, body: &Value) -> Result<reqwest::Response, ProxyError> {
    let response = http_client()
        .post(url)
        .header(header::AUTHORIZATION, auth_header(key))
        .json(body)
        .send()
        .await
        .map_err(classify_send_error)?;

    check_status(response).await
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProxyError> {
    let response = check_status(response).await?;
    response.json().await.map_err(|e| ProxyError::UpstreamConnection(e.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProxyError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProxyError::UpstreamStatus { status, body });
    }
    Ok(response)
}

fn classify_send_error(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout(err.to_string())
    } else {
        ProxyError::UpstreamConnection(err.to_string())
    }
}
