//! Per-request credential resolution: `x-openai-api-key`/`x-openai-api-url`
//! headers override the process-wide [`AppConfig`] defaults. Resolved fresh
//! on every request; never cached.

use axum::http::HeaderMap;
use config::AppConfig;
use secrecy::SecretString;

use crate::error::ProxyError;

pub(crate) const API_KEY_HEADER: &str = "x-openai-api-key";
pub(crate) const API_URL_HEADER: &str = "x-openai-api-url";

pub(crate) struct OpenAiAuth {
    pub key: SecretString,
    pub base_url: String,
}

pub(crate) fn resolve(headers: &HeaderMap, config: &AppConfig) -> Result<OpenAiAuth, ProxyError> {
    let key = header_str(headers, API_KEY_HEADER)
        .map(SecretString::from)
        .or_else(|| config.openai_api_key.clone())
        .ok_or(ProxyError::MissingCredentials)?;

    let base_url = header_str(headers, API_URL_HEADER)
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| config.openai_base_url.clone());

    Ok(OpenAiAuth { key, base_url })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty()).map(str::to_string)
}
