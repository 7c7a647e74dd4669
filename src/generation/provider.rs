use std::time::Duration;

use serde::Serialize;

use crate::foundation::core::ImageSize;
use crate::foundation::error::{CraftError, CraftResult};
use crate::model::config::{GenerationConfig, ProviderConfig, ProviderKind};

/// Why a single provider call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    ServerFault,
    Network,
    InvalidRequest,
    ContentRejected,
    Unauthorized,
    MalformedResponse,
}

impl FailureKind {
    /// Transient failures worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::ServerFault | Self::Network
        )
    }

    /// Classify a non-success HTTP status. `body` is scanned for content-policy markers.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            408 => Self::Timeout,
            429 => Self::RateLimited,
            401 | 403 => Self::Unauthorized,
            500..=599 => Self::ServerFault,
            400..=499 if mentions_content_policy(body) => Self::ContentRejected,
            _ => Self::InvalidRequest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerFault => "server_fault",
            Self::Network => "network",
            Self::InvalidRequest => "invalid_request",
            Self::ContentRejected => "content_rejected",
            Self::Unauthorized => "unauthorized",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn mentions_content_policy(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    ["content_policy", "safety", "moderation", "blocked"]
        .iter()
        .any(|m| body.contains(m))
}

/// One failed provider call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Map a transport-level `reqwest` error.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FailureKind::Timeout
        } else if e.is_decode() {
            FailureKind::MalformedResponse
        } else {
            FailureKind::Network
        };
        Self::new(kind, e.to_string())
    }
}

/// Image generation capability. Providers are tried in configuration order.
pub trait ImageProvider: Send + Sync {
    /// Stable name used in logs and reports.
    fn name(&self) -> &str;

    /// Generate one image and return its encoded bytes.
    fn generate(&self, prompt: &str, size: ImageSize) -> Result<Vec<u8>, ProviderFailure>;
}

pub(crate) fn http_client(timeout_secs: f64) -> CraftResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs_f64(timeout_secs))
        .build()
        .map_err(|e| CraftError::config(format!("failed to create HTTP client: {e}")))
}

/// Send a request and return the body of a 2xx response, classifying everything else.
pub(crate) fn send_for_body(
    req: reqwest::blocking::RequestBuilder,
) -> Result<Vec<u8>, ProviderFailure> {
    let resp = req.send().map_err(|e| ProviderFailure::from_reqwest(&e))?;
    let status = resp.status();
    let body = resp.bytes().map_err(|e| ProviderFailure::from_reqwest(&e))?;
    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        return Err(ProviderFailure::new(
            FailureKind::from_http_status(status.as_u16(), &text),
            format!("HTTP {status}: {}", truncate(&text, 300)),
        ));
    }
    Ok(body.to_vec())
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_owned(),
    }
}

/// Instantiate configured providers in order, sharing one HTTP client.
pub fn build_providers(cfg: &GenerationConfig) -> CraftResult<Vec<Box<dyn ImageProvider>>> {
    let client = http_client(cfg.timeout_secs)?;
    Ok(cfg
        .providers
        .iter()
        .map(|p| build_provider(client.clone(), p))
        .collect())
}

fn build_provider(client: reqwest::blocking::Client, cfg: &ProviderConfig) -> Box<dyn ImageProvider> {
    match cfg.kind {
        ProviderKind::Openai => Box::new(super::openai::OpenAiProvider::new(client, cfg)),
        ProviderKind::Imagen => Box::new(super::imagen::ImagenProvider::new(client, cfg)),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/generation/provider.rs"]
mod tests;
