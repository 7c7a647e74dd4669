use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};

use crate::foundation::core::ImageSize;
use crate::generation::provider::{FailureKind, ImageProvider, ProviderFailure, send_for_body};
use crate::model::config::ProviderConfig;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "dall-e-3";

/// OpenAI Images API (`/v1/images/generations`).
pub struct OpenAiProvider {
    client: reqwest::blocking::Client,
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ImagePayload {
    Inline(Vec<u8>),
    Url(String),
}

impl OpenAiProvider {
    pub fn new(client: reqwest::blocking::Client, cfg: &ProviderConfig) -> Self {
        let model = cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        Self {
            client,
            name: format!("openai:{model}"),
            endpoint: cfg
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            model,
            api_key: cfg.api_key.clone(),
        }
    }
}

impl ImageProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str, size: ImageSize) -> Result<Vec<u8>, ProviderFailure> {
        // gpt-image models always answer with b64_json and reject the parameter.
        let response_format = self.model.starts_with("dall-e").then_some("b64_json");
        let req = ImagesRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: size_param(size),
            response_format,
        };

        let body = send_for_body(
            self.client
                .post(format!("{}/v1/images/generations", self.endpoint))
                .bearer_auth(&self.api_key)
                .json(&req),
        )?;

        match parse_images_response(&body)? {
            ImagePayload::Inline(bytes) => Ok(bytes),
            ImagePayload::Url(url) => send_for_body(self.client.get(url)),
        }
    }
}

/// Closest size the Images API accepts.
pub(crate) fn size_param(size: ImageSize) -> &'static str {
    let ratio = f64::from(size.width) / f64::from(size.height.max(1));
    if (ratio - 1.0).abs() < 0.1 {
        "1024x1024"
    } else if ratio < 1.0 {
        "1024x1792"
    } else {
        "1792x1024"
    }
}

pub(crate) fn parse_images_response(body: &[u8]) -> Result<ImagePayload, ProviderFailure> {
    let parsed: ImagesResponse = serde_json::from_slice(body).map_err(|e| {
        ProviderFailure::new(
            FailureKind::MalformedResponse,
            format!("parse images response: {e}"),
        )
    })?;
    let first = parsed.data.into_iter().next().ok_or_else(|| {
        ProviderFailure::new(FailureKind::MalformedResponse, "no image data returned")
    })?;

    if let Some(b64) = first.b64_json {
        let bytes = general_purpose::STANDARD.decode(b64).map_err(|e| {
            ProviderFailure::new(
                FailureKind::MalformedResponse,
                format!("base64-decode image: {e}"),
            )
        })?;
        Ok(ImagePayload::Inline(bytes))
    } else if let Some(url) = first.url {
        Ok(ImagePayload::Url(url))
    } else {
        Err(ProviderFailure::new(
            FailureKind::MalformedResponse,
            "image response missing b64_json and url",
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/generation/openai.rs"]
mod tests;
