use base64::Engine;
use base64::engine::general_purpose;
use serde::Deserialize;
use serde_json::json;

use crate::foundation::core::ImageSize;
use crate::generation::provider::{FailureKind, ImageProvider, ProviderFailure, send_for_body};
use crate::model::config::ProviderConfig;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "imagen-3.0-generate-002";

/// Google Imagen through the Generative Language `:predict` endpoint.
pub struct ImagenProvider {
    client: reqwest::blocking::Client,
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    rai_filtered_reason: Option<String>,
}

impl ImagenProvider {
    pub fn new(client: reqwest::blocking::Client, cfg: &ProviderConfig) -> Self {
        let model = cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        Self {
            client,
            name: format!("imagen:{model}"),
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

impl ImageProvider for ImagenProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str, size: ImageSize) -> Result<Vec<u8>, ProviderFailure> {
        let body = json!({
            "instances": [{ "prompt": enhance_prompt(prompt, size) }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": aspect_param(size),
            },
        });
        let resp = send_for_body(
            self.client
                .post(format!(
                    "{}/v1beta/models/{}:predict",
                    self.endpoint, self.model
                ))
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )?;
        parse_predict_response(&resp)
    }
}

/// Nearest aspect string Imagen accepts.
pub(crate) fn aspect_param(size: ImageSize) -> &'static str {
    let ratio = f64::from(size.width) / f64::from(size.height.max(1));
    const KNOWN: [(f64, &str); 5] = [
        (1.0, "1:1"),
        (9.0 / 16.0, "9:16"),
        (16.0 / 9.0, "16:9"),
        (4.0 / 3.0, "4:3"),
        (3.0 / 4.0, "3:4"),
    ];
    KNOWN
        .iter()
        .find(|(r, _)| (ratio - r).abs() < 0.1)
        .map(|(_, s)| *s)
        .unwrap_or(if ratio < 1.0 { "9:16" } else { "16:9" })
}

/// Append composition guidance matching the requested orientation.
pub(crate) fn enhance_prompt(prompt: &str, size: ImageSize) -> String {
    let ratio = f64::from(size.width) / f64::from(size.height.max(1));
    let orientation = if (ratio - 1.0).abs() < 0.1 {
        "square"
    } else if ratio < 1.0 {
        "vertical portrait"
    } else {
        "horizontal landscape"
    };
    format!(
        "{prompt} High quality, professional photography, {orientation} composition, vibrant colors, sharp details, photorealistic, suitable for advertising."
    )
}

pub(crate) fn parse_predict_response(body: &[u8]) -> Result<Vec<u8>, ProviderFailure> {
    let parsed: PredictResponse = serde_json::from_slice(body).map_err(|e| {
        ProviderFailure::new(
            FailureKind::MalformedResponse,
            format!("parse predict response: {e}"),
        )
    })?;
    // Safety-filtered requests come back as 200 with no usable prediction.
    let Some(first) = parsed.predictions.into_iter().next() else {
        return Err(ProviderFailure::new(
            FailureKind::ContentRejected,
            "no predictions returned (likely filtered)",
        ));
    };
    match (first.bytes_base64_encoded, first.rai_filtered_reason) {
        (Some(b64), _) => general_purpose::STANDARD.decode(b64).map_err(|e| {
            ProviderFailure::new(
                FailureKind::MalformedResponse,
                format!("base64-decode image: {e}"),
            )
        }),
        (None, Some(reason)) => Err(ProviderFailure::new(FailureKind::ContentRejected, reason)),
        (None, None) => Err(ProviderFailure::new(
            FailureKind::MalformedResponse,
            "prediction has no image bytes",
        )),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/generation/imagen.rs"]
mod tests;
