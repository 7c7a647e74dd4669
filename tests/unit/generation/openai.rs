use base64::Engine;

use super::*;

#[test]
fn size_maps_to_supported_values() {
    assert_eq!(size_param(ImageSize::new(1024, 1024)), "1024x1024");
    assert_eq!(size_param(ImageSize::new(1000, 1050)), "1024x1024");
    assert_eq!(size_param(ImageSize::new(576, 1024)), "1024x1792");
    assert_eq!(size_param(ImageSize::new(1920, 1080)), "1792x1024");
}

#[test]
fn parses_inline_and_url_payloads() {
    let b64 = base64::engine::general_purpose::STANDARD.encode(b"png-bytes");
    let body = serde_json::json!({"data": [{"b64_json": b64}]}).to_string();
    assert_eq!(
        parse_images_response(body.as_bytes()).unwrap(),
        ImagePayload::Inline(b"png-bytes".to_vec())
    );

    let body = serde_json::json!({"data": [{"url": "https://example.invalid/x.png"}]}).to_string();
    assert_eq!(
        parse_images_response(body.as_bytes()).unwrap(),
        ImagePayload::Url("https://example.invalid/x.png".to_owned())
    );
}

#[test]
fn malformed_payloads_are_fatal() {
    for body in [
        "not json".to_owned(),
        serde_json::json!({"data": []}).to_string(),
        serde_json::json!({"data": [{}]}).to_string(),
        serde_json::json!({"data": [{"b64_json": "%%%"}]}).to_string(),
    ] {
        let err = parse_images_response(body.as_bytes()).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse, "{body}");
        assert!(!err.kind.is_retryable());
    }
}

#[test]
fn endpoint_and_model_defaults() {
    let cfg = ProviderConfig {
        kind: crate::model::config::ProviderKind::Openai,
        model: None,
        api_key: "k".to_owned(),
        endpoint: Some("http://localhost:9000/".to_owned()),
    };
    let p = OpenAiProvider::new(reqwest::blocking::Client::new(), &cfg);
    assert_eq!(p.name(), "openai:dall-e-3");
    assert_eq!(p.endpoint, "http://localhost:9000");
}
