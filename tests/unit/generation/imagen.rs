use base64::Engine;

use super::*;

#[test]
fn aspect_param_snaps_to_known_ratios() {
    assert_eq!(aspect_param(ImageSize::new(1024, 1024)), "1:1");
    assert_eq!(aspect_param(ImageSize::new(1080, 1920)), "9:16");
    assert_eq!(aspect_param(ImageSize::new(1920, 1080)), "16:9");
    assert_eq!(aspect_param(ImageSize::new(1200, 900)), "4:3");
    assert_eq!(aspect_param(ImageSize::new(900, 1200)), "3:4");
    assert_eq!(aspect_param(ImageSize::new(500, 2000)), "9:16");
    assert_eq!(aspect_param(ImageSize::new(3000, 1000)), "16:9");
}

#[test]
fn prompt_enhancement_names_orientation() {
    let p = enhance_prompt("Coffee.", ImageSize::new(576, 1024));
    assert!(p.starts_with("Coffee. High quality"));
    assert!(p.contains("vertical portrait composition"));
    assert!(enhance_prompt("x", ImageSize::new(10, 10)).contains("square"));
}

#[test]
fn parses_prediction_bytes() {
    let b64 = base64::engine::general_purpose::STANDARD.encode(b"img");
    let body = serde_json::json!({
        "predictions": [{"bytesBase64Encoded": b64, "mimeType": "image/png"}]
    })
    .to_string();
    assert_eq!(parse_predict_response(body.as_bytes()).unwrap(), b"img");
}

#[test]
fn filtered_predictions_are_content_rejections() {
    let empty = serde_json::json!({}).to_string();
    assert_eq!(
        parse_predict_response(empty.as_bytes()).unwrap_err().kind,
        FailureKind::ContentRejected
    );
    let filtered = serde_json::json!({
        "predictions": [{"raiFilteredReason": "blocked by safety filter"}]
    })
    .to_string();
    assert_eq!(
        parse_predict_response(filtered.as_bytes()).unwrap_err().kind,
        FailureKind::ContentRejected
    );
    assert_eq!(
        parse_predict_response(b"<html>").unwrap_err().kind,
        FailureKind::MalformedResponse
    );
}
