use super::*;
use serde_json::json;

#[test]
fn parses_hex_rgb_and_rgba() {
    let c: Rgba8 = serde_json::from_value(json!("#ff0000")).unwrap();
    assert_eq!(c, Rgba8::opaque(255, 0, 0));

    let c: Rgba8 = serde_json::from_value(json!("0000FF80")).unwrap();
    assert_eq!(c.b, 255);
    assert_eq!(c.a, 128);

    assert!(serde_json::from_value::<Rgba8>(json!("#fff")).is_err());
    assert!(serde_json::from_value::<Rgba8>(json!("#gg0000")).is_err());
}

#[test]
fn parses_arrays() {
    let c: Rgba8 = serde_json::from_value(json!([255, 255, 255])).unwrap();
    assert_eq!(c, Rgba8::WHITE);
    let c: Rgba8 = serde_json::from_value(json!([1, 2, 3, 4])).unwrap();
    assert_eq!(c.a, 4);
    assert!(serde_json::from_value::<Rgba8>(json!([1, 2])).is_err());
}

#[test]
fn serializes_as_hex() {
    assert_eq!(serde_json::to_value(Rgba8::WHITE).unwrap(), json!("#ffffffff"));
}

#[test]
fn premul_with_opacity_scales_all_channels() {
    assert_eq!(Rgba8::WHITE.to_premul_with_opacity(1.0), [255, 255, 255, 255]);
    assert_eq!(Rgba8::BLACK.to_premul_with_opacity(0.5), [0, 0, 0, 128]);
    assert_eq!(Rgba8::WHITE.to_premul_with_opacity(0.0), [0, 0, 0, 0]);
}

#[test]
fn darkness_follows_luminance() {
    assert!(Rgba8::BLACK.is_dark());
    assert!(!Rgba8::WHITE.is_dark());
    assert!(Rgba8::opaque(20, 20, 60).is_dark());
}
