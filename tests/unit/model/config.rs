use std::collections::HashMap;

use super::*;
use serde_json::json;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |k| map.get(k).cloned()
}

#[test]
fn empty_object_yields_defaults() {
    let cfg = PipelineConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, PipelineConfig::default());
    assert_eq!(cfg.generation.max_retries, 3);
    assert_eq!(cfg.generation.base_delay_secs, 2.0);
    assert_eq!(cfg.aspect_ratios.len(), 3);
    assert_eq!(cfg.text_overlay.opacity_floor, 0.4);
}

#[test]
fn parses_full_sections() {
    let v = json!({
        "generation": {
            "max_retries": 2,
            "base_delay_secs": 0.5,
            "providers": [
                {"kind": "openai", "api_key": "sk-test"},
                {"kind": "imagen", "api_key": "g-test", "model": "imagen-3.0-fast"}
            ]
        },
        "aspect_ratios": [
            {"ratio": "9:16"},
            {"ratio": "4x5", "crop_strategy": "center", "min_short_side": 512}
        ],
        "text_overlay": {"color": "#000000", "position": "top", "padding": 8},
        "storage": {"input_dir": "in", "output_dir": "out"},
        "concurrency": {"workers": 2},
        "logging": {"level": "debug"}
    });
    let cfg = PipelineConfig::from_json_str(&v.to_string()).unwrap();
    assert_eq!(cfg.generation.providers[1].kind, ProviderKind::Imagen);
    assert_eq!(cfg.aspect_ratios[0].strategy(), CropStrategy::TopWeighted);
    assert_eq!(cfg.aspect_ratios[1].strategy(), CropStrategy::Center);
    assert_eq!(cfg.aspect_ratios[1].min_short_side, Some(512));
    assert_eq!(cfg.text_overlay.color, Rgba8::BLACK);
    assert_eq!(cfg.text_overlay.position, TextPosition::Top);
    assert_eq!(cfg.concurrency.workers, Some(2));
    assert_eq!(cfg.storage.input_dir, PathBuf::from("in"));
}

#[test]
fn default_strategy_depends_on_orientation() {
    let tall = AspectRatioSpec {
        ratio: AspectRatio::STORY,
        crop_strategy: None,
        min_short_side: None,
    };
    let wide = AspectRatioSpec {
        ratio: AspectRatio::LANDSCAPE,
        ..tall
    };
    assert_eq!(tall.strategy(), CropStrategy::TopWeighted);
    assert_eq!(wide.strategy(), CropStrategy::Center);
}

#[test]
fn rejects_more_than_two_providers() {
    let p = json!({"kind": "openai", "api_key": "k"});
    let v = json!({"generation": {"providers": [p.clone(), p.clone(), p]}});
    let err = PipelineConfig::from_json_str(&v.to_string()).unwrap_err();
    assert!(matches!(err, CraftError::Config(_)));
}

#[test]
fn rejects_out_of_range_values() {
    for bad in [
        json!({"generation": {"max_retries": 0}}),
        json!({"generation": {"base_delay_secs": -1.0}}),
        json!({"aspect_ratios": []}),
        json!({"aspect_ratios": [{"ratio": "1:1"}, {"ratio": "1x1"}]}),
        json!({"text_overlay": {"background_opacity": 1.5}}),
        json!({"text_overlay": {"max_width_ratio": 0.0}}),
        json!({"text_overlay": {"base_font_size": 0.0}}),
        json!({"concurrency": {"workers": 0}}),
    ] {
        assert!(
            PipelineConfig::from_json_str(&bad.to_string()).is_err(),
            "accepted {bad}"
        );
    }
}

#[test]
fn env_overrides_apply_on_top_of_file() {
    let mut cfg = PipelineConfig::default();
    cfg.apply_env(env(&[
        (ENV_INPUT_DIR, "/data/in"),
        (ENV_OUTPUT_DIR, "/data/out"),
        (ENV_LOG_LEVEL, "debug"),
    ]));
    assert_eq!(cfg.storage.input_dir, PathBuf::from("/data/in"));
    assert_eq!(cfg.storage.output_dir, PathBuf::from("/data/out"));
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
fn api_key_placeholders_expand_or_disable_provider() {
    let mut cfg = PipelineConfig::default();
    cfg.generation.providers = vec![
        ProviderConfig {
            kind: ProviderKind::Openai,
            model: None,
            api_key: "${OPENAI_API_KEY}".to_owned(),
            endpoint: None,
        },
        ProviderConfig {
            kind: ProviderKind::Imagen,
            model: None,
            api_key: "${GOOGLE_API_KEY}".to_owned(),
            endpoint: None,
        },
    ];
    cfg.apply_env(env(&[("OPENAI_API_KEY", "sk-live")]));
    assert_eq!(cfg.generation.providers.len(), 1);
    assert_eq!(cfg.generation.providers[0].api_key, "sk-live");
    cfg.validate().unwrap();
}

#[test]
fn placeholder_syntax() {
    assert_eq!(env_placeholder("${X}"), Some("X"));
    assert_eq!(env_placeholder(" ${KEY_1} "), Some("KEY_1"));
    assert_eq!(env_placeholder("${}"), None);
    assert_eq!(env_placeholder("literal"), None);
}
