use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assets::color::Rgba8;
use crate::foundation::core::{AspectRatio, ImageSize};
use crate::foundation::error::{CraftError, CraftResult};

/// Environment variable overriding `storage.input_dir`.
pub const ENV_INPUT_DIR: &str = "PIPELINE_INPUT_DIR";
/// Environment variable overriding `storage.output_dir`.
pub const ENV_OUTPUT_DIR: &str = "PIPELINE_OUTPUT_DIR";
/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "PIPELINE_LOG_LEVEL";

/// Upper bound on configured providers (primary plus one fallback).
pub const MAX_PROVIDERS: usize = 2;

/// Full pipeline configuration. Every section has defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    pub aspect_ratios: Vec<AspectRatioSpec>,
    pub text_overlay: TextOverlaySpec,
    pub storage: StorageConfig,
    pub concurrency: ConcurrencyConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            aspect_ratios: AspectRatioSpec::default_set(),
            text_overlay: TextOverlaySpec::default(),
            storage: StorageConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per provider.
    pub max_retries: u32,
    /// Backoff base; the delay after failed attempt `k` is `base * 2^k`.
    pub base_delay_secs: f64,
    /// Per-call timeout.
    pub timeout_secs: f64,
    /// Requested source size.
    pub size: ImageSize,
    /// Ordered: primary first.
    pub providers: Vec<ProviderConfig>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2.0,
            timeout_secs: 60.0,
            size: ImageSize::new(1024, 1024),
            providers: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Imagen,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Literal key or a `${ENV_VAR}` placeholder.
    pub api_key: String,
    /// Base URL override, mostly for tests and proxies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStrategy {
    /// Centered on both axes.
    Center,
    /// Horizontally centered, biased toward the top of the source.
    TopWeighted,
}

/// One requested output ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatioSpec {
    pub ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_strategy: Option<CropStrategy>,
    /// Minimum edge length of the crop rectangle before upscaling kicks in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_short_side: Option<u32>,
}

impl AspectRatioSpec {
    pub fn new(ratio: AspectRatio, crop_strategy: CropStrategy) -> Self {
        Self {
            ratio,
            crop_strategy: Some(crop_strategy),
            min_short_side: None,
        }
    }

    /// Configured strategy, or `top_weighted` for tall ratios and `center` otherwise.
    pub fn strategy(&self) -> CropStrategy {
        self.crop_strategy.unwrap_or(if self.ratio.is_tall() {
            CropStrategy::TopWeighted
        } else {
            CropStrategy::Center
        })
    }

    pub fn default_set() -> Vec<Self> {
        vec![
            Self::new(AspectRatio::SQUARE, CropStrategy::Center),
            Self::new(AspectRatio::STORY, CropStrategy::TopWeighted),
            Self::new(AspectRatio::LANDSCAPE, CropStrategy::Center),
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Text overlay styling shared by every variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOverlaySpec {
    /// Font file path, or a family name looked up in system font directories.
    pub font_family: String,
    /// Pixel size at `reference_dimension`.
    pub base_font_size: f32,
    pub color: Rgba8,
    pub position: TextPosition,
    /// Pixels, applied inside the band and between band and image edge.
    pub padding: u32,
    pub background_opacity: f32,
    pub max_width_ratio: f32,
    pub line_spacing_multiplier: f32,
    /// Lowest band opacity the contrast policy will use.
    pub opacity_floor: f32,
    /// WCAG contrast ratio the band must reach against `color`.
    pub min_contrast_ratio: f32,
    /// Short-side length at which `base_font_size` applies unscaled.
    pub reference_dimension: u32,
    /// Keep a configured opacity below the floor when the image alone already has enough contrast.
    pub allow_low_opacity_when_contrasting: bool,
}

impl Default for TextOverlaySpec {
    fn default() -> Self {
        Self {
            font_family: "DejaVuSans".to_owned(),
            base_font_size: 48.0,
            color: Rgba8::WHITE,
            position: TextPosition::Bottom,
            padding: 20,
            background_opacity: 0.6,
            max_width_ratio: 0.9,
            line_spacing_multiplier: 1.2,
            opacity_floor: 0.4,
            min_contrast_ratio: 4.5,
            reference_dimension: 1000,
            allow_low_opacity_when_contrasting: false,
        }
    }
}

impl TextOverlaySpec {
    pub fn validate(&self) -> CraftResult<()> {
        fn finite_pos(name: &str, v: f32) -> CraftResult<()> {
            if !v.is_finite() || v <= 0.0 {
                return Err(CraftError::config(format!(
                    "text_overlay.{name} must be finite and > 0"
                )));
            }
            Ok(())
        }
        fn unit(name: &str, v: f32) -> CraftResult<()> {
            if !(0.0..=1.0).contains(&v) {
                return Err(CraftError::config(format!(
                    "text_overlay.{name} must be in [0, 1]"
                )));
            }
            Ok(())
        }

        if self.font_family.trim().is_empty() {
            return Err(CraftError::config("text_overlay.font_family must be set"));
        }
        finite_pos("base_font_size", self.base_font_size)?;
        finite_pos("line_spacing_multiplier", self.line_spacing_multiplier)?;
        unit("background_opacity", self.background_opacity)?;
        unit("opacity_floor", self.opacity_floor)?;
        if !(self.max_width_ratio > 0.0 && self.max_width_ratio <= 1.0) {
            return Err(CraftError::config(
                "text_overlay.max_width_ratio must be in (0, 1]",
            ));
        }
        if !(1.0..=21.0).contains(&self.min_contrast_ratio) {
            return Err(CraftError::config(
                "text_overlay.min_contrast_ratio must be in [1, 21]",
            ));
        }
        if self.reference_dimension == 0 {
            return Err(CraftError::config(
                "text_overlay.reference_dimension must be > 0",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_assets"),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Worker threads; `None` uses rayon's default.
    pub workers: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `adcraft=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate JSON. No environment access.
    pub fn from_json_str(s: &str) -> CraftResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| CraftError::serde(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from disk and apply process environment overrides.
    pub fn load(path: &Path) -> CraftResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let mut cfg: Self = serde_json::from_str(&s)
            .map_err(|e| CraftError::serde(format!("parse config JSON: {e}")))?;
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus process environment overrides, for runs without a config file.
    pub fn from_env() -> CraftResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `PIPELINE_*` overrides and expand `${VAR}` API keys through `lookup`.
    ///
    /// Providers whose key placeholder cannot be resolved are dropped with a warning, so a run
    /// can still reuse input assets.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_INPUT_DIR).filter(|v| !v.is_empty()) {
            self.storage.input_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.is_empty()) {
            self.storage.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = v;
        }

        self.generation.providers.retain_mut(|p| {
            let Some(var) = env_placeholder(&p.api_key) else {
                return true;
            };
            match lookup(var).filter(|v| !v.is_empty()) {
                Some(key) => {
                    p.api_key = key;
                    true
                }
                None => {
                    tracing::warn!(provider = ?p.kind, var, "API key variable unset; provider disabled");
                    false
                }
            }
        });
    }

    pub fn validate(&self) -> CraftResult<()> {
        let g = &self.generation;
        if g.max_retries == 0 {
            return Err(CraftError::config("generation.max_retries must be >= 1"));
        }
        if !g.base_delay_secs.is_finite() || g.base_delay_secs < 0.0 {
            return Err(CraftError::config(
                "generation.base_delay_secs must be finite and >= 0",
            ));
        }
        if !g.timeout_secs.is_finite() || g.timeout_secs <= 0.0 {
            return Err(CraftError::config(
                "generation.timeout_secs must be finite and > 0",
            ));
        }
        if g.size.width == 0 || g.size.height == 0 {
            return Err(CraftError::config("generation.size must be non-zero"));
        }
        if g.providers.len() > MAX_PROVIDERS {
            return Err(CraftError::config(format!(
                "at most {MAX_PROVIDERS} generation providers may be configured (primary + fallback)"
            )));
        }
        for p in &g.providers {
            if p.api_key.trim().is_empty() {
                return Err(CraftError::config(format!(
                    "provider {:?} has an empty api_key",
                    p.kind
                )));
            }
        }

        if self.aspect_ratios.is_empty() {
            return Err(CraftError::config("aspect_ratios must not be empty"));
        }
        for (i, a) in self.aspect_ratios.iter().enumerate() {
            if self.aspect_ratios[..i].iter().any(|b| b.ratio == a.ratio) {
                return Err(CraftError::config(format!(
                    "aspect ratio {} is listed twice",
                    a.ratio
                )));
            }
        }

        self.text_overlay.validate()?;

        if self.concurrency.workers == Some(0) {
            return Err(CraftError::config(
                "concurrency.workers must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// `${NAME}` -> `NAME`.
fn env_placeholder(s: &str) -> Option<&str> {
    s.trim()
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
#[path = "../../tests/unit/model/config.rs"]
mod tests;
