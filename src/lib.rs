//! adcraft turns a campaign brief into ready-to-publish ad images.
//!
//! For each product the pipeline:
//!
//! - reuses an input image or generates one through an [`ImageProvider`] with retries and a
//!   single fallback provider ([`GenerationClient`])
//! - crops it to every configured [`AspectRatio`] ([`crop_to_ratio`])
//! - burns in the campaign message over a contrast-safe band ([`apply_overlay`])
//!
//! and records the outcome of every requested output in a [`RunReport`].
#![forbid(unsafe_code)]

pub mod assets;
pub mod compliance;
pub mod compose;
pub mod foundation;
pub mod generation;
pub mod model;
pub mod pipeline;
pub mod resolve;

pub use crate::assets::color::Rgba8;
pub use crate::assets::decode::{decode_image, encode_png};
pub use crate::assets::store::AssetStore;
pub use crate::compliance::{ComplianceCheck, ComplianceOutcome, ComplianceRecord, VariantView};
pub use crate::compose::crop::crop_to_ratio;
pub use crate::compose::overlay::{OverlayError, TextPainter, apply_overlay};
pub use crate::compose::text::{TextLayoutEngine, TextMeasure};
pub use crate::foundation::core::{AspectRatio, ImageSize, PreparedImage};
pub use crate::foundation::error::{CraftError, CraftResult};
pub use crate::generation::client::{
    Clock, GenerationAttempt, GenerationClient, GenerationError, GenerationErrorKind, RetryPolicy,
};
pub use crate::generation::provider::{FailureKind, ImageProvider, ProviderFailure};
pub use crate::model::brief::{CampaignBrief, Product};
pub use crate::model::config::{AspectRatioSpec, CropStrategy, PipelineConfig, TextOverlaySpec};
pub use crate::pipeline::driver::{PainterFactory, Pipeline, ProductState};
pub use crate::pipeline::report::RunReport;
pub use crate::resolve::{AssetResolver, Origin, SourceAsset};
