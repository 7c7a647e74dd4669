use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::assets::decode::decode_image;
use crate::assets::store::AssetStore;
use crate::foundation::core::{ImageSize, PreparedImage};
use crate::foundation::error::{CraftError, CraftResult};
use crate::generation::client::{
    GenerationAttempt, GenerationClient, GenerationError, GenerationErrorKind,
};
use crate::model::brief::{CampaignBrief, Product};

/// Where a source image came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Reused,
    Generated,
}

/// The single source image every variant of a product derives from.
#[derive(Clone, Debug)]
pub struct SourceAsset {
    pub product_id: String,
    pub image: Arc<PreparedImage>,
    pub origin: Origin,
    pub dimensions: ImageSize,
    /// Input file, for reused assets.
    pub source_path: Option<PathBuf>,
    /// Provider that produced a generated asset.
    pub provider: Option<String>,
    pub generation_attempts: Vec<GenerationAttempt>,
}

/// Brief-level inputs to prompt building and generation.
#[derive(Clone, Copy, Debug)]
pub struct ResolveContext<'a> {
    pub target_audience: &'a str,
    pub target_region: &'a str,
    pub generation_size: ImageSize,
}

impl<'a> ResolveContext<'a> {
    pub fn from_brief(brief: &'a CampaignBrief, generation_size: ImageSize) -> Self {
        Self {
            target_audience: &brief.target_audience,
            target_region: &brief.target_region,
            generation_size,
        }
    }
}

/// Decides reuse vs. generation for each product.
pub struct AssetResolver<'a> {
    store: &'a AssetStore,
    generator: Option<&'a GenerationClient>,
}

impl<'a> AssetResolver<'a> {
    pub fn new(store: &'a AssetStore, generator: Option<&'a GenerationClient>) -> Self {
        Self { store, generator }
    }

    /// Reuse the first decodable input asset, otherwise generate one.
    ///
    /// Errors are per-product: an empty id or name is a validation error, generation failures come back
    /// as [`CraftError::Generation`] carrying the attempt log.
    #[tracing::instrument(skip_all, fields(product_id = %product.product_id))]
    pub fn resolve(&self, product: &Product, ctx: &ResolveContext<'_>) -> CraftResult<SourceAsset> {
        let id = product.product_id.trim();
        if id.is_empty() {
            return Err(CraftError::validation(format!(
                "product \"{}\" has an empty product_id",
                product.name
            )));
        }
        if product.name.trim().is_empty() {
            return Err(CraftError::validation(format!(
                "product \"{id}\" has an empty name"
            )));
        }

        for candidate in self.store.read_candidates(id)? {
            match decode_image(&candidate.bytes) {
                Ok(image) => {
                    tracing::info!(path = %candidate.path.display(), "reusing input asset");
                    return Ok(SourceAsset {
                        product_id: id.to_owned(),
                        dimensions: image.size(),
                        image: Arc::new(image),
                        origin: Origin::Reused,
                        source_path: Some(candidate.path),
                        provider: None,
                        generation_attempts: Vec::new(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        path = %candidate.path.display(),
                        error = %e,
                        "input asset failed to decode; treating as absent"
                    );
                }
            }
        }

        let Some(generator) = self.generator else {
            return Err(GenerationError {
                kind: GenerationErrorKind::NoProviders,
                attempts: Vec::new(),
                detail: Some("no usable input asset and no generation provider".to_owned()),
            }
            .into());
        };

        let prompt = build_prompt(product, ctx.target_audience, ctx.target_region);
        tracing::info!(size = %ctx.generation_size, "no usable input asset; generating");
        let out = generator.generate(&prompt, ctx.generation_size)?;
        let image = decode_image(&out.bytes).map_err(|e| GenerationError {
            kind: GenerationErrorKind::Undecodable,
            attempts: out.attempts.clone(),
            detail: Some(e.to_string()),
        })?;

        Ok(SourceAsset {
            product_id: id.to_owned(),
            dimensions: image.size(),
            image: Arc::new(image),
            origin: Origin::Generated,
            source_path: None,
            provider: Some(out.provider),
            generation_attempts: out.attempts,
        })
    }
}

/// Generation prompt for a product.
pub fn build_prompt(product: &Product, audience: &str, region: &str) -> String {
    let mut prompt = format!(
        "Create a high-quality advertising image for {}. Target audience: {audience}. Market: {region}. \
         Style: professional product photography with clean background, product-focused composition, \
         suitable for social media advertising.",
        product.name.trim()
    );
    if let Some(desc) = product
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        prompt.push_str(" Product details: ");
        prompt.push_str(desc.trim_end_matches('.'));
        prompt.push('.');
    }
    prompt
}

#[cfg(test)]
#[path = "../tests/unit/resolve.rs"]
mod tests;
