use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Instant,
};

use rayon::prelude::*;

use crate::assets::decode::encode_png;
use crate::assets::store::AssetStore;
use crate::compliance::{ComplianceCheck, ComplianceRecord, VariantView, evaluate_all};
use crate::compose::crop::crop_to_ratio;
use crate::compose::overlay::{OverlayError, TextPainter, apply_overlay};
use crate::compose::text::{FontSource, TextLayoutEngine, resolve_font};
use crate::foundation::core::{AspectRatio, PreparedImage};
use crate::foundation::error::{CraftError, CraftResult};
use crate::generation::client::GenerationClient;
use crate::model::brief::{CampaignBrief, Product};
use crate::model::config::{AspectRatioSpec, PipelineConfig};
use crate::pipeline::report::{
    FailureEntry, FailureStage, ProductOutcome, REPORT_FILE_NAME, ReportEntry, RunReport,
};
use crate::resolve::{AssetResolver, ResolveContext, SourceAsset};

/// Lifecycle of one product within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductState {
    Pending,
    Resolving,
    Resolved,
    /// Terminal for the product; no ratio is attempted.
    ResolutionFailed,
    Compositing,
    /// At least one ratio was written.
    Composed,
    /// Terminal for that one ratio; siblings continue.
    CompositionFailed(AspectRatio),
}

impl ProductState {
    pub fn can_advance_to(self, next: Self) -> bool {
        use ProductState::*;
        matches!(
            (self, next),
            (Pending, Resolving)
                | (Resolving, Resolved | ResolutionFailed)
                | (Resolved, Compositing)
                | (Compositing | CompositionFailed(_), Composed | CompositionFailed(_))
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ResolutionFailed | Self::Composed)
    }
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Resolving => f.write_str("resolving"),
            Self::Resolved => f.write_str("resolved"),
            Self::ResolutionFailed => f.write_str("resolution_failed"),
            Self::Compositing => f.write_str("compositing"),
            Self::Composed => f.write_str("composed"),
            Self::CompositionFailed(r) => write!(f, "composition_failed({r})"),
        }
    }
}

fn advance(product_id: &str, state: &mut ProductState, next: ProductState) {
    debug_assert!(
        state.can_advance_to(next),
        "illegal product transition {state} -> {next}"
    );
    tracing::debug!(product_id, from = %state, to = %next, "product state");
    *state = next;
}

/// Later occurrences of an id fail; the first one owns the output paths.
fn repeated_outcome(product: &Product) -> ProductOutcome {
    let id = product.product_id.trim();
    tracing::error!(product_id = id, "duplicate product_id in brief; skipping");
    let mut outcome = ProductOutcome::new(id);
    outcome.failures.push(FailureEntry {
        product_id: id.to_owned(),
        aspect_ratio: None,
        stage: FailureStage::Resolution,
        reason: format!("duplicate product_id \"{id}\"; only the first occurrence is processed"),
        generation_attempts: Vec::new(),
    });
    outcome
}

struct WrittenVariant {
    entry: ReportEntry,
    compliance: Vec<ComplianceRecord>,
}

/// Hands out a text painter per composition task.
pub trait PainterFactory: Send + Sync {
    fn painter(&self) -> Result<Box<dyn TextPainter>, OverlayError>;
}

/// Parley/vello_cpu painters over a font resolved on first use.
pub struct SystemFontPainters {
    family: String,
    font: OnceLock<Result<FontSource, OverlayError>>,
}

impl SystemFontPainters {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            font: OnceLock::new(),
        }
    }
}

impl PainterFactory for SystemFontPainters {
    fn painter(&self) -> Result<Box<dyn TextPainter>, OverlayError> {
        let font = self.font.get_or_init(|| {
            let resolved = resolve_font(&self.family);
            match &resolved {
                Ok(src) => tracing::info!(family = %self.family, path = %src.path.display(), "overlay font resolved"),
                Err(e) => tracing::error!(family = %self.family, error = %e, "overlay font unavailable"),
            }
            resolved
        });
        match font {
            Ok(src) => Ok(Box::new(TextLayoutEngine::new(src)?)),
            Err(e) => Err(e.clone()),
        }
    }
}

/// One campaign run: resolve every product, compose every ratio, write outputs and the report.
pub struct Pipeline {
    config: PipelineConfig,
    store: AssetStore,
    generator: Option<GenerationClient>,
    painters: Arc<dyn PainterFactory>,
    checks: Vec<Box<dyn ComplianceCheck>>,
}

impl Pipeline {
    /// Build a pipeline from configuration. Providers come from `generation.providers`; with
    /// none configured, products without an input asset fail.
    pub fn new(config: PipelineConfig) -> CraftResult<Self> {
        config.validate()?;
        let generator = if config.generation.providers.is_empty() {
            tracing::warn!("no generation providers configured; only input assets can be used");
            None
        } else {
            Some(GenerationClient::from_config(&config.generation)?)
        };
        Ok(Self {
            store: AssetStore::new(&config.storage.input_dir, &config.storage.output_dir),
            painters: Arc::new(SystemFontPainters::new(&config.text_overlay.font_family)),
            config,
            generator,
            checks: Vec::new(),
        })
    }

    /// A pipeline that only composes: configured providers are ignored and never built.
    pub fn without_generation(mut config: PipelineConfig) -> CraftResult<Self> {
        config.generation.providers.clear();
        Self::new(config)
    }

    pub fn with_generator(mut self, generator: Option<GenerationClient>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_painters(mut self, painters: Arc<dyn PainterFactory>) -> Self {
        self.painters = painters;
        self
    }

    pub fn with_compliance(mut self, check: Box<dyn ComplianceCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Process every product of `brief` and write `report.json`.
    ///
    /// Per-product and per-ratio failures land in the report. Only storage errors end the run
    /// early, leaving already written outputs in place.
    #[tracing::instrument(skip_all, fields(campaign_id = %brief.campaign_id))]
    pub fn run(&self, brief: &CampaignBrief) -> CraftResult<RunReport> {
        brief.validate()?;
        let started = Instant::now();
        let pool = build_thread_pool(self.config.concurrency.workers)?;
        let resolver = AssetResolver::new(&self.store, self.generator.as_ref());
        let ctx = ResolveContext::from_brief(brief, self.config.generation.size);
        let repeated = brief.repeated_products();
        tracing::info!(
            products = brief.products.len(),
            ratios = self.config.aspect_ratios.len(),
            threads = pool.current_num_threads(),
            "campaign run started"
        );

        let outcomes = pool.install(|| {
            brief
                .products
                .par_iter()
                .enumerate()
                .map(|(i, product)| {
                    if repeated.contains(&i) {
                        Ok(repeated_outcome(product))
                    } else {
                        self.process_product(brief, product, &resolver, &ctx)
                    }
                })
                .collect::<CraftResult<Vec<_>>>()
        })?;

        let report = RunReport::from_outcomes(&brief.campaign_id, outcomes, started.elapsed());
        let path =
            self.store
                .write_campaign_file(&brief.campaign_id, REPORT_FILE_NAME, &report.to_json()?)?;
        tracing::info!(
            report = %path.display(),
            outputs = report.summary.total_assets,
            failures = report.failures.len(),
            "campaign run finished"
        );
        Ok(report)
    }

    fn process_product(
        &self,
        brief: &CampaignBrief,
        product: &Product,
        resolver: &AssetResolver<'_>,
        ctx: &ResolveContext<'_>,
    ) -> CraftResult<ProductOutcome> {
        let id = product.product_id.trim();
        let mut outcome = ProductOutcome::new(id);
        let mut state = ProductState::Pending;
        advance(id, &mut state, ProductState::Resolving);

        let source = match resolver.resolve(product, ctx) {
            Ok(source) => source,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                advance(id, &mut state, ProductState::ResolutionFailed);
                tracing::error!(product_id = id, error = %e, "product failed");
                let generation_attempts = match &e {
                    CraftError::Generation(g) => g.attempts.clone(),
                    _ => Vec::new(),
                };
                outcome.failures.push(FailureEntry {
                    product_id: id.to_owned(),
                    aspect_ratio: None,
                    stage: FailureStage::Resolution,
                    reason: e.to_string(),
                    generation_attempts,
                });
                return Ok(outcome);
            }
        };
        advance(id, &mut state, ProductState::Resolved);
        advance(id, &mut state, ProductState::Compositing);

        let text = brief.overlay_message();
        let variants = self
            .config
            .aspect_ratios
            .par_iter()
            .map(|spec| self.compose_variant(brief, &source, spec, text))
            .collect::<CraftResult<Vec<_>>>()?;

        for variant in variants {
            match variant {
                Ok(written) => {
                    outcome.entries.push(written.entry);
                    outcome.compliance.extend(written.compliance);
                }
                Err(failure) => {
                    if let Some(ratio) = failure.aspect_ratio {
                        advance(id, &mut state, ProductState::CompositionFailed(ratio));
                    }
                    outcome.failures.push(failure);
                }
            }
        }
        if !outcome.entries.is_empty() {
            advance(id, &mut state, ProductState::Composed);
        }
        Ok(outcome)
    }

    /// Compose and write one ratio. The outer error aborts the run; the inner one fails only
    /// this ratio.
    fn compose_variant(
        &self,
        brief: &CampaignBrief,
        source: &SourceAsset,
        spec: &AspectRatioSpec,
        text: &str,
    ) -> CraftResult<Result<WrittenVariant, FailureEntry>> {
        let failed = |e: CraftError| {
            tracing::warn!(
                product_id = %source.product_id,
                ratio = %spec.ratio,
                error = %e,
                "variant failed"
            );
            FailureEntry {
                product_id: source.product_id.clone(),
                aspect_ratio: Some(spec.ratio),
                stage: FailureStage::Composition,
                reason: e.to_string(),
                generation_attempts: Vec::new(),
            }
        };

        let image = match self.render_variant(&source.image, spec, text) {
            Ok(image) => image,
            Err(e) => return Ok(Err(failed(e))),
        };
        let png = match encode_png(&image) {
            Ok(png) => png,
            Err(e) => return Ok(Err(failed(e))),
        };
        let path = self
            .store
            .write(&brief.campaign_id, &source.product_id, spec.ratio, &png)?;
        tracing::info!(
            product_id = %source.product_id,
            ratio = %spec.ratio,
            size = %image.size(),
            path = %path.display(),
            "variant written"
        );

        let compliance = evaluate_all(
            &self.checks,
            &VariantView {
                product_id: &source.product_id,
                ratio: spec.ratio,
                image: &image,
                text,
            },
        );
        Ok(Ok(WrittenVariant {
            entry: ReportEntry {
                product_id: source.product_id.clone(),
                aspect_ratio: spec.ratio,
                file_path: path,
                origin: source.origin,
                width: image.width,
                height: image.height,
                provider: source.provider.clone(),
                generation_attempts: source.generation_attempts.clone(),
            },
            compliance,
        }))
    }

    /// Crop `source` to `spec` and burn in `text`. Pure: nothing is written.
    pub fn render_variant(
        &self,
        source: &PreparedImage,
        spec: &AspectRatioSpec,
        text: &str,
    ) -> CraftResult<PreparedImage> {
        let cropped = crop_to_ratio(source, spec)?;
        let mut painter = self.painters.painter()?;
        let overlaid = apply_overlay(&cropped, text, &self.config.text_overlay, painter.as_mut())?;
        Ok(overlaid.image)
    }
}

pub(crate) fn build_thread_pool(workers: Option<usize>) -> CraftResult<rayon::ThreadPool> {
    if let Some(n) = workers
        && n == 0
    {
        return Err(CraftError::config(
            "concurrency 'workers' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("adcraft-{i}"));
    if let Some(n) = workers {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CraftError::config(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/driver.rs"]
mod tests;
