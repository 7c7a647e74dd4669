use crate::compose::overlay::OverlayError;
use crate::generation::client::GenerationError;

/// Crate-wide result alias.
pub type CraftResult<T> = Result<T, CraftError>;

/// Top-level error type for the pipeline.
///
/// Per-product and per-variant failures are usually recorded in the run report rather than
/// returned; only configuration and storage errors escape a run.
#[derive(thiserror::Error, Debug)]
pub enum CraftError {
    /// Brief or value-level validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Reading or writing the asset store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Image generation failed after the retry policy ran out.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Text overlay could not be applied.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Pixel-level composition failure (crop, resize, encode).
    #[error("composition error: {0}")]
    Composition(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CraftError {
    /// Build a [`CraftError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CraftError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`CraftError::Storage`].
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Build a [`CraftError::Composition`].
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Build a [`CraftError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` when this error must abort the whole run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Config(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
