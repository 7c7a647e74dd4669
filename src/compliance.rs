//! Hook for external brand/legal checkers.
//!
//! Checkers see every finished variant. Their outcome is recorded in the run report and
//! never blocks or alters the written image.

use serde::Serialize;

use crate::foundation::core::{AspectRatio, PreparedImage};

/// Read-only view of one composed variant.
#[derive(Clone, Copy, Debug)]
pub struct VariantView<'a> {
    pub product_id: &'a str,
    pub ratio: AspectRatio,
    pub image: &'a PreparedImage,
    /// Overlay text burned into the image.
    pub text: &'a str,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceOutcome {
    pub passed: bool,
    pub details: String,
    pub violations: Vec<String>,
}

impl ComplianceOutcome {
    pub fn pass(details: impl Into<String>) -> Self {
        Self {
            passed: true,
            details: details.into(),
            violations: Vec::new(),
        }
    }

    pub fn fail(details: impl Into<String>, violations: Vec<String>) -> Self {
        Self {
            passed: false,
            details: details.into(),
            violations,
        }
    }
}

pub trait ComplianceCheck: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, variant: &VariantView<'_>) -> ComplianceOutcome;
}

/// One checker's verdict on one variant, as stored in the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComplianceRecord {
    pub product_id: String,
    pub aspect_ratio: AspectRatio,
    pub checker: String,
    #[serde(flatten)]
    pub outcome: ComplianceOutcome,
}

/// Run every checker against `variant`.
pub fn evaluate_all(
    checks: &[Box<dyn ComplianceCheck>],
    variant: &VariantView<'_>,
) -> Vec<ComplianceRecord> {
    checks
        .iter()
        .map(|check| {
            let outcome = check.evaluate(variant);
            if !outcome.passed {
                tracing::warn!(
                    checker = check.name(),
                    product_id = variant.product_id,
                    ratio = %variant.ratio,
                    violations = outcome.violations.len(),
                    "compliance check failed"
                );
            }
            ComplianceRecord {
                product_id: variant.product_id.to_owned(),
                aspect_ratio: variant.ratio,
                checker: check.name().to_owned(),
                outcome,
            }
        })
        .collect()
}
