use std::{fmt::Write as _, path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::compliance::ComplianceRecord;
use crate::foundation::core::AspectRatio;
use crate::foundation::error::{CraftError, CraftResult};
use crate::generation::client::GenerationAttempt;
use crate::resolve::Origin;

/// File name of the run report inside `{output_dir}/{campaign_id}/`.
pub const REPORT_FILE_NAME: &str = "report.json";

/// One written variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub product_id: String,
    pub aspect_ratio: AspectRatio,
    pub file_path: PathBuf,
    pub origin: Origin,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generation_attempts: Vec<GenerationAttempt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Resolution,
    Composition,
}

/// A requested output that was not produced, with the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub product_id: String,
    /// `None` when the whole product failed before composition.
    pub aspect_ratio: Option<AspectRatio>,
    pub stage: FailureStage,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generation_attempts: Vec<GenerationAttempt>,
}

/// Everything one product contributed to the run. Built by one worker, merged by the driver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductOutcome {
    pub product_id: String,
    pub entries: Vec<ReportEntry>,
    pub failures: Vec<FailureEntry>,
    pub compliance: Vec<ComplianceRecord>,
}

impl ProductOutcome {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub products_processed: usize,
    pub product_ids: Vec<String>,
    pub total_assets: usize,
    pub assets_generated: usize,
    pub assets_reused: usize,
    pub assets_failed: usize,
}

/// Result of one campaign run, written as `report.json`.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub campaign_id: String,
    pub timestamp: DateTime<Utc>,
    pub execution_time_seconds: f64,
    /// `true` when every requested output was produced.
    pub success: bool,
    pub summary: ReportSummary,
    /// Sorted by `(product_id, aspect_ratio)`.
    pub outputs: Vec<ReportEntry>,
    pub failures: Vec<FailureEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compliance_results: Vec<ComplianceRecord>,
}

impl RunReport {
    /// Merge per-product outcomes in any order into a deterministic report.
    pub fn from_outcomes(
        campaign_id: impl Into<String>,
        outcomes: Vec<ProductOutcome>,
        elapsed: Duration,
    ) -> Self {
        let mut product_ids = Vec::with_capacity(outcomes.len());
        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        let mut compliance_results = Vec::new();
        for outcome in outcomes {
            product_ids.push(outcome.product_id);
            outputs.extend(outcome.entries);
            failures.extend(outcome.failures);
            compliance_results.extend(outcome.compliance);
        }
        product_ids.sort();
        outputs.sort_by(|a, b| {
            (&a.product_id, a.aspect_ratio).cmp(&(&b.product_id, b.aspect_ratio))
        });
        failures.sort_by(|a, b| {
            (&a.product_id, a.aspect_ratio, a.stage).cmp(&(&b.product_id, b.aspect_ratio, b.stage))
        });
        compliance_results.sort_by(|a, b| {
            (&a.product_id, a.aspect_ratio, &a.checker).cmp(&(
                &b.product_id,
                b.aspect_ratio,
                &b.checker,
            ))
        });

        let assets_generated = outputs
            .iter()
            .filter(|e| e.origin == Origin::Generated)
            .count();
        let summary = ReportSummary {
            products_processed: product_ids.len(),
            product_ids,
            total_assets: outputs.len(),
            assets_generated,
            assets_reused: outputs.len() - assets_generated,
            assets_failed: failures.len(),
        };

        Self {
            campaign_id: campaign_id.into(),
            timestamp: Utc::now(),
            execution_time_seconds: elapsed.as_secs_f64(),
            success: failures.is_empty(),
            summary,
            outputs,
            failures,
            compliance_results,
        }
    }

    pub fn to_json(&self) -> CraftResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CraftError::serde(e.to_string()))
    }

    /// Human-readable run summary.
    pub fn format_summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut s = String::new();
        let _ = writeln!(s, "{rule}");
        let _ = writeln!(s, "CAMPAIGN RUN SUMMARY");
        let _ = writeln!(s, "{rule}");
        let _ = writeln!(s, "Campaign ID: {}", self.campaign_id);
        let _ = writeln!(s, "Timestamp: {}", self.timestamp.to_rfc3339());
        let _ = writeln!(
            s,
            "Status: {}",
            if self.success { "SUCCESS" } else { "FAILED" }
        );
        let _ = writeln!(s, "Execution Time: {:.2} seconds", self.execution_time_seconds);
        let _ = writeln!(s);
        let _ = writeln!(s, "SUMMARY:");
        let sm = &self.summary;
        let _ = writeln!(s, "  Products Processed: {}", sm.products_processed);
        let _ = writeln!(s, "  Product IDs: {}", sm.product_ids.join(", "));
        let _ = writeln!(s, "  Total Assets: {}", sm.total_assets);
        let _ = writeln!(s, "  Assets Generated: {}", sm.assets_generated);
        let _ = writeln!(s, "  Assets Reused: {}", sm.assets_reused);
        let _ = writeln!(s, "  Failed Outputs: {}", sm.assets_failed);

        if !self.failures.is_empty() {
            let _ = writeln!(s);
            let _ = writeln!(s, "FAILURES:");
            for f in &self.failures {
                match f.aspect_ratio {
                    Some(r) => {
                        let _ = writeln!(s, "  - {} ({r}): {}", f.product_id, f.reason);
                    }
                    None => {
                        let _ = writeln!(s, "  - {}: {}", f.product_id, f.reason);
                    }
                }
            }
        }

        if !self.compliance_results.is_empty() {
            let _ = writeln!(s);
            let _ = writeln!(s, "COMPLIANCE RESULTS:");
            for c in &self.compliance_results {
                let status = if c.outcome.passed { "PASSED" } else { "FAILED" };
                let _ = writeln!(
                    s,
                    "  - {} ({}) [{}]: {status}",
                    c.product_id, c.aspect_ratio, c.checker
                );
                for v in &c.outcome.violations {
                    let _ = writeln!(s, "    * {v}");
                }
            }
        }
        s.push_str(&rule);
        s
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/report.rs"]
mod tests;
