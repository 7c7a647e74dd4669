use std::{collections::BTreeSet, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{CraftError, CraftResult};

/// One product to produce creatives for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_specific_message: Option<String>,
}

/// Campaign description driving a single run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub campaign_id: String,
    pub products: Vec<Product>,
    pub target_region: String,
    pub target_audience: String,
    pub campaign_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization: Option<Localization>,
}

impl CampaignBrief {
    /// Parse and validate a JSON brief.
    pub fn from_json_str(s: &str) -> CraftResult<Self> {
        let brief: Self = serde_json::from_str(s)
            .map_err(|e| CraftError::serde(format!("parse brief JSON: {e}")))?;
        brief.validate()?;
        Ok(brief)
    }

    /// Load and validate a JSON brief from disk.
    pub fn load(path: &Path) -> CraftResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read brief '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Campaign-level presence checks.
    ///
    /// Product fields are checked per product during the run, so one malformed entry fails
    /// alone (see [`CampaignBrief::repeated_products`]).
    pub fn validate(&self) -> CraftResult<()> {
        fn required(field: &str, v: &str) -> CraftResult<()> {
            if v.trim().is_empty() {
                return Err(CraftError::validation(format!(
                    "brief field '{field}' must be non-empty"
                )));
            }
            Ok(())
        }

        required("campaign_id", &self.campaign_id)?;
        required("target_region", &self.target_region)?;
        required("target_audience", &self.target_audience)?;
        required("campaign_message", &self.campaign_message)?;
        if self.products.is_empty() {
            return Err(CraftError::validation("brief must list at least one product"));
        }

        if let Some(loc) = &self.localization {
            required("localization.language", &loc.language)?;
        }
        Ok(())
    }

    /// Indices of products whose trimmed, non-empty id already appeared earlier in the list.
    pub fn repeated_products(&self) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut repeated = BTreeSet::new();
        for (i, p) in self.products.iter().enumerate() {
            let id = p.product_id.trim();
            if !id.is_empty() && !seen.insert(id) {
                repeated.insert(i);
            }
        }
        repeated
    }

    /// Text burned into every variant.
    pub fn overlay_message(&self) -> &str {
        self.localization
            .as_ref()
            .and_then(|l| l.region_specific_message.as_deref())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.campaign_message)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/brief.rs"]
mod tests;
