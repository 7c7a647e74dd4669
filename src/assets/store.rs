use std::path::{Path, PathBuf};

use crate::foundation::core::AspectRatio;
use crate::foundation::error::{CraftError, CraftResult};

/// Input encodings looked up for a product, in lookup order.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Raw bytes of one input file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredAsset {
    /// Where the bytes came from.
    pub path: PathBuf,
    /// Undecoded file content.
    pub bytes: Vec<u8>,
}

/// Local asset store: `{input_dir}/{product_id}.{ext}` in,
/// `{output_dir}/{campaign_id}/{product_id}/{WxH}_{product_id}.png` out.
#[derive(Clone, Debug)]
pub struct AssetStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl AssetStore {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Existing input files for `product_id`, in [`SUPPORTED_EXTENSIONS`] order.
    pub fn candidates(&self, product_id: &str) -> CraftResult<Vec<PathBuf>> {
        let id = path_segment(product_id)?;
        let mut out = Vec::new();
        for ext in SUPPORTED_EXTENSIONS {
            let found = [ext.to_owned(), ext.to_ascii_uppercase()]
                .into_iter()
                .map(|e| self.input_dir.join(format!("{id}.{e}")))
                .find(|p| p.is_file());
            if let Some(p) = found {
                out.push(p);
            }
        }
        Ok(out)
    }

    /// Read every candidate for `product_id`.
    ///
    /// Unreadable files are skipped with a warning; they count as absent.
    pub fn read_candidates(&self, product_id: &str) -> CraftResult<Vec<StoredAsset>> {
        let mut out = Vec::new();
        for path in self.candidates(product_id)? {
            match std::fs::read(&path) {
                Ok(bytes) => out.push(StoredAsset { path, bytes }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable input asset");
                }
            }
        }
        Ok(out)
    }

    /// First readable candidate for `product_id`, if any.
    pub fn read(&self, product_id: &str) -> CraftResult<Option<StoredAsset>> {
        Ok(self.read_candidates(product_id)?.into_iter().next())
    }

    /// Output path for one variant.
    pub fn variant_path(
        &self,
        campaign_id: &str,
        product_id: &str,
        ratio: AspectRatio,
    ) -> CraftResult<PathBuf> {
        let campaign = path_segment(campaign_id)?;
        let product = path_segment(product_id)?;
        Ok(self
            .output_dir
            .join(campaign)
            .join(product)
            .join(format!("{}_{product}.png", ratio.file_label())))
    }

    /// Write encoded variant bytes; the last writer for a path wins.
    pub fn write(
        &self,
        campaign_id: &str,
        product_id: &str,
        ratio: AspectRatio,
        bytes: &[u8],
    ) -> CraftResult<PathBuf> {
        let path = self.variant_path(campaign_id, product_id, ratio)?;
        write_file(&path, bytes)?;
        Ok(path)
    }

    /// Write a campaign-level file such as `report.json`.
    pub fn write_campaign_file(
        &self,
        campaign_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> CraftResult<PathBuf> {
        let path = self
            .output_dir
            .join(path_segment(campaign_id)?)
            .join(path_segment(file_name)?);
        write_file(&path, bytes)?;
        Ok(path)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> CraftResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CraftError::storage(format!("create dir '{}': {e}", parent.display()))
        })?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| CraftError::storage(format!("write '{}': {e}", path.display())))
}

/// Validate an identifier used as a single path component.
pub(crate) fn path_segment(id: &str) -> CraftResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CraftError::validation("identifier must be non-empty"));
    }
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(CraftError::validation(format!(
            "identifier \"{id}\" must not contain path separators or be '.'/'..'"
        )));
    }
    Ok(id)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
