use crate::compose::blend::PixelRect;
use crate::foundation::core::{AspectRatio, PreparedImage};
use crate::foundation::error::{CraftError, CraftResult};
use crate::model::config::{AspectRatioSpec, CropStrategy};

/// Smallest crop edge produced without upscaling the source first.
pub const MIN_CROP_EDGE: u32 = 128;

/// Fraction of the vertical slack kept above a `top_weighted` crop.
pub const TOP_WEIGHT: f64 = 0.3;

/// Refuse to upscale into buffers larger than this many pixels.
const MAX_UPSCALED_PIXELS: u64 = 100_000_000;

fn exact_fit(width: u32, height: u32, ratio: AspectRatio) -> (f64, f64) {
    let (w, h) = (f64::from(width), f64::from(height));
    let r = ratio.as_f64();
    if w / h > r { (h * r, h) } else { (w, w / r) }
}

/// Largest `ratio` rectangle that fits in `width x height`.
pub fn largest_fit(width: u32, height: u32, ratio: AspectRatio) -> (u32, u32) {
    let (cw, ch) = exact_fit(width, height, ratio);
    (
        cw.round().clamp(1.0, f64::from(width)) as u32,
        ch.round().clamp(1.0, f64::from(height)) as u32,
    )
}

/// Position a `cw x ch` crop inside `width x height`.
pub fn place(width: u32, height: u32, cw: u32, ch: u32, strategy: CropStrategy) -> PixelRect {
    let slack_x = width.saturating_sub(cw);
    let slack_y = height.saturating_sub(ch);
    let y = match strategy {
        CropStrategy::Center => slack_y / 2,
        CropStrategy::TopWeighted => (f64::from(slack_y) * TOP_WEIGHT).floor() as u32,
    };
    PixelRect {
        x: slack_x / 2,
        y,
        width: cw,
        height: ch,
    }
}

/// What [`crop_to_ratio`] will do for a given source size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropPlan {
    /// Source already has the ratio.
    Identity,
    /// Crop straight from the source.
    Crop(PixelRect),
    /// Upscale the source to `width x height` once, then crop from that buffer.
    UpscaleThenCrop {
        width: u32,
        height: u32,
        rect: PixelRect,
    },
}

pub fn plan_crop(width: u32, height: u32, spec: &AspectRatioSpec) -> CraftResult<CropPlan> {
    if width == 0 || height == 0 {
        return Err(CraftError::composition("cannot crop an empty image"));
    }
    if spec.ratio.matches(width, height) {
        return Ok(CropPlan::Identity);
    }

    let required = spec.min_short_side.unwrap_or(0).max(MIN_CROP_EDGE);
    let (cw, ch) = largest_fit(width, height, spec.ratio);
    if cw >= required && ch >= required {
        return Ok(CropPlan::Crop(place(width, height, cw, ch, spec.strategy())));
    }

    let (exact_w, exact_h) = exact_fit(width, height, spec.ratio);
    let scale = f64::from(required) / exact_w.min(exact_h);
    let up_w = (f64::from(width) * scale).ceil() as u32;
    let up_h = (f64::from(height) * scale).ceil() as u32;
    if u64::from(up_w) * u64::from(up_h) > MAX_UPSCALED_PIXELS {
        return Err(CraftError::composition(format!(
            "upscaling {width}x{height} to {up_w}x{up_h} for {} exceeds the pixel limit",
            spec.ratio
        )));
    }
    let (cw, ch) = largest_fit(up_w, up_h, spec.ratio);
    Ok(CropPlan::UpscaleThenCrop {
        width: up_w,
        height: up_h,
        rect: place(up_w, up_h, cw, ch, spec.strategy()),
    })
}

/// Produce a new image whose ratio matches `spec.ratio` within tolerance.
///
/// Sources are never downscaled; small sources are upscaled once (Lanczos3) before the single
/// crop.
pub fn crop_to_ratio(img: &PreparedImage, spec: &AspectRatioSpec) -> CraftResult<PreparedImage> {
    match plan_crop(img.width, img.height, spec)? {
        CropPlan::Identity => PreparedImage::from_premul(
            img.width,
            img.height,
            img.rgba8_premul.as_ref().clone(),
        ),
        CropPlan::Crop(rect) => copy_rect(img, rect),
        CropPlan::UpscaleThenCrop {
            width,
            height,
            rect,
        } => {
            tracing::debug!(
                from = %img.size(),
                to = %format!("{width}x{height}"),
                ratio = %spec.ratio,
                "upscaling source before crop"
            );
            let up = upscale(img, width, height)?;
            copy_rect(&up, rect)
        }
    }
}

fn copy_rect(img: &PreparedImage, rect: PixelRect) -> CraftResult<PreparedImage> {
    let clipped = rect.clipped(img.width, img.height);
    if clipped != rect || rect.is_empty() {
        return Err(CraftError::composition(format!(
            "crop rect {rect:?} does not fit {}x{}",
            img.width, img.height
        )));
    }
    let stride = img.width as usize * 4;
    let row_len = rect.width as usize * 4;
    let mut out = Vec::with_capacity(row_len * rect.height as usize);
    for y in rect.y..rect.y + rect.height {
        let start = y as usize * stride + rect.x as usize * 4;
        out.extend_from_slice(&img.rgba8_premul[start..start + row_len]);
    }
    PreparedImage::from_premul(rect.width, rect.height, out)
}

fn upscale(img: &PreparedImage, width: u32, height: u32) -> CraftResult<PreparedImage> {
    let src = image::RgbaImage::from_raw(img.width, img.height, img.rgba8_premul.as_ref().clone())
        .ok_or_else(|| CraftError::composition("rgba8 buffer does not match dimensions"))?;
    let resized =
        image::imageops::resize(&src, width, height, image::imageops::FilterType::Lanczos3);
    let mut buf = resized.into_raw();
    // Lanczos ringing can push a premultiplied channel above its alpha.
    for px in buf.chunks_exact_mut(4) {
        let a = px[3];
        for c in &mut px[..3] {
            *c = (*c).min(a);
        }
    }
    PreparedImage::from_premul(width, height, buf)
}

#[cfg(test)]
#[path = "../../tests/unit/compose/crop.rs"]
mod tests;
