use serde::Serialize;

use crate::assets::color::Rgba8;
use crate::compose::blend::{PixelRect, fill_rect_over, sample_region};
use crate::compose::text::{TextMeasure, font_px, wrap_lines};
use crate::foundation::core::{ImageSize, PreparedImage};
use crate::foundation::math::{contrast_ratio, relative_luminance};
use crate::model::config::{TextOverlaySpec, TextPosition};

/// Highest band opacity the contrast policy will raise to.
pub const MAX_BAND_OPACITY: f64 = 0.95;

const OPACITY_STEP: f64 = 0.05;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("font unavailable: {0}")]
    FontUnavailable(String),

    #[error("overlay text is empty")]
    EmptyText,

    #[error("image {0} exceeds the text rasterizer limit of 65535 px per side")]
    ImageTooLarge(ImageSize),

    #[error("text layout failed: {0}")]
    Layout(String),
}

/// One wrapped line with its slot inside the band.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    /// Left edge; lines are centered horizontally.
    pub x: f32,
    /// Top of the line slot.
    pub top: f32,
    /// `font_px * line_spacing_multiplier`.
    pub slot_height: f32,
    /// Measured width at the layout font size.
    pub width: f32,
}

/// Rasterizes placed lines onto a premultiplied canvas.
pub trait TextPainter: TextMeasure {
    fn paint_lines(
        &mut self,
        canvas: &mut [u8],
        width: u32,
        height: u32,
        lines: &[PlacedLine],
        font_px: f32,
        color: Rgba8,
    ) -> Result<(), OverlayError>;
}

/// Geometry of an overlay before anything is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLayout {
    pub font_px: f32,
    /// `max_width_ratio * image_width`.
    pub max_line_width: f32,
    pub lines: Vec<PlacedLine>,
    /// Background band, full image width.
    pub band: PixelRect,
}

/// Band color and opacity chosen by the contrast policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ContrastDecision {
    pub opacity: f64,
    pub band_color: Rgba8,
    /// Contrast between the text and the worst-case band pixel after blending.
    pub contrast: f64,
    /// Same, without the band.
    pub unblended_contrast: f64,
}

pub struct OverlayResult {
    pub image: PreparedImage,
    pub layout: OverlayLayout,
    pub decision: ContrastDecision,
}

/// Wrap `text` and place the band for a `width x height` image.
pub fn layout_overlay(
    width: u32,
    height: u32,
    text: &str,
    spec: &TextOverlaySpec,
    measure: &mut dyn TextMeasure,
) -> Result<OverlayLayout, OverlayError> {
    let font_px = font_px(spec, width, height);
    let max_line_width = spec.max_width_ratio * width as f32;
    let wrapped = wrap_lines(text, max_line_width, font_px, measure);
    if wrapped.is_empty() {
        return Err(OverlayError::EmptyText);
    }

    let padding = spec.padding as f32;
    let slot_height = font_px * spec.line_spacing_multiplier;
    let band_h = (wrapped.len() as f32 * slot_height + 2.0 * padding)
        .ceil()
        .min(height as f32) as u32;
    let slack = height - band_h;
    let band_y = match spec.position {
        TextPosition::Top => spec.padding.min(slack),
        TextPosition::Center => slack / 2,
        TextPosition::Bottom => slack.saturating_sub(spec.padding),
    };

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let width_px = measure.line_width(&text, font_px);
            PlacedLine {
                x: ((width as f32 - width_px) / 2.0).max(0.0),
                top: band_y as f32 + padding + i as f32 * slot_height,
                slot_height,
                width: width_px,
                text,
            }
        })
        .collect();

    Ok(OverlayLayout {
        font_px,
        max_line_width,
        lines,
        band: PixelRect {
            x: 0,
            y: band_y,
            width,
            height: band_h,
        },
    })
}

/// Pick the band opacity for a worst-case background color `critical_rgb` (straight sRGB in
/// `[0, 1]`).
///
/// The opacity starts at `max(background_opacity, opacity_floor)` and rises in small steps,
/// up to [`MAX_BAND_OPACITY`], until the blended band reaches `min_contrast_ratio`. With
/// `allow_low_opacity_when_contrasting`, a configured opacity below the floor is kept when the
/// background alone already has enough contrast.
pub fn resolve_band_opacity(
    critical_rgb: [f64; 3],
    text: Rgba8,
    spec: &TextOverlaySpec,
) -> ContrastDecision {
    let band_color = if text.is_dark() {
        Rgba8::WHITE
    } else {
        Rgba8::BLACK
    };
    let band_rgb = band_color.rgb_unit();
    let text_lum = text.luminance();
    let contrast_at = |alpha: f64| {
        let blended: [f64; 3] =
            std::array::from_fn(|i| critical_rgb[i] * (1.0 - alpha) + band_rgb[i] * alpha);
        contrast_ratio(relative_luminance(blended), text_lum)
    };

    let configured = f64::from(spec.background_opacity).clamp(0.0, 1.0);
    let floor = f64::from(spec.opacity_floor).clamp(0.0, 1.0);
    let min_contrast = f64::from(spec.min_contrast_ratio);
    let unblended_contrast = contrast_at(0.0);

    let mut opacity = if spec.allow_low_opacity_when_contrasting
        && configured < floor
        && unblended_contrast >= min_contrast
    {
        configured
    } else {
        let mut a = configured.max(floor);
        while contrast_at(a) < min_contrast && a < MAX_BAND_OPACITY {
            a = (a + OPACITY_STEP).min(MAX_BAND_OPACITY);
        }
        a
    };
    // Keep the reported value free of accumulated float noise.
    opacity = (opacity * 1000.0).round() / 1000.0;

    ContrastDecision {
        opacity,
        band_color,
        contrast: contrast_at(opacity),
        unblended_contrast,
    }
}

/// Draw `text` over a copy of `img`: the contrast band first, then the glyphs.
pub fn apply_overlay(
    img: &PreparedImage,
    text: &str,
    spec: &TextOverlaySpec,
    painter: &mut dyn TextPainter,
) -> Result<OverlayResult, OverlayError> {
    if text.trim().is_empty() {
        return Err(OverlayError::EmptyText);
    }
    if img.width > u32::from(u16::MAX) || img.height > u32::from(u16::MAX) {
        return Err(OverlayError::ImageTooLarge(img.size()));
    }

    let layout = layout_overlay(img.width, img.height, text, spec, painter)?;

    let decision = match sample_region(img, layout.band) {
        Some(sample) => {
            let critical = if spec.color.is_dark() {
                sample.dark_rgb
            } else {
                sample.bright_rgb
            };
            resolve_band_opacity(critical, spec.color, spec)
        }
        // Empty band: no background to measure, the floor alone applies.
        None => resolve_band_opacity([0.0; 3], spec.color, spec),
    };

    let mut canvas = img.rgba8_premul.as_ref().clone();
    fill_rect_over(
        &mut canvas,
        img.width,
        img.height,
        layout.band,
        decision.band_color.to_premul_with_opacity(decision.opacity),
    );
    painter.paint_lines(
        &mut canvas,
        img.width,
        img.height,
        &layout.lines,
        layout.font_px,
        spec.color,
    )?;

    tracing::debug!(
        size = %img.size(),
        lines = layout.lines.len(),
        font_px = layout.font_px,
        opacity = decision.opacity,
        contrast = decision.contrast,
        "text overlay applied"
    );

    let image = PreparedImage::from_premul(img.width, img.height, canvas)
        .map_err(|e| OverlayError::Layout(e.to_string()))?;
    Ok(OverlayResult {
        image,
        layout,
        decision,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/compose/overlay.rs"]
mod tests;
