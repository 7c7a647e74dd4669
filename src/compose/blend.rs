use crate::foundation::core::PreparedImage;
use crate::foundation::error::{CraftError, CraftResult};
use crate::foundation::math::{premul_over_px, relative_luminance};

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Clip to `width x height`.
    pub fn clipped(self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Source-over a premultiplied color onto `rect` of a tightly packed RGBA8 buffer.
pub(crate) fn fill_rect_over(dst: &mut [u8], width: u32, height: u32, rect: PixelRect, px: [u8; 4]) {
    let rect = rect.clipped(width, height);
    if rect.is_empty() || px[3] == 0 {
        return;
    }
    let stride = width as usize * 4;
    for y in rect.y..rect.y + rect.height {
        let row = y as usize * stride;
        let start = row + rect.x as usize * 4;
        let end = start + rect.width as usize * 4;
        for d in dst[start..end].chunks_exact_mut(4) {
            let out = premul_over_px([d[0], d[1], d[2], d[3]], px);
            d.copy_from_slice(&out);
        }
    }
}

pub(crate) fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> CraftResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(CraftError::composition(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let out = premul_over_px([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Luminance summary of an image region, in straight sRGB seen over black.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionSample {
    pub mean_rgb: [f64; 3],
    pub mean_luminance: f64,
    /// 90th-percentile brightest sample.
    pub bright_rgb: [f64; 3],
    /// 90th-percentile darkest sample.
    pub dark_rgb: [f64; 3],
}

/// Upper bound on visited pixels; larger regions are strided.
const MAX_SAMPLES: u64 = 65_536;

pub fn sample_region(img: &PreparedImage, rect: PixelRect) -> Option<RegionSample> {
    let rect = rect.clipped(img.width, img.height);
    if rect.is_empty() {
        return None;
    }
    let area = u64::from(rect.width) * u64::from(rect.height);
    let step = ((area as f64 / MAX_SAMPLES as f64).sqrt().ceil() as u32).max(1);

    let mut samples: Vec<(f64, [f64; 3])> = Vec::new();
    let mut sum = [0.0f64; 3];
    let mut y = rect.y;
    while y < rect.y + rect.height {
        let mut x = rect.x;
        while x < rect.x + rect.width {
            let p = img.pixel(x, y);
            // Premultiplied channels are the color seen over black.
            let rgb = [p[0], p[1], p[2]].map(|c| f64::from(c) / 255.0);
            for c in 0..3 {
                sum[c] += rgb[c];
            }
            samples.push((relative_luminance(rgb), rgb));
            x += step;
        }
        y += step;
    }

    let n = samples.len() as f64;
    let mean_rgb = sum.map(|s| s / n);
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    let last = samples.len() - 1;
    let hi = ((last as f64) * 0.9).round() as usize;
    let lo = ((last as f64) * 0.1).round() as usize;
    Some(RegionSample {
        mean_rgb,
        mean_luminance: relative_luminance(mean_rgb),
        bright_rgb: samples[hi].1,
        dark_rgb: samples[lo].1,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/compose/blend.rs"]
mod tests;
