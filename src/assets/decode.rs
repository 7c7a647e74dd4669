use std::io::Cursor;

use anyhow::Context;

use crate::foundation::core::PreparedImage;
use crate::foundation::error::{CraftError, CraftResult};

/// Decode any supported encoding into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> CraftResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    PreparedImage::from_premul(width, height, rgba8_premul)
}

/// Encode a prepared image as PNG (straight alpha).
pub fn encode_png(img: &PreparedImage) -> CraftResult<Vec<u8>> {
    let mut straight = img.rgba8_premul.as_ref().clone();
    unpremultiply_rgba8_in_place(&mut straight);
    let rgba = image::RgbaImage::from_raw(img.width, img.height, straight)
        .ok_or_else(|| CraftError::composition("rgba8 buffer does not match dimensions"))?;

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(buf)
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
