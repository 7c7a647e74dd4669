use std::{fmt, sync::Arc};

use crate::foundation::error::{CraftError, CraftResult};

/// Relative tolerance for "this image already has the requested ratio".
pub const RATIO_TOLERANCE: f64 = 0.005;

/// Width:height proportion of an output variant, e.g. `9:16`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AspectRatio {
    /// Width term, must be > 0.
    pub num: u32,
    /// Height term, must be > 0.
    pub den: u32,
}

impl AspectRatio {
    /// Square.
    pub const SQUARE: Self = Self { num: 1, den: 1 };
    /// Vertical story format.
    pub const STORY: Self = Self { num: 9, den: 16 };
    /// Horizontal widescreen format.
    pub const LANDSCAPE: Self = Self { num: 16, den: 9 };

    /// Create a validated ratio.
    pub fn new(num: u32, den: u32) -> CraftResult<Self> {
        if num == 0 || den == 0 {
            return Err(CraftError::validation(
                "aspect ratio terms must both be > 0",
            ));
        }
        Ok(Self { num, den })
    }

    /// Parse `W:H`, `WxH` or `W/H`.
    pub fn parse(s: &str) -> CraftResult<Self> {
        let s = s.trim();
        let (w, h) = s
            .split_once(':')
            .or_else(|| s.split_once(['x', 'X']))
            .or_else(|| s.split_once('/'))
            .ok_or_else(|| {
                CraftError::validation(format!(
                    "aspect ratio \"{s}\" must look like W:H, WxH or W/H"
                ))
            })?;
        let term = |t: &str| {
            t.trim().parse::<u32>().map_err(|_| {
                CraftError::validation(format!("aspect ratio \"{s}\" has a non-integer term"))
            })
        };
        Self::new(term(w)?, term(h)?)
    }

    /// Ratio as `width / height`.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Filesystem-friendly label (`9x16`).
    pub fn file_label(self) -> String {
        format!("{}x{}", self.num, self.den)
    }

    /// `true` for portrait ratios such as `9:16`.
    pub fn is_tall(self) -> bool {
        self.num < self.den
    }

    /// Return `true` when `width / height` is within [`RATIO_TOLERANCE`] of this ratio.
    pub fn matches(self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let actual = f64::from(width) / f64::from(height);
        ((actual - self.as_f64()) / self.as_f64()).abs() <= RATIO_TOLERANCE
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

impl serde::Serialize for AspectRatio {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for AspectRatio {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Construct a size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the shorter edge.
    pub fn short_side(self) -> u32 {
        self.width.min(self.height)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Prepared raster image in premultiplied RGBA8 form.
///
/// The pixel buffer is shared read-only; every transform produces a new buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap an owned premultiplied buffer, checking its length.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> CraftResult<Self> {
        if width == 0 || height == 0 {
            return Err(CraftError::composition("image dimensions must be > 0"));
        }
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if rgba8_premul.len() != expected {
            return Err(CraftError::composition(format!(
                "rgba8 buffer len {} does not match {width}x{height}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Fill a new image with a single premultiplied pixel value.
    pub fn solid(width: u32, height: u32, px_premul: [u8; 4]) -> CraftResult<Self> {
        let n = (width as usize) * (height as usize);
        let mut buf = Vec::with_capacity(n * 4);
        for _ in 0..n {
            buf.extend_from_slice(&px_premul);
        }
        Self::from_premul(width, height, buf)
    }

    /// Dimensions as an [`ImageSize`].
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.rgba8_premul[i..i + 4];
        [p[0], p[1], p[2], p[3]]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
