use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::assets::color::Rgba8;
use crate::compose::blend::premul_over_in_place;
use crate::compose::overlay::{OverlayError, PlacedLine, TextPainter};
use crate::model::config::TextOverlaySpec;

/// Font sizes never drop below this, however small the canvas.
pub const MIN_FONT_PX: f32 = 8.0;

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

const SYSTEM_FONT_DIRS: [&str; 5] = [
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// Tried in order when the configured family is not installed.
const FALLBACK_FAMILIES: [&str; 6] = [
    "DejaVuSans",
    "LiberationSans-Regular",
    "Arial",
    "Helvetica",
    "NotoSans-Regular",
    "FreeSans",
];

const MAX_SCAN_DEPTH: usize = 4;

/// Width of a single shaped line, in pixels.
pub trait TextMeasure {
    fn line_width(&mut self, text: &str, font_px: f32) -> f32;
}

/// Font size for an image: linear in the short side relative to `reference_dimension`.
pub fn font_px(spec: &TextOverlaySpec, width: u32, height: u32) -> f32 {
    let reference = spec.reference_dimension.max(1) as f32;
    (spec.base_font_size * width.min(height) as f32 / reference).max(MIN_FONT_PX)
}

/// Greedy word wrap.
///
/// Words are packed until the next one would push the line past `max_width`. A word that is
/// wider than `max_width` on its own gets a line to itself. Explicit newlines always break.
pub fn wrap_lines(
    text: &str,
    max_width: f32,
    font_px: f32,
    measure: &mut dyn TextMeasure,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure.line_width(&candidate, font_px) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_owned()));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Font file bytes plus where they came from.
#[derive(Clone, Debug)]
pub struct FontSource {
    pub path: PathBuf,
    pub bytes: Arc<Vec<u8>>,
}

/// Find a font for `family`: an explicit file path, then an installed family, then the
/// fallback list.
pub fn resolve_font(family: &str) -> Result<FontSource, OverlayError> {
    let family = family.trim();
    let as_path = Path::new(family);
    if as_path.is_file() {
        return load_font(as_path);
    }

    let mut files = Vec::new();
    for dir in font_dirs() {
        collect_font_files(&dir, 0, &mut files);
    }
    files.sort();

    for wanted in std::iter::once(family).chain(FALLBACK_FAMILIES) {
        let Some(path) = find_family(&files, wanted) else {
            continue;
        };
        if wanted != family {
            tracing::warn!(requested = family, using = %path.display(), "font family not installed; using fallback");
        }
        return load_font(path);
    }
    Err(OverlayError::FontUnavailable(family.to_owned()))
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = SYSTEM_FONT_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
    }
    dirs
}

fn collect_font_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, depth + 1, out);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
}

fn normalize_family(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_family<'a>(files: &'a [PathBuf], family: &str) -> Option<&'a Path> {
    let wanted = normalize_family(family);
    if wanted.is_empty() {
        return None;
    }
    let regular = format!("{wanted}regular");
    files
        .iter()
        .find(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(normalize_family)
                .is_some_and(|stem| stem == wanted || stem == regular)
        })
        .map(PathBuf::as_path)
}

fn load_font(path: &Path) -> Result<FontSource, OverlayError> {
    let bytes = std::fs::read(path)
        .map_err(|e| OverlayError::FontUnavailable(format!("{}: {e}", path.display())))?;
    Ok(FontSource {
        path: path.to_path_buf(),
        bytes: Arc::new(bytes),
    })
}

/// Brush carried through parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl From<Rgba8> for TextBrushRgba8 {
    fn from(c: Rgba8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Parley layouts and vello_cpu glyph rendering over a single registered font.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl TextLayoutEngine {
    /// Register `source` with a fresh font collection.
    pub fn new(source: &FontSource) -> Result<Self, OverlayError> {
        let unavailable =
            |why: &str| OverlayError::FontUnavailable(format!("{}: {why}", source.path.display()));

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(source.bytes.to_vec()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| unavailable("no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| unavailable("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(source.bytes.to_vec()),
            0,
        );
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    /// Resolve `family` and register it.
    pub fn from_family(family: &str) -> Result<Self, OverlayError> {
        Self::new(&resolve_font(family)?)
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    fn layout_line(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

impl TextMeasure for TextLayoutEngine {
    fn line_width(&mut self, text: &str, font_px: f32) -> f32 {
        self.layout_line(text, font_px, TextBrushRgba8::default())
            .width()
    }
}

impl TextPainter for TextLayoutEngine {
    fn paint_lines(
        &mut self,
        canvas: &mut [u8],
        width: u32,
        height: u32,
        lines: &[PlacedLine],
        font_px: f32,
        color: Rgba8,
    ) -> Result<(), OverlayError> {
        let (Ok(w16), Ok(h16)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(OverlayError::ImageTooLarge(crate::foundation::core::ImageSize::new(
                width, height,
            )));
        };

        let brush = TextBrushRgba8::from(color);
        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        for line in lines {
            let layout = self.layout_line(&line.text, font_px, brush);
            // Center the shaped line box inside its slot.
            let top = line.top + (line.slot_height - layout.height()).max(0.0) / 2.0;
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                f64::from(line.x),
                f64::from(top),
            )));
            for layout_line in layout.lines() {
                for item in layout_line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(&self.font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.render_to_pixmap(&mut pixmap);
        premul_over_in_place(canvas, pixmap.data_as_u8_slice())
            .map_err(|e| OverlayError::Layout(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/text.rs"]
mod tests;
