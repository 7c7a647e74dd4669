use super::*;
use crate::compose::text::MIN_FONT_PX;

/// Fixed advance of 0.6 em per character; paints each line as a solid block.
#[derive(Default)]
struct BlockPainter {
    painted: Vec<String>,
}

impl TextMeasure for BlockPainter {
    fn line_width(&mut self, text: &str, font_px: f32) -> f32 {
        text.chars().count() as f32 * font_px * 0.6
    }
}

impl TextPainter for BlockPainter {
    fn paint_lines(
        &mut self,
        canvas: &mut [u8],
        width: u32,
        height: u32,
        lines: &[PlacedLine],
        _font_px: f32,
        color: Rgba8,
    ) -> Result<(), OverlayError> {
        for line in lines {
            let rect = PixelRect {
                x: line.x as u32,
                y: line.top as u32,
                width: line.width as u32,
                height: line.slot_height as u32,
            };
            fill_rect_over(canvas, width, height, rect, color.to_premul_with_opacity(1.0));
            self.painted.push(line.text.clone());
        }
        Ok(())
    }
}

fn canvas(w: u32, h: u32, gray: u8) -> PreparedImage {
    PreparedImage::solid(w, h, [gray, gray, gray, 255]).unwrap()
}

#[test]
fn short_message_fits_within_two_lines_on_square_canvas() {
    let spec = TextOverlaySpec::default();
    let img = canvas(1024, 1024, 128);
    let mut painter = BlockPainter::default();
    let out = apply_overlay(&img, "Start your day right", &spec, &mut painter).unwrap();

    assert!(!out.layout.lines.is_empty() && out.layout.lines.len() <= 2);
    assert!((out.layout.max_line_width - 921.6).abs() < 1e-3);
    for line in &out.layout.lines {
        assert!(line.width <= out.layout.max_line_width);
    }
    assert!(out.decision.opacity >= f64::from(spec.opacity_floor));
    assert_eq!(painter.painted, vec!["Start your day right"]);
}

#[test]
fn long_message_wraps_and_band_grows_with_lines() {
    let spec = TextOverlaySpec::default();
    let text = "Organic green tea harvested at dawn from high mountain gardens for a calm and focused afternoon";
    let layout = layout_overlay(1080, 1920, text, &spec, &mut BlockPainter::default()).unwrap();
    assert!(layout.lines.len() > 1);
    for line in &layout.lines {
        assert!(line.width <= layout.max_line_width || !line.text.contains(' '));
    }
    let expected_h =
        (layout.lines.len() as f32 * (layout.font_px * spec.line_spacing_multiplier) + 40.0).ceil();
    assert_eq!(layout.band.height, expected_h as u32);
    assert_eq!(layout.band.width, 1080);
}

#[test]
fn band_placement_follows_position() {
    let mut spec = TextOverlaySpec::default();
    let mut m = BlockPainter::default();

    spec.position = TextPosition::Bottom;
    let b = layout_overlay(1000, 800, "Hello", &spec, &mut m).unwrap().band;
    assert_eq!(b.y + b.height, 800 - spec.padding);

    spec.position = TextPosition::Top;
    let t = layout_overlay(1000, 800, "Hello", &spec, &mut m).unwrap().band;
    assert_eq!(t.y, spec.padding);

    spec.position = TextPosition::Center;
    let c = layout_overlay(1000, 800, "Hello", &spec, &mut m).unwrap().band;
    assert!((c.y as i64 * 2 + c.height as i64 - 800).abs() <= 1);
}

#[test]
fn lines_are_centered_horizontally() {
    let spec = TextOverlaySpec::default();
    let layout =
        layout_overlay(1000, 1000, "Hello there", &spec, &mut BlockPainter::default()).unwrap();
    let line = &layout.lines[0];
    assert!((line.x * 2.0 + line.width - 1000.0).abs() < 1e-3);
    assert!(line.top >= layout.band.y as f32 + spec.padding as f32);
}

#[test]
fn tiny_canvas_still_lays_out() {
    let spec = TextOverlaySpec::default();
    let layout = layout_overlay(40, 30, "Hi", &spec, &mut BlockPainter::default()).unwrap();
    assert_eq!(layout.font_px, MIN_FONT_PX);
    assert!(layout.band.y + layout.band.height <= 30);
}

#[test]
fn opacity_never_drops_below_floor() {
    for configured in [0.0f32, 0.1, 0.3, 0.39, 0.5, 0.9] {
        for bg in [[0.0; 3], [0.5; 3], [1.0; 3]] {
            for color in [Rgba8::WHITE, Rgba8::BLACK] {
                let spec = TextOverlaySpec {
                    background_opacity: configured,
                    color,
                    ..TextOverlaySpec::default()
                };
                let d = resolve_band_opacity(bg, color, &spec);
                assert!(d.opacity >= 0.4, "{configured} {bg:?} -> {}", d.opacity);
                assert!(d.opacity >= f64::from(configured) - 1e-9);
            }
        }
    }
}

#[test]
fn opacity_rises_until_contrast_is_met() {
    let spec = TextOverlaySpec::default();
    // White text over white background.
    let d = resolve_band_opacity([1.0; 3], Rgba8::WHITE, &spec);
    assert_eq!(d.band_color, Rgba8::BLACK);
    assert!(d.opacity > 0.5 && d.opacity <= MAX_BAND_OPACITY);
    assert!(d.contrast >= 4.5);
    assert!(d.unblended_contrast < 1.01);

    // Black text over black background gets a white band.
    let d = resolve_band_opacity([0.0; 3], Rgba8::BLACK, &spec);
    assert_eq!(d.band_color, Rgba8::WHITE);
    assert!(d.contrast >= 4.5);
}

#[test]
fn low_opacity_kept_only_with_flag_and_sufficient_contrast() {
    let mut spec = TextOverlaySpec {
        background_opacity: 0.1,
        ..TextOverlaySpec::default()
    };
    // White text over black already reads at 21:1.
    assert_eq!(resolve_band_opacity([0.0; 3], Rgba8::WHITE, &spec).opacity, 0.4);

    spec.allow_low_opacity_when_contrasting = true;
    assert_eq!(resolve_band_opacity([0.0; 3], Rgba8::WHITE, &spec).opacity, 0.1);
    assert!(resolve_band_opacity([1.0; 3], Rgba8::WHITE, &spec).opacity >= 0.4);
}

#[test]
fn band_is_composited_behind_text_without_touching_source() {
    let spec = TextOverlaySpec::default();
    let img = canvas(512, 512, 255);
    let out = apply_overlay(&img, "Hi", &spec, &mut BlockPainter::default()).unwrap();

    assert!(img.rgba8_premul.iter().all(|&c| c == 255));
    let band = out.layout.band;
    let inside = out.image.pixel(1, band.y + 1);
    let expected = (255.0 * (1.0 - out.decision.opacity)).round() as i32;
    assert!((i32::from(inside[0]) - expected).abs() <= 2, "{inside:?}");
    assert_eq!(inside[3], 255);
    assert_eq!(out.image.pixel(1, band.y.saturating_sub(2)), [255, 255, 255, 255]);
}

#[test]
fn empty_text_and_oversized_images_are_rejected() {
    let spec = TextOverlaySpec::default();
    let img = canvas(64, 64, 0);
    for text in ["", "   ", "\n\t"] {
        assert!(matches!(
            apply_overlay(&img, text, &spec, &mut BlockPainter::default()),
            Err(OverlayError::EmptyText)
        ));
    }

    let wide = PreparedImage::solid(70_000, 1, [0, 0, 0, 255]).unwrap();
    assert!(matches!(
        apply_overlay(&wide, "Hi", &spec, &mut BlockPainter::default()),
        Err(OverlayError::ImageTooLarge(_))
    ));
}
