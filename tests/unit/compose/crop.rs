use std::sync::Arc;

use super::*;

fn spec(ratio: AspectRatio, strategy: CropStrategy) -> AspectRatioSpec {
    AspectRatioSpec::new(ratio, strategy)
}

/// Row index encoded in R (low byte) and G (high byte).
fn row_coded(width: u32, height: u32) -> PreparedImage {
    let mut buf = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for _x in 0..width {
            buf.extend_from_slice(&[(y % 256) as u8, (y / 256) as u8, 0, 255]);
        }
    }
    PreparedImage::from_premul(width, height, buf).unwrap()
}

fn coded_row(img: &PreparedImage, y: u32) -> u32 {
    let p = img.pixel(0, y);
    u32::from(p[0]) + 256 * u32::from(p[1])
}

#[test]
fn largest_fit_matches_expected_dimensions() {
    assert_eq!(largest_fit(1024, 1024, AspectRatio::STORY), (576, 1024));
    assert_eq!(largest_fit(1024, 1024, AspectRatio::LANDSCAPE), (1024, 576));
    assert_eq!(largest_fit(1920, 1080, AspectRatio::SQUARE), (1080, 1080));
    assert_eq!(largest_fit(1080, 1920, AspectRatio::SQUARE), (1080, 1080));
}

#[test]
fn center_and_top_weighted_placement() {
    let c = place(1024, 1024, 1024, 576, CropStrategy::Center);
    assert_eq!((c.x, c.y), (0, 224));
    let t = place(1024, 1024, 1024, 576, CropStrategy::TopWeighted);
    assert_eq!((t.x, t.y), (0, 134));
    let v = place(1024, 1024, 576, 1024, CropStrategy::TopWeighted);
    assert_eq!((v.x, v.y), (224, 0));
}

#[test]
fn top_weighted_center_never_below_source_midpoint() {
    for h in [300u32, 1000, 2000, 4097] {
        let r = place(1000, h, 1000, 300.min(h), CropStrategy::TopWeighted);
        let crop_center_2x = 2 * r.y + r.height;
        assert!(crop_center_2x <= h, "h={h} rect={r:?}");
    }
}

#[test]
fn identity_when_ratio_already_matches() {
    let src = row_coded(320, 180);
    assert_eq!(
        plan_crop(320, 180, &spec(AspectRatio::LANDSCAPE, CropStrategy::Center)).unwrap(),
        CropPlan::Identity
    );
    let out = crop_to_ratio(&src, &spec(AspectRatio::LANDSCAPE, CropStrategy::Center)).unwrap();
    assert_eq!(out, src);
    assert!(!Arc::ptr_eq(&out.rgba8_premul, &src.rgba8_premul));
}

#[test]
fn center_crop_takes_middle_rows() {
    let src = row_coded(256, 512);
    let out = crop_to_ratio(&src, &spec(AspectRatio::SQUARE, CropStrategy::Center)).unwrap();
    assert_eq!((out.width, out.height), (256, 256));
    assert_eq!(coded_row(&out, 0), 128);
    assert_eq!(coded_row(&out, 255), 383);
}

#[test]
fn top_weighted_crop_biases_upward() {
    let src = row_coded(256, 512);
    let out = crop_to_ratio(&src, &spec(AspectRatio::SQUARE, CropStrategy::TopWeighted)).unwrap();
    assert_eq!((out.width, out.height), (256, 256));
    assert_eq!(coded_row(&out, 0), 76);
}

#[test]
fn small_sources_are_upscaled_once_then_cropped() {
    let src = PreparedImage::solid(100, 50, [40, 80, 120, 255]).unwrap();
    let plan = plan_crop(100, 50, &spec(AspectRatio::SQUARE, CropStrategy::Center)).unwrap();
    assert!(matches!(
        plan,
        CropPlan::UpscaleThenCrop {
            width: 256,
            height: 128,
            ..
        }
    ));
    let out = crop_to_ratio(&src, &spec(AspectRatio::SQUARE, CropStrategy::Center)).unwrap();
    assert_eq!((out.width, out.height), (128, 128));
    // A flat color survives Lanczos resampling.
    let px = out.pixel(64, 64);
    for (got, want) in px.iter().zip([40u8, 80, 120, 255]) {
        assert!(got.abs_diff(want) <= 1, "{px:?}");
    }
}

#[test]
fn min_short_side_forces_upscale() {
    let mut s = spec(AspectRatio::STORY, CropStrategy::TopWeighted);
    s.min_short_side = Some(512);
    assert!(matches!(
        plan_crop(1024, 1024, &s).unwrap(),
        CropPlan::Crop(_)
    ));
    s.min_short_side = Some(800);
    let CropPlan::UpscaleThenCrop { rect, .. } = plan_crop(1024, 1024, &s).unwrap() else {
        panic!("expected upscale");
    };
    assert!(rect.width >= 800);
}

#[test]
fn extreme_sources_keep_ratio_after_upscale() {
    let s = spec(AspectRatio::STORY, CropStrategy::Center);
    let CropPlan::UpscaleThenCrop { rect, .. } = plan_crop(2000, 10, &s).unwrap() else {
        panic!("expected upscale");
    };
    assert!(rect.width >= MIN_CROP_EDGE);
    assert!(AspectRatio::STORY.matches(rect.width, rect.height));
}

#[test]
fn every_ratio_within_tolerance_and_never_downscaled() {
    let ratios = [
        AspectRatio::SQUARE,
        AspectRatio::STORY,
        AspectRatio::LANDSCAPE,
        AspectRatio::new(4, 5).unwrap(),
    ];
    let sizes = [(1024, 1024), (1920, 1080), (1080, 1920), (333, 777), (129, 4000)];
    for (w, h) in sizes {
        let src = PreparedImage::solid(w, h, [0, 0, 0, 255]).unwrap();
        for ratio in ratios {
            for strategy in [CropStrategy::Center, CropStrategy::TopWeighted] {
                let out = crop_to_ratio(&src, &spec(ratio, strategy)).unwrap();
                assert!(
                    ratio.matches(out.width, out.height),
                    "{w}x{h} -> {ratio}: got {}x{}",
                    out.width,
                    out.height
                );
                let (fit_w, fit_h) = largest_fit(w, h, ratio);
                assert!(out.width >= fit_w.min(w) && out.height >= fit_h.min(h));
            }
        }
    }
}

#[test]
fn upscale_clamps_premultiplied_channels_to_alpha() {
    let mut buf = Vec::new();
    for i in 0..(20 * 10) {
        buf.extend_from_slice(&if i % 2 == 0 { [200, 200, 200, 200] } else { [0, 0, 0, 0] });
    }
    let src = PreparedImage::from_premul(20, 10, buf).unwrap();
    let out = crop_to_ratio(&src, &spec(AspectRatio::SQUARE, CropStrategy::Center)).unwrap();
    for px in out.rgba8_premul.chunks_exact(4) {
        assert!(px[0] <= px[3] && px[1] <= px[3] && px[2] <= px[3]);
    }
}
