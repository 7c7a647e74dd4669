use super::*;

fn repeat_px(px: [u8; 4], n: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(n * 4);
    for _ in 0..n {
        out.extend_from_slice(&px);
    }
    out
}

#[test]
fn clipped_rect_stays_inside() {
    let r = PixelRect {
        x: 8,
        y: 2,
        width: 10,
        height: 10,
    }
    .clipped(10, 5);
    assert_eq!(
        r,
        PixelRect {
            x: 8,
            y: 2,
            width: 2,
            height: 3
        }
    );
    assert!(
        PixelRect {
            x: 20,
            y: 0,
            width: 5,
            height: 5
        }
        .clipped(10, 10)
        .is_empty()
    );
}

#[test]
fn fill_rect_over_touches_only_rect() {
    let mut buf = repeat_px([255, 255, 255, 255], 4 * 3);
    fill_rect_over(
        &mut buf,
        4,
        3,
        PixelRect {
            x: 0,
            y: 1,
            width: 4,
            height: 1,
        },
        [0, 0, 0, 128],
    );
    assert_eq!(&buf[0..4], &[255, 255, 255, 255]);
    assert_eq!(&buf[16..20], &[127, 127, 127, 255]);
    assert_eq!(&buf[32..36], &[255, 255, 255, 255]);
}

#[test]
fn over_in_place_rejects_mismatched_lengths() {
    let mut dst = repeat_px([0, 0, 0, 255], 2);
    assert!(premul_over_in_place(&mut dst, &[0u8; 4]).is_err());
    premul_over_in_place(&mut dst, &repeat_px([255, 255, 255, 255], 2)).unwrap();
    assert_eq!(dst, repeat_px([255, 255, 255, 255], 2));
}

#[test]
fn sample_region_reports_mean_and_tails() {
    // Left half black, right half white.
    let mut buf = Vec::new();
    for _y in 0..10 {
        for x in 0..10 {
            buf.extend_from_slice(&if x < 5 { [0, 0, 0, 255] } else { [255, 255, 255, 255] });
        }
    }
    let img = PreparedImage::from_premul(10, 10, buf).unwrap();
    let s = sample_region(
        &img,
        PixelRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        },
    )
    .unwrap();
    assert!((s.mean_rgb[0] - 0.5).abs() < 1e-9);
    assert_eq!(s.bright_rgb, [1.0, 1.0, 1.0]);
    assert_eq!(s.dark_rgb, [0.0, 0.0, 0.0]);

    assert!(
        sample_region(
            &img,
            PixelRect {
                x: 10,
                y: 0,
                width: 1,
                height: 1
            }
        )
        .is_none()
    );
}
