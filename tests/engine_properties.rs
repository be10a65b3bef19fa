use image::{imageops, DynamicImage, GenericImageView, GrayImage, Luma, Rgb, RgbImage};
use palette::Srgb;
use vra_lib::config::TemplateOptions;
use vra_lib::{
    dhash64, diff_with_mask, hamming, hsv_correlation, match_multi_scale, match_single_scale,
    ssim, wcag_contrast_ratio, Point, VraError,
};

fn textured(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let v = ((x * 31 + y * 17) ^ (x * y)) % 256;
        Rgb([v as u8, (255 - v) as u8, ((x * 3 + y * 11) % 256) as u8])
    }))
}

fn logo() -> RgbImage {
    RgbImage::from_fn(50, 50, |x, y| {
        let dx = x as i32 - 25;
        let dy = y as i32 - 25;
        if dx * dx + dy * dy < 300 {
            Rgb([230, 120, 20])
        } else if (x / 10 + y / 10) % 2 == 0 {
            Rgb([20, 20, 60])
        } else {
            Rgb([250, 250, 250])
        }
    })
}

#[test]
fn single_scale_score_is_reproducible() {
    let hay = textured(90, 70);
    let needle = hay.crop_imm(30, 20, 25, 15);

    let first = match_single_scale(&hay, &needle, 3).expect("first");
    let second = match_single_scale(&hay, &needle, 3).expect("second");

    assert_eq!(first, second);
}

#[test]
fn embedded_needle_is_found_exactly() {
    let mut hay = RgbImage::from_pixel(200, 200, Rgb([128, 128, 128]));
    imageops::replace(&mut hay, &logo(), 80, 60);
    let hay = DynamicImage::ImageRgb8(hay);
    let needle = DynamicImage::ImageRgb8(logo());

    let result = match_single_scale(&hay, &needle, 0).expect("match");

    assert_eq!(result.top_left, Point { x: 80, y: 60 });
    assert!((result.score - 1.0).abs() < 1e-6, "score {}", result.score);
}

#[test]
fn downscaled_needle_is_recovered_at_its_scale() {
    let mut hay = RgbImage::from_pixel(160, 120, Rgb([245, 245, 245]));
    let small = imageops::resize(&logo(), 25, 25, imageops::FilterType::Triangle);
    imageops::replace(&mut hay, &small, 60, 40);
    let hay = DynamicImage::ImageRgb8(hay);
    let needle = DynamicImage::ImageRgb8(logo());

    let result = match_multi_scale(&hay, &needle, &TemplateOptions::default()).expect("match");

    assert!(result.score > 0.9, "score {}", result.score);
    assert!((result.scale_used - 0.5).abs() < 0.051, "scale {}", result.scale_used);
    assert!(result.top_left.x.abs_diff(60) <= 2 && result.top_left.y.abs_diff(40) <= 2);
}

#[test]
fn multi_scale_never_reports_tiny_needles() {
    let hay = textured(40, 40);
    let needle = textured(12, 12);
    let options = TemplateOptions {
        blur_kernel: 0,
        max_scale: 1.0,
        min_scale: 0.1,
        step: 0.1,
    };

    let result = match_multi_scale(&hay, &needle, &options).expect("match");

    assert!(result.region.width >= 5 && result.region.height >= 5);
}

#[test]
fn oversized_needle_at_every_scale_has_no_feasible_scale() {
    let hay = textured(30, 30);
    let needle = textured(200, 200);
    let options = TemplateOptions {
        blur_kernel: 3,
        max_scale: 1.0,
        min_scale: 0.5,
        step: 0.1,
    };

    let err = match_multi_scale(&hay, &needle, &options).unwrap_err();
    assert!(matches!(err, VraError::NoFeasibleScale { .. }));
}

#[test]
fn identical_images_score_perfectly() {
    let img = textured(64, 48);

    let s = ssim(&img, &img).expect("ssim");
    assert!((s - 1.0).abs() < 1e-9, "ssim {}", s);

    let h = dhash64(&img).expect("hash");
    assert_eq!(hamming(h, h), 0);

    let c = hsv_correlation(&img, &img).expect("correlation");
    assert!((c - 1.0).abs() < 1e-9, "correlation {}", c);
}

#[test]
fn zero_mask_hides_every_change() {
    let actual = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 30, Rgb([0, 0, 0])));
    let baseline = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 30, Rgb([255, 255, 255])));
    let mask = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 30, Luma([0])));

    let result = diff_with_mask(&actual, &baseline, Some(&mask), 25).expect("diff");

    assert_eq!(result.changed_pct, 0.0);
    assert_eq!(result.changed_pixels, 0);
}

#[test]
fn mask_limits_diff_to_checked_region() {
    let actual = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([0, 0, 0])));
    let baseline = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([255, 255, 255])));
    let mut mask = GrayImage::from_pixel(100, 100, Luma([0]));
    for y in 40..50 {
        for x in 40..50 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    let mask = DynamicImage::ImageLuma8(mask);

    let result = diff_with_mask(&actual, &baseline, Some(&mask), 25).expect("diff");

    assert!((result.changed_pct - 1.0).abs() < 1e-9);
    assert_eq!(result.overlay.dimensions(), (100, 100));
}

#[test]
fn contrast_reference_values() {
    let white = Srgb::new(255u8, 255, 255);
    let black = Srgb::new(0u8, 0, 0);
    assert!((wcag_contrast_ratio(white, black) - 21.0).abs() < 1e-9);

    for c in [white, black, Srgb::new(255, 165, 0), Srgb::new(12, 200, 77)] {
        assert!((wcag_contrast_ratio(c, c) - 1.0).abs() < 1e-12);
    }
}

#[test]
fn empty_images_are_rejected() {
    let empty = DynamicImage::new_rgb8(0, 0);
    let img = textured(10, 10);

    assert!(matches!(
        ssim(&empty, &img),
        Err(VraError::InvalidImage { .. })
    ));
    assert!(matches!(dhash64(&empty), Err(VraError::InvalidImage { .. })));
}
