use image::imageops::FilterType;
use std::path::Path;

/// Mismatch reported when a comparison cannot be performed.
pub const MAX_MISMATCH: f64 = 100.0;

/// Both images are scaled to this square before comparison.
const COMPARE_SIZE: u32 = 64;

/// Per-channel delta below which two pixels still count as matching.
const CHANNEL_TOLERANCE: i16 = 16;

/// Percentage of pixels whose RGB channels differ beyond the tolerance,
/// after scaling both images to a common size. Alpha is ignored.
pub fn mismatch_percentage(left: &Path, right: &Path) -> image::ImageResult<f64> {
    let left_img = image::open(left)?
        .resize_exact(COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle)
        .to_rgba8();
    let right_img = image::open(right)?
        .resize_exact(COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle)
        .to_rgba8();

    let mut mismatched = 0usize;
    for (left_pixel, right_pixel) in left_img.pixels().zip(right_img.pixels()) {
        let differs = left_pixel.0[..3]
            .iter()
            .zip(&right_pixel.0[..3])
            .any(|(a, b)| (*a as i16 - *b as i16).abs() > CHANNEL_TOLERANCE);
        if differs {
            mismatched += 1;
        }
    }

    let total = (COMPARE_SIZE * COMPARE_SIZE) as f64;
    Ok(mismatched as f64 / total * 100.0)
}
