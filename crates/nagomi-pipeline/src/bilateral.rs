//! Joint spatial/range bilateral filter in RGB space.
//!
//! The classic edge-aware blur: each neighbor in a `(2·radius+1)²`
//! window is weighted by spatial proximity *and* RGB color proximity to
//! the center pixel, so flat regions average out while strong color
//! boundaries survive.
//!
//! This is the pipeline's dominant cost center — O(width · height ·
//! radius²). Border pixels use a clipped window (fewer samples, no
//! wraparound or reflection). Alpha passes through unchanged.

use crate::types::RgbaImage;

/// Apply the bilateral filter.
///
/// `sigma_color` controls the range weight over Euclidean RGB distance
/// to the center; `sigma_space` the spatial Gaussian over pixel offset.
/// The weight sum is always positive: the center contributes weight 1
/// to itself (both distances are zero), so the weighted average is
/// well defined everywhere.
#[must_use = "returns the filtered raster"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn bilateral_filter(
    image: &RgbaImage,
    radius: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    let src: &[u8] = image.as_raw();
    let mut out = RgbaImage::new(width, height);

    let radius = i64::from(radius);
    let w = i64::from(width);
    let h = i64::from(height);

    // Gaussian denominators, precomputed once. Domains are enforced at
    // the orchestrator boundary; the max() guards keep stray direct
    // calls finite.
    let inv_two_sigma_color_sq = 1.0 / (2.0 * sigma_color.max(f32::EPSILON).powi(2));
    let inv_two_sigma_space_sq = 1.0 / (2.0 * sigma_space.max(f32::EPSILON).powi(2));

    {
        let dst: &mut [u8] = &mut out;
        for y in 0..h {
            for x in 0..w {
                let i = ((y * w + x) * 4) as usize;
                let cr = f32::from(src[i]);
                let cg = f32::from(src[i + 1]);
                let cb = f32::from(src[i + 2]);

                let mut sum_r = 0.0f32;
                let mut sum_g = 0.0f32;
                let mut sum_b = 0.0f32;
                let mut sum_w = 0.0f32;

                for dy in -radius..=radius {
                    let ny = y + dy;
                    if ny < 0 || ny >= h {
                        continue;
                    }
                    for dx in -radius..=radius {
                        let nx = x + dx;
                        if nx < 0 || nx >= w {
                            continue;
                        }
                        let ni = ((ny * w + nx) * 4) as usize;
                        let dr = f32::from(src[ni]) - cr;
                        let dg = f32::from(src[ni + 1]) - cg;
                        let db = f32::from(src[ni + 2]) - cb;

                        let color_dist_sq = dr * dr + dg * dg + db * db;
                        let spatial_dist_sq = (dx * dx + dy * dy) as f32;
                        let weight = (-color_dist_sq * inv_two_sigma_color_sq).exp()
                            * (-spatial_dist_sq * inv_two_sigma_space_sq).exp();

                        sum_r += f32::from(src[ni]) * weight;
                        sum_g += f32::from(src[ni + 1]) * weight;
                        sum_b += f32::from(src[ni + 2]) * weight;
                        sum_w += weight;
                    }
                }

                dst[i] = (sum_r / sum_w).round() as u8;
                dst[i + 1] = (sum_g / sum_w).round() as u8;
                dst[i + 2] = (sum_b / sum_w).round() as u8;
                dst[i + 3] = src[i + 3];
            }
        }
    }

    out
}
