//! Palette simplification: uniform quantization and neighborhood
//! mode-color merge.
//!
//! Quantization snaps each channel to a uniform grid. The merge pass
//! then pulls each pixel toward the most common quantization bin in
//! its neighborhood, collapsing speckle into flat patches — the
//! "posterized" look. Both passes allocate fresh buffers; the input is
//! never mutated.

use std::collections::HashMap;

use crate::types::{RgbaImage, SmoothingOptions};

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a).mul_add(t, a)
}

/// Snap every channel to a uniform grid of `levels` steps.
///
/// `step = 255 / levels`; each channel becomes `round(v/step)·step`.
/// Quantization is idempotent: applying it twice with the same level
/// count equals applying it once. Levels below 2 return the input
/// unchanged (cloned). Alpha passes through.
#[must_use = "returns the quantized raster"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize(image: &RgbaImage, levels: u32) -> RgbaImage {
    if levels < 2 {
        return image.clone();
    }
    let step = 255.0 / levels as f32;

    let src: &[u8] = image.as_raw();
    let mut out = RgbaImage::new(image.width(), image.height());
    let dst: &mut [u8] = &mut out;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        for c in 0..3 {
            let snapped = (f32::from(s[c]) / step).round() * step;
            d[c] = snapped.round().clamp(0.0, 255.0) as u8;
        }
        d[3] = s[3];
    }

    out
}

/// Run the palette stage: optional quantization, then optional
/// neighborhood mode-color merge.
///
/// Quantization runs when `palette_levels > 1`. The merge runs when
/// `neighbor_merge > 0`, binning neighbors with the quantization level
/// count (or 12 when quantization was not separately applied) and
/// blending each pixel toward its neighborhood's mode color by the
/// merge strength. Merge radius is 1, widening to 2 above 0.65.
#[must_use = "returns the simplified raster"]
pub fn simplify_palette(image: &RgbaImage, options: &SmoothingOptions) -> RgbaImage {
    let levels = options.palette_levels.min(32);
    let quantized = if levels > 1 {
        quantize(image, levels)
    } else {
        image.clone()
    };

    let strength = options.neighbor_merge.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return quantized;
    }

    let bin_levels = if levels > 1 { levels } else { 12 };
    let radius = if strength > 0.65 { 2 } else { 1 };
    merge_neighbor_colors(&quantized, bin_levels, strength, radius)
}

/// Blend each pixel toward the mode quantization bin of its
/// neighborhood.
///
/// Bins use `step = 255 / (levels − 1)` so the extremes map onto the
/// first and last bins. Ties break toward the bin that reached the
/// maximum count first in top-left→bottom-right scan order — a stable,
/// deterministic rule (strict `>` on the running maximum).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn merge_neighbor_colors(
    image: &RgbaImage,
    levels: u32,
    strength: f32,
    radius: i64,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    let w = i64::from(width);
    let h = i64::from(height);
    let src: &[u8] = image.as_raw();

    let safe_levels = levels.clamp(2, 32);
    let step = 255.0 / (safe_levels - 1) as f32;
    let max_bin = safe_levels - 1;

    let bin_of = |v: u8| -> u32 { ((f32::from(v) / step).round() as u32).min(max_bin) };

    let mut out = RgbaImage::new(width, height);
    let dst: &mut [u8] = &mut out;
    let mut counts: HashMap<u32, u32> = HashMap::new();

    for y in 0..h {
        for x in 0..w {
            counts.clear();
            let mut max_key = 0u32;
            let mut max_count = 0u32;

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
                    let idx = ((ny * w + nx) * 4) as usize;
                    let key = (bin_of(src[idx]) << 16)
                        | (bin_of(src[idx + 1]) << 8)
                        | bin_of(src[idx + 2]);
                    let count = counts.entry(key).or_insert(0);
                    *count += 1;
                    if *count > max_count {
                        max_count = *count;
                        max_key = key;
                    }
                }
            }

            let target_r = ((max_key >> 16) & 0xff) as f32 * step;
            let target_g = ((max_key >> 8) & 0xff) as f32 * step;
            let target_b = (max_key & 0xff) as f32 * step;

            let i = ((y * w + x) * 4) as usize;
            dst[i] = lerp(f32::from(src[i]), target_r, strength).round() as u8;
            dst[i + 1] = lerp(f32::from(src[i + 1]), target_g, strength).round() as u8;
            dst[i + 2] = lerp(f32::from(src[i + 2]), target_b, strength).round() as u8;
            dst[i + 3] = src[i + 3];
        }
    }

    out
}
