//! Edge-aware compositing: preserve, soften, and outline-merge blends.
//!
//! These stages consume an [`EdgeMap`] (or outline map) and blend
//! rasters per pixel. Preserve restores the original where edges are
//! strong; soften blurs locally at edges instead; outline-merge draws
//! the outline color into the result with a selectable blend mode.

use crate::types::{
    EdgeFalloff, EdgeMap, OutlineBlendMode, PipelineError, RgbaImage, SmoothingOptions,
    ensure_map_matches, ensure_same_dimensions,
};

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a).mul_add(t, a)
}

/// Restore the original image where the edge map is strong.
///
/// Per pixel `keep = edge · strength` (shaped by `k²(3−2k)` for the
/// smoothstep falloff); output = `smoothed·(1−keep) + original·keep`.
/// Alpha is copied from `original`. Zero strength returns `smoothed`
/// unchanged (cloned).
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the rasters or the
/// edge map disagree in size.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_edge_preserve(
    original: &RgbaImage,
    smoothed: &RgbaImage,
    edge_map: &EdgeMap,
    strength: f32,
    falloff: EdgeFalloff,
) -> Result<RgbaImage, PipelineError> {
    ensure_same_dimensions(original, smoothed)?;
    ensure_map_matches(smoothed, edge_map)?;

    let strength = strength.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return Ok(smoothed.clone());
    }

    let base: &[u8] = original.as_raw();
    let src: &[u8] = smoothed.as_raw();
    let mut out = RgbaImage::new(smoothed.width(), smoothed.height());
    let dst: &mut [u8] = &mut out;

    for (i, &edge) in edge_map.data().iter().enumerate() {
        let mut keep = (edge * strength).clamp(0.0, 1.0);
        if falloff == EdgeFalloff::Smoothstep {
            keep = keep * keep * (2.0f32.mul_add(-keep, 3.0));
        }
        let mix = 1.0 - keep;
        let idx = i * 4;
        for c in 0..3 {
            dst[idx + c] = f32::from(src[idx + c])
                .mul_add(mix, f32::from(base[idx + c]) * keep)
                .round() as u8;
        }
        dst[idx + 3] = base[idx + 3];
    }

    Ok(out)
}

/// Blend toward a 3×3 box blur of `image` where the edge map is
/// strong, locally softening hard transitions.
///
/// Alpha is copied from `image` (the blur's alpha is not used). Zero
/// amount returns `image` unchanged (cloned).
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the map does not
/// cover the image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn soften_edges(
    image: &RgbaImage,
    edge_map: &EdgeMap,
    amount: f32,
) -> Result<RgbaImage, PipelineError> {
    ensure_map_matches(image, edge_map)?;

    let amount = amount.clamp(0.0, 1.0);
    if amount <= 0.0 {
        return Ok(image.clone());
    }

    let blurred = blur3x3(image);
    let src: &[u8] = image.as_raw();
    let soft: &[u8] = blurred.as_raw();
    let mut out = RgbaImage::new(image.width(), image.height());
    let dst: &mut [u8] = &mut out;

    for (i, &edge) in edge_map.data().iter().enumerate() {
        let t = (edge * amount).clamp(0.0, 1.0);
        let idx = i * 4;
        for c in 0..3 {
            dst[idx + c] =
                lerp(f32::from(src[idx + c]), f32::from(soft[idx + c]), t).round() as u8;
        }
        dst[idx + 3] = src[idx + 3];
    }

    Ok(out)
}

/// Draw the outline map into `image` with the configured color and
/// blend mode.
///
/// Per pixel `t = outline · outline_merge_strength`; where `t > 0` the
/// RGB channels blend toward [`blend_outline_pixel`]. Zero strength is
/// an early-out returning `image` unchanged (cloned).
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the map does not
/// cover the image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_outline_merge(
    image: &RgbaImage,
    outline_map: &EdgeMap,
    options: &SmoothingOptions,
) -> Result<RgbaImage, PipelineError> {
    ensure_map_matches(image, outline_map)?;

    let strength = options.outline_merge_strength.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return Ok(image.clone());
    }

    let color = options.outline_color.rgb();
    let mode = options.outline_blend_mode;

    let src: &[u8] = image.as_raw();
    let mut out = RgbaImage::new(image.width(), image.height());
    let dst: &mut [u8] = &mut out;

    for (i, &coverage) in outline_map.data().iter().enumerate() {
        let t = (coverage * strength).clamp(0.0, 1.0);
        let idx = i * 4;
        let pixel = [src[idx], src[idx + 1], src[idx + 2]];

        if t <= 0.0 {
            dst[idx..idx + 3].copy_from_slice(&pixel);
        } else {
            let blended = blend_outline_pixel(pixel, color, mode);
            for c in 0..3 {
                dst[idx + c] =
                    lerp(f32::from(pixel[c]), f32::from(blended[c]), t).round() as u8;
            }
        }
        dst[idx + 3] = src[idx + 3];
    }

    Ok(out)
}

/// Combine one pixel with the outline color under the given blend
/// mode.
///
/// `EdgeDarken` ignores the outline color entirely and darkens the
/// pixel by a fixed 90 per channel.
#[must_use]
pub fn blend_outline_pixel(pixel: [u8; 3], color: [u8; 3], mode: OutlineBlendMode) -> [u8; 3] {
    match mode {
        OutlineBlendMode::Multiply => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let mul = |p: u8, c: u8| -> u8 {
                ((f32::from(p) * f32::from(c)) / 255.0).round() as u8
            };
            [
                mul(pixel[0], color[0]),
                mul(pixel[1], color[1]),
                mul(pixel[2], color[2]),
            ]
        }
        OutlineBlendMode::Darken => [
            pixel[0].min(color[0]),
            pixel[1].min(color[1]),
            pixel[2].min(color[2]),
        ],
        OutlineBlendMode::Overlay => [
            overlay_channel(pixel[0], color[0]),
            overlay_channel(pixel[1], color[1]),
            overlay_channel(pixel[2], color[2]),
        ],
        OutlineBlendMode::EdgeDarken => [
            pixel[0].saturating_sub(90),
            pixel[1].saturating_sub(90),
            pixel[2].saturating_sub(90),
        ],
    }
}

/// Standard overlay blend for one channel, branching at base < 128.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn overlay_channel(base: u8, blend: u8) -> u8 {
    let b = f32::from(base);
    let l = f32::from(blend);
    let v = if base < 128 {
        2.0 * b * l / 255.0
    } else {
        (2.0 * (255.0 - b)).mul_add(-(255.0 - l) / 255.0, 255.0)
    };
    v.round().clamp(0.0, 255.0) as u8
}

/// 3×3 clipped box blur over all four channels.
///
/// Border pixels average their in-bounds neighbors only. Used by
/// [`soften_edges`] as the local blur target.
#[must_use = "returns the blurred raster"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn blur3x3(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let w = i64::from(width);
    let h = i64::from(height);
    let src: &[u8] = image.as_raw();

    let mut out = RgbaImage::new(width, height);
    let dst: &mut [u8] = &mut out;

    for y in 0..h {
        for x in 0..w {
            let mut sums = [0.0f32; 4];
            let mut count = 0u32;
            for dy in -1..=1 {
                let ny = y + dy;
                if ny < 0 || ny >= h {
                    continue;
                }
                for dx in -1..=1 {
                    let nx = x + dx;
                    if nx < 0 || nx >= w {
                        continue;
                    }
                    let idx = ((ny * w + nx) * 4) as usize;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += f32::from(src[idx + c]);
                    }
                    count += 1;
                }
            }
            let idx = ((y * w + x) * 4) as usize;
            for (c, sum) in sums.iter().enumerate() {
                dst[idx + c] = (sum / count as f32).round() as u8;
            }
        }
    }

    out
}
