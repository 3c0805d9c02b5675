//! Lab-space chroma smoothing and the chroma artifact booster.
//!
//! The chroma smoother runs a second, luma-aware joint bilateral pass
//! over only the A/B channels of the already-smoothed buffer, with the
//! pristine source alongside. Its per-pixel strength is the product of
//! the global strength, per-channel multipliers, and the protection
//! masks in [`crate::protect`] — all computed from unmodified source
//! data. Lightness is handled separately: the output L is a blend of
//! the smoothed L back toward the source L by `luma_preserve`.
//!
//! The artifact booster is the inverse tool: it exaggerates the chroma
//! residual (source − smoothed) for preview display, making visible
//! exactly what the smoother removed.

use crate::color::{Lab, lab_to_rgb, rgb_to_lab};
use crate::protect::{PixelStats, active_protections, combined_factor};
use crate::types::{PipelineError, RgbaImage, SmoothingOptions, ensure_same_dimensions};

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a).mul_add(t, a)
}

/// Per-pixel Lab planes extracted from a raster pair.
struct LabPlanes {
    l_src: Vec<f32>,
    a_src: Vec<f32>,
    b_src: Vec<f32>,
    /// Chroma magnitude of the source, reused by masks and the clamp.
    mag_src: Vec<f32>,
    l_work: Vec<f32>,
    a_work: Vec<f32>,
    b_work: Vec<f32>,
}

#[allow(clippy::cast_possible_truncation)]
fn extract_planes(work: &RgbaImage, source: &RgbaImage) -> LabPlanes {
    let total = work.width() as usize * work.height() as usize;
    let src: &[u8] = source.as_raw();
    let wrk: &[u8] = work.as_raw();

    let mut planes = LabPlanes {
        l_src: Vec::with_capacity(total),
        a_src: Vec::with_capacity(total),
        b_src: Vec::with_capacity(total),
        mag_src: Vec::with_capacity(total),
        l_work: Vec::with_capacity(total),
        a_work: Vec::with_capacity(total),
        b_work: Vec::with_capacity(total),
    };

    for i in 0..total {
        let idx = i * 4;
        let source_lab = rgb_to_lab(src[idx], src[idx + 1], src[idx + 2]);
        let work_lab = rgb_to_lab(wrk[idx], wrk[idx + 1], wrk[idx + 2]);
        planes.l_src.push(source_lab.l);
        planes.a_src.push(source_lab.a);
        planes.b_src.push(source_lab.b);
        planes.mag_src.push(source_lab.chroma());
        planes.l_work.push(work_lab.l);
        planes.a_work.push(work_lab.a);
        planes.b_work.push(work_lab.b);
    }

    planes
}

/// Clamp the chroma displacement from the source and enforce a minimum
/// chroma magnitude, preventing runaway shifts and over-desaturation.
fn clamp_chroma(
    a: f32,
    b: f32,
    src_a: f32,
    src_b: f32,
    src_mag: f32,
    max_displacement: f32,
    min_magnitude_ratio: f32,
) -> (f32, f32) {
    let da = a - src_a;
    let db = b - src_b;
    let displacement = da.hypot(db);

    let (mut out_a, mut out_b) = if displacement > max_displacement {
        let scale = max_displacement / displacement.max(f32::EPSILON);
        (da.mul_add(scale, src_a), db.mul_add(scale, src_b))
    } else {
        (a, b)
    };

    let min_magnitude = src_mag * min_magnitude_ratio;
    let magnitude = out_a.hypot(out_b);
    if magnitude < min_magnitude {
        if magnitude > 1e-6 {
            let scale = min_magnitude / magnitude;
            out_a *= scale;
            out_b *= scale;
        } else if src_mag > 1e-6 {
            // Result collapsed to neutral: rescale along the source
            // chroma direction, the only one available.
            let scale = min_magnitude / src_mag;
            out_a = src_a * scale;
            out_b = src_b * scale;
        }
    }

    (out_a, out_b)
}

/// Smooth the chroma channels of `work` in Lab space, guided by the
/// pristine `source`.
///
/// `work` is typically the bilateral output; `source` the unmodified
/// input raster. Returns `work` unchanged (cloned) when
/// `chroma_smooth` is zero. Alpha is copied from `work`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two rasters
/// differ in size.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]
pub fn smooth_chroma(
    work: &RgbaImage,
    source: &RgbaImage,
    options: &SmoothingOptions,
) -> Result<RgbaImage, PipelineError> {
    ensure_same_dimensions(work, source)?;

    let strength = options.chroma_smooth.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return Ok(work.clone());
    }

    let (width, height) = work.dimensions();
    let w = i64::from(width);
    let h = i64::from(height);

    let planes = extract_planes(work, source);
    let src: &[u8] = source.as_raw();
    let wrk: &[u8] = work.as_raw();

    let radius = i64::from(options.chroma_radius.clamp(1, 8));
    let kernel_size = (radius * 2 + 1) as usize;

    let luma_preserve = options.luma_preserve.clamp(0.0, 1.0);
    let sigma_luma = (1.0 - luma_preserve).mul_add(24.0, 6.0);
    let sigma_chroma = options.chroma_sigma_color.max(1.0);
    let sigma_space = options.chroma_sigma_space.max(0.5);

    let inv_two_sigma_luma_sq = 1.0 / (2.0 * sigma_luma * sigma_luma);
    let inv_two_sigma_chroma_sq = 1.0 / (2.0 * sigma_chroma * sigma_chroma);
    let inv_two_sigma_space_sq = 1.0 / (2.0 * sigma_space * sigma_space);

    // Spatial kernel, precomputed once per invocation.
    let mut spatial = vec![0.0f32; kernel_size * kernel_size];
    let mut k = 0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist_sq = (dx * dx + dy * dy) as f32;
            spatial[k] = (-dist_sq * inv_two_sigma_space_sq).exp();
            k += 1;
        }
    }

    let protections = active_protections(options);
    let strength_a = strength * options.chroma_smooth_a.clamp(0.0, 1.0);
    let strength_b = strength * options.chroma_smooth_b.clamp(0.0, 1.0);

    let chroma_clamp = options.chroma_clamp.clamp(0.0, 1.0);
    let max_displacement = lerp(42.0, 6.0, chroma_clamp);
    let min_magnitude_ratio = lerp(0.72, 0.95, chroma_clamp);

    let mut out = RgbaImage::new(width, height);
    let dst: &mut [u8] = &mut out;

    for y in 0..h {
        for x in 0..w {
            let center = (y * w + x) as usize;
            let center_l = planes.l_src[center];
            let center_a = planes.a_work[center];
            let center_b = planes.b_work[center];

            let mut sum_a = 0.0f32;
            let mut sum_b = 0.0f32;
            let mut sum_w = 0.0f32;
            // Accumulators for the local chroma-magnitude variance over
            // the same window (feeds the adaptive protection).
            let mut sum_mag = 0.0f32;
            let mut sum_mag_sq = 0.0f32;
            let mut count = 0u32;

            let mut k = 0usize;
            for dy in -radius..=radius {
                let ny = y + dy;
                if ny < 0 || ny >= h {
                    k += kernel_size;
                    continue;
                }
                for dx in -radius..=radius {
                    let nx = x + dx;
                    if nx < 0 || nx >= w {
                        k += 1;
                        continue;
                    }
                    let idx = (ny * w + nx) as usize;
                    let d_l = planes.l_src[idx] - center_l;
                    let d_a = planes.a_work[idx] - center_a;
                    let d_b = planes.b_work[idx] - center_b;

                    let weight = spatial[k]
                        * (-d_l * d_l * inv_two_sigma_luma_sq).exp()
                        * (-(d_a * d_a + d_b * d_b) * inv_two_sigma_chroma_sq).exp();

                    sum_a += planes.a_work[idx] * weight;
                    sum_b += planes.b_work[idx] * weight;
                    sum_w += weight;

                    let mag = planes.mag_src[idx];
                    sum_mag += mag;
                    sum_mag_sq += mag * mag;
                    count += 1;
                    k += 1;
                }
            }

            let candidate_a = if sum_w > 0.0 { sum_a / sum_w } else { center_a };
            let candidate_b = if sum_w > 0.0 { sum_b / sum_w } else { center_b };

            let n = count.max(1) as f32;
            let mean = sum_mag / n;
            let variance = (sum_mag_sq / n - mean * mean).max(0.0);

            let pixel = center * 4;
            let stats = PixelStats {
                source_lab: Lab {
                    l: planes.l_src[center],
                    a: planes.a_src[center],
                    b: planes.b_src[center],
                },
                source_rgb: [src[pixel], src[pixel + 1], src[pixel + 2]],
                source_chroma: planes.mag_src[center],
                chroma_variance: variance,
            };
            let protection = combined_factor(&protections, &stats);

            let effective_a = (strength_a * protection).clamp(0.0, 1.0);
            let effective_b = (strength_b * protection).clamp(0.0, 1.0);

            let mut final_a = lerp(center_a, candidate_a, effective_a);
            let mut final_b = lerp(center_b, candidate_b, effective_b);
            let final_l = lerp(planes.l_work[center], planes.l_src[center], luma_preserve);

            if chroma_clamp > 0.0 {
                (final_a, final_b) = clamp_chroma(
                    final_a,
                    final_b,
                    planes.a_src[center],
                    planes.b_src[center],
                    planes.mag_src[center],
                    max_displacement,
                    min_magnitude_ratio,
                );
            }

            let [r, g, b] = lab_to_rgb(final_l, final_a, final_b);
            dst[pixel] = r;
            dst[pixel + 1] = g;
            dst[pixel + 2] = b;
            dst[pixel + 3] = wrk[pixel + 3];
        }
    }

    Ok(out)
}

/// Exaggerate the chroma residual between `original` and `smoothed`.
///
/// Per pixel: `A = origA + (origA − smoothA) · gain` (same for B) with
/// `gain = 1 + artifact_boost · 3.5`, keeping the original L. A
/// visualization/sharpening aid for preview display — the full-image
/// apply path runs with `artifact_boost = 0`. Out-of-gamut results
/// saturate in [`lab_to_rgb`]. Alpha is copied from `smoothed`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two rasters
/// differ in size.
#[allow(clippy::cast_possible_truncation)]
pub fn boost_chroma_artifacts(
    original: &RgbaImage,
    smoothed: &RgbaImage,
    options: &SmoothingOptions,
) -> Result<RgbaImage, PipelineError> {
    ensure_same_dimensions(original, smoothed)?;

    let boost = options.artifact_boost.clamp(0.0, 1.0);
    if boost <= 0.0 {
        return Ok(smoothed.clone());
    }
    let gain = boost.mul_add(3.5, 1.0);

    let (width, height) = original.dimensions();
    let total = width as usize * height as usize;
    let orig: &[u8] = original.as_raw();
    let smth: &[u8] = smoothed.as_raw();

    let mut out = RgbaImage::new(width, height);
    let dst: &mut [u8] = &mut out;

    for i in 0..total {
        let idx = i * 4;
        let o = rgb_to_lab(orig[idx], orig[idx + 1], orig[idx + 2]);
        let s = rgb_to_lab(smth[idx], smth[idx + 1], smth[idx + 2]);
        let a = (o.a - s.a).mul_add(gain, o.a);
        let b = (o.b - s.b).mul_add(gain, o.b);
        let [r, g, bl] = lab_to_rgb(o.l, a, b);
        dst[idx] = r;
        dst[idx + 1] = g;
        dst[idx + 2] = bl;
        dst[idx + 3] = smth[idx + 3];
    }

    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn options_with(strength: f32) -> SmoothingOptions {
        SmoothingOptions {
            chroma_smooth: strength,
            // Isolate the smoother from the protections for most tests.
            neutral_protect: 0.0,
            luma_protect: 0.0,
            adaptive_chroma: 0.0,
            protect_skin: false,
            chroma_clamp: 0.0,
            ..SmoothingOptions::default()
        }
    }

    /// Mid-gray with scattered saturated color speckles.
    fn speckled_image() -> RgbaImage {
        RgbaImage::from_fn(12, 12, |x, y| {
            if (x + y * 12) % 7 == 0 {
                Rgba([200, 90, 90, 255])
            } else {
                Rgba([128, 128, 128, 255])
            }
        })
    }

    fn mean_chroma(image: &RgbaImage) -> f32 {
        let mut sum = 0.0f32;
        for p in image.pixels() {
            sum += rgb_to_lab(p.0[0], p.0[1], p.0[2]).chroma();
        }
        sum / (image.width() * image.height()) as f32
    }

    #[test]
    fn zero_strength_returns_work_unchanged() {
        let img = speckled_image();
        let out = smooth_chroma(&img, &img, &options_with(0.0)).unwrap();
        assert_eq!(img.as_raw(), out.as_raw());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let a = RgbaImage::new(4, 4);
        let b = RgbaImage::new(4, 5);
        let err = smooth_chroma(&a, &b, &options_with(0.5)).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
    }

    #[test]
    fn smoothing_reduces_chroma_speckle() {
        let img = speckled_image();
        let out = smooth_chroma(&img, &img, &options_with(1.0)).unwrap();
        assert!(
            mean_chroma(&out) < mean_chroma(&img),
            "full-strength chroma smoothing should pull speckles toward neutral",
        );
    }

    #[test]
    fn alpha_comes_from_work_buffer() {
        let img = RgbaImage::from_fn(6, 6, |x, y| Rgba([140, 90, 90, (x * 20 + y) as u8]));
        let out = smooth_chroma(&img, &img, &options_with(0.8)).unwrap();
        for (p_in, p_out) in img.pixels().zip(out.pixels()) {
            assert_eq!(p_in.0[3], p_out.0[3]);
        }
    }

    #[test]
    fn luma_preserve_restores_source_lightness() {
        // Work buffer darker than source; full luma_preserve should
        // bring output L back to the source.
        let source = RgbaImage::from_pixel(6, 6, Rgba([160, 120, 120, 255]));
        let work = RgbaImage::from_pixel(6, 6, Rgba([120, 90, 90, 255]));
        let options = SmoothingOptions {
            luma_preserve: 1.0,
            ..options_with(0.5)
        };
        let out = smooth_chroma(&work, &source, &options).unwrap();
        let src_l = rgb_to_lab(160, 120, 120).l;
        let p = out.get_pixel(3, 3).0;
        let out_l = rgb_to_lab(p[0], p[1], p[2]).l;
        assert!(
            (out_l - src_l).abs() < 1.0,
            "expected L≈{src_l}, got {out_l}",
        );
    }

    #[test]
    fn neutral_protect_keeps_gray_pixels_closer() {
        let img = speckled_image();
        let unprotected = smooth_chroma(&img, &img, &options_with(1.0)).unwrap();
        let protected = smooth_chroma(
            &img,
            &img,
            &SmoothingOptions {
                neutral_protect: 1.0,
                ..options_with(1.0)
            },
        )
        .unwrap();
        // A gray pixel adjacent to a speckle picks up less chroma when
        // neutral protection is active.
        let mut protected_drift = 0.0f32;
        let mut unprotected_drift = 0.0f32;
        for (p_u, p_p) in unprotected.pixels().zip(protected.pixels()) {
            unprotected_drift += rgb_to_lab(p_u.0[0], p_u.0[1], p_u.0[2]).chroma();
            protected_drift += rgb_to_lab(p_p.0[0], p_p.0[1], p_p.0[2]).chroma();
        }
        assert!(
            protected_drift <= unprotected_drift,
            "neutral protection should not increase chroma drift",
        );
    }

    #[test]
    fn chroma_clamp_limits_desaturation() {
        let img = speckled_image();
        let unclamped = smooth_chroma(&img, &img, &options_with(1.0)).unwrap();
        let clamped = smooth_chroma(
            &img,
            &img,
            &SmoothingOptions {
                chroma_clamp: 1.0,
                ..options_with(1.0)
            },
        )
        .unwrap();
        // With a hard clamp, saturated speckles must keep at least 95%
        // of their source chroma, so the mean stays higher.
        assert!(
            mean_chroma(&clamped) >= mean_chroma(&unclamped),
            "clamp should limit how much chroma smoothing removes",
        );
    }

    #[test]
    fn smoothing_is_deterministic() {
        let img = speckled_image();
        let options = SmoothingOptions::default();
        let a = smooth_chroma(&img, &img, &options).unwrap();
        let b = smooth_chroma(&img, &img, &options).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    // --- booster tests ---

    #[test]
    fn boost_zero_returns_smoothed_clone() {
        let original = speckled_image();
        let smoothed = smooth_chroma(&original, &original, &options_with(1.0)).unwrap();
        let out = boost_chroma_artifacts(
            &original,
            &smoothed,
            &SmoothingOptions {
                artifact_boost: 0.0,
                ..SmoothingOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out.as_raw(), smoothed.as_raw());
    }

    #[test]
    fn boost_exaggerates_residual() {
        let original = speckled_image();
        let smoothed = smooth_chroma(&original, &original, &options_with(1.0)).unwrap();
        let boosted = boost_chroma_artifacts(
            &original,
            &smoothed,
            &SmoothingOptions {
                artifact_boost: 1.0,
                ..SmoothingOptions::default()
            },
        )
        .unwrap();
        // The boosted image pushes chroma beyond the original wherever
        // smoothing removed any.
        assert!(
            mean_chroma(&boosted) > mean_chroma(&smoothed),
            "boost should restore and exaggerate removed chroma",
        );
    }

    #[test]
    fn boost_preserves_original_lightness() {
        let original = RgbaImage::from_pixel(4, 4, Rgba([170, 110, 60, 255]));
        let smoothed = RgbaImage::from_pixel(4, 4, Rgba([150, 120, 90, 255]));
        let boosted = boost_chroma_artifacts(
            &original,
            &smoothed,
            &SmoothingOptions {
                artifact_boost: 0.5,
                ..SmoothingOptions::default()
            },
        )
        .unwrap();
        let p = boosted.get_pixel(0, 0).0;
        let orig_l = rgb_to_lab(170, 110, 60).l;
        let out_l = rgb_to_lab(p[0], p[1], p[2]).l;
        // Saturation in lab_to_rgb can nudge L slightly; it must stay close.
        assert!(
            (out_l - orig_l).abs() < 2.5,
            "expected L near {orig_l}, got {out_l}",
        );
    }

    #[test]
    fn boost_alpha_comes_from_smoothed() {
        let original = RgbaImage::from_pixel(3, 3, Rgba([100, 100, 100, 10]));
        let smoothed = RgbaImage::from_pixel(3, 3, Rgba([110, 100, 90, 200]));
        let boosted = boost_chroma_artifacts(
            &original,
            &smoothed,
            &SmoothingOptions {
                artifact_boost: 1.0,
                ..SmoothingOptions::default()
            },
        )
        .unwrap();
        assert!(boosted.pixels().all(|p| p.0[3] == 200));
    }
}
