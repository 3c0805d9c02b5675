//! Gradient-magnitude edge detection and edge-map morphology.
//!
//! The detector converts the raster to a luma plane, optionally
//! box-blurs it, applies a Sobel or Scharr kernel, then shapes the
//! normalized magnitudes with a sensitivity gain and a threshold
//! rescale. An optional refinement pass (morphological closing, one
//! blur, then a "harden" step) cleans ragged mid-strength edges into
//! outline-friendly ridges.
//!
//! The morphology primitives ([`dilate`], [`erode`], [`box_blur`],
//! [`harden`]) are standalone pure functions over [`EdgeMap`] so the
//! detector and the outline builder stay expressible as short
//! pipelines of named, independently testable steps.

use serde::{Deserialize, Serialize};

use crate::types::{EdgeKernel, EdgeMap, RgbaImage, SmoothingOptions};

/// Pedestal subtracted by the harden step of the refinement pass.
const HARDEN_PEDESTAL: f32 = 0.2;

/// Sobel magnitude normalization: `1 / max |gradient|` for 8-bit luma.
const SOBEL_INV_MAX: f32 = 1.0 / 1443.0;

/// Scharr magnitude normalization (3/10/3 weights).
const SCHARR_INV_MAX: f32 = 1.0 / 5776.0;

/// Options consumed by [`detect_edges`].
///
/// A focused subset of [`SmoothingOptions`] — callers that only run
/// edge detection need not assemble the full record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDetectOptions {
    /// Gradient kernel.
    pub kernel: EdgeKernel,
    /// Sensitivity control (0–1), mapped to a gain of `0.6 + s·2.2`.
    pub sensitivity: f32,
    /// Strength threshold (0–1); values at or below it drop to zero.
    pub threshold: f32,
    /// 3×3 box pre-blur passes over the luma plane (0–3).
    pub pre_blur: u32,
    /// Morphological closing passes (0–3); nonzero also runs the
    /// blur + harden refinement.
    pub smooth: u32,
}

impl Default for EdgeDetectOptions {
    fn default() -> Self {
        Self {
            kernel: EdgeKernel::default(),
            sensitivity: SmoothingOptions::DEFAULT_EDGE_SENSITIVITY,
            threshold: SmoothingOptions::DEFAULT_EDGE_THRESHOLD,
            pre_blur: 0,
            smooth: 0,
        }
    }
}

impl EdgeDetectOptions {
    /// Extract the edge-detection subset of a full options record.
    #[must_use]
    pub const fn from_smoothing(options: &SmoothingOptions) -> Self {
        Self {
            kernel: options.edge_kernel,
            sensitivity: options.edge_sensitivity,
            threshold: options.edge_threshold,
            pre_blur: options.edge_preblur,
            smooth: options.edge_smooth,
        }
    }
}

/// Rescale a strength against a threshold: at or below the threshold
/// drops to zero, the rest stretches back to the full range.
pub(crate) fn threshold_rescale(v: f32, threshold: f32) -> f32 {
    if v <= threshold {
        0.0
    } else {
        ((v - threshold) / (1.0 - threshold).max(f32::EPSILON)).min(1.0)
    }
}

/// Rec. 709 luma plane, values 0–255.
fn luma_plane(image: &RgbaImage) -> Vec<f32> {
    image
        .as_raw()
        .chunks_exact(4)
        .map(|px| {
            f32::from(px[2]).mul_add(
                0.0722,
                f32::from(px[0]).mul_add(0.2126, f32::from(px[1]) * 0.7152),
            )
        })
        .collect()
}

/// One 3×3 clipped box-blur pass over a float plane: each output is
/// the mean of the in-bounds neighbors (border pixels average fewer
/// samples).
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn box_blur_plane(data: &[f32], w: i64, h: i64) -> Vec<f32> {
    let mut out = vec![0.0f32; data.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0f32;
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
                    sum += data[(ny * w + nx) as usize];
                    count += 1;
                }
            }
            out[(y * w + x) as usize] = sum / count as f32;
        }
    }
    out
}

/// 3×3 neighborhood extreme over a float plane. `maximum` selects
/// dilation; otherwise erosion.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn extreme_plane(data: &[f32], w: i64, h: i64, maximum: bool) -> Vec<f32> {
    let mut out = vec![0.0f32; data.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = if maximum { 0.0f32 } else { 1.0f32 };
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
                    let v = data[(ny * w + nx) as usize];
                    acc = if maximum { acc.max(v) } else { acc.min(v) };
                }
            }
            out[(y * w + x) as usize] = acc;
        }
    }
    out
}

fn map_dims(map: &EdgeMap) -> (i64, i64) {
    (i64::from(map.width()), i64::from(map.height()))
}

fn map_with(map: &EdgeMap, data: Vec<f32>) -> EdgeMap {
    let mut out = EdgeMap::new(map.width(), map.height());
    out.data_mut().copy_from_slice(&data);
    out
}

/// 3×3 dilation: each pixel becomes the maximum of its clipped
/// neighborhood.
#[must_use = "returns the dilated map"]
pub fn dilate(map: &EdgeMap) -> EdgeMap {
    let (w, h) = map_dims(map);
    map_with(map, extreme_plane(map.data(), w, h, true))
}

/// 3×3 erosion: each pixel becomes the minimum of its clipped
/// neighborhood.
#[must_use = "returns the eroded map"]
pub fn erode(map: &EdgeMap) -> EdgeMap {
    let (w, h) = map_dims(map);
    map_with(map, extreme_plane(map.data(), w, h, false))
}

/// Morphological closing, repeated `passes` times:
/// `close = erode(dilate(map))`. Fills small gaps without growing the
/// overall shape.
#[must_use = "returns the closed map"]
pub fn close(map: &EdgeMap, passes: u32) -> EdgeMap {
    let mut out = map.clone();
    for _ in 0..passes {
        out = erode(&dilate(&out));
    }
    out
}

/// 3×3 clipped box blur, repeated `passes` times.
#[must_use = "returns the blurred map"]
pub fn box_blur(map: &EdgeMap, passes: u32) -> EdgeMap {
    let (w, h) = map_dims(map);
    let mut data = map.data().to_vec();
    for _ in 0..passes {
        data = box_blur_plane(&data, w, h);
    }
    map_with(map, data)
}

/// Subtract a fixed pedestal and rescale, pushing mid-strength values
/// toward 0 or 1.
///
/// The pedestal is clamped to at most 0.6 and the rescale denominator
/// guarded, matching the refinement pass the detector runs after
/// closing.
#[must_use = "returns the hardened map"]
pub fn harden(map: &EdgeMap, pedestal: f32) -> EdgeMap {
    let t = pedestal.clamp(0.0, 0.6);
    let inv = 1.0 / (1.0 - t).max(0.001);
    let mut out = map.clone();
    for v in out.data_mut() {
        *v = ((*v - t).max(0.0) * inv).min(1.0);
    }
    out
}

/// Grow and soften edge influence outward: `radius` rounds of box-blur
/// followed by dilation.
///
/// Used to widen the zone affected by edge-preserve and edge-soften
/// compositing.
#[must_use = "returns the expanded map"]
pub fn expand_edge_map(map: &EdgeMap, radius: u32) -> EdgeMap {
    let mut out = map.clone();
    for _ in 0..radius {
        out = dilate(&box_blur(&out, 1));
    }
    out
}

/// Detect edges, producing a strength map in `[0, 1]`.
///
/// The luma plane (optionally pre-blurred) is convolved with the
/// selected kernel; magnitudes are normalized, boosted by the
/// sensitivity gain, clamped, and threshold-rescaled. The 1-pixel
/// border ring stays 0 — the kernels need a full 3×3 neighborhood.
/// When `smooth > 0` the refinement pass runs: that many closings, one
/// box blur, then [`harden`] with pedestal 0.2. (The refinement is
/// deliberately all-or-nothing; downstream outline visuals are tuned
/// around the resulting step in edge character.)
#[must_use = "returns the edge map"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn detect_edges(image: &RgbaImage, options: &EdgeDetectOptions) -> EdgeMap {
    let (width, height) = image.dimensions();
    let w = i64::from(width);
    let h = i64::from(height);

    let sensitivity = options.sensitivity.clamp(0.0, 1.0);
    let threshold = options.threshold.clamp(0.0, 1.0);
    let gain = sensitivity.mul_add(2.2, 0.6);

    let mut luma = luma_plane(image);
    for _ in 0..options.pre_blur.min(3) {
        luma = box_blur_plane(&luma, w, h);
    }

    let inv_max = match options.kernel {
        EdgeKernel::Sobel => SOBEL_INV_MAX,
        EdgeKernel::Scharr => SCHARR_INV_MAX,
    };
    let (side, center) = match options.kernel {
        EdgeKernel::Sobel => (1.0f32, 2.0f32),
        EdgeKernel::Scharr => (3.0f32, 10.0f32),
    };

    let mut map = EdgeMap::new(width, height);
    {
        let data = map.data_mut();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let i = (y * w + x) as usize;
                let tl = luma[i - w as usize - 1];
                let tc = luma[i - w as usize];
                let tr = luma[i - w as usize + 1];
                let ml = luma[i - 1];
                let mr = luma[i + 1];
                let bl = luma[i + w as usize - 1];
                let bc = luma[i + w as usize];
                let br = luma[i + w as usize + 1];

                let gx = (tr - tl).mul_add(side, (mr - ml) * center) + (br - bl) * side;
                let gy = (tl - bl).mul_add(side, (tc - bc) * center) + (tr - br) * side;
                let magnitude = (gx.hypot(gy) * inv_max).min(1.0);
                let boosted = (magnitude * gain).min(1.0);
                data[i] = threshold_rescale(boosted, threshold);
            }
        }
    }

    if options.smooth > 0 {
        map = close(&map, options.smooth.min(3));
        map = box_blur(&map, 1);
        map = harden(&map, HARDEN_PEDESTAL);
    }

    map
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 8×8 image, left half black, right half white.
    fn boundary_image() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn in_bounds(map: &EdgeMap) -> bool {
        map.data().iter().all(|&v| (0.0..=1.0).contains(&v))
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([128, 128, 128, 255]));
        let map = detect_edges(&img, &EdgeDetectOptions::default());
        assert!(map.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn single_white_center_on_3x3_is_all_zero() {
        // Only the center pixel is interior, and its Sobel response is
        // zero by symmetry (the kernels ignore the center sample); the
        // border ring is never computed.
        let mut img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let map = detect_edges(
            &img,
            &EdgeDetectOptions {
                threshold: 0.0,
                sensitivity: 0.5,
                ..EdgeDetectOptions::default()
            },
        );
        assert!(
            map.data().iter().all(|&v| v == 0.0),
            "3×3 border ring plus symmetric center must yield an empty map",
        );
    }

    #[test]
    fn border_ring_is_zero() {
        let map = detect_edges(&boundary_image(), &EdgeDetectOptions::default());
        let (w, h) = (map.width() as usize, map.height() as usize);
        for x in 0..w {
            assert_eq!(map.data()[x], 0.0, "top row must stay 0");
            assert_eq!(map.data()[(h - 1) * w + x], 0.0, "bottom row must stay 0");
        }
        for y in 0..h {
            assert_eq!(map.data()[y * w], 0.0, "left column must stay 0");
            assert_eq!(map.data()[y * w + w - 1], 0.0, "right column must stay 0");
        }
    }

    #[test]
    fn sharp_boundary_clamps_to_one() {
        // A full-contrast vertical step: |gx| = 4·255 = 1020, so the
        // normalized Sobel magnitude is 1020/1443 ≈ 0.707. With the
        // default gain 0.6 + 0.5·2.2 = 1.7 it exceeds 1 and clamps.
        let map = detect_edges(
            &boundary_image(),
            &EdgeDetectOptions {
                threshold: 0.0,
                sensitivity: 0.5,
                ..EdgeDetectOptions::default()
            },
        );
        let w = map.width() as usize;
        let center = map.data()[4 * w + 4];
        assert_eq!(center, 1.0, "boundary response should clamp to exactly 1.0");
        assert!(in_bounds(&map));
    }

    #[test]
    fn threshold_zeroes_weak_edges() {
        // A gentle two-step ramp produces weak responses that a high
        // threshold should wipe out entirely.
        let img = RgbaImage::from_fn(8, 8, |x, _| {
            let v = 120 + (x as u8) * 2;
            Rgba([v, v, v, 255])
        });
        let map = detect_edges(
            &img,
            &EdgeDetectOptions {
                threshold: 0.9,
                sensitivity: 0.0,
                ..EdgeDetectOptions::default()
            },
        );
        assert!(map.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn scharr_detects_the_same_boundary() {
        let map = detect_edges(
            &boundary_image(),
            &EdgeDetectOptions {
                kernel: EdgeKernel::Scharr,
                threshold: 0.0,
                ..EdgeDetectOptions::default()
            },
        );
        let w = map.width() as usize;
        assert!(map.data()[4 * w + 4] > 0.5);
        assert!(in_bounds(&map));
    }

    #[test]
    fn pre_blur_weakens_single_pixel_speckle() {
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let raw = detect_edges(
            &img,
            &EdgeDetectOptions {
                threshold: 0.0,
                ..EdgeDetectOptions::default()
            },
        );
        let blurred = detect_edges(
            &img,
            &EdgeDetectOptions {
                threshold: 0.0,
                pre_blur: 2,
                ..EdgeDetectOptions::default()
            },
        );
        let sum = |m: &EdgeMap| m.data().iter().sum::<f32>();
        assert!(
            sum(&blurred) < sum(&raw),
            "pre-blur should weaken the speckle's total response",
        );
    }

    #[test]
    fn smooth_refinement_changes_edge_character() {
        let plain = detect_edges(&boundary_image(), &EdgeDetectOptions::default());
        let refined = detect_edges(
            &boundary_image(),
            &EdgeDetectOptions {
                smooth: 1,
                ..EdgeDetectOptions::default()
            },
        );
        assert_ne!(
            plain.data(),
            refined.data(),
            "the refinement pass must alter the map",
        );
        assert!(in_bounds(&refined));
    }

    #[test]
    fn detector_is_deterministic() {
        let img = boundary_image();
        let options = EdgeDetectOptions {
            smooth: 2,
            pre_blur: 1,
            ..EdgeDetectOptions::default()
        };
        let a = detect_edges(&img, &options);
        let b = detect_edges(&img, &options);
        assert_eq!(a.data(), b.data());
    }

    // --- morphology primitive tests ---

    fn single_spike_map() -> EdgeMap {
        let mut data = vec![0.0f32; 81];
        data[4 * 9 + 4] = 1.0;
        EdgeMap::from_data(9, 9, data).unwrap()
    }

    #[test]
    fn dilate_grows_a_spike_to_3x3() {
        let dilated = dilate(&single_spike_map());
        let on = dilated.data().iter().filter(|&&v| v > 0.0).count();
        assert_eq!(on, 9);
    }

    #[test]
    fn erode_removes_an_isolated_spike() {
        let eroded = erode(&single_spike_map());
        assert!(eroded.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn close_fills_a_one_pixel_gap() {
        // Two pixels with a gap between them: dilation bridges the
        // gap, erosion shrinks back without reopening it.
        let mut data = vec![0.0f32; 25];
        data[11] = 1.0; // (1, 2)
        data[13] = 1.0; // (3, 2)
        let map = EdgeMap::from_data(5, 5, data).unwrap();
        let closed = close(&map, 1);
        assert_eq!(
            closed.data()[12], 1.0,
            "closing should fill the gap at (2, 2)",
        );
    }

    #[test]
    fn close_zero_passes_is_identity() {
        let map = single_spike_map();
        assert_eq!(close(&map, 0), map);
    }

    #[test]
    fn box_blur_preserves_uniform_map() {
        let map = EdgeMap::from_data(4, 4, vec![0.5; 16]).unwrap();
        let blurred = box_blur(&map, 1);
        for &v in blurred.data() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn harden_pushes_values_apart() {
        let map = EdgeMap::from_data(1, 3, vec![0.1, 0.2, 0.8]).unwrap();
        let hardened = harden(&map, 0.2);
        assert_eq!(hardened.data()[0], 0.0);
        assert_eq!(hardened.data()[1], 0.0);
        assert!((hardened.data()[2] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn harden_clamps_pedestal_to_06() {
        let map = EdgeMap::from_data(1, 1, vec![0.9]).unwrap();
        let over = harden(&map, 5.0);
        let capped = harden(&map, 0.6);
        assert_eq!(over.data(), capped.data());
    }

    #[test]
    fn expand_grows_support_each_round() {
        let map = single_spike_map();
        let on =
            |m: &EdgeMap| m.data().iter().filter(|&&v| v > 0.0).count();
        let once = expand_edge_map(&map, 1);
        let twice = expand_edge_map(&map, 2);
        assert!(on(&once) > on(&map));
        assert!(on(&twice) > on(&once));
        assert!(in_bounds(&once) && in_bounds(&twice));
    }

    #[test]
    fn expand_zero_radius_is_identity() {
        let map = single_spike_map();
        assert_eq!(expand_edge_map(&map, 0), map);
    }
}
