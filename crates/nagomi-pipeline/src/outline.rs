//! Outline-map construction: turn a soft edge map into a drawable
//! line.
//!
//! The builder runs up to three steps, in order: optional thinning
//! (4-neighbor non-maximum suppression), thresholding (binary or
//! weighted), and optional thickening (repeated dilation). The result
//! is an [`EdgeMap`] whose values read as line coverage rather than a
//! soft glow.

use serde::{Deserialize, Serialize};

use crate::edges::{dilate, threshold_rescale};
use crate::types::{EdgeMap, OutlineMode, SmoothingOptions};

/// Options consumed by [`build_outline_map`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineOptions {
    /// Coverage threshold (0–1).
    pub threshold: f32,
    /// Binary or weighted thresholding.
    pub mode: OutlineMode,
    /// Line thickness; `thickness − 1` dilation passes.
    pub thickness: u32,
    /// Thin the map before thresholding.
    pub thin: bool,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self {
            threshold: SmoothingOptions::DEFAULT_OUTLINE_THRESHOLD,
            mode: OutlineMode::default(),
            thickness: 1,
            thin: false,
        }
    }
}

impl OutlineOptions {
    /// Extract the outline subset of a full options record.
    #[must_use]
    pub const fn from_smoothing(options: &SmoothingOptions) -> Self {
        Self {
            threshold: options.outline_threshold,
            mode: options.outline_mode,
            thickness: options.outline_thickness,
            thin: options.outline_thin,
        }
    }
}

/// 4-neighbor non-maximum suppression: keep a pixel only when it is at
/// least as strong as all of its in-bounds up/down/left/right
/// neighbors.
#[must_use = "returns the thinned map"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn thin_edge_map(map: &EdgeMap) -> EdgeMap {
    let w = i64::from(map.width());
    let h = i64::from(map.height());
    let src = map.data();

    let mut out = EdgeMap::new(map.width(), map.height());
    let dst = out.data_mut();

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) as usize;
            let v = src[i];
            let mut keep = true;
            for (dx, dy) in [(0i64, -1i64), (0, 1), (-1, 0), (1, 0)] {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                if src[(ny * w + nx) as usize] > v {
                    keep = false;
                    break;
                }
            }
            dst[i] = if keep { v } else { 0.0 };
        }
    }

    out
}

/// Build an outline map: thin → threshold → thicken.
///
/// In `Binary` mode every output value is exactly 0 or 1 (values at or
/// below the threshold drop, the rest snap to 1). `Weighted` mode uses
/// the same threshold-rescale as the edge detector, keeping graded
/// coverage.
#[must_use = "returns the outline map"]
pub fn build_outline_map(map: &EdgeMap, options: &OutlineOptions) -> EdgeMap {
    let threshold = options.threshold.clamp(0.0, 1.0);

    let mut out = if options.thin {
        thin_edge_map(map)
    } else {
        map.clone()
    };

    for v in out.data_mut() {
        *v = match options.mode {
            OutlineMode::Binary => {
                if *v <= threshold {
                    0.0
                } else {
                    1.0
                }
            }
            OutlineMode::Weighted => threshold_rescale(*v, threshold),
        };
    }

    for _ in 1..options.thickness.clamp(1, 6) {
        out = dilate(&out);
    }

    out
}
