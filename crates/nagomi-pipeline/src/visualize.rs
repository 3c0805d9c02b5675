//! Edge-map visualization encoders.
//!
//! Three ways to turn an [`EdgeMap`] into a displayable raster: a
//! translucent colored overlay (for drawing on top of the result), a
//! plain grayscale rendering, and a three-band heatmap for judging
//! threshold placement.

use serde::{Deserialize, Serialize};

use crate::types::{EdgeMap, RgbaImage};

/// Default overlay color (cyan-green accent).
pub const DEFAULT_OVERLAY_COLOR: [u8; 3] = [0, 255, 204];

/// Default overlay opacity.
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.75;

/// Options for [`edge_map_to_image_data`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    /// Overlay RGB color.
    pub color: [u8; 3],
    /// Overall opacity multiplier (0–1).
    pub opacity: f32,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            color: DEFAULT_OVERLAY_COLOR,
            opacity: DEFAULT_OVERLAY_OPACITY,
        }
    }
}

/// Encode an edge map as a translucent colored overlay.
///
/// Pixels with zero strength stay fully transparent; elsewhere the
/// overlay color is written with alpha `round(255 · opacity · v)`.
#[must_use = "returns the overlay raster"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn edge_map_to_image_data(map: &EdgeMap, options: &OverlayOptions) -> RgbaImage {
    let opacity = options.opacity.clamp(0.0, 1.0);
    let mut out = RgbaImage::new(map.width(), map.height());
    let dst: &mut [u8] = &mut out;

    for (i, &v) in map.data().iter().enumerate() {
        if v <= 0.0 {
            continue;
        }
        let idx = i * 4;
        dst[idx] = options.color[0];
        dst[idx + 1] = options.color[1];
        dst[idx + 2] = options.color[2];
        dst[idx + 3] = (255.0 * opacity * v).round() as u8;
    }

    out
}

/// Encode an edge map as opaque grayscale, optionally inverted (dark
/// lines on white, the usual "pencil sketch" view).
#[must_use = "returns the grayscale raster"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn edge_map_to_grayscale(map: &EdgeMap, invert: bool) -> RgbaImage {
    let mut out = RgbaImage::new(map.width(), map.height());
    let dst: &mut [u8] = &mut out;

    for (i, &v) in map.data().iter().enumerate() {
        let mut g = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if invert {
            g = 255 - g;
        }
        let idx = i * 4;
        dst[idx] = g;
        dst[idx + 1] = g;
        dst[idx + 2] = g;
        dst[idx + 3] = 255;
    }

    out
}

/// Encode an edge map as an opaque three-band heatmap.
///
/// Blue ramps to green over [0, 0.33), green to red over [0.33, 0.66),
/// and everything above is solid red. The heatmap replaces the display
/// buffer when active, so it is fully opaque.
#[must_use = "returns the heatmap raster"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn edge_map_to_heatmap(map: &EdgeMap) -> RgbaImage {
    let mut out = RgbaImage::new(map.width(), map.height());
    let dst: &mut [u8] = &mut out;

    for (i, &v) in map.data().iter().enumerate() {
        let v = v.clamp(0.0, 1.0);
        let (r, g, b) = if v < 0.33 {
            let t = v / 0.33;
            (0.0, t, 1.0 - t)
        } else if v < 0.66 {
            let t = (v - 0.33) / 0.33;
            (t, 1.0 - t, 0.0)
        } else {
            (1.0, 0.0, 0.0)
        };
        let idx = i * 4;
        dst[idx] = (r * 255.0).round() as u8;
        dst[idx + 1] = (g * 255.0).round() as u8;
        dst[idx + 2] = (b * 255.0).round() as u8;
        dst[idx + 3] = 255;
    }

    out
}
