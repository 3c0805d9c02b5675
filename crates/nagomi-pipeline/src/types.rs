//! Shared types for the nagomi image smoothing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can reference raster
/// buffers without depending on `image` directly.
///
/// A raster is a width × height RGBA buffer, 8 bits per channel,
/// row-major. Every pipeline stage reads one or more rasters and
/// allocates a fresh output of identical dimensions — caller-owned
/// buffers are never mutated.
pub use image::RgbaImage;

/// Build a raster from raw RGBA bytes, validating the buffer contract.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if either dimension is
/// zero, and [`PipelineError::BufferSize`] if `pixels.len()` is not
/// exactly `width * height * 4`. Malformed inputs are rejected here at
/// the boundary — they are never truncated or padded.
#[allow(clippy::cast_possible_truncation)]
pub fn raster_from_raw(
    width: u32,
    height: u32,
    pixels: Vec<u8>,
) -> Result<RgbaImage, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize * 4;
    let actual = pixels.len();
    // from_raw alone would accept an oversized buffer; the contract is
    // an exact match.
    if actual != expected {
        return Err(PipelineError::BufferSize { expected, actual });
    }
    RgbaImage::from_raw(width, height, pixels)
        .ok_or(PipelineError::BufferSize { expected, actual })
}

/// A per-pixel edge-strength grid with values in `[0, 1]`.
///
/// Produced by the edge detector and consumed by the compositing and
/// outline stages. Owns its storage — an `EdgeMap` is not tied to the
/// lifetime of the raster it was derived from. Does not implement
/// serde: construction goes through [`EdgeMap::from_data`] so the
/// length invariant always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl EdgeMap {
    /// Create a zero-filled edge map.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    /// Wrap existing per-pixel values as an edge map.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BufferSize`] if `data.len()` is not
    /// exactly `width * height`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self, PipelineError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PipelineError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The per-pixel values in row-major order.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access for map-producing stages within the crate.
    pub(crate) fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the map and return the underlying values.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Selects the smoothing path: plain RGB bilateral, or bilateral plus
/// the Lab-space chroma smoother.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    /// Bilateral filter only, in RGB space.
    Rgb,
    /// Bilateral filter followed by chroma-only smoothing in Lab space.
    #[default]
    Lab,
}

/// Gradient kernel used by the edge detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKernel {
    /// 3×3 Sobel operator, magnitude normalized by 1/1443.
    #[default]
    Sobel,
    /// 3×3 Scharr operator (3/10/3 weights), magnitude normalized by 1/5776.
    Scharr,
}

/// Falloff curve applied to the edge-preserve keep factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeFalloff {
    /// Keep factor used as-is.
    #[default]
    Linear,
    /// Keep factor shaped by `k²·(3 - 2k)`.
    Smoothstep,
}

/// How edge strengths become outline coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineMode {
    /// Threshold-rescaled, keeping graded strengths.
    #[default]
    Weighted,
    /// Hard 0/1 at the threshold.
    Binary,
}

/// Color drawn by the outline-merge stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineColor {
    /// Pure black (0, 0, 0).
    #[default]
    Black,
    /// Near-black (20, 20, 20).
    Dark,
    /// Cyan accent (0, 209, 255).
    Accent,
}

impl OutlineColor {
    /// The RGB triple this choice draws with.
    #[must_use]
    pub const fn rgb(self) -> [u8; 3] {
        match self {
            Self::Black => [0, 0, 0],
            Self::Dark => [20, 20, 20],
            Self::Accent => [0, 209, 255],
        }
    }
}

/// Per-pixel blend applied where the outline map is nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutlineBlendMode {
    /// `p · c / 255` per channel.
    #[default]
    Multiply,
    /// `min(p, c)` per channel.
    Darken,
    /// Standard overlay formula, branching at base < 128.
    Overlay,
    /// `max(0, p - 90)` per channel; ignores the outline color.
    EdgeDarken,
}

/// Configuration for one pipeline invocation.
///
/// All numeric fields are clamped into their documented domains by
/// [`clamped`](Self::clamped) at the API boundary; out-of-range values
/// never error. The record is immutable per invocation — no stage
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SmoothingOptions {
    /// Smoothing path selector.
    pub smoothing_mode: SmoothingMode,

    /// Bilateral kernel radius in pixels (1–12).
    pub radius: u32,
    /// Bilateral range sigma over Euclidean RGB distance (1–200).
    pub sigma_color: f32,
    /// Bilateral spatial Gaussian sigma.
    pub sigma_space: f32,

    /// Blend factor restoring the source L channel (0–1).
    pub luma_preserve: f32,
    /// Overall chroma smoothing strength (0–1). Zero disables the
    /// chroma smoother entirely.
    pub chroma_smooth: f32,
    /// Per-channel strength multiplier for the A channel (0–1).
    pub chroma_smooth_a: f32,
    /// Per-channel strength multiplier for the B channel (0–1).
    pub chroma_smooth_b: f32,
    /// Chroma kernel radius in pixels (1–8).
    pub chroma_radius: u32,
    /// Chroma spatial Gaussian sigma (0.5–12).
    pub chroma_sigma_space: f32,
    /// Chroma range sigma over Euclidean (A, B) distance (1–80).
    pub chroma_sigma_color: f32,
    /// Limits chroma displacement from the source (0–1). Higher values
    /// clamp harder.
    pub chroma_clamp: f32,

    /// Protection strength for near-neutral source pixels (0–1).
    pub neutral_protect: f32,
    /// Protection strength in deep shadows and bright highlights (0–1).
    pub luma_protect: f32,
    /// How strongly local chroma variance reduces smoothing (0–1).
    pub adaptive_chroma: f32,
    /// Reduce smoothing inside the skin-tone hue window.
    pub protect_skin: bool,

    /// Chroma-residual exaggeration gain for preview display (0–1).
    pub artifact_boost: f32,

    /// Uniform quantization level count (0–32); values above 1 enable
    /// the palette stage.
    pub palette_levels: u32,
    /// Neighborhood mode-color merge strength (0–1).
    pub neighbor_merge: f32,

    /// Master switch for edge detection and everything downstream of it.
    pub edge_detect: bool,
    /// Gradient kernel.
    pub edge_kernel: EdgeKernel,
    /// Sensitivity gain control (0–1); maps to a gain of `0.6 + s·2.2`.
    pub edge_sensitivity: f32,
    /// Edge strength threshold (0–1); strengths at or below it drop to 0.
    pub edge_threshold: f32,
    /// 3×3 box pre-blur passes over the luma plane (0–3).
    pub edge_preblur: u32,
    /// Morphological closing passes (0–3). Nonzero also triggers the
    /// blur + harden refinement.
    pub edge_smooth: u32,
    /// Edge-map expansion radius (0–6).
    pub edge_influence: u32,

    /// Edge-preserve blend strength (0–1); restores the original at edges.
    pub edge_preserve: f32,
    /// Falloff curve for the edge-preserve keep factor.
    pub edge_falloff: EdgeFalloff,
    /// Edge-soften blend strength (0–1); locally blurs at edges.
    pub edge_soften: f32,

    /// Draw the outline map into the final result.
    pub outline_merge: bool,
    /// Outline coverage threshold (0–1).
    pub outline_threshold: f32,
    /// Outline thresholding mode.
    pub outline_mode: OutlineMode,
    /// Outline dilation count plus one (1–6).
    pub outline_thickness: u32,
    /// Thin the edge map (4-neighbor non-max suppression) before
    /// thresholding.
    pub outline_thin: bool,
    /// Outline draw strength (0–1); zero makes the merge a no-op.
    pub outline_merge_strength: f32,
    /// Outline draw color.
    pub outline_color: OutlineColor,
    /// Outline blend mode.
    pub outline_blend_mode: OutlineBlendMode,
}

impl SmoothingOptions {
    /// Default bilateral radius.
    pub const DEFAULT_RADIUS: u32 = 4;
    /// Default bilateral range sigma.
    pub const DEFAULT_SIGMA_COLOR: f32 = 30.0;
    /// Default bilateral spatial sigma.
    pub const DEFAULT_SIGMA_SPACE: f32 = 4.0;
    /// Default source-L restoration factor.
    pub const DEFAULT_LUMA_PRESERVE: f32 = 0.85;
    /// Default overall chroma smoothing strength.
    pub const DEFAULT_CHROMA_SMOOTH: f32 = 0.6;
    /// Default chroma kernel radius.
    pub const DEFAULT_CHROMA_RADIUS: u32 = 3;
    /// Default chroma spatial sigma.
    pub const DEFAULT_CHROMA_SIGMA_SPACE: f32 = 3.0;
    /// Default chroma range sigma.
    pub const DEFAULT_CHROMA_SIGMA_COLOR: f32 = 26.0;
    /// Default chroma displacement clamp.
    pub const DEFAULT_CHROMA_CLAMP: f32 = 0.45;
    /// Default neutral-protection strength.
    pub const DEFAULT_NEUTRAL_PROTECT: f32 = 0.45;
    /// Default shadow/highlight protection strength.
    pub const DEFAULT_LUMA_PROTECT: f32 = 0.35;
    /// Default adaptive-variance strength.
    pub const DEFAULT_ADAPTIVE_CHROMA: f32 = 0.4;
    /// Default edge sensitivity.
    pub const DEFAULT_EDGE_SENSITIVITY: f32 = 0.5;
    /// Default edge threshold.
    pub const DEFAULT_EDGE_THRESHOLD: f32 = 0.12;
    /// Default outline threshold.
    pub const DEFAULT_OUTLINE_THRESHOLD: f32 = 0.35;
    /// Default outline merge strength.
    pub const DEFAULT_OUTLINE_MERGE_STRENGTH: f32 = 0.65;

    /// Return a copy with every numeric field clamped into its
    /// documented domain.
    ///
    /// Called once at the orchestrator boundary so the per-pixel loops
    /// can assume domains hold.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            smoothing_mode: self.smoothing_mode,
            radius: self.radius.clamp(1, 12),
            sigma_color: self.sigma_color.clamp(1.0, 200.0),
            sigma_space: self.sigma_space.max(0.1),
            luma_preserve: self.luma_preserve.clamp(0.0, 1.0),
            chroma_smooth: self.chroma_smooth.clamp(0.0, 1.0),
            chroma_smooth_a: self.chroma_smooth_a.clamp(0.0, 1.0),
            chroma_smooth_b: self.chroma_smooth_b.clamp(0.0, 1.0),
            chroma_radius: self.chroma_radius.clamp(1, 8),
            chroma_sigma_space: self.chroma_sigma_space.clamp(0.5, 12.0),
            chroma_sigma_color: self.chroma_sigma_color.clamp(1.0, 80.0),
            chroma_clamp: self.chroma_clamp.clamp(0.0, 1.0),
            neutral_protect: self.neutral_protect.clamp(0.0, 1.0),
            luma_protect: self.luma_protect.clamp(0.0, 1.0),
            adaptive_chroma: self.adaptive_chroma.clamp(0.0, 1.0),
            protect_skin: self.protect_skin,
            artifact_boost: self.artifact_boost.clamp(0.0, 1.0),
            palette_levels: self.palette_levels.min(32),
            neighbor_merge: self.neighbor_merge.clamp(0.0, 1.0),
            edge_detect: self.edge_detect,
            edge_kernel: self.edge_kernel,
            edge_sensitivity: self.edge_sensitivity.clamp(0.0, 1.0),
            edge_threshold: self.edge_threshold.clamp(0.0, 1.0),
            edge_preblur: self.edge_preblur.min(3),
            edge_smooth: self.edge_smooth.min(3),
            edge_influence: self.edge_influence.min(6),
            edge_preserve: self.edge_preserve.clamp(0.0, 1.0),
            edge_falloff: self.edge_falloff,
            edge_soften: self.edge_soften.clamp(0.0, 1.0),
            outline_merge: self.outline_merge,
            outline_threshold: self.outline_threshold.clamp(0.0, 1.0),
            outline_mode: self.outline_mode,
            outline_thickness: self.outline_thickness.clamp(1, 6),
            outline_thin: self.outline_thin,
            outline_merge_strength: self.outline_merge_strength.clamp(0.0, 1.0),
            outline_color: self.outline_color,
            outline_blend_mode: self.outline_blend_mode,
        }
    }

    /// Apply a chroma preset on top of these options.
    ///
    /// Mirrors the preset selector: forces Lab mode and overwrites the
    /// chroma-related fields with the preset's values. Everything else
    /// is left untouched.
    #[must_use]
    pub fn with_preset(&self, preset: ChromaPreset) -> Self {
        let v = preset.values();
        Self {
            smoothing_mode: SmoothingMode::Lab,
            luma_preserve: v.luma_preserve,
            chroma_smooth: v.chroma_smooth,
            chroma_smooth_a: v.chroma_smooth_a,
            chroma_smooth_b: v.chroma_smooth_b,
            chroma_radius: v.chroma_radius,
            chroma_sigma_space: v.chroma_sigma_space,
            chroma_sigma_color: v.chroma_sigma_color,
            chroma_clamp: v.chroma_clamp,
            neutral_protect: v.neutral_protect,
            luma_protect: v.luma_protect,
            adaptive_chroma: v.adaptive_chroma,
            protect_skin: v.protect_skin,
            ..self.clone()
        }
    }
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            smoothing_mode: SmoothingMode::default(),
            radius: Self::DEFAULT_RADIUS,
            sigma_color: Self::DEFAULT_SIGMA_COLOR,
            sigma_space: Self::DEFAULT_SIGMA_SPACE,
            luma_preserve: Self::DEFAULT_LUMA_PRESERVE,
            chroma_smooth: Self::DEFAULT_CHROMA_SMOOTH,
            chroma_smooth_a: 1.0,
            chroma_smooth_b: 1.0,
            chroma_radius: Self::DEFAULT_CHROMA_RADIUS,
            chroma_sigma_space: Self::DEFAULT_CHROMA_SIGMA_SPACE,
            chroma_sigma_color: Self::DEFAULT_CHROMA_SIGMA_COLOR,
            chroma_clamp: Self::DEFAULT_CHROMA_CLAMP,
            neutral_protect: Self::DEFAULT_NEUTRAL_PROTECT,
            luma_protect: Self::DEFAULT_LUMA_PROTECT,
            adaptive_chroma: Self::DEFAULT_ADAPTIVE_CHROMA,
            protect_skin: true,
            artifact_boost: 0.0,
            palette_levels: 0,
            neighbor_merge: 0.0,
            edge_detect: false,
            edge_kernel: EdgeKernel::default(),
            edge_sensitivity: Self::DEFAULT_EDGE_SENSITIVITY,
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            edge_preblur: 0,
            edge_smooth: 0,
            edge_influence: 0,
            edge_preserve: 0.0,
            edge_falloff: EdgeFalloff::default(),
            edge_soften: 0.0,
            outline_merge: false,
            outline_threshold: Self::DEFAULT_OUTLINE_THRESHOLD,
            outline_mode: OutlineMode::default(),
            outline_thickness: 1,
            outline_thin: false,
            outline_merge_strength: Self::DEFAULT_OUTLINE_MERGE_STRENGTH,
            outline_color: OutlineColor::default(),
            outline_blend_mode: OutlineBlendMode::default(),
        }
    }
}

/// Named chroma tuning presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaPreset {
    /// Gentle smoothing, strong protections.
    Subtle,
    /// Moderate smoothing and protections.
    Balanced,
    /// Heavy smoothing, relaxed protections.
    Aggressive,
}

impl ChromaPreset {
    /// Look up a preset by name ("subtle", "balanced", "aggressive").
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "subtle" => Some(Self::Subtle),
            "balanced" => Some(Self::Balanced),
            "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }

    /// The chroma field values this preset sets.
    #[must_use]
    pub const fn values(self) -> ChromaPresetValues {
        match self {
            Self::Subtle => ChromaPresetValues {
                luma_preserve: 0.92,
                chroma_smooth: 0.35,
                chroma_smooth_a: 1.0,
                chroma_smooth_b: 1.0,
                chroma_radius: 2,
                chroma_sigma_space: 2.5,
                chroma_sigma_color: 18.0,
                chroma_clamp: 0.6,
                neutral_protect: 0.6,
                luma_protect: 0.55,
                adaptive_chroma: 0.55,
                protect_skin: true,
            },
            Self::Balanced => ChromaPresetValues {
                luma_preserve: 0.85,
                chroma_smooth: 0.6,
                chroma_smooth_a: 1.0,
                chroma_smooth_b: 1.0,
                chroma_radius: 3,
                chroma_sigma_space: 3.0,
                chroma_sigma_color: 26.0,
                chroma_clamp: 0.45,
                neutral_protect: 0.45,
                luma_protect: 0.35,
                adaptive_chroma: 0.4,
                protect_skin: true,
            },
            Self::Aggressive => ChromaPresetValues {
                luma_preserve: 0.75,
                chroma_smooth: 0.85,
                chroma_smooth_a: 1.0,
                chroma_smooth_b: 1.0,
                chroma_radius: 4,
                chroma_sigma_space: 4.0,
                chroma_sigma_color: 36.0,
                chroma_clamp: 0.3,
                neutral_protect: 0.3,
                luma_protect: 0.2,
                adaptive_chroma: 0.25,
                protect_skin: true,
            },
        }
    }
}

/// Chroma field values carried by a [`ChromaPreset`].
///
/// A plain value struct — presets are a pure lookup, not mutable
/// global state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaPresetValues {
    /// Source-L restoration factor.
    pub luma_preserve: f32,
    /// Overall chroma smoothing strength.
    pub chroma_smooth: f32,
    /// A-channel strength multiplier.
    pub chroma_smooth_a: f32,
    /// B-channel strength multiplier.
    pub chroma_smooth_b: f32,
    /// Chroma kernel radius.
    pub chroma_radius: u32,
    /// Chroma spatial sigma.
    pub chroma_sigma_space: f32,
    /// Chroma range sigma.
    pub chroma_sigma_color: f32,
    /// Chroma displacement clamp.
    pub chroma_clamp: f32,
    /// Neutral-protection strength.
    pub neutral_protect: f32,
    /// Shadow/highlight protection strength.
    pub luma_protect: f32,
    /// Adaptive-variance strength.
    pub adaptive_chroma: f32,
    /// Skin-hue protection toggle.
    pub protect_skin: bool,
}

/// Result of a full pipeline run with all intermediates preserved.
///
/// Lets a preview UI (or the bench CLI) display every step of the
/// chain without re-running it.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The pristine input raster.
    pub source: RgbaImage,
    /// Output of the smoothing core (bilateral + chroma + palette).
    pub smoothed: RgbaImage,
    /// Edge map, `Some` only when edge detection ran.
    pub edge_map: Option<EdgeMap>,
    /// Outline map, `Some` only when the outline-merge stage ran.
    pub outline_map: Option<EdgeMap>,
    /// Final composited result.
    pub result: RgbaImage,
}

/// Errors produced at the pipeline's API boundary.
///
/// Numeric option values never error — they are clamped. Only
/// structural input-contract violations are reported.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A raster dimension was zero.
    #[error("invalid raster dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Offending width.
        width: u32,
        /// Offending height.
        height: u32,
    },

    /// A pixel buffer did not match its declared dimensions.
    #[error("buffer length {actual} does not match dimensions (expected {expected})")]
    BufferSize {
        /// Element count implied by the dimensions.
        expected: usize,
        /// Element count actually supplied.
        actual: usize,
    },

    /// Two buffers that must share dimensions did not.
    #[error("dimension mismatch: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        /// First buffer width.
        left_width: u32,
        /// First buffer height.
        left_height: u32,
        /// Second buffer width.
        right_width: u32,
        /// Second buffer height.
        right_height: u32,
    },
}

/// Check that two rasters share dimensions.
pub(crate) fn ensure_same_dimensions(
    left: &RgbaImage,
    right: &RgbaImage,
) -> Result<(), PipelineError> {
    if left.dimensions() == right.dimensions() {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            left_width: left.width(),
            left_height: left.height(),
            right_width: right.width(),
            right_height: right.height(),
        })
    }
}

/// Check that an edge map covers a raster pixel-for-pixel.
pub(crate) fn ensure_map_matches(
    image: &RgbaImage,
    map: &EdgeMap,
) -> Result<(), PipelineError> {
    if image.width() == map.width() && image.height() == map.height() {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            left_width: image.width(),
            left_height: image.height(),
            right_width: map.width(),
            right_height: map.height(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- raster_from_raw tests ---

    #[test]
    fn raster_from_raw_accepts_exact_buffer() {
        let raster = raster_from_raw(2, 3, vec![0; 2 * 3 * 4]).unwrap();
        assert_eq!(raster.dimensions(), (2, 3));
    }

    #[test]
    fn raster_from_raw_rejects_zero_width() {
        let err = raster_from_raw(0, 3, vec![]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidDimensions { width: 0, height: 3 }
        ));
    }

    #[test]
    fn raster_from_raw_rejects_short_buffer() {
        let err = raster_from_raw(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BufferSize {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn raster_from_raw_rejects_oversized_buffer() {
        // Never truncate a too-long buffer down to fit.
        let err = raster_from_raw(2, 2, vec![0; 20]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BufferSize {
                expected: 16,
                actual: 20
            }
        ));
    }

    // --- EdgeMap tests ---

    #[test]
    fn edge_map_new_is_zero_filled() {
        let map = EdgeMap::new(4, 3);
        assert_eq!(map.data().len(), 12);
        assert!(map.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn edge_map_from_data_validates_length() {
        assert!(EdgeMap::from_data(2, 2, vec![0.0; 4]).is_ok());
        let err = EdgeMap::from_data(2, 2, vec![0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BufferSize {
                expected: 4,
                actual: 5
            }
        ));
    }

    // --- SmoothingOptions tests ---

    #[test]
    fn default_options_match_documented_values() {
        let options = SmoothingOptions::default();
        assert_eq!(options.smoothing_mode, SmoothingMode::Lab);
        assert_eq!(options.radius, 4);
        assert!((options.sigma_color - 30.0).abs() < f32::EPSILON);
        assert!((options.chroma_smooth - 0.6).abs() < f32::EPSILON);
        assert_eq!(options.palette_levels, 0);
        assert!(!options.edge_detect);
        assert_eq!(options.edge_kernel, EdgeKernel::Sobel);
        assert_eq!(options.outline_blend_mode, OutlineBlendMode::Multiply);
        assert!(options.protect_skin);
    }

    #[test]
    fn clamped_pulls_fields_into_domain() {
        let options = SmoothingOptions {
            radius: 99,
            sigma_color: -5.0,
            chroma_smooth: 2.0,
            chroma_radius: 0,
            palette_levels: 1000,
            edge_influence: 40,
            outline_thickness: 0,
            edge_threshold: 1.5,
            ..SmoothingOptions::default()
        };
        let clamped = options.clamped();
        assert_eq!(clamped.radius, 12);
        assert!((clamped.sigma_color - 1.0).abs() < f32::EPSILON);
        assert!((clamped.chroma_smooth - 1.0).abs() < f32::EPSILON);
        assert_eq!(clamped.chroma_radius, 1);
        assert_eq!(clamped.palette_levels, 32);
        assert_eq!(clamped.edge_influence, 6);
        assert_eq!(clamped.outline_thickness, 1);
        assert!((clamped.edge_threshold - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn clamped_is_idempotent() {
        let options = SmoothingOptions {
            radius: 50,
            edge_soften: -1.0,
            ..SmoothingOptions::default()
        };
        let once = options.clamped();
        let twice = once.clamped();
        assert_eq!(once, twice);
    }

    #[test]
    fn options_serde_round_trip() {
        let options = SmoothingOptions {
            smoothing_mode: SmoothingMode::Rgb,
            edge_kernel: EdgeKernel::Scharr,
            outline_blend_mode: OutlineBlendMode::EdgeDarken,
            edge_detect: true,
            ..SmoothingOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: SmoothingOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(options, back);
    }

    #[test]
    fn options_deserialize_from_partial_json() {
        // Missing fields fall back to defaults rather than erroring.
        let back: SmoothingOptions =
            serde_json::from_str(r#"{"radius": 7, "edge_kernel": "scharr"}"#).unwrap();
        assert_eq!(back.radius, 7);
        assert_eq!(back.edge_kernel, EdgeKernel::Scharr);
        assert!((back.chroma_smooth - SmoothingOptions::DEFAULT_CHROMA_SMOOTH).abs()
            < f32::EPSILON);
    }

    #[test]
    fn outline_blend_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&OutlineBlendMode::EdgeDarken).unwrap();
        assert_eq!(json, r#""edge-darken""#);
    }

    // --- preset tests ---

    #[test]
    fn preset_lookup_by_name() {
        assert_eq!(
            ChromaPreset::from_name("balanced"),
            Some(ChromaPreset::Balanced)
        );
        assert_eq!(ChromaPreset::from_name("nope"), None);
    }

    #[test]
    fn preset_values_are_in_domain() {
        for preset in [
            ChromaPreset::Subtle,
            ChromaPreset::Balanced,
            ChromaPreset::Aggressive,
        ] {
            let v = preset.values();
            assert!((0.0..=1.0).contains(&v.chroma_smooth));
            assert!((0.0..=1.0).contains(&v.luma_preserve));
            assert!((1..=8).contains(&v.chroma_radius));
            assert!((0.5..=12.0).contains(&v.chroma_sigma_space));
            assert!((1.0..=80.0).contains(&v.chroma_sigma_color));
        }
    }

    #[test]
    fn with_preset_forces_lab_mode_and_overwrites_chroma_fields() {
        let options = SmoothingOptions {
            smoothing_mode: SmoothingMode::Rgb,
            radius: 9,
            ..SmoothingOptions::default()
        };
        let applied = options.with_preset(ChromaPreset::Aggressive);
        assert_eq!(applied.smoothing_mode, SmoothingMode::Lab);
        assert!((applied.chroma_smooth - 0.85).abs() < f32::EPSILON);
        assert_eq!(applied.chroma_radius, 4);
        // Non-chroma fields survive.
        assert_eq!(applied.radius, 9);
    }

    #[test]
    fn outline_color_rgb_values() {
        assert_eq!(OutlineColor::Black.rgb(), [0, 0, 0]);
        assert_eq!(OutlineColor::Dark.rgb(), [20, 20, 20]);
        assert_eq!(OutlineColor::Accent.rgb(), [0, 209, 255]);
    }

    // --- error display tests ---

    #[test]
    fn invalid_dimensions_display() {
        let err = PipelineError::InvalidDimensions {
            width: 0,
            height: 5,
        };
        assert_eq!(err.to_string(), "invalid raster dimensions: 0x5");
    }

    #[test]
    fn dimension_mismatch_display() {
        let err = PipelineError::DimensionMismatch {
            left_width: 1,
            left_height: 2,
            right_width: 3,
            right_height: 4,
        };
        assert_eq!(err.to_string(), "dimension mismatch: 1x2 vs 3x4");
    }
}
