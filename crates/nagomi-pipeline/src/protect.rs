//! Protection masks for the chroma smoother.
//!
//! Each protection is an independent strategy mapping per-pixel source
//! statistics to a multiplier in `[0, 1]` that scales the effective
//! chroma smoothing strength down. Factors are combined by
//! multiplication, so they are order-independent and individually
//! removable without touching the convolution code.
//!
//! All inputs come from the *unmodified* source raster — never from
//! partially smoothed data — so every mask sees the same pixel no
//! matter where it sits in the list.

use crate::color::{Lab, rgb_to_hsv};
use crate::types::SmoothingOptions;

/// Per-pixel statistics handed to each protection.
#[derive(Debug, Clone, Copy)]
pub struct PixelStats {
    /// Source pixel in Lab.
    pub source_lab: Lab,
    /// Source pixel in RGB (for the HSV-based skin window).
    pub source_rgb: [u8; 3],
    /// Euclidean chroma magnitude of the source pixel.
    pub source_chroma: f32,
    /// Variance of the source chroma magnitude over the smoothing
    /// window centered on this pixel.
    pub chroma_variance: f32,
}

/// A strategy reducing chroma-smoothing strength for some class of
/// pixels.
pub trait Protection {
    /// Multiplier in `[0, 1]` for this pixel's effective strength.
    fn factor(&self, stats: &PixelStats) -> f32;
}

/// Protects near-neutral pixels: smoothing weak chroma toward its
/// neighbors mostly just shifts gray points around.
///
/// Full protection ramps in linearly as source chroma falls below 12.
pub struct NeutralProtect {
    /// Protection strength, 0–1.
    pub strength: f32,
}

impl Protection for NeutralProtect {
    fn factor(&self, stats: &PixelStats) -> f32 {
        let neutrality = ((12.0 - stats.source_chroma) / 12.0).clamp(0.0, 1.0);
        (1.0 - self.strength * neutrality).clamp(0.0, 1.0)
    }
}

/// Protects deep shadows (L < 18) and bright highlights (L > 86),
/// where chroma shifts read as blotches.
pub struct LumaProtect {
    /// Protection strength, 0–1.
    pub strength: f32,
}

impl Protection for LumaProtect {
    fn factor(&self, stats: &PixelStats) -> f32 {
        let l = stats.source_lab.l;
        let ramp = if l < 18.0 {
            (18.0 - l) / 18.0
        } else if l > 86.0 {
            (l - 86.0) / 14.0
        } else {
            0.0
        };
        (1.0 - self.strength * ramp.clamp(0.0, 1.0)).clamp(0.0, 1.0)
    }
}

/// Reduces strength by up to 60% inside the skin-tone hue window.
///
/// The window is centered at hue 28°: full weight within ±18°, linear
/// falloff over the next 10°. Gated on saturation > 0.15 and
/// value > 0.2 so gray and near-black pixels are unaffected.
pub struct SkinProtect;

impl SkinProtect {
    const CENTER_HUE: f32 = 28.0;
    const FULL_WIDTH: f32 = 18.0;
    const FALLOFF: f32 = 10.0;
    const MAX_REDUCTION: f32 = 0.6;
}

impl Protection for SkinProtect {
    fn factor(&self, stats: &PixelStats) -> f32 {
        let [r, g, b] = stats.source_rgb;
        let hsv = rgb_to_hsv(r, g, b);
        if hsv.s <= 0.15 || hsv.v <= 0.2 {
            return 1.0;
        }
        let delta = (hsv.h - Self::CENTER_HUE).abs();
        let distance = delta.min(360.0 - delta);
        let weight = if distance <= Self::FULL_WIDTH {
            1.0
        } else if distance < Self::FULL_WIDTH + Self::FALLOFF {
            (Self::FULL_WIDTH + Self::FALLOFF - distance) / Self::FALLOFF
        } else {
            0.0
        };
        1.0 - Self::MAX_REDUCTION * weight
    }
}

/// Adapts strength to local chroma noise: `1 / (1 + variance/scale)`.
///
/// Chromatically busy neighborhoods smooth less than flat ones. The
/// scale is derived from the `adaptive_chroma` option before the
/// per-pixel loop.
pub struct AdaptiveChroma {
    /// Variance normalization scale; smaller means more suppression.
    pub scale: f32,
}

impl AdaptiveChroma {
    /// Map the `adaptive_chroma` option (0–1) to the variance scale,
    /// interpolating 420 (barely adaptive) down to 60 (strongly
    /// adaptive).
    #[must_use]
    pub fn scale_for(adaptive_chroma: f32) -> f32 {
        let t = adaptive_chroma.clamp(0.0, 1.0);
        420.0 + (60.0 - 420.0) * t
    }
}

impl Protection for AdaptiveChroma {
    fn factor(&self, stats: &PixelStats) -> f32 {
        1.0 / (1.0 + stats.chroma_variance / self.scale.max(f32::EPSILON))
    }
}

/// Build the active protection list for one invocation.
///
/// Protections whose strength is zero are omitted (their factor would
/// be 1). The adaptive factor is always active — its scale, not its
/// presence, is what the option controls.
#[must_use]
pub fn active_protections(options: &SmoothingOptions) -> Vec<Box<dyn Protection>> {
    let mut protections: Vec<Box<dyn Protection>> = Vec::with_capacity(4);
    if options.neutral_protect > 0.0 {
        protections.push(Box::new(NeutralProtect {
            strength: options.neutral_protect,
        }));
    }
    if options.luma_protect > 0.0 {
        protections.push(Box::new(LumaProtect {
            strength: options.luma_protect,
        }));
    }
    if options.protect_skin {
        protections.push(Box::new(SkinProtect));
    }
    protections.push(Box::new(AdaptiveChroma {
        scale: AdaptiveChroma::scale_for(options.adaptive_chroma),
    }));
    protections
}

/// Multiply all active factors for one pixel.
#[must_use]
pub fn combined_factor(protections: &[Box<dyn Protection>], stats: &PixelStats) -> f32 {
    protections
        .iter()
        .fold(1.0, |acc, p| acc * p.factor(stats))
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(l: f32, a: f32, b: f32, rgb: [u8; 3], variance: f32) -> PixelStats {
        PixelStats {
            source_lab: Lab { l, a, b },
            source_rgb: rgb,
            source_chroma: a.hypot(b),
            chroma_variance: variance,
        }
    }

    #[test]
    fn neutral_protect_full_for_gray() {
        let p = NeutralProtect { strength: 1.0 };
        let gray = stats(50.0, 0.0, 0.0, [120, 120, 120], 0.0);
        assert!(
            p.factor(&gray).abs() < f32::EPSILON,
            "zero-chroma pixel at full strength should be fully protected",
        );
    }

    #[test]
    fn neutral_protect_inactive_for_saturated() {
        let p = NeutralProtect { strength: 1.0 };
        let vivid = stats(50.0, 40.0, 20.0, [200, 60, 40], 0.0);
        assert!((p.factor(&vivid) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn neutral_protect_ramps_linearly() {
        let p = NeutralProtect { strength: 1.0 };
        let half = stats(50.0, 6.0, 0.0, [140, 120, 120], 0.0);
        assert!((p.factor(&half) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn luma_protect_hits_shadows_and_highlights() {
        let p = LumaProtect { strength: 1.0 };
        let shadow = stats(0.0, 5.0, 5.0, [5, 5, 5], 0.0);
        let highlight = stats(100.0, 5.0, 5.0, [250, 250, 250], 0.0);
        let midtone = stats(50.0, 5.0, 5.0, [120, 120, 120], 0.0);
        assert!(p.factor(&shadow) < 0.01);
        assert!(p.factor(&highlight) < 0.01);
        assert!((p.factor(&midtone) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn luma_protect_is_continuous_at_gates() {
        let p = LumaProtect { strength: 1.0 };
        let at_shadow_gate = stats(18.0, 0.0, 0.0, [40, 40, 40], 0.0);
        let at_highlight_gate = stats(86.0, 0.0, 0.0, [220, 220, 220], 0.0);
        assert!((p.factor(&at_shadow_gate) - 1.0).abs() < f32::EPSILON);
        assert!((p.factor(&at_highlight_gate) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn skin_protect_reduces_inside_window() {
        // Saturated orange-ish pixel, hue ≈ 25°.
        let skin = stats(65.0, 20.0, 25.0, [224, 150, 110], 0.0);
        let factor = SkinProtect.factor(&skin);
        assert!(
            (factor - 0.4).abs() < 1e-5,
            "inside the full window the reduction is exactly 60%, got {factor}",
        );
    }

    #[test]
    fn skin_protect_ignores_desaturated_pixels() {
        let gray = stats(50.0, 0.0, 0.0, [120, 118, 117], 0.0);
        assert!((SkinProtect.factor(&gray) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn skin_protect_ignores_far_hues() {
        // Pure blue, hue 240°.
        let blue = stats(40.0, 20.0, -60.0, [0, 0, 255], 0.0);
        assert!((SkinProtect.factor(&blue) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn adaptive_factor_decreases_with_variance() {
        let p = AdaptiveChroma { scale: 60.0 };
        let flat = stats(50.0, 10.0, 0.0, [150, 120, 120], 0.0);
        let busy = stats(50.0, 10.0, 0.0, [150, 120, 120], 240.0);
        assert!((p.factor(&flat) - 1.0).abs() < f32::EPSILON);
        assert!((p.factor(&busy) - 0.2).abs() < 1e-5);
    }

    #[test]
    fn adaptive_scale_interpolates_420_to_60() {
        assert!((AdaptiveChroma::scale_for(0.0) - 420.0).abs() < f32::EPSILON);
        assert!((AdaptiveChroma::scale_for(1.0) - 60.0).abs() < f32::EPSILON);
        assert!((AdaptiveChroma::scale_for(0.5) - 240.0).abs() < 0.01);
    }

    #[test]
    fn combined_factor_multiplies_all() {
        let options = SmoothingOptions {
            neutral_protect: 1.0,
            luma_protect: 0.0,
            protect_skin: false,
            adaptive_chroma: 1.0,
            ..SmoothingOptions::default()
        };
        let protections = active_protections(&options);
        // Gray pixel with busy neighborhood: neutral gives 0, so the
        // product is 0 regardless of the adaptive factor.
        let gray = stats(50.0, 0.0, 0.0, [120, 120, 120], 120.0);
        assert!(combined_factor(&protections, &gray).abs() < f32::EPSILON);
    }

    #[test]
    fn inactive_protections_are_omitted() {
        let options = SmoothingOptions {
            neutral_protect: 0.0,
            luma_protect: 0.0,
            protect_skin: false,
            ..SmoothingOptions::default()
        };
        // Only the always-on adaptive factor remains.
        assert_eq!(active_protections(&options).len(), 1);
    }
}
