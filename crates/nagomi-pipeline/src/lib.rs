//! nagomi-pipeline: Pure image smoothing and stylization pipeline
//! (sans-IO).
//!
//! Produces a perceptually-tuned smoothed variant of a raster region
//! through: bilateral filter -> Lab chroma smoothing -> palette
//! simplification, with optional edge detection feeding edge-preserve,
//! edge-soften, and outline-merge compositing, plus a chroma artifact
//! booster for preview display.
//!
//! This crate has **no I/O dependencies** — it operates on in-memory
//! RGBA buffers and returns fresh buffers. File loading, canvas
//! compositing, region selection, and control binding live in callers.
//!
//! Every entry point is a pure function: identical inputs produce
//! byte-identical outputs, no state is held between invocations, and
//! caller-owned buffers are never mutated. Rapid re-invocation (live
//! preview) is the caller's concern — coalesce or debounce there; the
//! pipeline always runs to completion from scratch.

pub mod bilateral;
pub mod chroma;
pub mod color;
pub mod composite;
pub mod diagnostics;
pub mod edges;
pub mod outline;
pub mod palette;
pub mod protect;
pub mod types;
pub mod visualize;

pub use chroma::{boost_chroma_artifacts, smooth_chroma};
pub use composite::{apply_edge_preserve, apply_outline_merge, soften_edges};
pub use diagnostics::{Clock, NullClock, PipelineDiagnostics};
pub use edges::{EdgeDetectOptions, detect_edges, expand_edge_map};
pub use outline::{OutlineOptions, build_outline_map};
pub use types::{
    ChromaPreset, ChromaPresetValues, EdgeFalloff, EdgeKernel, EdgeMap, OutlineBlendMode,
    OutlineColor, OutlineMode, PipelineError, RgbaImage, SmoothingMode, SmoothingOptions,
    StagedResult, raster_from_raw,
};

use diagnostics::{StageDiagnostics, time_stage};

fn validate(image: &RgbaImage) -> Result<(), PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidDimensions {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

/// Run the smoothing core: bilateral, then (in Lab mode) the chroma
/// smoother, then the palette stage.
///
/// The bilateral filter always runs — there is no true no-op mode.
/// The chroma smoother runs on top of the bilateral output when the
/// mode is not RGB and `chroma_smooth > 0`; the palette stage runs
/// last when `palette_levels > 1` or `neighbor_merge > 0`.
///
/// Options are clamped into their documented domains here; numeric
/// out-of-range values never error.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if either raster
/// dimension is zero.
pub fn smooth_region(
    image: &RgbaImage,
    options: &SmoothingOptions,
) -> Result<RgbaImage, PipelineError> {
    validate(image)?;
    let options = options.clamped();

    let mut out = bilateral::bilateral_filter(
        image,
        options.radius,
        options.sigma_color,
        options.sigma_space,
    );

    if options.smoothing_mode != SmoothingMode::Rgb && options.chroma_smooth > 0.0 {
        out = smooth_chroma(&out, image, &options)?;
    }

    if options.palette_levels > 1 || options.neighbor_merge > 0.0 {
        out = palette::simplify_palette(&out, &options);
    }

    Ok(out)
}

/// Run the full pipeline: smoothing core, then the edge-aware
/// compositing chain, then the preview booster.
///
/// When `edge_detect` is set and some consumer needs the map
/// (`edge_preserve > 0`, `edge_soften > 0`, or `outline_merge`), edges
/// are detected on the *pristine* input, optionally expanded, and the
/// compositing stages run in fixed order: edge-preserve, edge-soften,
/// outline-merge. The artifact booster runs last when
/// `artifact_boost > 0` — callers writing a final (non-preview) result
/// set it to zero first.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if either raster
/// dimension is zero.
pub fn process(
    image: &RgbaImage,
    options: &SmoothingOptions,
) -> Result<RgbaImage, PipelineError> {
    let (staged, _) = process_staged(image, options, &NullClock)?;
    Ok(staged.result)
}

/// Run the full pipeline, retaining intermediates and collecting
/// per-stage diagnostics.
///
/// Identical processing to [`process`]; the returned [`StagedResult`]
/// additionally carries the smoothing-core output and any edge/outline
/// maps for preview display, and the diagnostics record stage timings
/// measured against `clock`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if either raster
/// dimension is zero.
pub fn process_staged(
    image: &RgbaImage,
    options: &SmoothingOptions,
    clock: &dyn Clock,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    validate(image)?;
    let options = options.clamped();
    let run_start = clock.now_seconds();

    // 1. Bilateral filter (always runs).
    let (mut smoothed, bilateral_time) = time_stage(clock, || {
        bilateral::bilateral_filter(
            image,
            options.radius,
            options.sigma_color,
            options.sigma_space,
        )
    });
    let bilateral_diag = StageDiagnostics {
        duration: bilateral_time,
        detail: format!(
            "radius={} sigma_color={:.1} sigma_space={:.1}",
            options.radius, options.sigma_color, options.sigma_space,
        ),
    };

    // 2. Chroma smoother (Lab mode only).
    let mut chroma_diag = None;
    if options.smoothing_mode != SmoothingMode::Rgb && options.chroma_smooth > 0.0 {
        let (result, duration) = time_stage(clock, || smooth_chroma(&smoothed, image, &options));
        smoothed = result?;
        chroma_diag = Some(StageDiagnostics {
            duration,
            detail: format!(
                "radius={} strength={:.2} clamp={:.2}",
                options.chroma_radius, options.chroma_smooth, options.chroma_clamp,
            ),
        });
    }

    // 3. Palette simplification.
    let mut palette_diag = None;
    if options.palette_levels > 1 || options.neighbor_merge > 0.0 {
        let (result, duration) =
            time_stage(clock, || palette::simplify_palette(&smoothed, &options));
        smoothed = result;
        palette_diag = Some(StageDiagnostics {
            duration,
            detail: format!(
                "levels={} merge={:.2}",
                options.palette_levels, options.neighbor_merge,
            ),
        });
    }

    // 4. Edge detection + compositing chain.
    let needs_edge_map = options.edge_detect
        && (options.edge_preserve > 0.0 || options.edge_soften > 0.0 || options.outline_merge);

    let mut result = smoothed.clone();
    let mut edge_map = None;
    let mut outline_map = None;
    let mut edge_diag = None;
    let mut compositing_diag = None;

    if needs_edge_map {
        let (map, detect_time) = time_stage(clock, || {
            let mut map = detect_edges(image, &EdgeDetectOptions::from_smoothing(&options));
            if options.edge_influence > 0 {
                map = expand_edge_map(&map, options.edge_influence);
            }
            map
        });
        edge_diag = Some(StageDiagnostics {
            duration: detect_time,
            detail: format!(
                "{} smooth={} influence={}",
                kernel_name(options.edge_kernel),
                options.edge_smooth,
                options.edge_influence,
            ),
        });

        let composite_start = clock.now_seconds();
        if options.edge_preserve > 0.0 {
            result = apply_edge_preserve(
                image,
                &result,
                &map,
                options.edge_preserve,
                options.edge_falloff,
            )?;
        }
        if options.edge_soften > 0.0 {
            result = soften_edges(&result, &map, options.edge_soften)?;
        }
        if options.outline_merge {
            let outline = build_outline_map(&map, &OutlineOptions::from_smoothing(&options));
            result = apply_outline_merge(&result, &outline, &options)?;
            outline_map = Some(outline);
        }
        let composite_elapsed = (clock.now_seconds() - composite_start).max(0.0);
        compositing_diag = Some(StageDiagnostics {
            duration: std::time::Duration::try_from_secs_f64(composite_elapsed)
                .unwrap_or(std::time::Duration::ZERO),
            detail: format!(
                "preserve={:.2} soften={:.2} outline={}",
                options.edge_preserve, options.edge_soften, options.outline_merge,
            ),
        });
        edge_map = Some(map);
    }

    // 5. Artifact booster, preview only.
    let mut boost_diag = None;
    if options.artifact_boost > 0.0 {
        let (boosted, duration) =
            time_stage(clock, || boost_chroma_artifacts(image, &result, &options));
        result = boosted?;
        boost_diag = Some(StageDiagnostics {
            duration,
            detail: format!("boost={:.2}", options.artifact_boost),
        });
    }

    let total_elapsed = (clock.now_seconds() - run_start).max(0.0);
    let diagnostics = PipelineDiagnostics {
        bilateral: bilateral_diag,
        chroma: chroma_diag,
        palette: palette_diag,
        edge_detection: edge_diag,
        compositing: compositing_diag,
        boost: boost_diag,
        total_duration: std::time::Duration::try_from_secs_f64(total_elapsed)
            .unwrap_or(std::time::Duration::ZERO),
        image_width: image.width(),
        image_height: image.height(),
    };

    let staged = StagedResult {
        source: image.clone(),
        smoothed,
        edge_map,
        outline_map,
        result,
    };

    Ok((staged, diagnostics))
}

const fn kernel_name(kernel: EdgeKernel) -> &'static str {
    match kernel {
        EdgeKernel::Sobel => "sobel",
        EdgeKernel::Scharr => "scharr",
    }
}
