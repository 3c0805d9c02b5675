//! nagomi-bench: CLI tool for smoothing parameter experimentation and
//! diagnostics.
//!
//! Runs the smoothing pipeline on an image file with configurable
//! parameters, printing per-stage diagnostics. Useful for:
//!
//! - Tuning bilateral/chroma strengths against real photos
//! - Comparing Sobel vs Scharr edge response and threshold placement
//! - Measuring per-stage durations to identify bottlenecks
//! - Rendering the edge map / heatmap / outline views to files
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin nagomi-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use nagomi_pipeline::diagnostics::Clock;
use nagomi_pipeline::{
    ChromaPreset, EdgeDetectOptions, EdgeFalloff, EdgeKernel, OutlineBlendMode, OutlineColor,
    OutlineMode, OutlineOptions, RgbaImage, SmoothingMode, SmoothingOptions, StagedResult,
    build_outline_map, detect_edges, expand_edge_map, process_staged, visualize,
};

/// Smoothing parameter experimentation and diagnostics for nagomi.
///
/// Runs the pipeline on a given image with configurable parameters and
/// prints per-stage timing diagnostics.
#[derive(Parser)]
#[command(name = "nagomi-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write the selected view to this file (PNG recommended).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Which buffer to write with --output.
    #[arg(long, value_enum, default_value_t = View::Result)]
    view: View,

    /// Smoothing mode.
    #[arg(long, value_enum, default_value_t = Mode::Lab)]
    mode: Mode,

    /// Chroma preset applied before individual flags (subtle,
    /// balanced, aggressive).
    #[arg(long)]
    preset: Option<String>,

    /// Bilateral kernel radius.
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_RADIUS)]
    radius: u32,

    /// Bilateral range sigma.
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_SIGMA_COLOR)]
    sigma_color: f32,

    /// Bilateral spatial sigma.
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_SIGMA_SPACE)]
    sigma_space: f32,

    /// Source lightness restoration (0-1). Defaults to 0.85, or the
    /// preset's value when --preset is given.
    #[arg(long)]
    luma_preserve: Option<f32>,

    /// Overall chroma smoothing strength (0-1). Defaults to 0.6, or
    /// the preset's value when --preset is given.
    #[arg(long)]
    chroma_smooth: Option<f32>,

    /// Chroma kernel radius. Defaults to 3, or the preset's value when
    /// --preset is given.
    #[arg(long)]
    chroma_radius: Option<u32>,

    /// Chroma displacement clamp (0-1). Defaults to 0.45, or the
    /// preset's value when --preset is given.
    #[arg(long)]
    chroma_clamp: Option<f32>,

    /// Palette quantization levels (0 disables).
    #[arg(long, default_value_t = 0)]
    palette_levels: u32,

    /// Neighborhood mode-color merge strength (0-1).
    #[arg(long, default_value_t = 0.0)]
    neighbor_merge: f32,

    /// Enable edge detection.
    #[arg(long)]
    edge_detect: bool,

    /// Gradient kernel.
    #[arg(long, value_enum, default_value_t = Kernel::Sobel)]
    edge_kernel: Kernel,

    /// Edge sensitivity (0-1).
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_EDGE_SENSITIVITY)]
    edge_sensitivity: f32,

    /// Edge threshold (0-1).
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_EDGE_THRESHOLD)]
    edge_threshold: f32,

    /// Luma pre-blur passes (0-3).
    #[arg(long, default_value_t = 0)]
    edge_preblur: u32,

    /// Morphological closing passes (0-3).
    #[arg(long, default_value_t = 0)]
    edge_smooth: u32,

    /// Edge-map expansion radius (0-6).
    #[arg(long, default_value_t = 0)]
    edge_influence: u32,

    /// Edge-preserve blend strength (0-1).
    #[arg(long, default_value_t = 0.0)]
    edge_preserve: f32,

    /// Edge-preserve falloff curve.
    #[arg(long, value_enum, default_value_t = Falloff::Linear)]
    edge_falloff: Falloff,

    /// Edge-soften blend strength (0-1).
    #[arg(long, default_value_t = 0.0)]
    edge_soften: f32,

    /// Enable outline merge.
    #[arg(long)]
    outline_merge: bool,

    /// Outline threshold (0-1).
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_OUTLINE_THRESHOLD)]
    outline_threshold: f32,

    /// Outline thresholding mode.
    #[arg(long, value_enum, default_value_t = OutlineModeArg::Weighted)]
    outline_mode: OutlineModeArg,

    /// Outline thickness (1-6).
    #[arg(long, default_value_t = 1)]
    outline_thickness: u32,

    /// Thin the outline before thresholding.
    #[arg(long)]
    outline_thin: bool,

    /// Outline merge strength (0-1).
    #[arg(long, default_value_t = SmoothingOptions::DEFAULT_OUTLINE_MERGE_STRENGTH)]
    outline_merge_strength: f32,

    /// Outline color.
    #[arg(long, value_enum, default_value_t = Color::Black)]
    outline_color: Color,

    /// Outline blend mode.
    #[arg(long, value_enum, default_value_t = Blend::Multiply)]
    outline_blend_mode: Blend,

    /// Chroma artifact boost for preview views (0-1).
    #[arg(long, default_value_t = 0.0)]
    artifact_boost: f32,

    /// Full options record as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `SmoothingOptions` serialization
    /// (missing fields fall back to defaults).
    #[arg(long)]
    options_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

/// Which buffer `--output` writes.
#[derive(Clone, Copy, ValueEnum)]
enum View {
    /// Final composited result.
    Result,
    /// Smoothing-core output, before compositing.
    Smoothed,
    /// Edge map as inverted grayscale (dark lines on white).
    Edges,
    /// Edge map as a blue-green-red heatmap.
    Heatmap,
    /// Outline map as inverted grayscale.
    Outline,
}

/// Smoothing mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Bilateral filter only, in RGB space.
    Rgb,
    /// Bilateral plus Lab chroma smoothing.
    Lab,
}

/// Gradient kernel selection.
#[derive(Clone, Copy, ValueEnum)]
enum Kernel {
    /// 3x3 Sobel operator.
    Sobel,
    /// 3x3 Scharr operator.
    Scharr,
}

/// Edge-preserve falloff selection.
#[derive(Clone, Copy, ValueEnum)]
enum Falloff {
    /// Keep factor used as-is.
    Linear,
    /// Keep factor shaped by smoothstep.
    Smoothstep,
}

/// Outline thresholding mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum OutlineModeArg {
    /// Graded coverage above the threshold.
    Weighted,
    /// Hard 0/1 at the threshold.
    Binary,
}

/// Outline color selection.
#[derive(Clone, Copy, ValueEnum)]
enum Color {
    /// Pure black.
    Black,
    /// Near-black.
    Dark,
    /// Cyan accent.
    Accent,
}

/// Outline blend mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Blend {
    /// Multiply channels.
    Multiply,
    /// Channel minimum.
    Darken,
    /// Standard overlay.
    Overlay,
    /// Fixed darkening, ignoring the outline color.
    EdgeDarken,
}

/// Build a [`SmoothingOptions`] from CLI arguments.
///
/// If `--options-json` is provided, the JSON is parsed directly and
/// all individual parameter flags are ignored. Otherwise a record is
/// assembled from the flags, applying `--preset` first so individual
/// flags can override preset values.
fn options_from_cli(cli: &Cli) -> Result<SmoothingOptions, String> {
    if let Some(ref json) = cli.options_json {
        return serde_json::from_str(json).map_err(|e| format!("Invalid --options-json: {e}"));
    }

    let mut options = SmoothingOptions::default();
    if let Some(ref name) = cli.preset {
        let preset = ChromaPreset::from_name(name)
            .ok_or_else(|| format!("Unknown preset '{name}' (subtle, balanced, aggressive)"))?;
        options = options.with_preset(preset);
    }

    options.smoothing_mode = match cli.mode {
        Mode::Rgb => SmoothingMode::Rgb,
        Mode::Lab => SmoothingMode::Lab,
    };
    options.radius = cli.radius;
    options.sigma_color = cli.sigma_color;
    options.sigma_space = cli.sigma_space;
    if let Some(v) = cli.luma_preserve {
        options.luma_preserve = v;
    }
    if let Some(v) = cli.chroma_smooth {
        options.chroma_smooth = v;
    }
    if let Some(v) = cli.chroma_radius {
        options.chroma_radius = v;
    }
    if let Some(v) = cli.chroma_clamp {
        options.chroma_clamp = v;
    }
    options.palette_levels = cli.palette_levels;
    options.neighbor_merge = cli.neighbor_merge;
    options.edge_detect = cli.edge_detect;
    options.edge_kernel = match cli.edge_kernel {
        Kernel::Sobel => EdgeKernel::Sobel,
        Kernel::Scharr => EdgeKernel::Scharr,
    };
    options.edge_sensitivity = cli.edge_sensitivity;
    options.edge_threshold = cli.edge_threshold;
    options.edge_preblur = cli.edge_preblur;
    options.edge_smooth = cli.edge_smooth;
    options.edge_influence = cli.edge_influence;
    options.edge_preserve = cli.edge_preserve;
    options.edge_falloff = match cli.edge_falloff {
        Falloff::Linear => EdgeFalloff::Linear,
        Falloff::Smoothstep => EdgeFalloff::Smoothstep,
    };
    options.edge_soften = cli.edge_soften;
    options.outline_merge = cli.outline_merge;
    options.outline_threshold = cli.outline_threshold;
    options.outline_mode = match cli.outline_mode {
        OutlineModeArg::Weighted => OutlineMode::Weighted,
        OutlineModeArg::Binary => OutlineMode::Binary,
    };
    options.outline_thickness = cli.outline_thickness;
    options.outline_thin = cli.outline_thin;
    options.outline_merge_strength = cli.outline_merge_strength;
    options.outline_color = match cli.outline_color {
        Color::Black => OutlineColor::Black,
        Color::Dark => OutlineColor::Dark,
        Color::Accent => OutlineColor::Accent,
    };
    options.outline_blend_mode = match cli.outline_blend_mode {
        Blend::Multiply => OutlineBlendMode::Multiply,
        Blend::Darken => OutlineBlendMode::Darken,
        Blend::Overlay => OutlineBlendMode::Overlay,
        Blend::EdgeDarken => OutlineBlendMode::EdgeDarken,
    };
    options.artifact_boost = cli.artifact_boost;

    Ok(options)
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock {
    origin: Instant,
}

impl StdClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Render the requested view from a staged result, computing the edge
/// map on demand when the pipeline itself had no reason to.
fn render_view(
    cli: &Cli,
    options: &SmoothingOptions,
    staged: &StagedResult,
) -> RgbaImage {
    let edge_map_for_view = || {
        staged.edge_map.clone().unwrap_or_else(|| {
            let mut map =
                detect_edges(&staged.source, &EdgeDetectOptions::from_smoothing(options));
            if options.edge_influence > 0 {
                map = expand_edge_map(&map, options.edge_influence);
            }
            map
        })
    };

    match cli.view {
        View::Result => staged.result.clone(),
        View::Smoothed => staged.smoothed.clone(),
        View::Edges => visualize::edge_map_to_grayscale(&edge_map_for_view(), true),
        View::Heatmap => visualize::edge_map_to_heatmap(&edge_map_for_view()),
        View::Outline => {
            let outline = staged.outline_map.clone().unwrap_or_else(|| {
                build_outline_map(&edge_map_for_view(), &OutlineOptions::from_smoothing(options))
            });
            visualize::edge_map_to_grayscale(&outline, true)
        }
    }
}

fn run() -> ExitCode {
    let cli = Cli::parse();

    let options = match options_from_cli(&cli) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&cli.image_path) {
        Ok(image) => image.to_rgba8(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let clock = StdClock::new();
    let mut written = false;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match process_staged(&image, &options, &clock) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the output view on the first run only.
                if !written
                    && let Some(ref output) = cli.output
                {
                    let view = render_view(&cli, &options, &staged);
                    match view.save(output) {
                        Ok(()) => eprintln!("Output written to {}", output.display()),
                        Err(e) => {
                            eprintln!("Error writing {}: {e}", output.display());
                            return ExitCode::FAILURE;
                        }
                    }
                    written = true;
                }
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    run()
}
