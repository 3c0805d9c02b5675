//! Pipeline diagnostics: per-stage timing and parameters.
//!
//! Permanent instrumentation for parameter experimentation — every
//! call to [`process_staged`](crate::process_staged) collects
//! diagnostics alongside the pipeline results.
//!
//! Timestamps come from a caller-supplied [`Clock`] so this crate
//! never touches `std::time::Instant` directly and stays portable to
//! hosts without a monotonic clock of their own. Durations are
//! serialized as fractional seconds (`f64`) for JSON compatibility,
//! since `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Monotonic time source for stage measurements.
///
/// The bench CLI backs this with `std::time::Instant`; tests use a
/// fixed or scripted clock for deterministic output.
pub trait Clock {
    /// Seconds elapsed since an arbitrary fixed origin.
    fn now_seconds(&self) -> f64;
}

/// A [`Clock`] that always reads zero — for callers that want staged
/// results without paying for (or depending on) real timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    fn now_seconds(&self) -> f64 {
        0.0
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Timing for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Compact stage detail (key parameters), for the report table.
    pub detail: String,
}

/// Diagnostics collected from a single pipeline run.
///
/// Stages that are conditionally skipped have `Option` fields that are
/// `None` when the stage did not execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Bilateral filter (always runs).
    pub bilateral: StageDiagnostics,
    /// Chroma smoother (Lab mode with nonzero strength only).
    pub chroma: Option<StageDiagnostics>,
    /// Palette simplifier (levels > 1 or merge > 0 only).
    pub palette: Option<StageDiagnostics>,
    /// Edge detection, including expansion.
    pub edge_detection: Option<StageDiagnostics>,
    /// Edge-preserve, soften, and outline-merge compositing.
    pub compositing: Option<StageDiagnostics>,
    /// Chroma artifact booster (preview only).
    pub boost: Option<StageDiagnostics>,
    /// Total wall-clock duration of the run.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.image_width,
            self.image_height,
            u64::from(self.image_width) * u64::from(self.image_height),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<18} {:>10} {:>9}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let stages: Vec<(&str, &StageDiagnostics)> = {
            let mut s = vec![("Bilateral", &self.bilateral)];
            if let Some(ref d) = self.chroma {
                s.push(("Chroma", d));
            }
            if let Some(ref d) = self.palette {
                s.push(("Palette", d));
            }
            if let Some(ref d) = self.edge_detection {
                s.push(("Edge Detection", d));
            }
            if let Some(ref d) = self.compositing {
                s.push(("Compositing", d));
            }
            if let Some(ref d) = self.boost {
                s.push(("Boost", d));
            }
            s
        };

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "{name:<18} {ms:>8.3}ms {pct:>8.1}%  {detail}",
                detail = diag.detail,
            ));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Run a closure and measure its duration against the clock.
pub(crate) fn time_stage<T>(clock: &dyn Clock, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now_seconds();
    let value = f();
    let elapsed = (clock.now_seconds() - start).max(0.0);
    (
        value,
        Duration::try_from_secs_f64(elapsed).unwrap_or(Duration::ZERO),
    )
}
