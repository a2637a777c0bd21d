//! Clip normalization
//!
//! Re-encodes every `.mp3` in the input directory to the sprite profile,
//! padded to a whole number of seconds, under the same basename in the
//! output directory. A failing clip is reported and the batch carries on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::engine::MediaEngine;
use crate::error::{Result, SpriteError};
use crate::files;

/// Overshoot past a whole second that still rounds down: decoders may
/// return a few samples more than were encoded.
pub const WHOLE_SECOND_SLACK_MS: f64 = 1.0;

/// Whole seconds a clip of `duration_ms` is padded to.
pub fn target_seconds(duration_ms: f64) -> u64 {
    let ms = duration_ms.max(0.0);
    let secs = (ms / 1000.0).ceil() as u64;
    if secs > 1 && ms <= (secs - 1) as f64 * 1000.0 + WHOLE_SECOND_SLACK_MS {
        secs - 1
    } else {
        secs
    }
}

/// Result of normalizing one clip
#[derive(Debug)]
pub enum ClipOutcome {
    Normalized {
        original_ms: f64,
        /// Probed length of the written file. `None` if that probe failed;
        /// the file itself was still written.
        normalized_ms: Option<f64>,
        target_secs: u64,
    },
    Failed {
        error: SpriteError,
    },
}

#[derive(Debug)]
pub struct ClipReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: ClipOutcome,
}

impl ClipReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ClipOutcome::Normalized { .. })
    }

    pub fn error(&self) -> Option<&SpriteError> {
        match &self.outcome {
            ClipOutcome::Failed { error } => Some(error),
            ClipOutcome::Normalized { .. } => None,
        }
    }
}

/// Per-clip outcomes in sorted filename order
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub clips: Vec<ClipReport>,
}

impl NormalizeReport {
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.clips.iter().filter(|c| c.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.clips.len() - self.succeeded()
    }

    /// Error of the first failed clip in sorted order.
    pub fn first_failure(&self) -> Option<&SpriteError> {
        self.clips.iter().find_map(ClipReport::error)
    }
}

/// Normalize every clip in `input_dir` into `output_dir`.
///
/// Up to `max_parallel_jobs` clips are encoded at once. Only a missing
/// input directory or an unusable output directory fail the whole call;
/// per-clip failures land in the report. The input directory is listed
/// before the output directory is created, so a bad input path leaves the
/// filesystem untouched.
///
/// The padding target comes from the clip's decoded length rather than its
/// container duration, which for MP3 includes encoder delay and padding.
/// Normalizing an already normalized clip therefore keeps its length.
pub async fn normalize<E: MediaEngine>(
    engine: Arc<E>,
    input_dir: &Path,
    output_dir: &Path,
    max_parallel_jobs: usize,
) -> Result<NormalizeReport> {
    let inputs = files::list_mp3_files(input_dir)?;
    std::fs::create_dir_all(output_dir).map_err(|e| SpriteError::filesystem(output_dir, e))?;

    if inputs.is_empty() {
        tracing::info!(dir = %input_dir.display(), "No MP3 files found in the folder");
        return Ok(NormalizeReport::default());
    }

    tracing::info!(
        files = inputs.len(),
        jobs = max_parallel_jobs,
        "Normalizing MP3 files"
    );

    let semaphore = Arc::new(Semaphore::new(max_parallel_jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let output = files::same_name_in(output_dir, &input);
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SpriteError::Internal(e.to_string()))?;
        let engine = Arc::clone(&engine);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let outcome = normalize_one(engine.as_ref(), &input, &output);
            (
                index,
                ClipReport {
                    input,
                    output,
                    outcome,
                },
            )
        });
    }

    let mut done = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (index, report) = joined.map_err(|e| SpriteError::Internal(e.to_string()))?;
        log_clip(&report);
        done.push((index, report));
    }
    done.sort_by_key(|(index, _)| *index);

    let report = NormalizeReport {
        clips: done.into_iter().map(|(_, report)| report).collect(),
    };
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Normalization finished"
    );
    Ok(report)
}

fn normalize_one<E: MediaEngine + ?Sized>(engine: &E, input: &Path, output: &Path) -> ClipOutcome {
    let original_ms = match engine.probe_duration_ms(input) {
        Ok(ms) => ms,
        Err(error) => return ClipOutcome::Failed { error },
    };
    let content_ms = match engine.content_duration_ms(input) {
        Ok(ms) => ms,
        Err(error) => return ClipOutcome::Failed { error },
    };
    let target_secs = target_seconds(content_ms);
    tracing::debug!(
        file = %input.display(),
        original_ms,
        content_ms,
        target_secs,
        "Measured clip"
    );

    if let Err(error) = engine.normalize_clip(input, output, target_secs) {
        return ClipOutcome::Failed { error };
    }

    let normalized_ms = match engine.probe_duration_ms(output) {
        Ok(ms) => Some(ms),
        Err(e) => {
            tracing::warn!(file = %output.display(), error = %e, "Cannot probe normalized clip");
            None
        }
    };

    ClipOutcome::Normalized {
        original_ms,
        normalized_ms,
        target_secs,
    }
}

fn log_clip(report: &ClipReport) {
    match &report.outcome {
        ClipOutcome::Normalized {
            original_ms,
            normalized_ms,
            target_secs,
        } => tracing::info!(
            file = %report.input.display(),
            original_ms,
            normalized_ms = ?normalized_ms,
            target_secs,
            "Normalized"
        ),
        ClipOutcome::Failed { error } => tracing::error!(
            file = %report.input.display(),
            error = %error,
            "Failed to normalize"
        ),
    }
}
