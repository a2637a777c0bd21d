//! Sprite building
//!
//! Concatenates the normalized clips in sorted filename order and writes the
//! sprite map that locates each clip inside the result.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PathsConfig;
use crate::engine::MediaEngine;
use crate::error::{Result, SpriteError};
use crate::files::{self, StagedFile};
use crate::sprite::{self, ClipDurations, SpriteMap};

/// What a successful build produced
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteOutcome {
    pub clip_count: usize,
    /// Sum of the normalized clip durations, unrounded
    pub total_ms: f64,
    pub map: SpriteMap,
    pub output_path: PathBuf,
    pub sprite_map_path: PathBuf,
}

/// Build the sprite audio file and its sprite map.
///
/// Returns `Ok(None)` without writing anything when the normalized directory
/// holds no clips. Any probe failure aborts before encoding. The sprite map
/// and the audio are both staged next to their targets and only published,
/// audio first, once both are complete; any earlier failure leaves both
/// previous outputs as they were.
pub async fn build_sprite<E: MediaEngine>(
    engine: Arc<E>,
    paths: &PathsConfig,
) -> Result<Option<SpriteOutcome>> {
    let clips = files::list_mp3_files(&paths.normalized_dir)?;
    if clips.is_empty() {
        tracing::warn!(
            dir = %paths.normalized_dir.display(),
            "No MP3 files to join"
        );
        return Ok(None);
    }

    let mut durations = Vec::with_capacity(clips.len());
    for clip in &clips {
        let original = files::same_name_in(&paths.input_dir, clip);
        durations.push(probe_clip(&engine, clip.clone(), original).await?);
    }

    let (map, total_ms) = SpriteMap::from_clips(&durations);
    tracing::info!(
        clips = clips.len(),
        total_ms,
        output = %paths.output_path.display(),
        "Joining clips"
    );

    let staged_map = map.stage_json(&paths.sprite_map_path)?;
    let staged_audio = StagedFile::new(&paths.output_path)?;

    let output = staged_audio.path().to_path_buf();
    let inputs = clips.clone();
    let concat_engine = Arc::clone(&engine);
    run_blocking(move || concat_engine.concat_clips(&inputs, &output))
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Error joining MP3 files"))?;

    staged_audio.publish()?;
    staged_map.publish()?;

    Ok(Some(SpriteOutcome {
        clip_count: clips.len(),
        total_ms,
        map,
        output_path: paths.output_path.clone(),
        sprite_map_path: paths.sprite_map_path.clone(),
    }))
}

/// Probe the normalized clip and its original counterpart.
async fn probe_clip<E: MediaEngine>(
    engine: &Arc<E>,
    normalized: PathBuf,
    original: PathBuf,
) -> Result<ClipDurations> {
    let engine = Arc::clone(engine);
    run_blocking(move || {
        let normalized_ms = engine.probe_duration_ms(&normalized)?;
        let effective_ms = engine.probe_duration_ms(&original)?;
        let id = sprite::clip_id(&normalized);
        tracing::debug!(
            id = %id,
            normalized_ms,
            effective_ms,
            "Probed clip"
        );
        Ok(ClipDurations {
            id,
            normalized_ms,
            effective_ms,
        })
    })
    .await
}

async fn run_blocking<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| SpriteError::Internal(e.to_string()))?
}

