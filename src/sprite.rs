//! Sprite map model and offset accounting
//!
//! A sprite map indexes clips inside the concatenated sprite file:
//! `id -> [start_ms, duration_ms]`. Start offsets accumulate the padded
//! (normalized) clip lengths because that is what the concatenated stream
//! contains; the recorded duration is the clip's original length so players
//! stop before the padding.

use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::error::{Result, SpriteError};
use crate::files::StagedFile;

/// Map key for a clip file: basename without extension, `-` replaced by `_`.
pub fn clip_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace('-', "_"))
        .unwrap_or_default()
}

/// Location of one clip inside the sprite, serialized as `[start, duration]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct SpriteEntry {
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl From<(u64, u64)> for SpriteEntry {
    fn from((start_ms, duration_ms): (u64, u64)) -> Self {
        Self {
            start_ms,
            duration_ms,
        }
    }
}

impl From<SpriteEntry> for (u64, u64) {
    fn from(entry: SpriteEntry) -> Self {
        (entry.start_ms, entry.duration_ms)
    }
}

/// Probed durations of one clip, in processing order
#[derive(Debug, Clone, PartialEq)]
pub struct ClipDurations {
    pub id: String,
    /// Length of the normalized (padded) clip
    pub normalized_ms: f64,
    /// Length of the original clip
    pub effective_ms: f64,
}

/// Insertion-ordered sprite map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteMap {
    entries: Vec<(String, SpriteEntry)>,
}

impl SpriteMap {
    /// Fold clips (in processing order) into a sprite map.
    ///
    /// Each clip starts at the ceiling of the running sum of all previous
    /// normalized durations. The running sum itself is never rounded.
    /// Returns the map and that final un-rounded sum.
    pub fn from_clips<'a, I>(clips: I) -> (Self, f64)
    where
        I: IntoIterator<Item = &'a ClipDurations>,
    {
        clips
            .into_iter()
            .fold((SpriteMap::default(), 0.0), |(mut map, start), clip| {
                let entry = SpriteEntry {
                    start_ms: ceil_ms(start),
                    duration_ms: ceil_ms(clip.effective_ms),
                };
                if let Some(previous) = map.insert(clip.id.clone(), entry) {
                    tracing::warn!(
                        id = %clip.id,
                        ?previous,
                        replacement = ?entry,
                        "Two clips share a sprite id; keeping the later one"
                    );
                }
                (map, start + clip.normalized_ms)
            })
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, id: String, entry: SpriteEntry) -> Option<SpriteEntry> {
        match self.entries.iter_mut().find(|(key, _)| *key == id) {
            Some((_, slot)) => Some(std::mem::replace(slot, entry)),
            None => {
                self.entries.push((id, entry));
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<SpriteEntry> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, entry)| *entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SpriteEntry)> + '_ {
        self.entries.iter().map(|(key, entry)| (key.as_str(), *entry))
    }

    /// Pretty-printed JSON with two-space indentation, in insertion order.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON form next to `path`, to be published later.
    pub fn stage_json(&self, path: &Path) -> Result<StagedFile> {
        let json = self.to_json_pretty()?;
        let staged = StagedFile::new(path)?;
        std::fs::write(staged.path(), json.as_bytes())
            .map_err(|e| SpriteError::filesystem(staged.path(), e))?;
        Ok(staged)
    }

    /// Atomically write the JSON form to `path`.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        self.stage_json(path)?.publish()
    }
}

impl Serialize for SpriteMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

fn ceil_ms(ms: f64) -> u64 {
    ms.max(0.0).ceil() as u64
}
