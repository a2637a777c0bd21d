//! Directory enumeration, clip ordering and atomic file replacement

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use icu_collator::{Collator, CollatorOptions};
use tempfile::TempPath;

use crate::error::{Result, SpriteError};

/// Extension (without dot, compared case-insensitively) of candidate clips
pub const CLIP_EXTENSION: &str = "mp3";

/// True when `path` ends in `.mp3` in any letter case.
pub fn has_mp3_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CLIP_EXTENSION))
}

/// List the `.mp3` files directly inside `dir`, in collation order.
///
/// Subdirectories and other entries are ignored. A missing or unreadable
/// directory is a filesystem error; an empty result is not.
pub fn list_mp3_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SpriteError::filesystem(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SpriteError::filesystem(dir, e))?;
        let path = entry.path();
        if has_mp3_extension(&path) && path.is_file() {
            files.push(path);
        }
    }

    let collator = root_collator()?;
    files.sort_by(|a, b| collate(&collator, &file_name(a), &file_name(b)));
    Ok(files)
}

/// Final path component as (lossy) UTF-8, for logs and ordering only.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `dir` joined with the exact final component of `path`.
pub fn same_name_in(dir: &Path, path: &Path) -> PathBuf {
    dir.join(path.file_name().unwrap_or_default())
}

/// Collator for the Unicode root locale at tertiary strength.
pub fn root_collator() -> Result<Collator> {
    Collator::try_new(&Default::default(), CollatorOptions::new())
        .map_err(|e| SpriteError::Internal(format!("cannot load collation data: {}", e)))
}

/// Order two clip names by root collation, falling back to code points so
/// that distinct names never compare equal.
pub fn collate(collator: &Collator, a: &str, b: &str) -> Ordering {
    collator.compare(a, b).then_with(|| a.cmp(b))
}

/// A hidden temporary sibling of `target` that only replaces it on
/// [`StagedFile::publish`]. Dropping it unpublished removes the temporary.
#[derive(Debug)]
pub struct StagedFile {
    temp: TempPath,
    target: PathBuf,
}

impl StagedFile {
    /// Reserve the temporary next to `target`, creating parent directories.
    pub fn new(target: &Path) -> Result<Self> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| SpriteError::filesystem(parent, e))?;

        let temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(parent)
            .map_err(|e| SpriteError::filesystem(parent, e))?
            .into_temp_path();

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Where the content is written before publishing.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary over the target.
    pub fn publish(self) -> Result<()> {
        let Self { temp, target } = self;
        temp.persist(&target)
            .map_err(|e| SpriteError::filesystem(&target, e.error))
    }
}

/// Write `target` through a [`StagedFile`] that is published only when
/// `write` succeeds. Parent directories are created.
///
/// The temporary file is removed on failure, so a previously published
/// `target` is never replaced by a partial one.
pub fn write_atomically<T, F>(target: &Path, write: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let staged = StagedFile::new(target)?;
    let value = write(staged.path())?;
    staged.publish()?;
    Ok(value)
}
