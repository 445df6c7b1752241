//! Artifact output directory.
//!
//! Artifacts land at `<dir>/<unit_id>.<ext>`, with the extension derived
//! from the media type. Writes go through a temp file plus rename, so an
//! interrupted run never leaves a partial artifact behind, and a re-run can
//! trust that an existing file is complete.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::work::Artifact;
use crate::error::Result;

/// Extensions checked when looking for an existing artifact.
const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "webp", "mp3", "wav", "mp4", "txt", "bin"];

/// File extension for a media type.
#[must_use]
pub fn extension_for(media_type: &str) -> &'static str {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "video/mp4" => "mp4",
        "text/plain" => "txt",
        _ => "bin",
    }
}

/// Turn a unit id into a safe file stem.
///
/// Distinct ids can share a stem ("scene 1" and "scene_1"); batches reject
/// such pairs up front.
#[must_use]
pub fn file_stem(unit_id: &str) -> String {
    let stem: String = unit_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem.to_string()
    }
}

/// Writes artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, unit_id: &str, media_type: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_stem(unit_id), extension_for(media_type)))
    }

    /// Path of an artifact already written for `unit_id`, if any.
    #[must_use]
    pub fn exists(&self, unit_id: &str) -> Option<PathBuf> {
        let stem = file_stem(unit_id);
        KNOWN_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{stem}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Write `artifact` for `unit_id` atomically and return its path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written.
    pub fn write(&self, unit_id: &str, artifact: &Artifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(unit_id, &artifact.media_type);
        write_atomic(&path, &artifact.bytes)?;
        tracing::debug!(path = %path.display(), bytes = artifact.size(), "Artifact written");
        Ok(path)
    }
}

/// Write bytes atomically using temp file + rename.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory, so the rename stays on one filesystem.
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("artifact"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    if let Err(err) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}
