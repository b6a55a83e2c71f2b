//! Per-session scratch directory
//!
//! Holds the uploaded image and the two turn audio files. Every session
//! gets its own directory so concurrent sessions never share files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use super::image::UploadedImage;
use crate::Result;

/// Recorded user speech for the current turn
pub const RECORDING_FILE: &str = "test.wav";

/// Synthesized assistant speech for the current turn
pub const SPEECH_FILE: &str = "output.mp3";

enum Location {
    /// Removed on drop
    Temporary(TempDir),
    /// Kept after the session ends
    Retained(PathBuf),
}

/// Scratch directory owned by one session
pub struct ScratchSpace {
    location: Location,
}

impl ScratchSpace {
    /// Create the scratch directory for a session under `parent`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn create(parent: &Path, session_id: Uuid, retain: bool) -> Result<Self> {
        std::fs::create_dir_all(parent)?;

        let location = if retain {
            let dir = parent.join(format!("session-{session_id}"));
            std::fs::create_dir_all(&dir)?;
            Location::Retained(dir)
        } else {
            let dir = tempfile::Builder::new()
                .prefix(&format!("session-{session_id}-"))
                .tempdir_in(parent)?;
            Location::Temporary(dir)
        };

        let scratch = Self { location };
        tracing::debug!(path = %scratch.path().display(), retain, "scratch directory ready");
        Ok(scratch)
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        match &self.location {
            Location::Temporary(dir) => dir.path(),
            Location::Retained(dir) => dir,
        }
    }

    /// Path of the recorded turn audio
    #[must_use]
    pub fn recording_path(&self) -> PathBuf {
        self.path().join(RECORDING_FILE)
    }

    /// Path of the synthesized turn audio
    #[must_use]
    pub fn speech_path(&self) -> PathBuf {
        self.path().join(SPEECH_FILE)
    }

    /// Persist the uploaded image as `uploaded_image.<ext>`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn store_image(&self, image: &UploadedImage) -> Result<PathBuf> {
        let path = self
            .path()
            .join(format!("uploaded_image.{}", image.kind().extension()));
        std::fs::write(&path, image.bytes())?;
        Ok(path)
    }
}
