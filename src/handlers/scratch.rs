//! # Per-Request Scratch Files
//!
//! Each transcription request writes its upload to a scratch file with a
//! unique name, so two in-flight requests can never read or delete each
//! other's audio. The file is a scoped resource: removal is tied to the
//! guard's `Drop`, which runs on every exit path, success or failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Owns one transiently-stored audio upload on disk.
pub struct ScratchAudio {
    path: PathBuf,
}

impl ScratchAudio {
    /// Write `bytes` to a fresh uniquely-named file under `dir`.
    ///
    /// The directory is created if absent. The filename embeds a v4 UUID, so
    /// concurrent requests never collide.
    pub fn write(dir: &Path, bytes: &[u8]) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("upload-{}.audio", Uuid::new_v4()));
        fs::write(&path, bytes)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Scratch audio written");
        Ok(Self { path })
    }

    /// Location of the stored upload.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchAudio {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            // A leaked scratch file is non-fatal; log it and move on.
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch audio file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_test_dir() -> PathBuf {
        std::env::temp_dir().join(format!("scratch-test-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_write_and_drop_removes_file() {
        let dir = unique_test_dir();

        let path = {
            let scratch = ScratchAudio::write(&dir, b"payload").unwrap();
            assert_eq!(fs::read(scratch.path()).unwrap(), b"payload");
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unique_paths_per_request() {
        let dir = unique_test_dir();

        let a = ScratchAudio::write(&dir, b"first").unwrap();
        let b = ScratchAudio::write(&dir, b"second").unwrap();
        assert_ne!(a.path(), b.path());

        drop(a);
        drop(b);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_drop_tolerates_already_removed_file() {
        let dir = unique_test_dir();

        let scratch = ScratchAudio::write(&dir, b"payload").unwrap();
        fs::remove_file(scratch.path()).unwrap();
        drop(scratch); // must not panic

        fs::remove_dir_all(&dir).unwrap();
    }
}
