//! Filesystem utilities.
//!
//! Scoped temporary artifacts for multi-step ffmpeg pipelines.

use std::path::{Path, PathBuf};

/// Uniquely named temporary files removed when the guard drops.
///
/// Files are created next to the pipeline output rather than in the system
/// temp dir so intermediate renders stay on the same volume.
#[derive(Debug)]
pub struct TempFiles {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl TempFiles {
    /// Temp files will live in `dir`, which is created if missing.
    pub fn in_dir(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            paths: Vec::new(),
        })
    }

    /// Temp files beside `output`.
    pub fn beside(output: &Path) -> std::io::Result<Self> {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::in_dir(dir)
    }

    /// Reserves a fresh `{prefix}_{uuid}.{extension}` path.
    ///
    /// Nothing is written; the path is only registered for cleanup.
    pub fn reserve(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let path = self
            .dir
            .join(format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension));
        self.paths.push(path.clone());
        path
    }

    /// Writes `contents` to a freshly reserved path.
    pub fn write(&mut self, prefix: &str, extension: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.reserve(prefix, extension);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Error cleaning up temporary file");
                }
            }
        }
    }
}
