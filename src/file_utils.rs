// File utilities for Voice Notes API
//
// Per-request scratch directories and upload persistence. A scratch directory and everything
// in it is removed when its guard is dropped, on every exit path of the request.

use log::{debug, error};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempDir;

/// Scratch directory owned by a single request
#[derive(Debug)]
pub struct ScopedDir {
    inner: Option<TempDir>,
}

impl ScopedDir {
    /// Create a uniquely named directory under `base_dir`, creating `base_dir` if needed
    pub fn create(base_dir: &str, prefix: &str) -> io::Result<Self> {
        fs::create_dir_all(base_dir)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(base_dir)?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { inner: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        self.inner
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Some(dir) = self.inner.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Cleaned up scratch directory {}", path.display()),
                Err(e) => error!("Failed to clean up folder {}: {}", path.display(), e),
            }
        }
    }
}

/// Save uploaded file data to the filesystem
pub fn save_file_data(data: &[u8], file_path: &Path) -> io::Result<()> {
    let mut file = File::create(file_path)?;
    file.write_all(data)?;
    Ok(())
}

/// Reduce a client-supplied file name to a safe single path component
///
/// Directory parts are dropped and unusual characters replaced, keeping the extension.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        String::from("upload")
    } else {
        cleaned.to_string()
    }
}
