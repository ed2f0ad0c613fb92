// Audio format handling for Voice Notes API
//
// Uploads the transcription provider accepts are passed through untouched. Anything else is
// converted to mp3 next to the original file by an external converter (ffmpeg by default).

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use log::{debug, info};
use thiserror::Error;
use tokio::process::Command;

/// Extensions the transcription provider accepts as-is
pub const SUPPORTED_EXTENSIONS: [&str; 10] = [
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to run audio converter '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Audio converter exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Lowercased extension of a file name, if any
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Whether the provider accepts this file without conversion
pub fn is_supported(file_name: &str) -> bool {
    extension_of(file_name).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Runs the configured converter command
#[derive(Debug, Clone)]
pub struct AudioConverter {
    command: String,
}

impl AudioConverter {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Path of a file the provider accepts, converting `input` if needed
    ///
    /// The converted file is written next to `input`, so it shares its lifetime.
    pub async fn prepare(&self, input: &Path) -> Result<PathBuf, ConversionError> {
        let name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if is_supported(name) {
            debug!("{} is already in a supported format", input.display());
            return Ok(input.to_path_buf());
        }

        let output = input.with_extension("mp3");
        self.convert(input, &output).await?;
        info!("Converted {} to {}", input.display(), output.display());
        Ok(output)
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let result = Command::new(&self.command)
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg(output)
            .output()
            .await
            .map_err(|source| ConversionError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(ConversionError::Failed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported("memo.mp3"));
        assert!(is_supported("memo.M4A"));
        assert!(is_supported("memo.webm"));
        assert!(!is_supported("memo.amr"));
        assert!(!is_supported("memo"));
    }

    #[tokio::test]
    async fn supported_files_are_not_converted() {
        let converter = AudioConverter::new("/definitely/not/a/converter");
        let input = Path::new("/tmp/whatever/memo.wav");
        assert_eq!(converter.prepare(input).await.unwrap(), input);
    }

    #[tokio::test]
    async fn missing_converter_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("memo.amr");
        std::fs::write(&input, b"#!AMR\n").unwrap();

        let converter = AudioConverter::new("/definitely/not/a/converter");
        let err = converter.prepare(&input).await.unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_converter_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("memo.amr");
        std::fs::write(&input, b"#!AMR\n").unwrap();

        let converter = AudioConverter::new("false");
        let err = converter.prepare(&input).await.unwrap_err();
        assert!(matches!(err, ConversionError::Failed { .. }));
    }
}
