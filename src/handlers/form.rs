// Form data processing for Voice Notes API
//
// Extracts the uploaded audio file from a multipart form into a per-request scratch
// directory. Every other field is drained and ignored.

use std::path::PathBuf;

use actix_multipart::{Field, Multipart};
use futures::{StreamExt, TryStreamExt};
use log::{debug, info};

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::file_utils::{sanitize_file_name, save_file_data, ScopedDir};

/// Name of the multipart field carrying the audio file
pub const FILE_FIELD: &str = "file";

/// An uploaded audio file and the scratch directory that owns it
///
/// Dropping the upload removes the directory.
#[derive(Debug)]
pub struct AudioUpload {
    pub dir: ScopedDir,
    pub path: PathBuf,
    pub original_name: String,
    pub size: usize,
}

/// Extract the audio file from a transcription request
pub async fn extract_audio_upload(
    mut form: Multipart,
    config: &HandlerConfig,
) -> Result<AudioUpload, HandlerError> {
    let mut upload: Option<AudioUpload> = None;

    while let Some(mut field) = form
        .try_next()
        .await
        .map_err(|e| HandlerError::form_error(e.to_string()))?
    {
        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|name| name.to_string()))
            .unwrap_or_default();

        if field_name != FILE_FIELD || upload.is_some() {
            debug!("Skipping form field '{}'", field_name);
            drain_field(&mut field).await?;
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|name| name.to_string()))
            .unwrap_or_default();
        if file_name.trim().is_empty() {
            return Err(HandlerError::NoSelectedFile);
        }

        let data = read_file_field(&mut field, config.max_file_size).await?;
        if data.is_empty() {
            return Err(HandlerError::EmptyFile);
        }

        let dir = ScopedDir::create(&config.temp_dir, "transcribe_")?;
        let path = dir.path().join(sanitize_file_name(&file_name));
        save_file_data(&data, &path)?;
        info!("Saved audio file: {} ({} bytes)", path.display(), data.len());

        upload = Some(AudioUpload {
            dir,
            path,
            original_name: file_name,
            size: data.len(),
        });
    }

    upload.ok_or(HandlerError::NoAudioFile)
}

async fn read_file_field(
    field: &mut Field,
    max_file_size: usize,
) -> Result<Vec<u8>, HandlerError> {
    let mut file_data = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| {
            HandlerError::form_error(format!("Error processing file upload: {}", e))
        })?;

        let total_size = file_data.len() + data.len();
        if total_size > max_file_size {
            return Err(HandlerError::FileTooLarge(total_size, max_file_size));
        }
        file_data.extend_from_slice(&data);
    }
    Ok(file_data)
}

async fn drain_field(field: &mut Field) -> Result<(), HandlerError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| HandlerError::form_error(e.to_string()))?;
    }
    Ok(())
}
