use crate::config::Config;
use actix_multipart::Multipart;
use actix_web::web;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("No file was uploaded.")]
    MissingFile,
    #[error("Unsupported file type: '{0}'.")]
    UnsupportedType(String),
    #[error("File is too large. Maximum size is {0}MB.")]
    TooLarge(u64),
    #[error("Upload failed: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl MediaError {
    /// True when the client sent something unacceptable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MediaError::MissingFile | MediaError::UnsupportedType(_) | MediaError::TooLarge(_) | MediaError::Multipart(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Cover,
    Pdf,
}

impl MediaKind {
    fn directory(self) -> &'static str {
        match self {
            MediaKind::Cover => "covers",
            MediaKind::Pdf => "pdfs",
        }
    }

    /// Maps an accepted MIME type to the extension stored on disk.
    pub fn extension_for(self, mime: &str) -> Option<&'static str> {
        match (self, mime) {
            (MediaKind::Cover, "image/jpeg") => Some("jpg"),
            (MediaKind::Cover, "image/png") => Some("png"),
            (MediaKind::Cover, "image/gif") => Some("gif"),
            (MediaKind::Cover, "image/webp") => Some("webp"),
            (MediaKind::Pdf, "application/pdf") => Some("pdf"),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoredMedia {
    pub url: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
}

/// Streams the `file` field of a multipart upload to `MEDIA_PATH/<kind>/<uuid>.<ext>`.
/// Partially written files are removed when the size limit is exceeded.
pub async fn save_upload(
    config: &Config,
    kind: MediaKind,
    max_size_mb: u64,
    mut payload: Multipart,
) -> Result<StoredMedia, MediaError> {
    let max_bytes = max_size_mb * 1024 * 1024;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }

        let mime = field.content_type().map(|m| m.essence_str().to_string()).unwrap_or_default();
        let ext = kind.extension_for(&mime).ok_or_else(|| MediaError::UnsupportedType(mime.clone()))?;

        let dir = PathBuf::from(&config.media_path).join(kind.directory());
        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let final_path = dir.join(&file_name);

        web::block({
            let dir = dir.clone();
            move || fs::create_dir_all(dir)
        })
        .await??;

        let mut f = web::block({
            let path = final_path.clone();
            move || fs::File::create(path)
        })
        .await??;

        let mut size: u64 = 0;
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            size += data.len() as u64;
            if size > max_bytes {
                drop(f);
                let path = final_path.clone();
                if let Err(e) = web::block(move || fs::remove_file(path)).await? {
                    log::warn!("Could not remove oversized upload {}: {}", final_path.display(), e);
                }
                return Err(MediaError::TooLarge(max_size_mb));
            }
            f = web::block(move || f.write_all(&data).map(|_| f)).await??;
        }

        log::info!("Stored {} upload {} ({} bytes)", kind.directory(), file_name, size);
        return Ok(StoredMedia {
            url: format!("/media/{}/{}", kind.directory(), file_name),
            kind,
            size_bytes: size,
        });
    }

    Err(MediaError::MissingFile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_accept_images_only() {
        assert_eq!(MediaKind::Cover.extension_for("image/webp"), Some("webp"));
        assert_eq!(MediaKind::Cover.extension_for("application/pdf"), None);
        assert_eq!(MediaKind::Pdf.extension_for("application/pdf"), Some("pdf"));
        assert_eq!(MediaKind::Pdf.extension_for("image/png"), None);
    }
}
