//! Image uploads (signatures and company logos) stored on the local filesystem.
//!
//! Files are written as `<dir>/<unix millis>-<random hex>-<sanitised original name>` and referred
//! to by their public path under the directory's static mount, e.g.
//! `/firmas/1718000000000-3f2a...-firma.png`. A stored file is never overwritten.

use crate::errors::{Error, Result};
use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Extensions accepted for uploaded images, compared case-insensitively.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// An image read from a multipart form, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Bytes,
}

/// An image written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub disk_path: PathBuf,
    /// Path under the static mount, recorded on the owning record
    pub public_path: String,
}

pub fn is_allowed_image(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ALLOWED_IMAGE_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
}

/// Keep the final path component and replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();

    match cleaned.trim_start_matches('.') {
        "" => "upload".to_string(),
        rest => rest.to_string(),
    }
}

/// Read the image in form field `field_name`.
///
/// Other fields are skipped. A missing or empty file, or a file whose extension is not in
/// [`ALLOWED_IMAGE_EXTENSIONS`], is a bad request.
#[instrument(skip(multipart), err)]
pub async fn read_image_field(multipart: &mut Multipart, field_name: &str) -> Result<UploadedImage> {
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string).ok_or_else(|| Error::BadRequest {
            message: format!("Field '{field_name}' must be a file"),
        })?;

        if !is_allowed_image(&file_name) {
            return Err(Error::BadRequest {
                message: format!("Only {} images are allowed", ALLOWED_IMAGE_EXTENSIONS.join(", ")),
            });
        }

        let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read uploaded file: {e}"),
        })?;

        if bytes.is_empty() {
            break;
        }

        debug!(size = bytes.len(), "read uploaded image");
        return Ok(UploadedImage { file_name, bytes });
    }

    Err(Error::BadRequest {
        message: format!("No file uploaded in field '{field_name}'"),
    })
}

/// Write `image` into `dir`, creating the directory if needed.
#[instrument(skip(image), fields(size = image.bytes.len()), err)]
pub async fn store_image(dir: &Path, public_prefix: &str, image: &UploadedImage) -> Result<StoredFile> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| Error::Internal {
        operation: format!("create upload directory {}: {e}", dir.display()),
    })?;

    let stored_name = format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        sanitize_file_name(&image.file_name)
    );
    let disk_path = dir.join(&stored_name);

    let write_error = |e: std::io::Error| Error::Internal {
        operation: format!("write upload {}: {e}", disk_path.display()),
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&disk_path)
        .await
        .map_err(write_error)?;
    file.write_all(&image.bytes).await.map_err(write_error)?;
    file.flush().await.map_err(write_error)?;

    Ok(StoredFile {
        disk_path,
        public_path: format!("{}/{stored_name}", public_prefix.trim_end_matches('/')),
    })
}

/// Delete a stored file. Failures are logged, not returned.
pub async fn remove_stored(file: &StoredFile) {
    if let Err(e) = tokio::fs::remove_file(&file.disk_path).await {
        warn!(path = %file.disk_path.display(), "failed to remove upload: {e}");
    }
}

/// Map a public path such as `/firmas/x.png` back to a file in `dir`.
///
/// Returns `None` when the path is not under `public_prefix` or tries to leave the directory.
pub fn resolve_public_path(dir: &Path, public_prefix: &str, public_path: &str) -> Option<PathBuf> {
    let prefix = format!("{}/", public_prefix.trim_end_matches('/'));
    let name = public_path.strip_prefix(&prefix)?;

    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return None;
    }
    Some(dir.join(name))
}
