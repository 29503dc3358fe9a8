//! Base64 image payloads and their on-disk storage under `MEDIA_ROOT`.

use std::path::{Component, Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const AVATAR_DIR: &str = "users/avatars";
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Parses `data:image/<ext>;base64,<payload>`.
pub fn decode_data_uri(raw: &str) -> AppResult<DecodedImage> {
    let invalid = || {
        AppError::bad_request(
            "invalid base64 image, expected data:image/<type>;base64,<data>",
        )
    };

    let rest = raw.trim().strip_prefix("data:image/").ok_or_else(invalid)?;
    let (mime_subtype, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;

    let extension = mime_subtype.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::bad_request(format!(
            "unsupported image type '{extension}'"
        )));
    }

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    if !signature_matches(&extension, &bytes) {
        return Err(AppError::bad_request(format!(
            "image content is not a valid {extension} file"
        )));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Checks the leading magic bytes against the declared subtype.
fn signature_matches(extension: &str, bytes: &[u8]) -> bool {
    match extension {
        "png" => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "jpg" | "jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        "webp" => bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP",
        "bmp" => bytes.starts_with(b"BM"),
        _ => false,
    }
}

/// Writes the image under `media_root/subdir` with a random name and returns
/// the path relative to `media_root`.
pub async fn save_image(media_root: &str, subdir: &str, image: &DecodedImage) -> AppResult<String> {
    let dir = Path::new(media_root).join(subdir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("create media dir: {e}")))?;

    let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
    tokio::fs::write(dir.join(&file_name), &image.bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write media file: {e}")))?;

    Ok(format!("{subdir}/{file_name}"))
}

/// Best effort; a missing file is not an error.
pub async fn remove_file(media_root: &str, relative: &str) {
    let Some(path) = resolve(media_root, relative) else {
        tracing::warn!(path = relative, "refusing to delete media outside root");
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(error = %err, path = %path.display(), "media cleanup failed"),
    }
}

fn resolve(media_root: &str, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(Path::new(media_root).join(rel))
}
