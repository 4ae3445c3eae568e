use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use cohort_types::api::{Claims, UploadResponse};

use crate::AppState;
use crate::error::ApiError;

/// 10 MB upload limit for media
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// File extension for each accepted content type.
const ACCEPTED: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("video/quicktime", "mov"),
];

/// POST /files: accepts raw image or video bytes, saves them to the upload
/// directory under a fresh name and returns the public URL.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let ext = extension_for(content_type)
        .ok_or_else(|| ApiError::bad_request("only image and video uploads are accepted"))?;

    if bytes.is_empty() {
        return Err(ApiError::bad_request("empty upload"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::bad_request("upload exceeds 10 MB"));
    }

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| anyhow::anyhow!("create upload dir: {}", e))?;

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    let file_path = state.upload_dir.join(&file_name);
    let body = bytes.clone();
    save_or_discard(file_path, |path| async move { write_file(&path, &body).await }).await?;

    info!("User {} uploaded {} ({} bytes)", claims.sub, file_name, bytes.len());

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("/uploads/{}", file_name),
            size: bytes.len() as u64,
        }),
    ))
}

/// Runs `write` and removes whatever it left at `path` if it fails.
async fn save_or_discard<F, Fut>(path: PathBuf, write: F) -> anyhow::Result<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let result = write(path.clone()).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove partial upload {}: {}", path.display(), e);
            }
        }
    }
    result
}

async fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    file.flush().await.with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    // Ignore parameters such as `; charset=...`.
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    ACCEPTED
        .iter()
        .find(|(accepted, _)| *accepted == mime)
        .map(|(_, ext)| *ext)
}
