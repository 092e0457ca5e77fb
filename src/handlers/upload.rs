use std::path::Path;

use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, web};
use futures_util::TryStreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::AppState;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::Attachment;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/upload").route(web::post().to(upload)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn from_mime(mime: &str) -> Option<MediaKind> {
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    fn dir(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    fn max_bytes(self, config: &Config) -> u64 {
        match self {
            MediaKind::Image => config.max_image_bytes,
            MediaKind::Video => config.max_video_bytes,
        }
    }
}

/// File extension for the stored copy: the original one when it is plain
/// alphanumeric, otherwise the MIME subtype.
fn extension(file_name: &str, mime: &str) -> String {
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match from_name {
        Some(ext) => ext.to_ascii_lowercase(),
        None => mime
            .rsplit('/')
            .next()
            .unwrap_or("bin")
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect(),
    }
}

fn multipart_error(err: actix_multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {err}"))
}

// === POST /api/upload ===
async fn upload(state: web::Data<AppState>, mut payload: Multipart) -> ApiResult<HttpResponse> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            while field.try_next().await.map_err(multipart_error)?.is_some() {}
            continue;
        }
        let file = store_field(&state.config, &mut field).await?;
        log::info!("stored upload {} ({} bytes)", file.url, file.size);
        return Ok(HttpResponse::Ok().json(json!({ "success": true, "file": file })));
    }
    Err(ApiError::bad_request("No file uploaded"))
}

/// Streams the field into `out`, failing once more than `limit` bytes arrive.
async fn copy_field(field: &mut Field, out: &mut tokio::fs::File, limit: u64) -> ApiResult<u64> {
    let io_err = |err: std::io::Error| ApiError::Internal(format!("failed to store upload: {err}"));
    let mut size: u64 = 0;
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > limit {
            return Err(ApiError::bad_request(format!(
                "File exceeds the {} MB limit",
                limit / (1024 * 1024)
            )));
        }
        out.write_all(&chunk).await.map_err(io_err)?;
    }
    out.flush().await.map_err(io_err)?;
    Ok(size)
}

async fn store_field(config: &Config, field: &mut Field) -> ApiResult<Attachment> {
    let mime = field
        .content_type()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_default();
    let kind = MediaKind::from_mime(&mime)
        .ok_or_else(|| ApiError::bad_request("Only image and video files can be uploaded"))?;
    let original_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or("upload")
        .to_string();

    let dir = config.uploads_dir().join(kind.dir());
    let io_err = |err: std::io::Error| ApiError::Internal(format!("failed to store upload: {err}"));
    tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;

    let stored_name = format!("{}.{}", Uuid::new_v4(), extension(&original_name, &mime));
    let target = dir.join(&stored_name);
    let mut out = tokio::fs::File::create(&target).await.map_err(io_err)?;

    let size = match copy_field(field, &mut out, kind.max_bytes(config)).await {
        Ok(size) => size,
        Err(err) => {
            drop(out);
            if let Err(rm) = tokio::fs::remove_file(&target).await {
                log::warn!("could not remove partial upload {target:?}: {rm}");
            }
            return Err(err);
        }
    };

    Ok(Attachment {
        url: format!("/uploads/{}/{stored_name}", kind.dir()),
        name: original_name,
        size,
        mime_type: mime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_follows_mime_prefix() {
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }

    #[test]
    fn extension_prefers_file_name() {
        assert_eq!(extension("belt.JPG", "image/jpeg"), "jpg");
        assert_eq!(extension("belt", "image/png"), "png");
        assert_eq!(extension("clip.m p4", "video/mp4"), "mp4");
    }
}
