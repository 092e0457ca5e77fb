use std::path::{Component, Path, PathBuf};

use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::{Value, json};

use super::non_blank;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{AttachPayload, Attachment, DetachQuery};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/issues/{id}/attachments")
            .route(web::post().to(attach))
            .route(web::delete().to(detach)),
    );
}

/// Maps an `/uploads/...` URL onto a file under the public directory.
/// Anything else, or any path that tries to climb out, maps to nothing.
fn upload_path(public_dir: &Path, url: &str) -> Option<PathBuf> {
    let relative = url.strip_prefix("/uploads/")?;
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(public_dir.join("uploads").join(relative))
}

// === POST /api/issues/{id}/attachments ===
async fn attach(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AttachPayload>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let added: Vec<Attachment> = match payload.into_inner().attachments {
        Some(list @ Value::Array(_)) => serde_json::from_value(list)
            .map_err(|err| ApiError::bad_request(format!("Invalid attachment: {err}")))?,
        _ => return Err(ApiError::bad_request("attachments must be an array")),
    };

    let attachments = state
        .store
        .issues
        .update(|issues| {
            let issue = issues
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::not_found("Issue not found"))?;
            issue.attachments.extend(added);
            issue.updated_at = Utc::now();
            Ok::<_, ApiError>(issue.attachments.clone())
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "attachments": attachments })))
}

// === DELETE /api/issues/{id}/attachments?fileUrl= ===
async fn detach(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<DetachQuery>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let file_url = non_blank(query.file_url.as_deref())
        .ok_or_else(|| ApiError::bad_request("fileUrl is required"))?
        .to_string();

    let attachments = state
        .store
        .issues
        .update(|issues| {
            let issue = issues
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::not_found("Issue not found"))?;
            let pos = issue
                .attachments
                .iter()
                .position(|a| a.url == file_url)
                .ok_or_else(|| ApiError::not_found("Attachment not found"))?;
            issue.attachments.remove(pos);
            issue.updated_at = Utc::now();
            Ok::<_, ApiError>(issue.attachments.clone())
        })
        .await?;

    match upload_path(&state.config.public_dir, &file_url) {
        Some(file) => {
            if let Err(err) = tokio::fs::remove_file(&file).await {
                log::warn!("could not remove attachment file {file:?}: {err}");
            }
        }
        None => log::debug!("not unlinking {file_url}, it is not a local upload"),
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "attachments": attachments })))
}
