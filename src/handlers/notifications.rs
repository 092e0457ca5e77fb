use actix_web::{HttpResponse, web};
use serde_json::json;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Authorization;
use crate::models::{MarkReadPayload, Notification};
use crate::store::Store;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/notifications")
            .route(web::get().to(list_notifications))
            .route(web::put().to(mark_read))
            .wrap(Authorization::session()),
    );
}

/// Appends notifications. A failure here never fails the request that
/// triggered it.
pub(super) async fn notify(store: &Store, notes: Vec<Notification>) {
    if notes.is_empty() {
        return;
    }
    let count = notes.len();
    let res = store
        .notifications
        .update(|all| {
            all.extend(notes);
            Ok::<_, ApiError>(())
        })
        .await;
    match res {
        Ok(()) => log::debug!("queued {count} notification(s)"),
        Err(err) => log::warn!("failed to store notifications: {err}"),
    }
}

// === GET /api/notifications ===
async fn list_notifications(
    state: web::Data<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<HttpResponse> {
    let mut mine: Vec<Notification> = state
        .store
        .notifications
        .read()
        .await?
        .into_iter()
        .filter(|n| n.user_id == user.id)
        .collect();
    mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(mine))
}

// === PUT /api/notifications ===
async fn mark_read(
    state: web::Data<AppState>,
    CurrentUser(user): CurrentUser,
    payload: web::Json<MarkReadPayload>,
) -> ApiResult<HttpResponse> {
    let ids = payload.into_inner().notification_ids;
    let updated = state
        .store
        .notifications
        .update(|all| {
            let mut updated = 0usize;
            for note in all
                .iter_mut()
                .filter(|n| n.user_id == user.id && ids.contains(&n.id))
            {
                note.is_read = true;
                updated += 1;
            }
            Ok::<_, ApiError>(updated)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "updated": updated })))
}
