use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::dashboard::{self, DateRange, StatsQuery};
use crate::error::{ApiError, ApiResult};
use crate::middleware::Authorization;
use crate::models::{DashboardSettings, DashboardSettingsPayload};
use crate::seed::DASHBOARD_LAYOUT;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/dashboard").route(web::get().to(overview)))
        .service(web::resource("/api/dashboard/stats").route(web::get().to(stats)))
        .service(
            web::resource("/api/dashboard/settings")
                .route(web::get().to(get_layout))
                .route(web::post().to(save_layout))
                .wrap(Authorization::session()),
        );
}

// === GET /api/dashboard ===
async fn overview(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let issues = state.store.issues.read().await?;
    Ok(HttpResponse::Ok().json(dashboard::compute_overview(&issues, Utc::now())))
}

// === GET /api/dashboard/stats ===
async fn stats(
    state: web::Data<AppState>,
    query: web::Query<StatsQuery>,
) -> ApiResult<HttpResponse> {
    let range = DateRange::try_from(query.into_inner())?;
    let issues = state.store.issues.read().await?;
    let users = state.store.users.read().await?;
    let settings = state.store.settings.read().await?;

    let stats = dashboard::compute_stats(&issues, &users, &settings.workers, range, Utc::now());
    Ok(HttpResponse::Ok().json(stats))
}

// === GET /api/dashboard/settings ===
async fn get_layout(
    state: web::Data<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<HttpResponse> {
    let saved = state.store.dashboard_settings.read().await?;
    let layout = saved
        .get(&user.id)
        .cloned()
        .unwrap_or_else(|| DASHBOARD_LAYOUT.clone());
    Ok(HttpResponse::Ok().json(layout))
}

// === POST /api/dashboard/settings ===
async fn save_layout(
    state: web::Data<AppState>,
    CurrentUser(user): CurrentUser,
    payload: web::Json<DashboardSettingsPayload>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let (Some(layout), Some(widgets)) = (payload.layout, payload.widgets) else {
        return Err(ApiError::bad_request("layout and widgets are required"));
    };
    let settings = DashboardSettings { layout, widgets };

    let stored = settings.clone();
    state
        .store
        .dashboard_settings
        .update(|all| {
            all.insert(user.id.clone(), stored);
            Ok::<_, ApiError>(())
        })
        .await?;

    log::debug!("saved dashboard layout for {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "settings": settings })))
}
