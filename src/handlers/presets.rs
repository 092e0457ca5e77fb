use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::non_blank;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{FilterPreset, PresetPayload};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/filter-presets")
            .route(web::get().to(list_presets))
            .route(web::post().to(create_preset)),
    )
    .service(
        web::resource("/api/filter-presets/{id}")
            .route(web::get().to(get_preset))
            .route(web::put().to(update_preset))
            .route(web::delete().to(delete_preset)),
    );
}

fn required_name(payload: &PresetPayload) -> ApiResult<String> {
    non_blank(payload.name.as_deref())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Preset name is required"))
}

async fn list_presets(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.presets.read().await?))
}

async fn get_preset(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let preset = state
        .store
        .presets
        .read()
        .await?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ApiError::not_found("Filter preset not found"))?;
    Ok(HttpResponse::Ok().json(preset))
}

async fn create_preset(
    state: web::Data<AppState>,
    payload: web::Json<PresetPayload>,
) -> ApiResult<HttpResponse> {
    let name = required_name(&payload)?;
    let preset = FilterPreset {
        id: format!("preset-{}", Uuid::new_v4()),
        name,
        filter: payload.into_inner().filter.unwrap_or_default(),
        created_at: Utc::now(),
        updated_at: None,
    };

    let stored = preset.clone();
    state
        .store
        .presets
        .update(move |presets| {
            presets.push(stored);
            Ok::<_, ApiError>(())
        })
        .await?;

    Ok(HttpResponse::Created().json(preset))
}

async fn update_preset(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PresetPayload>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let name = required_name(&payload)?;
    let filter = payload.into_inner().filter;

    let preset = state
        .store
        .presets
        .update(|presets| {
            let preset = presets
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| ApiError::not_found("Filter preset not found"))?;
            preset.name = name;
            if let Some(filter) = filter {
                preset.filter = filter;
            }
            preset.updated_at = Some(Utc::now());
            Ok::<_, ApiError>(preset.clone())
        })
        .await?;

    Ok(HttpResponse::Ok().json(preset))
}

async fn delete_preset(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    state
        .store
        .presets
        .update(|presets| {
            let before = presets.len();
            presets.retain(|p| p.id != id);
            if presets.len() == before {
                return Err(ApiError::not_found("Filter preset not found"));
            }
            Ok(())
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
