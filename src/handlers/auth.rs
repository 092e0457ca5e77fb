use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use super::non_blank;
use crate::AppState;
use crate::auth::{
    ADMIN_IDENTITY, SessionUser, TOKEN_COOKIE, USER_COOKIE, create_token, removal_cookie,
    session_cookie, token_cookie, validate_token, verify_password,
};
use crate::error::{ApiError, ApiResult};
use crate::models::LoginPayload;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/auth/login")
            .route(web::post().to(login))
            .route(web::delete().to(logout)),
    )
    .service(web::resource("/api/auth/me").route(web::get().to(me)))
    .service(web::resource("/api/auth/admin-login").route(web::get().to(admin_login)));
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid username or password".to_string())
}

fn cookie_error(err: serde_json::Error) -> ApiError {
    ApiError::Internal(format!("failed to encode session cookie: {err}"))
}

// === POST /api/auth/login ===
async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> ApiResult<HttpResponse> {
    let (Some(username), Some(password)) = (
        non_blank(payload.username.as_deref()),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("username and password are required"));
    };

    let users = state.store.users.read().await?;
    let user = users
        .iter()
        .find(|u| u.name.eq_ignore_ascii_case(username) || u.email.eq_ignore_ascii_case(username))
        .ok_or_else(invalid_credentials)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
    if !verify_password(&state.config.password_salt, password, hash) {
        log::warn!("failed login for {username}");
        return Err(invalid_credentials());
    }

    let session = SessionUser::from(user);
    let token = create_token(&session, &state.config.jwt_secret)
        .map_err(|err| ApiError::Internal(format!("failed to sign token: {err}")))?;
    let cookie = session_cookie(&session).map_err(cookie_error)?;

    log::info!("user {} logged in", user.id);
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .cookie(token_cookie(token))
        .json(json!({ "user": user.public() })))
}

// === DELETE /api/auth/login ===
async fn logout() -> HttpResponse {
    HttpResponse::Ok()
        .cookie(removal_cookie(USER_COOKIE))
        .cookie(removal_cookie(TOKEN_COOKIE))
        .json(json!({ "success": true }))
}

// === GET /api/auth/me ===
async fn me(req: HttpRequest, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let token = req
        .cookie(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            req.headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::Unauthorized("Not logged in".to_string()))?;
    let claims = validate_token(&token, &state.config.jwt_secret)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    let users = state.store.users.read().await?;
    let user = users
        .iter()
        .find(|u| u.id == claims.sub)
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;
    Ok(HttpResponse::Ok().json(json!({ "user": user.public() })))
}

// === GET /api/auth/admin-login ===
async fn admin_login(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    if !state.config.admin_login_enabled {
        return Err(ApiError::Forbidden("Admin login is disabled".to_string()));
    }
    let admin: &SessionUser = &ADMIN_IDENTITY;
    let cookie = session_cookie(admin).map_err(cookie_error)?;

    log::warn!("issued admin session without credentials");
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "success": true, "user": admin })))
}
