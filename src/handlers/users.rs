use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::non_blank;
use crate::AppState;
use crate::auth::hash_password;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Authorization;
use crate::models::{
    PromotePayload, PublicUser, Role, Settings, User, UserPayload, UserQuery, Worker,
};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/users")
            .route(web::get().to(list_users))
            .route(web::post().to(create_user))
            .route(web::put().to(update_user_from_body))
            .route(web::delete().to(delete_user_by_query)),
    )
    .service(
        web::resource("/api/users/{id}")
            .route(web::get().to(get_user))
            .route(web::put().to(update_user))
            .route(web::delete().to(delete_user)),
    )
    .service(
        web::resource("/api/users/{id}/promote")
            .route(web::put().to(promote_user))
            .wrap(Authorization::admin()),
    );
}

/// The required part of a create/update payload, already trimmed.
struct Profile {
    name: String,
    email: String,
    role: Role,
    department: String,
    company_id: Option<String>,
}

impl Profile {
    fn from_payload(payload: &UserPayload) -> ApiResult<Profile> {
        let required = |value: Option<&str>, field: &str| {
            non_blank(value)
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
        };
        Ok(Profile {
            name: required(payload.name.as_deref(), "name")?,
            email: required(payload.email.as_deref(), "email")?,
            role: payload
                .role
                .ok_or_else(|| ApiError::bad_request("role is required"))?,
            department: required(payload.department.as_deref(), "department")?,
            company_id: non_blank(payload.company_id.as_deref()).map(str::to_string),
        })
    }
}

fn registered_worker<'a>(settings: &'a Settings, company_id: &str) -> ApiResult<&'a Worker> {
    settings
        .workers
        .iter()
        .find(|w| w.company_id == company_id)
        .ok_or_else(|| {
            ApiError::rejected(
                "Unregistered company ID",
                format!("Company ID {company_id} is not in the worker registry"),
            )
        })
}

/// The company ID must be registered, and registered to the same name.
fn check_company_id(settings: &Settings, profile: &Profile) -> ApiResult<()> {
    let Some(company_id) = profile.company_id.as_deref() else {
        return Ok(());
    };
    let worker = registered_worker(settings, company_id)?;
    if worker.name != profile.name {
        return Err(ApiError::rejected(
            "Name does not match company ID",
            format!("Company ID {company_id} is registered to {}", worker.name),
        ));
    }
    Ok(())
}

fn ensure_unique_email(users: &[User], email: &str, except: Option<&str>) -> ApiResult<()> {
    let taken = users
        .iter()
        .filter(|u| Some(u.id.as_str()) != except)
        .any(|u| u.email.eq_ignore_ascii_case(email));
    if taken {
        return Err(ApiError::bad_request(format!("Email {email} is already in use")));
    }
    Ok(())
}

fn sort_by_company_id(users: &mut [User]) {
    users.sort_by(|a, b| a.company_id.cmp(&b.company_id));
}

fn matches_query(user: &User, query: &UserQuery) -> bool {
    let role = non_blank(query.role.as_deref());
    let department = non_blank(query.department.as_deref());
    let search = non_blank(query.search.as_deref()).map(str::to_lowercase);

    role.is_none_or(|r| user.role.as_str().eq_ignore_ascii_case(r))
        && department.is_none_or(|d| user.department.eq_ignore_ascii_case(d))
        && search.is_none_or(|s| {
            [&user.name, &user.email, &user.company_id]
                .iter()
                .any(|field| field.to_lowercase().contains(&s))
        })
}

// === GET /api/users ===
async fn list_users(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> ApiResult<HttpResponse> {
    let users: Vec<PublicUser> = state
        .store
        .users
        .read()
        .await?
        .iter()
        .filter(|u| matches_query(u, &query))
        .map(User::public)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

// === GET /api/users/{id} ===
async fn get_user(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let users = state.store.users.read().await?;
    let user = users
        .iter()
        .find(|u| u.id == id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(user.public()))
}

// === POST /api/users ===
async fn create_user(
    state: web::Data<AppState>,
    payload: web::Json<UserPayload>,
) -> ApiResult<HttpResponse> {
    let profile = Profile::from_payload(&payload)?;
    check_company_id(&state.store.settings.read().await?, &profile)?;

    let password_hash = non_blank(payload.password.as_deref())
        .map(|pw| hash_password(&state.config.password_salt, pw));
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: profile.name,
        email: profile.email,
        role: profile.role,
        department: profile.department,
        company_id: profile.company_id.unwrap_or_default(),
        created_at: Utc::now(),
        password_hash,
    };

    let public = user.public();
    state
        .store
        .users
        .update(move |users| {
            ensure_unique_email(users, &user.email, None)?;
            users.push(user);
            sort_by_company_id(users);
            Ok::<_, ApiError>(())
        })
        .await?;

    log::info!("user {} ({}) created", public.id, public.role);
    Ok(HttpResponse::Created().json(public))
}

async fn apply_update(state: &AppState, id: &str, payload: &UserPayload) -> ApiResult<PublicUser> {
    let profile = Profile::from_payload(payload)?;
    check_company_id(&state.store.settings.read().await?, &profile)?;
    let password_hash = non_blank(payload.password.as_deref())
        .map(|pw| hash_password(&state.config.password_salt, pw));

    state
        .store
        .users
        .update(|users| {
            ensure_unique_email(users, &profile.email, Some(id))?;
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            user.name = profile.name;
            user.email = profile.email;
            user.role = profile.role;
            user.department = profile.department;
            if let Some(company_id) = profile.company_id {
                user.company_id = company_id;
            }
            if password_hash.is_some() {
                user.password_hash = password_hash;
            }
            let public = user.public();
            sort_by_company_id(users);
            Ok(public)
        })
        .await
}

// === PUT /api/users/{id} ===
async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UserPayload>,
) -> ApiResult<HttpResponse> {
    let user = apply_update(&state, &path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(user))
}

// === PUT /api/users ===
async fn update_user_from_body(
    state: web::Data<AppState>,
    payload: web::Json<UserPayload>,
) -> ApiResult<HttpResponse> {
    let id = non_blank(payload.id.as_deref())
        .ok_or_else(|| ApiError::bad_request("User id is required"))?
        .to_string();
    let user = apply_update(&state, &id, &payload).await?;
    Ok(HttpResponse::Ok().json(user))
}

async fn remove_user(state: &AppState, id: &str) -> ApiResult<HttpResponse> {
    let removed = state
        .store
        .users
        .update(|users| {
            let pos = users
                .iter()
                .position(|u| u.id == id)
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            Ok::<_, ApiError>(users.remove(pos))
        })
        .await?;

    log::info!("user {id} deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "User deleted",
        "user": removed.public(),
    })))
}

// === DELETE /api/users/{id} ===
async fn delete_user(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    remove_user(&state, &path.into_inner()).await
}

// === DELETE /api/users?id= ===
async fn delete_user_by_query(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> ApiResult<HttpResponse> {
    let id = non_blank(query.id.as_deref())
        .ok_or_else(|| ApiError::bad_request("User id is required"))?;
    remove_user(&state, id).await
}

// === PUT /api/users/{id}/promote (admin only) ===
async fn promote_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PromotePayload>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let role = payload.role.as_deref().and_then(Role::parse);
    if role != Some(Role::Manager) {
        return Err(ApiError::bad_request("Users can only be promoted to MANAGER"));
    }

    let user = state
        .store
        .users
        .update(|users| {
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            match user.role {
                Role::Manager => Err(ApiError::bad_request("User is already a manager")),
                Role::Admin => Err(ApiError::bad_request("Administrators cannot be promoted")),
                _ => {
                    user.role = Role::Manager;
                    Ok(user.public())
                }
            }
        })
        .await?;

    log::info!("user {} promoted to MANAGER", user.id);
    Ok(HttpResponse::Ok().json(json!({
        "message": "User promoted to manager",
        "user": user,
    })))
}
