use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::non_blank;
use super::notifications::notify;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AssignPayload, CreateIssue, Issue, Notification, Person, Priority, Status, UpdateIssue, Worker,
};
use crate::query::{self, IssueQuery, ListQuery};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/issues")
            .route(web::get().to(list_issues))
            .route(web::post().to(create_issue)),
    )
    .service(
        web::resource("/api/issues/{id}")
            .route(web::get().to(get_issue))
            .route(web::put().to(update_issue))
            .route(web::delete().to(delete_issue)),
    )
    .service(web::resource("/api/issues/{id}/assign").route(web::put().to(assign_issue)));
}

/// Looks the id up among login users first, then the worker registry.
pub(super) async fn find_person(state: &AppState, id: &str) -> ApiResult<Option<Person>> {
    let users = state.store.users.read().await?;
    if let Some(user) = users.iter().find(|u| u.id == id) {
        return Ok(Some(user.snapshot()));
    }
    let settings = state.store.settings.read().await?;
    Ok(settings
        .workers
        .iter()
        .find(|w| w.id == id)
        .map(Worker::snapshot))
}

// === GET /api/issues ===
async fn list_issues(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let query = IssueQuery::try_from(query.into_inner())?;
    let issues = state.store.issues.read().await?;
    Ok(HttpResponse::Ok().json(query::list(issues, &query)))
}

// === GET /api/issues/{id} ===
async fn get_issue(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let issues = state.store.issues.read().await?;
    let issue = issues
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| ApiError::not_found("Issue not found"))?;
    Ok(HttpResponse::Ok().json(issue))
}

// === POST /api/issues ===
async fn create_issue(
    state: web::Data<AppState>,
    payload: web::Json<CreateIssue>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let title = payload
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let reporter_id = non_blank(payload.created_by_id.as_deref())
        .ok_or_else(|| ApiError::bad_request("createdById is required"))?;

    let settings = state.store.settings.read().await?;
    let reporter = settings
        .workers
        .iter()
        .find(|w| w.id == reporter_id)
        .map(Worker::snapshot)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown reporter: {reporter_id}")))?;

    let assignee = match non_blank(payload.assigned_to_id.as_deref()) {
        Some(id) => Some(
            find_person(&state, id)
                .await?
                .ok_or_else(|| ApiError::bad_request(format!("Unknown assignee: {id}")))?,
        ),
        None => None,
    };

    let department = match non_blank(payload.department.as_deref()) {
        Some(dept) => dept.to_string(),
        None => settings
            .departments
            .first()
            .map(|d| d.value.clone())
            .unwrap_or_default(),
    };

    let now = Utc::now();
    let issue = Issue {
        id: format!("issue-{}", Uuid::new_v4()),
        title,
        description: payload.description.unwrap_or_default(),
        status: Status::Open,
        priority: payload.priority.unwrap_or(Priority::Medium),
        department,
        issue_type: payload.issue_type.unwrap_or_default(),
        created_by: reporter,
        assigned_to: assignee,
        created_at: now,
        updated_at: now,
        resolved_at: None,
        solution: None,
        attachments: payload.attachments.unwrap_or_default(),
    };

    let stored = issue.clone();
    state
        .store
        .issues
        .update(move |issues| {
            issues.push(stored);
            Ok::<_, ApiError>(())
        })
        .await?;

    log::info!("issue {} reported by {}", issue.id, issue.created_by.id);
    Ok(HttpResponse::Created().json(issue))
}

// === PUT /api/issues/{id} ===
async fn update_issue(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateIssue>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let update = payload.into_inner();
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title cannot be blank"));
    }

    let issue = state
        .store
        .issues
        .update(|issues| {
            let issue = issues
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::not_found("Issue not found"))?;
            issue.apply_update(update, Utc::now());
            Ok::<_, ApiError>(issue.clone())
        })
        .await?;

    log::debug!("issue {} updated, status {}", issue.id, issue.status);
    Ok(HttpResponse::Ok().json(issue))
}

// === DELETE /api/issues/{id} ===
async fn delete_issue(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    state
        .store
        .issues
        .update(|issues| {
            let pos = issues
                .iter()
                .position(|i| i.id == id)
                .ok_or_else(|| ApiError::not_found("Issue not found"))?;
            issues.remove(pos);
            Ok::<_, ApiError>(())
        })
        .await?;

    log::info!("issue {id} deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// === PUT /api/issues/{id}/assign ===
async fn assign_issue(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AssignPayload>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let assignee = match non_blank(payload.assigned_to_id.as_deref()) {
        Some(person_id) => Some(
            find_person(&state, person_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Assignee not found"))?,
        ),
        None => None,
    };

    let notified = assignee.clone();
    let issue = state
        .store
        .issues
        .update(|issues| {
            let issue = issues
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::not_found("Issue not found"))?;
            issue.assigned_to = assignee;
            issue.updated_at = Utc::now();
            Ok::<_, ApiError>(issue.clone())
        })
        .await?;

    if let Some(person) = notified {
        notify(
            &state.store,
            vec![Notification {
                id: Uuid::new_v4().to_string(),
                user_id: person.id.clone(),
                issue_id: issue.id.clone(),
                issue_title: issue.title.clone(),
                comment_id: None,
                message: format!("You were assigned to \"{}\"", issue.title),
                is_read: false,
                created_at: Utc::now(),
            }],
        )
        .await;
        log::info!("issue {} assigned to {}", issue.id, person.id);
    }

    Ok(HttpResponse::Ok().json(issue))
}
