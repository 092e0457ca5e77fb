use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::non_blank;
use super::notifications::notify;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Authorization;
use crate::models::{Comment, CommentAuthor, CommentPayload, Issue, Notification};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/issues/{id}/comments")
            .route(web::get().to(list_comments))
            .route(web::post().to(create_comment))
            .wrap(Authorization::session()),
    )
    .service(
        web::resource("/api/issues/{id}/comments/{comment_id}")
            .route(web::put().to(edit_comment))
            .route(web::delete().to(delete_comment))
            .wrap(Authorization::session()),
    );
}

async fn load_issue(state: &AppState, id: &str) -> ApiResult<Issue> {
    state
        .store
        .issues
        .read()
        .await?
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| ApiError::not_found("Issue not found"))
}

fn required_content(payload: &CommentPayload) -> ApiResult<String> {
    non_blank(payload.content.as_deref())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Comment content is required"))
}

/// Reporter and assignee of the issue, minus the comment author.
fn recipients(issue: &Issue, author_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let people = std::iter::once(&issue.created_by).chain(issue.assigned_to.as_ref());
    for person in people {
        if person.id != author_id && !ids.contains(&person.id) {
            ids.push(person.id.clone());
        }
    }
    ids
}

// === GET /api/issues/{id}/comments ===
async fn list_comments(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let issue_id = path.into_inner();
    load_issue(&state, &issue_id).await?;

    let mut comments: Vec<Comment> = state
        .store
        .comments
        .read()
        .await?
        .into_iter()
        .filter(|c| c.issue_id == issue_id)
        .collect();
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(comments))
}

// === POST /api/issues/{id}/comments ===
async fn create_comment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    CurrentUser(user): CurrentUser,
    payload: web::Json<CommentPayload>,
) -> ApiResult<HttpResponse> {
    let issue_id = path.into_inner();
    let content = required_content(&payload)?;
    let issue = load_issue(&state, &issue_id).await?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        issue_id: issue.id.clone(),
        content,
        created_by: CommentAuthor {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        },
        created_at: now,
        updated_at: now,
    };

    let stored = comment.clone();
    state
        .store
        .comments
        .update(move |comments| {
            comments.push(stored);
            Ok::<_, ApiError>(())
        })
        .await?;

    let notes = recipients(&issue, &user.id)
        .into_iter()
        .map(|user_id| Notification {
            id: Uuid::new_v4().to_string(),
            user_id,
            issue_id: issue.id.clone(),
            issue_title: issue.title.clone(),
            comment_id: Some(comment.id.clone()),
            message: format!("{} commented on \"{}\"", user.name, issue.title),
            is_read: false,
            created_at: now,
        })
        .collect();
    notify(&state.store, notes).await;

    Ok(HttpResponse::Created().json(comment))
}

// === PUT /api/issues/{id}/comments/{comment_id} ===
async fn edit_comment(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    payload: web::Json<CommentPayload>,
) -> ApiResult<HttpResponse> {
    let (issue_id, comment_id) = path.into_inner();
    let content = required_content(&payload)?;

    let comment = state
        .store
        .comments
        .update(|comments| {
            let comment = comments
                .iter_mut()
                .find(|c| c.id == comment_id && c.issue_id == issue_id)
                .ok_or_else(|| ApiError::not_found("Comment not found"))?;
            if comment.created_by.id != user.id {
                return Err(ApiError::Forbidden(
                    "Only the author can edit this comment".to_string(),
                ));
            }
            comment.content = content;
            comment.updated_at = Utc::now();
            Ok(comment.clone())
        })
        .await?;

    Ok(HttpResponse::Ok().json(comment))
}

// === DELETE /api/issues/{id}/comments/{comment_id} ===
async fn delete_comment(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<HttpResponse> {
    let (issue_id, comment_id) = path.into_inner();

    state
        .store
        .comments
        .update(|comments| {
            let pos = comments
                .iter()
                .position(|c| c.id == comment_id && c.issue_id == issue_id)
                .ok_or_else(|| ApiError::not_found("Comment not found"))?;
            if comments[pos].created_by.id != user.id {
                return Err(ApiError::Forbidden(
                    "Only the author can delete this comment".to_string(),
                ));
            }
            comments.remove(pos);
            Ok(())
        })
        .await?;

    log::info!("comment {comment_id} on issue {issue_id} deleted by {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
