use actix_web::web;

use crate::error::ApiError;

mod attachments;
mod auth;
mod comments;
mod dashboard;
mod issues;
mod notifications;
mod presets;
mod settings;
mod upload;
mod users;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(format!("Invalid JSON body: {err}")).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(format!("Invalid query string: {err}")).into()),
    )
    .configure(issues::config)
    .configure(comments::config)
    .configure(attachments::config)
    .configure(upload::config)
    .configure(users::config)
    .configure(settings::config)
    .configure(presets::config)
    .configure(notifications::config)
    .configure(dashboard::config)
    .configure(auth::config);
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
