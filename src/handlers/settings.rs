use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::non_blank;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    DepartmentOption, IssueTypeOption, PriorityOption, ReplaceSettings, Settings, SettingsQuery,
    UpsertSetting, Worker,
};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/settings")
            .route(web::get().to(get_settings))
            .route(web::post().to(replace_collection))
            .route(web::put().to(upsert_item))
            .route(web::delete().to(delete_item)),
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsKind {
    Priorities,
    Departments,
    Workers,
    IssueTypes,
}

impl SettingsKind {
    pub fn parse(raw: &str) -> Option<SettingsKind> {
        Some(match raw {
            "priorities" => SettingsKind::Priorities,
            "departments" => SettingsKind::Departments,
            "workers" => SettingsKind::Workers,
            "issueTypes" => SettingsKind::IssueTypes,
            _ => return None,
        })
    }

    pub fn key(self) -> &'static str {
        match self {
            SettingsKind::Priorities => "priorities",
            SettingsKind::Departments => "departments",
            SettingsKind::Workers => "workers",
            SettingsKind::IssueTypes => "issueTypes",
        }
    }

    fn id_prefix(self) -> &'static str {
        match self {
            SettingsKind::Priorities => "priority",
            SettingsKind::Departments => "dept",
            SettingsKind::Workers => "worker",
            SettingsKind::IssueTypes => "issuetype",
        }
    }

    fn required(raw: Option<&str>) -> ApiResult<SettingsKind> {
        let raw = non_blank(raw).ok_or_else(|| ApiError::bad_request("type is required"))?;
        SettingsKind::parse(raw)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown settings type: {raw}")))
    }
}

/// An entry of one of the settings collections.
trait SettingItem: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

macro_rules! setting_item {
    ($($ty:ty),*) => {
        $(impl SettingItem for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        })*
    };
}

setting_item!(PriorityOption, DepartmentOption, IssueTypeOption, Worker);

pub enum Change {
    Replace(Value),
    Upsert(Value),
    Remove(String),
}

fn decode<T: DeserializeOwned>(value: Value, kind: SettingsKind) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::bad_request(format!("Invalid {} entry: {err}", kind.key())))
}

fn new_id(kind: SettingsKind) -> String {
    format!("{}-{}", kind.id_prefix(), Uuid::new_v4())
}

impl Change {
    fn apply_to<T: SettingItem>(self, items: &mut Vec<T>, kind: SettingsKind) -> ApiResult<()> {
        match self {
            Change::Replace(value) => {
                if !value.is_array() {
                    return Err(ApiError::bad_request("items must be an array"));
                }
                let mut replaced: Vec<T> = decode(value, kind)?;
                for item in replaced.iter_mut().filter(|i| i.id().is_empty()) {
                    item.set_id(new_id(kind));
                }
                *items = replaced;
            }
            Change::Upsert(value) => {
                if !value.is_object() {
                    return Err(ApiError::bad_request("item must be an object"));
                }
                let mut item: T = decode(value, kind)?;
                if item.id().is_empty() {
                    item.set_id(new_id(kind));
                    items.push(item);
                } else {
                    let slot = items
                        .iter_mut()
                        .find(|existing| existing.id() == item.id())
                        .ok_or_else(|| {
                            ApiError::not_found(format!("No {} entry {}", kind.key(), item.id()))
                        })?;
                    *slot = item;
                }
            }
            Change::Remove(id) => {
                let pos = items
                    .iter()
                    .position(|existing| existing.id() == id)
                    .ok_or_else(|| ApiError::not_found(format!("No {} entry {id}", kind.key())))?;
                items.remove(pos);
            }
        }
        Ok(())
    }
}

fn ensure_unique_company_ids(workers: &[Worker]) -> ApiResult<()> {
    let mut seen = HashSet::new();
    match workers.iter().find(|w| !seen.insert(w.company_id.as_str())) {
        Some(dup) => Err(ApiError::rejected(
            "Duplicate company ID",
            format!("Company ID {} is already registered to another worker", dup.company_id),
        )),
        None => Ok(()),
    }
}

/// Applies `change` to the collection named by `kind`. Worker collections
/// must keep company IDs unique and stay sorted by them.
pub fn apply(settings: &mut Settings, kind: SettingsKind, change: Change) -> ApiResult<()> {
    match kind {
        SettingsKind::Priorities => change.apply_to(&mut settings.priorities, kind),
        SettingsKind::Departments => change.apply_to(&mut settings.departments, kind),
        SettingsKind::IssueTypes => change.apply_to(&mut settings.issue_types, kind),
        SettingsKind::Workers => {
            change.apply_to(&mut settings.workers, kind)?;
            ensure_unique_company_ids(&settings.workers)?;
            settings.workers.sort_by(|a, b| a.company_id.cmp(&b.company_id));
            Ok(())
        }
    }
}

fn collection(settings: &Settings, kind: SettingsKind) -> ApiResult<Value> {
    let value = match kind {
        SettingsKind::Priorities => serde_json::to_value(&settings.priorities),
        SettingsKind::Departments => serde_json::to_value(&settings.departments),
        SettingsKind::Workers => serde_json::to_value(&settings.workers),
        SettingsKind::IssueTypes => serde_json::to_value(&settings.issue_types),
    };
    value.map_err(|err| ApiError::Internal(format!("failed to encode settings: {err}")))
}

async fn mutate(state: &AppState, kind: SettingsKind, change: Change) -> ApiResult<HttpResponse> {
    let items = state
        .store
        .settings
        .update(|settings| {
            apply(settings, kind, change)?;
            collection(settings, kind)
        })
        .await?;

    log::info!("settings collection {} updated", kind.key());
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(kind.key().to_string(), items);
    Ok(HttpResponse::Ok().json(body))
}

// === GET /api/settings?type= ===
async fn get_settings(
    state: web::Data<AppState>,
    query: web::Query<SettingsQuery>,
) -> ApiResult<HttpResponse> {
    let settings = state.store.settings.read().await?;
    match non_blank(query.kind.as_deref()) {
        None => Ok(HttpResponse::Ok().json(settings)),
        Some(raw) => {
            let kind = SettingsKind::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown settings type: {raw}")))?;
            Ok(HttpResponse::Ok().json(collection(&settings, kind)?))
        }
    }
}

// === POST /api/settings ===
async fn replace_collection(
    state: web::Data<AppState>,
    payload: web::Json<ReplaceSettings>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let kind = SettingsKind::required(payload.kind.as_deref())?;
    let items = payload
        .items
        .ok_or_else(|| ApiError::bad_request("items is required"))?;
    mutate(&state, kind, Change::Replace(items)).await
}

// === PUT /api/settings ===
async fn upsert_item(
    state: web::Data<AppState>,
    payload: web::Json<UpsertSetting>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let kind = SettingsKind::required(payload.kind.as_deref())?;
    let item = payload
        .item
        .ok_or_else(|| ApiError::bad_request("item is required"))?;
    mutate(&state, kind, Change::Upsert(item)).await
}

// === DELETE /api/settings?type=&id= ===
async fn delete_item(
    state: web::Data<AppState>,
    query: web::Query<SettingsQuery>,
) -> ApiResult<HttpResponse> {
    let kind = SettingsKind::required(query.kind.as_deref())?;
    let id = non_blank(query.id.as_deref())
        .ok_or_else(|| ApiError::bad_request("id is required"))?
        .to_string();
    mutate(&state, kind, Change::Remove(id)).await
}
