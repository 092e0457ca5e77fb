use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// === Issues ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Open,
        Status::InProgress,
        Status::Resolved,
        Status::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "OPEN",
            Status::InProgress => "IN_PROGRESS",
            Status::Resolved => "RESOLVED",
            Status::Closed => "CLOSED",
        }
    }

    pub fn parse(raw: &str) -> Option<Status> {
        Status::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Resolved and closed issues count as done for workload and resolver stats.
    pub fn is_done(self) -> bool {
        matches!(self, Status::Resolved | Status::Closed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    pub fn parse(raw: &str) -> Option<Priority> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity copied into an issue when it is reported or assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub issue_type: String,
    pub created_by: Person,
    #[serde(default)]
    pub assigned_to: Option<Person>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Issue {
    /// Applies a status change, stamping `resolved_at` the first time the
    /// issue enters RESOLVED. An existing stamp is never overwritten.
    pub fn set_status(&mut self, status: Status, now: DateTime<Utc>) {
        if status == Status::Resolved && self.status != Status::Resolved && self.resolved_at.is_none()
        {
            self.resolved_at = Some(now);
        }
        self.status = status;
    }

    pub fn apply_update(&mut self, update: UpdateIssue, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description.filter(|d| !d.is_empty()) {
            self.description = description;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(department) = update.department.filter(|d| !d.is_empty()) {
            self.department = department;
        }
        if let Some(issue_type) = update.issue_type.filter(|t| !t.is_empty()) {
            self.issue_type = issue_type;
        }
        if let Some(solution) = update.solution {
            self.solution = solution;
        }
        if let Some(status) = update.status {
            self.set_status(status, now);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub department: Option<String>,
    pub issue_type: Option<String>,
    pub created_by_id: Option<String>,
    pub assigned_to_id: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub department: Option<String>,
    pub issue_type: Option<String>,
    /// `None` leaves the solution alone, `Some(None)` clears it.
    #[serde(default, deserialize_with = "present")]
    pub solution: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPayload {
    #[serde(default)]
    pub assigned_to_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachPayload {
    #[serde(default)]
    pub attachments: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachQuery {
    pub file_url: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// === Comments ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub issue_id: String,
    pub content: String,
    pub created_by: CommentAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    pub content: Option<String>,
}

// === Users ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Worker,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Worker => "WORKER",
            Role::User => "USER",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        [Role::Admin, Role::Manager, Role::Worker, Role::User]
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Roles allowed to resolve issues and manage lookup data.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login account as persisted in `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    #[serde(default)]
    pub company_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// What the API returns for a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    pub company_id: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            department: self.department.clone(),
            company_id: self.company_id.clone(),
            created_at: self.created_at,
        }
    }

    pub fn snapshot(&self) -> Person {
        Person {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            company_id: Some(self.company_id.clone()).filter(|c| !c.is_empty()),
            department: Some(self.department.clone()).filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub company_id: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
    pub department: Option<String>,
    pub search: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromotePayload {
    pub role: Option<String>,
}

// === Settings ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityOption {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentOption {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTypeOption {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// Factory employee in the worker registry; may report issues without a login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub company_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub department: String,
    pub role: Role,
}

impl Worker {
    pub fn snapshot(&self) -> Person {
        Person {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            company_id: Some(self.company_id.clone()),
            department: Some(self.department.clone()).filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub priorities: Vec<PriorityOption>,
    #[serde(default)]
    pub departments: Vec<DepartmentOption>,
    #[serde(default)]
    pub workers: Vec<Worker>,
    #[serde(default)]
    pub issue_types: Vec<IssueTypeOption>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceSettings {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub items: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertSetting {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub item: Option<serde_json::Value>,
}

// === Filter presets ===

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub filter: IssueFilter,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PresetPayload {
    pub name: Option<String>,
    pub filter: Option<IssueFilter>,
}

// === Notifications ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub issue_id: String,
    pub issue_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    #[serde(default)]
    pub notification_ids: Vec<String>,
}

// === Dashboard settings ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutItem {
    pub i: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSetting {
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSettings {
    pub layout: Vec<LayoutItem>,
    pub widgets: BTreeMap<String, WidgetSetting>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardSettingsPayload {
    pub layout: Option<Vec<LayoutItem>>,
    pub widgets: Option<BTreeMap<String, WidgetSetting>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issue() -> Issue {
        let now = Utc::now();
        Issue {
            id: "issue-1".into(),
            title: "Belt jam".into(),
            description: String::new(),
            status: Status::Open,
            priority: Priority::High,
            department: "생산".into(),
            issue_type: "설비 문제".into(),
            created_by: Person {
                id: "worker-1".into(),
                name: "Kim".into(),
                email: "kim@example.com".into(),
                company_id: Some("EMP001".into()),
                department: None,
            },
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            solution: None,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn resolving_stamps_resolved_at_once() {
        let mut issue = issue();
        let first = issue.created_at + Duration::hours(2);
        issue.set_status(Status::Resolved, first);
        assert_eq!(issue.resolved_at, Some(first));

        issue.set_status(Status::InProgress, first + Duration::hours(1));
        issue.set_status(Status::Resolved, first + Duration::hours(3));
        assert_eq!(issue.resolved_at, Some(first));
        assert_eq!(issue.status, Status::Resolved);
    }

    #[test]
    fn any_status_can_follow_any_other() {
        let mut issue = issue();
        let now = Utc::now();
        issue.set_status(Status::Closed, now);
        issue.set_status(Status::Open, now);
        assert_eq!(issue.status, Status::Open);
        assert!(issue.resolved_at.is_none());
    }

    #[test]
    fn update_distinguishes_missing_and_null_solution() {
        let mut issue = issue();
        issue.solution = Some("replaced belt".into());

        let keep: UpdateIssue = serde_json::from_str(r#"{"title":"Belt jam"}"#).unwrap();
        issue.apply_update(keep, Utc::now());
        assert_eq!(issue.solution.as_deref(), Some("replaced belt"));

        let clear: UpdateIssue =
            serde_json::from_str(r#"{"title":"Belt jam","solution":null}"#).unwrap();
        issue.apply_update(clear, Utc::now());
        assert_eq!(issue.solution, None);
    }

    #[test]
    fn status_and_priority_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(Priority::parse("critical"), Some(Priority::Critical));
        assert!(Priority::Low < Priority::Critical);
        assert_eq!(Role::parse("user"), Some(Role::User));
    }

    #[test]
    fn public_user_hides_password_hash() {
        let user = User {
            id: "1".into(),
            name: "Admin".into(),
            email: "admin@example.com".into(),
            role: Role::Admin,
            department: "IT".into(),
            company_id: "ADMIN-001".into(),
            created_at: Utc::now(),
            password_hash: Some("secret".into()),
        };
        let json = serde_json::to_value(user.public()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["companyId"], "ADMIN-001");
    }
}
