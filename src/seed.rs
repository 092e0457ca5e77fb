//! Initial contents for data files that do not exist yet.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;

use crate::auth::hash_password;
use crate::models::{
    DashboardSettings, DepartmentOption, FilterPreset, IssueFilter, IssueTypeOption, LayoutItem,
    Priority, PriorityOption, Role, Settings, Status, User, WidgetSetting, Worker,
};

pub static SETTINGS: Lazy<Settings> = Lazy::new(|| Settings {
    priorities: vec![
        priority("priority-1", "낮음", Priority::Low, "gray"),
        priority("priority-2", "중간", Priority::Medium, "blue"),
        priority("priority-3", "높음", Priority::High, "orange"),
        priority("priority-4", "긴급", Priority::Critical, "red"),
    ],
    departments: ["생산", "품질", "유지보수", "안전"]
        .into_iter()
        .enumerate()
        .map(|(n, name)| DepartmentOption {
            id: format!("dept-{}", n + 1),
            name: name.to_string(),
            value: name.to_string(),
        })
        .collect(),
    workers: vec![
        worker("worker-1", "김작업자", "EMP001", "생산", Role::Worker),
        worker("worker-2", "이엔지니어", "EMP002", "품질", Role::Worker),
        worker("worker-3", "박기술자", "EMP003", "유지보수", Role::Worker),
        worker("worker-4", "최관리자", "EMP004", "안전", Role::Manager),
        worker("worker-5", "정감독관", "EMP005", "생산", Role::Manager),
    ],
    issue_types: vec![
        issue_type("issuetype-1", "설비 문제", "기계 및 설비 관련 문제"),
        issue_type("issuetype-2", "원자재 문제", "원자재 품질 또는 공급 관련 문제"),
        issue_type("issuetype-3", "작업자 문제", "작업자 실수 또는 교육 관련 문제"),
        issue_type("issuetype-4", "지그 문제", "지그 또는 공구 관련 문제"),
    ],
});

pub static DASHBOARD_LAYOUT: Lazy<DashboardSettings> = Lazy::new(|| {
    let cells = [
        ("stats", 0, 0, 12, 1),
        ("statusChart", 0, 1, 4, 2),
        ("priorityChart", 4, 1, 4, 2),
        ("trendChart", 8, 1, 4, 2),
        ("departmentStats", 0, 3, 6, 2),
        ("recentResolved", 6, 3, 6, 2),
        ("issuesByCreator", 0, 5, 4, 2),
        ("issuesBySolver", 4, 5, 4, 2),
        ("resolutionTimeByDepartment", 8, 5, 4, 2),
    ];
    DashboardSettings {
        layout: cells
            .iter()
            .map(|&(i, x, y, w, h)| LayoutItem {
                i: i.to_string(),
                x,
                y,
                w,
                h,
            })
            .collect(),
        widgets: cells
            .iter()
            .map(|&(i, ..)| (i.to_string(), WidgetSetting { visible: true }))
            .collect::<BTreeMap<_, _>>(),
    }
});

pub fn users(salt: &str) -> Vec<User> {
    let now = Utc::now();
    let account = |id: &str, name: &str, email: &str, role: Role, dept: &str, company: &str, pw: &str| User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        department: dept.to_string(),
        company_id: company.to_string(),
        created_at: now,
        password_hash: Some(hash_password(salt, pw)),
    };

    vec![
        account("1", "관리자", "admin@example.com", Role::Admin, "시스템관리", "ADMIN-001", "admin123"),
        account("2", "매니저", "manager@example.com", Role::Manager, "운영", "MGR-001", "manager123"),
        account("3", "사용자1", "user1@example.com", Role::User, "생산", "USR-001", "user123"),
        account("4", "사용자2", "user2@example.com", Role::User, "품질", "USR-002", "user123"),
    ]
}

pub fn presets() -> Vec<FilterPreset> {
    let now = Utc::now();
    let preset = |id: &str, name: &str, filter: IssueFilter, days_ago: i64| FilterPreset {
        id: id.to_string(),
        name: name.to_string(),
        filter,
        created_at: now - Duration::days(days_ago),
        updated_at: None,
    };

    vec![
        preset(
            "preset-1",
            "해결되지 않은 이슈",
            IssueFilter {
                status: Some(Status::Open),
                ..IssueFilter::default()
            },
            10,
        ),
        preset(
            "preset-2",
            "긴급 이슈",
            IssueFilter {
                priority: Some(Priority::Critical),
                ..IssueFilter::default()
            },
            5,
        ),
        preset(
            "preset-3",
            "생산부 이슈",
            IssueFilter {
                department: Some("생산".to_string()),
                ..IssueFilter::default()
            },
            2,
        ),
    ]
}

fn priority(id: &str, name: &str, value: Priority, color: &str) -> PriorityOption {
    PriorityOption {
        id: id.to_string(),
        name: name.to_string(),
        value: value.as_str().to_string(),
        color: color.to_string(),
    }
}

fn worker(id: &str, name: &str, company_id: &str, department: &str, role: Role) -> Worker {
    Worker {
        id: id.to_string(),
        name: name.to_string(),
        company_id: company_id.to_string(),
        email: format!("{id}@example.com"),
        department: department.to_string(),
        role,
    }
}

fn issue_type(id: &str, name: &str, description: &str) -> IssueTypeOption {
    IssueTypeOption {
        id: id.to_string(),
        name: name.to_string(),
        value: name.to_string(),
        description: description.to_string(),
    }
}
