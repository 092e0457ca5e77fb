//! Dashboard aggregation over the issue collection.
//!
//! Everything here is a pure function of the issues, the people lists and
//! `now`; nothing is cached between requests.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Issue, Person, Priority, Status, User, Worker};

pub const HISTOGRAM_DAYS: i64 = 14;
const TOP_N: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub month: Option<String>,
}

/// Half-open creation-time window `[from, until)`; `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.until.is_none_or(|until| at < until)
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn parse_day(raw: &str, what: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("{what} must be formatted as YYYY-MM-DD")))
}

impl TryFrom<StatsQuery> for DateRange {
    type Error = ApiError;

    /// `month` (YYYY-MM) takes precedence over `startDate`/`endDate`, both of
    /// which are inclusive calendar days.
    fn try_from(query: StatsQuery) -> Result<Self, Self::Error> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(month) = non_empty(query.month) {
            let first = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("month must be formatted as YYYY-MM"))?;
            let next = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
            }
            .ok_or_else(|| ApiError::bad_request("month is out of range"))?;
            return Ok(DateRange {
                from: Some(midnight(first)),
                until: Some(midnight(next)),
            });
        }

        let from = non_empty(query.start_date)
            .map(|d| parse_day(&d, "startDate"))
            .transpose()?
            .map(midnight);
        let until = non_empty(query.end_date)
            .map(|d| parse_day(&d, "endDate"))
            .transpose()?
            .map(|d| midnight(d) + Duration::days(1));

        if let (Some(from), Some(until)) = (from, until) {
            if from >= until {
                return Err(ApiError::bad_request("startDate must not be after endDate"));
            }
        }
        Ok(DateRange { from, until })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPerson {
    pub id: String,
    pub name: String,
    pub department: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub department: String,
    pub assigned_count: usize,
    pub resolved_count: usize,
    pub pending_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub department: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_issues: usize,
    pub open_issues: usize,
    pub in_progress_issues: usize,
    pub resolved_issues: usize,
    pub closed_issues: usize,
    pub critical_issues: usize,
    pub issues_by_status: BTreeMap<String, usize>,
    pub issues_by_priority: BTreeMap<String, usize>,
    pub issues_by_department: BTreeMap<String, usize>,
    pub issues_by_issue_type: BTreeMap<String, usize>,
    pub issues_by_day: BTreeMap<String, usize>,
    pub top_reporters: Vec<RankedPerson>,
    pub top_resolvers: Vec<RankedPerson>,
    pub average_resolution_time: f64,
    pub manager_workload: Vec<Workload>,
    pub recent_important_issues: Vec<IssueSummary>,
}

pub fn compute_stats(
    issues: &[Issue],
    users: &[User],
    workers: &[Worker],
    range: DateRange,
    now: DateTime<Utc>,
) -> DashboardStats {
    let issues: Vec<&Issue> = issues
        .iter()
        .filter(|issue| range.contains(issue.created_at))
        .collect();
    let total = issues.len();
    let count_status = |s: Status| issues.iter().filter(|i| i.status == s).count();

    let mut by_status: BTreeMap<String, usize> = Status::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut by_priority: BTreeMap<String, usize> = Priority::ALL
        .iter()
        .map(|p| (p.as_str().to_string(), 0))
        .collect();
    let mut by_department = BTreeMap::new();
    let mut by_issue_type = BTreeMap::new();
    for issue in &issues {
        *by_status.entry(issue.status.as_str().to_string()).or_default() += 1;
        *by_priority.entry(issue.priority.as_str().to_string()).or_default() += 1;
        *by_department.entry(label(&issue.department)).or_default() += 1;
        *by_issue_type.entry(label(&issue.issue_type)).or_default() += 1;
    }

    let resolved_by: Vec<&Person> = issues
        .iter()
        .filter(|i| i.status.is_done())
        .filter_map(|i| i.assigned_to.as_ref())
        .collect();

    DashboardStats {
        total_issues: total,
        open_issues: count_status(Status::Open),
        in_progress_issues: count_status(Status::InProgress),
        resolved_issues: count_status(Status::Resolved),
        closed_issues: count_status(Status::Closed),
        critical_issues: issues
            .iter()
            .filter(|i| i.priority == Priority::Critical)
            .count(),
        issues_by_status: by_status,
        issues_by_priority: by_priority,
        issues_by_department: by_department,
        issues_by_issue_type: by_issue_type,
        issues_by_day: daily_histogram(&issues, now),
        top_reporters: rank(issues.iter().map(|i| &i.created_by), total),
        top_resolvers: rank(resolved_by.iter().copied(), resolved_by.len()),
        average_resolution_time: average_resolution_hours(&issues),
        manager_workload: manager_workload(&issues, users, workers),
        recent_important_issues: recent_important(&issues),
    }
}

fn label(value: &str) -> String {
    if value.trim().is_empty() {
        "미지정".to_string()
    } else {
        value.to_string()
    }
}

/// Counts per calendar day (UTC) for the 14 days ending on `now`, zero-filled.
pub fn daily_histogram(issues: &[&Issue], now: DateTime<Utc>) -> BTreeMap<String, usize> {
    let today = now.date_naive();
    let mut days: BTreeMap<NaiveDate, usize> = (0..HISTOGRAM_DAYS)
        .map(|back| (today - Duration::days(back), 0))
        .collect();
    for issue in issues {
        if let Some(count) = days.get_mut(&issue.created_at.date_naive()) {
            *count += 1;
        }
    }
    days.into_iter()
        .map(|(day, count)| (day.format("%Y-%m-%d").to_string(), count))
        .collect()
}

fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((count as f64 / total as f64) * 100.0).round() as u32
    }
}

fn rank<'a>(people: impl Iterator<Item = &'a Person>, total: usize) -> Vec<RankedPerson> {
    let mut counts: HashMap<&str, (&Person, usize)> = HashMap::new();
    for person in people {
        counts.entry(person.id.as_str()).or_insert((person, 0)).1 += 1;
    }

    let mut ranked: Vec<RankedPerson> = counts
        .into_values()
        .map(|(person, count)| RankedPerson {
            id: person.id.clone(),
            name: person.name.clone(),
            department: person.department.clone().unwrap_or_default(),
            count,
            percentage: percentage(count, total),
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_N);
    ranked
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean hours between creation and resolution over issues that have a
/// `resolvedAt` stamp.
pub fn average_resolution_hours(issues: &[&Issue]) -> f64 {
    let durations: Vec<f64> = issues
        .iter()
        .filter(|i| i.status.is_done())
        .filter_map(|i| i.resolved_at.map(|at| (at - i.created_at).num_seconds() as f64 / 3600.0))
        .collect();
    if durations.is_empty() {
        return 0.0;
    }
    round1(durations.iter().sum::<f64>() / durations.len() as f64)
}

fn manager_workload(issues: &[&Issue], users: &[User], workers: &[Worker]) -> Vec<Workload> {
    let mut seen = HashSet::new();
    let managers = users
        .iter()
        .filter(|u| u.role.is_staff())
        .map(|u| (u.id.as_str(), u.name.as_str(), u.department.as_str()))
        .chain(
            workers
                .iter()
                .filter(|w| w.role.is_staff())
                .map(|w| (w.id.as_str(), w.name.as_str(), w.department.as_str())),
        )
        .filter(|(id, ..)| seen.insert(*id));

    let mut workload: Vec<Workload> = managers
        .map(|(id, name, department)| {
            let assigned: Vec<&&Issue> = issues
                .iter()
                .filter(|i| i.assigned_to.as_ref().is_some_and(|p| p.id == id))
                .collect();
            let resolved = assigned.iter().filter(|i| i.status.is_done()).count();
            Workload {
                id: id.to_string(),
                name: name.to_string(),
                department: department.to_string(),
                assigned_count: assigned.len(),
                resolved_count: resolved,
                pending_count: assigned.len() - resolved,
            }
        })
        .collect();
    workload.sort_by(|a, b| {
        b.assigned_count
            .cmp(&a.assigned_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    workload
}

fn recent_important(issues: &[&Issue]) -> Vec<IssueSummary> {
    let mut important: Vec<&&Issue> = issues
        .iter()
        .filter(|i| !i.status.is_done() && i.priority >= Priority::High)
        .collect();
    important.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    important
        .into_iter()
        .take(TOP_N)
        .map(|i| IssueSummary {
            id: i.id.clone(),
            title: i.title.clone(),
            priority: i.priority,
            department: i.department.clone(),
            status: i.status,
            created_at: i.created_at,
        })
        .collect()
}

// === Overview ===

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentStat {
    pub department: String,
    pub total_count: usize,
    pub resolved_count: usize,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSummary {
    pub id: String,
    pub title: String,
    pub resolved_at: DateTime<Utc>,
    pub solver: Option<Person>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub total_issues: usize,
    pub resolved_issues: usize,
    pub critical_issues: usize,
    pub department_stats: Vec<DepartmentStat>,
    pub recent_resolved: Vec<ResolvedSummary>,
    pub average_resolution_time: f64,
    pub weekly_change: f64,
}

pub fn compute_overview(issues: &[Issue], now: DateTime<Utc>) -> DashboardOverview {
    let all: Vec<&Issue> = issues.iter().collect();

    let mut departments: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for issue in &all {
        let entry = departments.entry(label(&issue.department)).or_default();
        entry.0 += 1;
        if issue.status.is_done() {
            entry.1 += 1;
        }
    }

    // a reopened issue keeps its stamp but no longer counts as resolved
    let mut resolved: Vec<&Issue> = all
        .iter()
        .copied()
        .filter(|i| i.status.is_done() && i.resolved_at.is_some())
        .collect();
    resolved.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));

    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);
    let this_week = all
        .iter()
        .filter(|i| i.created_at > week_ago && i.created_at <= now)
        .count();
    let last_week = all
        .iter()
        .filter(|i| i.created_at > two_weeks_ago && i.created_at <= week_ago)
        .count();

    DashboardOverview {
        total_issues: all.len(),
        resolved_issues: all.iter().filter(|i| i.status.is_done()).count(),
        critical_issues: all
            .iter()
            .filter(|i| i.priority == Priority::Critical)
            .count(),
        department_stats: departments
            .into_iter()
            .map(|(department, (total, done))| DepartmentStat {
                department,
                total_count: total,
                resolved_count: done,
                resolution_rate: round1(done as f64 * 100.0 / total as f64),
            })
            .collect(),
        recent_resolved: resolved
            .into_iter()
            .take(TOP_N)
            .filter_map(|i| {
                Some(ResolvedSummary {
                    id: i.id.clone(),
                    title: i.title.clone(),
                    resolved_at: i.resolved_at?,
                    solver: i.assigned_to.clone(),
                })
            })
            .collect(),
        average_resolution_time: average_resolution_hours(&all),
        weekly_change: weekly_change(this_week, last_week),
    }
}

fn weekly_change(this_week: usize, last_week: usize) -> f64 {
    match (this_week, last_week) {
        (0, 0) => 0.0,
        (_, 0) => 100.0,
        (now, before) => round1((now as f64 - before as f64) * 100.0 / before as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn person(id: &str, name: &str) -> Person {
        Person {
            id: id.into(),
            name: name.into(),
            email: format!("{id}@example.com"),
            company_id: None,
            department: Some("생산".into()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn issue(
        id: &str,
        days_ago: i64,
        status: Status,
        priority: Priority,
        dept: &str,
        reporter: &str,
        assignee: Option<&str>,
    ) -> Issue {
        let created = now() - Duration::days(days_ago);
        Issue {
            id: id.into(),
            title: format!("title {id}"),
            description: String::new(),
            status,
            priority,
            department: dept.into(),
            issue_type: "설비 문제".into(),
            created_by: person(reporter, reporter),
            assigned_to: assignee.map(|a| person(a, a)),
            created_at: created,
            updated_at: created,
            resolved_at: status.is_done().then(|| created + Duration::hours(10)),
            solution: None,
            attachments: Vec::new(),
        }
    }

    fn sample() -> Vec<Issue> {
        vec![
            issue("1", 0, Status::Open, Priority::Critical, "생산", "kim", None),
            issue("2", 1, Status::Resolved, Priority::High, "생산", "kim", Some("choi")),
            issue("3", 2, Status::Closed, Priority::Low, "품질", "lee", Some("choi")),
            issue("4", 3, Status::InProgress, Priority::High, "품질", "park", Some("jung")),
            issue("5", 20, Status::Resolved, Priority::Medium, "", "kim", Some("jung")),
            issue("6", 40, Status::Open, Priority::Medium, "안전", "lee", None),
        ]
    }

    fn workers() -> Vec<Worker> {
        vec![
            Worker {
                id: "choi".into(),
                name: "choi".into(),
                company_id: "EMP004".into(),
                email: String::new(),
                department: "안전".into(),
                role: Role::Manager,
            },
            Worker {
                id: "jung".into(),
                name: "jung".into(),
                company_id: "EMP005".into(),
                email: String::new(),
                department: "생산".into(),
                role: Role::Manager,
            },
            Worker {
                id: "kim".into(),
                name: "kim".into(),
                company_id: "EMP001".into(),
                email: String::new(),
                department: "생산".into(),
                role: Role::Worker,
            },
        ]
    }

    #[test]
    fn grouped_counts_sum_to_total() {
        let stats = compute_stats(&sample(), &[], &workers(), DateRange::default(), now());
        assert_eq!(stats.total_issues, 6);
        assert_eq!(stats.issues_by_priority.values().sum::<usize>(), 6);
        assert_eq!(stats.issues_by_department.values().sum::<usize>(), 6);
        assert_eq!(stats.issues_by_status.values().sum::<usize>(), 6);
        assert_eq!(stats.issues_by_department["미지정"], 1);
        assert_eq!(stats.issues_by_priority["CRITICAL"], 1);
        assert_eq!(stats.critical_issues, 1);
        assert_eq!(stats.open_issues, 2);
    }

    #[test]
    fn histogram_has_fourteen_zero_filled_days() {
        let stats = compute_stats(&sample(), &[], &[], DateRange::default(), now());
        assert_eq!(stats.issues_by_day.len(), 14);
        assert_eq!(stats.issues_by_day["2024-03-20"], 1);
        assert_eq!(stats.issues_by_day["2024-03-17"], 1);
        assert_eq!(stats.issues_by_day["2024-03-07"], 0);
        assert!(!stats.issues_by_day.contains_key("2024-03-06"));
        assert_eq!(stats.issues_by_day.values().sum::<usize>(), 4);
    }

    #[test]
    fn reporters_and_resolvers_are_ranked() {
        let stats = compute_stats(&sample(), &[], &workers(), DateRange::default(), now());
        assert_eq!(stats.top_reporters[0].id, "kim");
        assert_eq!(stats.top_reporters[0].count, 3);
        assert_eq!(stats.top_reporters[0].percentage, 50);

        let resolvers: Vec<_> = stats
            .top_resolvers
            .iter()
            .map(|r| (r.id.as_str(), r.count, r.percentage))
            .collect();
        assert_eq!(resolvers, vec![("choi", 2, 67), ("jung", 1, 33)]);
    }

    #[test]
    fn resolution_time_and_workload() {
        let stats = compute_stats(&sample(), &[], &workers(), DateRange::default(), now());
        assert_eq!(stats.average_resolution_time, 10.0);

        assert_eq!(stats.manager_workload.len(), 2);
        let choi = &stats.manager_workload[0];
        assert_eq!((choi.assigned_count, choi.resolved_count, choi.pending_count), (2, 2, 0));
        let jung = &stats.manager_workload[1];
        assert_eq!((jung.assigned_count, jung.resolved_count, jung.pending_count), (2, 1, 1));
    }

    #[test]
    fn important_issues_are_open_and_severe() {
        let stats = compute_stats(&sample(), &[], &[], DateRange::default(), now());
        let ids: Vec<_> = stats
            .recent_important_issues
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn date_range_filters_by_creation() {
        let range = DateRange::try_from(StatsQuery {
            start_date: Some("2024-03-17".into()),
            end_date: Some("2024-03-19".into()),
            month: None,
        })
        .unwrap();
        let stats = compute_stats(&sample(), &[], &[], range, now());
        assert_eq!(stats.total_issues, 3);

        let february = DateRange::try_from(StatsQuery {
            month: Some("2024-02".into()),
            ..StatsQuery::default()
        })
        .unwrap();
        let stats = compute_stats(&sample(), &[], &[], february, now());
        assert_eq!(stats.total_issues, 2);
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(
            DateRange::try_from(StatsQuery {
                start_date: Some("03/01/2024".into()),
                ..StatsQuery::default()
            })
            .is_err()
        );
        assert!(
            DateRange::try_from(StatsQuery {
                start_date: Some("2024-03-10".into()),
                end_date: Some("2024-03-01".into()),
                month: None,
            })
            .is_err()
        );
    }

    #[test]
    fn empty_collection_is_all_zero() {
        let stats = compute_stats(&[], &[], &[], DateRange::default(), now());
        assert_eq!(stats.total_issues, 0);
        assert_eq!(stats.average_resolution_time, 0.0);
        assert!(stats.top_reporters.is_empty());
        assert_eq!(stats.issues_by_priority.len(), 4);
    }

    #[test]
    fn overview_reports_rates_and_weekly_change() {
        let overview = compute_overview(&sample(), now());
        assert_eq!(overview.total_issues, 6);
        assert_eq!(overview.resolved_issues, 3);
        let production = overview
            .department_stats
            .iter()
            .find(|d| d.department == "생산")
            .unwrap();
        assert_eq!(production.resolution_rate, 50.0);
        assert_eq!(overview.recent_resolved[0].id, "2");
        // four issues this week, none the week before
        assert_eq!(overview.weekly_change, 100.0);
        assert_eq!(weekly_change(3, 2), 50.0);
    }

    #[test]
    fn reopened_issues_are_not_counted_as_resolved() {
        let mut issues = sample();
        let mut reopened = issue("7", 4, Status::Open, Priority::High, "생산", "kim", Some("choi"));
        reopened.resolved_at = Some(reopened.created_at + Duration::hours(95));
        issues.push(reopened);

        let stats = compute_stats(&issues, &[], &[], DateRange::default(), now());
        assert_eq!(stats.average_resolution_time, 10.0);

        let overview = compute_overview(&issues, now());
        assert_eq!(overview.resolved_issues, 3);
        assert_eq!(overview.average_resolution_time, 10.0);
        assert_eq!(overview.recent_resolved[0].id, "2");
        assert!(overview.recent_resolved.iter().all(|r| r.id != "7"));
    }
}
