//! Issue list filtering, search parsing, sorting and pagination.
//!
//! All of it runs over the full in-memory collection on every request.

use std::cmp::{Ordering, Reverse};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Issue, IssueFilter, Priority, Status};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Raw list parameters. Filters are accepted both as `filter[status]` and as
/// a bare `status`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "filter[status]", alias = "status")]
    pub status: Option<String>,
    #[serde(rename = "filter[priority]", alias = "priority")]
    pub priority: Option<String>,
    #[serde(rename = "filter[department]", alias = "department")]
    pub department: Option<String>,
    #[serde(rename = "filter[assignedToId]", alias = "assignedToId")]
    pub assigned_to_id: Option<String>,
    #[serde(rename = "filter[createdById]", alias = "createdById")]
    pub created_by_id: Option<String>,
    #[serde(rename = "filter[issueType]", alias = "issueType")]
    pub issue_type: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "sort[field]", alias = "sortField")]
    pub sort_field: Option<String>,
    #[serde(rename = "sort[order]", alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    ResolvedAt,
    Title,
    Status,
    Priority,
    Department,
    IssueType,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<SortField> {
        Some(match raw {
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "resolvedAt" => SortField::ResolvedAt,
            "title" => SortField::Title,
            "status" => SortField::Status,
            "priority" => SortField::Priority,
            "department" => SortField::Department,
            "issueType" => SortField::IssueType,
            _ => return None,
        })
    }

    fn compare(self, a: &Issue, b: &Issue) -> Ordering {
        match self {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::ResolvedAt => a.resolved_at.cmp(&b.resolved_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Status => a.status.cmp(&b.status),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Department => a.department.cmp(&b.department),
            SortField::IssueType => a.issue_type.cmp(&b.issue_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueQuery {
    pub filter: IssueFilter,
    pub sort: Sort,
    pub page: usize,
    pub limit: usize,
}

impl Default for IssueQuery {
    fn default() -> Self {
        IssueQuery {
            filter: IssueFilter::default(),
            sort: Sort::default(),
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<ListQuery> for IssueQuery {
    type Error = ApiError;

    fn try_from(raw: ListQuery) -> Result<Self, Self::Error> {
        let status = match non_empty(raw.status) {
            Some(s) => Some(
                Status::parse(&s)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown status: {s}")))?,
            ),
            None => None,
        };
        let priority = match non_empty(raw.priority) {
            Some(p) => Some(
                Priority::parse(&p)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown priority: {p}")))?,
            ),
            None => None,
        };

        let field = match non_empty(raw.sort_field) {
            Some(f) => SortField::parse(&f)
                .ok_or_else(|| ApiError::bad_request(format!("Unsupported sort field: {f}")))?,
            None => SortField::CreatedAt,
        };
        let descending = match non_empty(raw.sort_order).as_deref() {
            None | Some("desc") => true,
            Some("asc") => false,
            Some(other) => {
                return Err(ApiError::bad_request(format!(
                    "Sort order must be asc or desc, got {other}"
                )));
            }
        };

        let page = non_empty(raw.page)
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|&p| p > 0)
            .unwrap_or(1);
        let limit = non_empty(raw.limit)
            .and_then(|l| l.parse::<usize>().ok())
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);

        Ok(IssueQuery {
            filter: IssueFilter {
                status,
                priority,
                department: non_empty(raw.department),
                assigned_to_id: non_empty(raw.assigned_to_id),
                created_by_id: non_empty(raw.created_by_id),
                issue_type: non_empty(raw.issue_type),
                search: non_empty(raw.search),
            },
            sort: Sort { field, descending },
            page,
            limit,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub pagination: Pagination,
}

pub fn list(issues: Vec<Issue>, query: &IssueQuery) -> IssuePage {
    let search = query
        .filter
        .search
        .as_deref()
        .map(parse_search)
        .unwrap_or_default();

    let mut matching: Vec<Issue> = issues
        .into_iter()
        .filter(|issue| matches_filter(issue, &query.filter) && search.matches(issue))
        .collect();

    let sort = query.sort;
    matching.sort_by(|a, b| {
        let ord = sort.field.compare(a, b);
        if sort.descending { ord.reverse() } else { ord }
    });

    let total = matching.len();
    let start = (query.page - 1).saturating_mul(query.limit);
    let issues = matching
        .into_iter()
        .skip(start)
        .take(query.limit)
        .collect();

    IssuePage {
        issues,
        pagination: Pagination {
            total,
            page: query.page,
            limit: query.limit,
            total_pages: total.div_ceil(query.limit),
        },
    }
}

pub fn matches_filter(issue: &Issue, filter: &IssueFilter) -> bool {
    filter.status.is_none_or(|s| issue.status == s)
        && filter.priority.is_none_or(|p| issue.priority == p)
        && filter
            .department
            .as_deref()
            .is_none_or(|d| issue.department == d)
        && filter
            .issue_type
            .as_deref()
            .is_none_or(|t| issue.issue_type == t)
        && filter
            .created_by_id
            .as_deref()
            .is_none_or(|id| issue.created_by.id == id)
        && filter.assigned_to_id.as_deref().is_none_or(|id| {
            issue
                .assigned_to
                .as_ref()
                .is_some_and(|person| person.id == id)
        })
}

// === Search syntax ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

const OPERATORS: [(&str, Op); 6] = [
    (">=", Op::Ge),
    ("<=", Op::Le),
    ("!=", Op::Ne),
    (":", Op::Eq),
    (">", Op::Gt),
    ("<", Op::Lt),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Status,
    Priority,
    Department,
    IssueType,
    CreatedAt,
    UpdatedAt,
    ResolvedAt,
}

impl SearchField {
    fn parse(raw: &str) -> Option<SearchField> {
        Some(match raw {
            "status" => SearchField::Status,
            "priority" => SearchField::Priority,
            "department" | "category" => SearchField::Department,
            "issueType" | "type" => SearchField::IssueType,
            "createdAt" => SearchField::CreatedAt,
            "updatedAt" => SearchField::UpdatedAt,
            "resolvedAt" => SearchField::ResolvedAt,
            _ => return None,
        })
    }

    fn is_date(self) -> bool {
        matches!(
            self,
            SearchField::CreatedAt | SearchField::UpdatedAt | SearchField::ResolvedAt
        )
    }

    fn value_of(self, issue: &Issue) -> Option<String> {
        match self {
            SearchField::Status => Some(issue.status.as_str().to_string()),
            SearchField::Priority => Some(issue.priority.as_str().to_string()),
            SearchField::Department => Some(issue.department.clone()),
            SearchField::IssueType => Some(issue.issue_type.clone()),
            SearchField::CreatedAt => Some(issue.created_at.to_rfc3339()),
            SearchField::UpdatedAt => Some(issue.updated_at.to_rfc3339()),
            SearchField::ResolvedAt => issue.resolved_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCondition {
    pub field: SearchField,
    pub op: Op,
    pub value: String,
}

impl SearchCondition {
    fn matches(&self, issue: &Issue) -> bool {
        let Some(actual) = self.field.value_of(issue) else {
            return self.op == Op::Ne;
        };

        // Dates match on prefix so `createdAt:2024-03-01` means "that day".
        let equal = if self.field.is_date() {
            actual.starts_with(&self.value)
        } else {
            actual.eq_ignore_ascii_case(&self.value)
        };

        match self.op {
            Op::Eq => equal,
            Op::Ne => !equal,
            Op::Gt => actual.as_str() > self.value.as_str(),
            Op::Lt => actual.as_str() < self.value.as_str(),
            Op::Ge => actual.as_str() >= self.value.as_str(),
            Op::Le => actual.as_str() <= self.value.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSearch {
    pub text: Option<String>,
    pub conditions: Vec<SearchCondition>,
}

impl ParsedSearch {
    pub fn matches(&self, issue: &Issue) -> bool {
        let text_ok = self.text.as_deref().is_none_or(|text| {
            let needle = text.to_lowercase();
            issue.title.to_lowercase().contains(&needle)
                || issue.description.to_lowercase().contains(&needle)
        });
        text_ok && self.conditions.iter().all(|c| c.matches(issue))
    }
}

/// Splits a search box string into free text and `field<op>value` conditions.
///
/// Quoted phrases are always free text. Conditions on unknown fields are
/// dropped.
pub fn parse_search(input: &str) -> ParsedSearch {
    let mut words: Vec<String> = Vec::new();
    let mut conditions = Vec::new();

    let mut rest = input;
    while !rest.is_empty() {
        rest = rest.trim_start();
        if let Some(quoted) = rest.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                let phrase = quoted[..end].trim();
                if !phrase.is_empty() {
                    words.push(phrase.to_string());
                }
                rest = &quoted[end + 1..];
                continue;
            }
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..end];
        rest = &rest[end..];
        if token.is_empty() {
            continue;
        }

        match split_condition(token) {
            Some((field, op, value)) => match SearchField::parse(field) {
                Some(field) => conditions.push(SearchCondition {
                    field,
                    op,
                    value: value.to_string(),
                }),
                None => log::debug!("ignoring search condition on unknown field {field:?}"),
            },
            None => words.push(token.trim_matches('"').to_string()),
        }
    }

    let text = words.join(" ");
    ParsedSearch {
        text: Some(text).filter(|t| !t.is_empty()),
        conditions,
    }
}

fn split_condition(token: &str) -> Option<(&str, Op, &str)> {
    let (at, sym, op) = OPERATORS
        .iter()
        .filter_map(|&(sym, op)| token.find(sym).map(|at| (at, sym, op)))
        .min_by_key(|&(at, sym, _)| (at, Reverse(sym.len())))?;

    let field = &token[..at];
    let value = &token[at + sym.len()..];
    if field.is_empty() || value.is_empty() {
        return None;
    }
    Some((field, op, value))
}
