use serde::{Deserialize, Serialize};

use crate::tasks::repo_types::Task;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Status filter value meaning "no status filter".
pub const ALL_STATUSES: &str = "All";

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Every field is optional; empty strings count as "not supplied".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Raw `GET /api/tasks` query string. Kept as strings so bad numbers fall back
/// to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub status: Option<String>,
    pub keyword: Option<String>,
    pub page: u64,
    pub page_size: u64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            status: None,
            keyword: None,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(default)
}

impl From<ListParams> for ListQuery {
    fn from(p: ListParams) -> Self {
        Self {
            status: p.status.filter(|s| !s.is_empty() && s != ALL_STATUSES),
            keyword: p.keyword.filter(|k| !k.is_empty()),
            page: positive_or(p.page.as_deref(), DEFAULT_PAGE),
            page_size: positive_or(p.limit.as_deref(), DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
    pub items: Vec<Task>,
    pub page: u64,
    pub page_count: u64,
    pub total_count: u64,
    pub page_size: u64,
}

impl PageEnvelope {
    pub fn empty(page_size: u64) -> Self {
        Self {
            items: Vec::new(),
            page: DEFAULT_PAGE,
            page_count: 1,
            total_count: 0,
            page_size,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(status: Option<&str>, keyword: Option<&str>, page: Option<&str>, limit: Option<&str>) -> ListParams {
        ListParams {
            status: status.map(Into::into),
            keyword: keyword.map(Into::into),
            page: page.map(Into::into),
            limit: limit.map(Into::into),
        }
    }

    #[test]
    fn all_status_and_empty_keyword_mean_no_filter() {
        let q = ListQuery::from(params(Some("All"), Some(""), None, None));
        assert_eq!(q, ListQuery::default());
    }

    #[test]
    fn bad_or_non_positive_numbers_fall_back_to_defaults() {
        let q = ListQuery::from(params(None, None, Some("0"), Some("abc")));
        assert_eq!((q.page, q.page_size), (1, 10));
        let q = ListQuery::from(params(None, None, Some("-3"), Some("")));
        assert_eq!((q.page, q.page_size), (1, 10));
        let q = ListQuery::from(params(Some("Completed"), Some("api"), Some("3"), Some("25")));
        assert_eq!(q.status.as_deref(), Some("Completed"));
        assert_eq!(q.keyword.as_deref(), Some("api"));
        assert_eq!((q.page, q.page_size), (3, 25));
    }
}
