pub mod client;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AdapterError;
use crate::model::user::User;

/// The calendar year a report covers when none is configured.
pub const DEFAULT_YEAR: i32 = 2025;

/// Numeric status code this Backlog instance uses for "Closed".
/// Instance-specific convention, kept as a literal.
pub const STATUS_CLOSED: u64 = 4;

/// Inclusive calendar-year window attached to every count query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearWindow {
    pub since: String,
    pub until: String,
}

impl YearWindow {
    /// Window for the given year. A configured year outside chrono's
    /// calendar range is reported and replaced with [`DEFAULT_YEAR`].
    pub fn for_year(year: i32) -> Self {
        match Self::try_for_year(year) {
            Some(window) => window,
            None => {
                log::warn!("year {year} is outside the supported calendar range, using {DEFAULT_YEAR}");
                Self {
                    since: format!("{DEFAULT_YEAR}-01-01"),
                    until: format!("{DEFAULT_YEAR}-12-31"),
                }
            }
        }
    }

    fn try_for_year(year: i32) -> Option<Self> {
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let dec31 = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self {
            since: jan1.format("%Y-%m-%d").to_string(),
            until: dec31.format("%Y-%m-%d").to_string(),
        })
    }
}

/// Caller-supplied filter for `/issues/count`. The fixed year window is
/// appended by the adapter and is not part of this filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueCountFilter {
    pub status_id: Vec<u64>,
    pub created_user_id: Vec<u64>,
    pub assignee_id: Vec<u64>,
}

impl IssueCountFilter {
    /// Issues created by the given user.
    pub fn created_by(user_id: u64) -> Self {
        Self {
            created_user_id: vec![user_id],
            ..Self::default()
        }
    }

    /// Issues assigned to the given user.
    pub fn assigned_to(user_id: u64) -> Self {
        Self {
            assignee_id: vec![user_id],
            ..Self::default()
        }
    }

    /// Narrow the filter to Closed issues.
    pub fn closed(mut self) -> Self {
        self.status_id.push(STATUS_CLOSED);
        self
    }
}

/// Query pairs for `/issues/count`. The year window is always appended,
/// regardless of what the caller asked for.
pub fn issue_count_query(filter: &IssueCountFilter, window: &YearWindow) -> Vec<(String, String)> {
    let mut query = Vec::new();
    for id in &filter.status_id {
        query.push(("statusId[]".to_string(), id.to_string()));
    }
    for id in &filter.created_user_id {
        query.push(("createdUserId[]".to_string(), id.to_string()));
    }
    for id in &filter.assignee_id {
        query.push(("assigneeId[]".to_string(), id.to_string()));
    }
    query.push(("createdSince".to_string(), window.since.clone()));
    query.push(("createdUntil".to_string(), window.until.clone()));
    query
}

/// Query pairs for `/users/{id}/stars/count`. Same dates as the issue
/// window, but the endpoint names them `since`/`until`.
pub fn star_count_query(window: &YearWindow) -> Vec<(String, String)> {
    vec![
        ("since".to_string(), window.since.clone()),
        ("until".to_string(), window.until.clone()),
    ]
}

/// Read-side surface of the Backlog REST API consumed by the report
/// pipeline. One production implementation ([`client::BacklogClient`]);
/// tests substitute mocks.
#[async_trait]
pub trait BacklogApi: Send + Sync {
    /// `GET /users/myself`.
    async fn current_user(&self) -> Result<User, AdapterError>;

    /// `GET /issues/count`, always scoped to the report year.
    async fn issue_count(&self, filter: &IssueCountFilter) -> Result<u64, AdapterError>;

    /// `GET /users/{id}/stars/count`.
    async fn star_count(&self, user_id: u64) -> Result<u64, AdapterError>;

    /// `GET /users/{id}/icon` — raw raster bytes, not JSON.
    async fn user_icon(&self, user_id: u64) -> Result<Vec<u8>, AdapterError>;
}
