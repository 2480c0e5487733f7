use serde::Deserialize;

/// The authenticated Backlog user, from `/users/myself`.
///
/// Backlog returns many more fields; only `id` drives the report, `name`
/// is kept for log output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}
