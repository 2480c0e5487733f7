/// The five per-user statistics composited onto the card.
///
/// Each is fetched independently; no relationship between the totals and
/// the completed sub-counts is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricSet {
    /// Stars the user gave during the report year.
    pub stars: u64,
    /// Issues the user created.
    pub created: u64,
    /// Issues the user created that reached Closed.
    pub created_completed: u64,
    /// Issues assigned to the user.
    pub assigned: u64,
    /// Assigned issues that reached Closed.
    pub assigned_completed: u64,
}
