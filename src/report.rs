use std::path::Path;

use anyhow::Context;
use image::{DynamicImage, RgbaImage};

use crate::api::{BacklogApi, IssueCountFilter};
use crate::card;
use crate::error::{ReportError, ReportResult};
use crate::model::metrics::MetricSet;
use crate::model::user::User;

/// Where a run currently stands. `Errored` is terminal; a new run starts
/// over from `Validating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Fetching,
    ImagesLoading,
    Compositing,
    Completed,
    Errored,
}

/// Credentials as entered by the user; checked before any network call.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub backlog_url: String,
    pub api_key: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.backlog_url.is_empty() && !self.api_key.is_empty()
    }
}

/// A finished report: the resolved user, the five metrics, and the
/// composited 640×640 card.
#[derive(Debug)]
pub struct Report {
    pub user: User,
    pub metrics: MetricSet,
    pub card: RgbaImage,
}

/// Drives one report run end to end. `run` takes `&mut self`, so a second
/// run cannot start while one is in flight.
pub struct ReportRunner {
    state: RunState,
}

impl Default for ReportRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRunner {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run<A: BacklogApi>(
        &mut self,
        api: &A,
        credentials: &Credentials,
        template_path: &Path,
    ) -> ReportResult<Report> {
        match self.try_run(api, credentials, template_path).await {
            Ok(report) => {
                self.state = RunState::Completed;
                Ok(report)
            }
            Err(err) => {
                self.state = RunState::Errored;
                Err(err)
            }
        }
    }

    async fn try_run<A: BacklogApi>(
        &mut self,
        api: &A,
        credentials: &Credentials,
        template_path: &Path,
    ) -> ReportResult<Report> {
        self.state = RunState::Validating;
        if !credentials.is_complete() {
            return Err(ReportError::validation(
                "Backlog URL and API key are required",
            ));
        }

        self.state = RunState::Fetching;
        let user = api.current_user().await?;
        log::info!("resolved user {} (id {})", user.name, user.id);

        let metrics = fetch_metrics(api, user.id).await?;
        log::debug!("metrics for {}: {metrics:?}", user.name);

        self.state = RunState::ImagesLoading;
        let (template, avatar) =
            tokio::try_join!(load_template(template_path), fetch_avatar(api, user.id))?;

        self.state = RunState::Compositing;
        let card = card::compose(&template, &avatar, &metrics);

        Ok(Report {
            user,
            metrics,
            card,
        })
    }
}

/// The four issue-count queries and the star-count query share no data
/// dependency once the user id is known, so they run concurrently. Any
/// single failure fails the whole run.
async fn fetch_metrics<A: BacklogApi>(api: &A, user_id: u64) -> ReportResult<MetricSet> {
    // The filters must outlive the boxed futures the join polls.
    let created_filter = IssueCountFilter::created_by(user_id);
    let created_completed_filter = IssueCountFilter::created_by(user_id).closed();
    let assigned_filter = IssueCountFilter::assigned_to(user_id);
    let assigned_completed_filter = IssueCountFilter::assigned_to(user_id).closed();

    let (created, created_completed, assigned, assigned_completed, stars) = tokio::try_join!(
        api.issue_count(&created_filter),
        api.issue_count(&created_completed_filter),
        api.issue_count(&assigned_filter),
        api.issue_count(&assigned_completed_filter),
        api.star_count(user_id),
    )?;

    Ok(MetricSet {
        stars,
        created,
        created_completed,
        assigned,
        assigned_completed,
    })
}

async fn load_template(path: &Path) -> ReportResult<DynamicImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read template from {}", path.display()))
        .map_err(ReportError::fetch)?;
    card::decode_image(&bytes)
        .with_context(|| format!("failed to decode template {}", path.display()))
        .map_err(ReportError::fetch)
}

async fn fetch_avatar<A: BacklogApi>(api: &A, user_id: u64) -> ReportResult<DynamicImage> {
    let bytes = api.user_icon(user_id).await?;
    card::decode_image(&bytes)
        .context("failed to decode avatar image")
        .map_err(ReportError::fetch)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::error::AdapterError;

    /// Records every adapter call in order; individual endpoints can be
    /// made to fail.
    struct MockApi {
        calls: Arc<Mutex<Vec<String>>>,
        fail_identity: bool,
        fail_star_count: bool,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_identity: false,
                fail_star_count: false,
            }
        }

        fn with_identity_failure(mut self) -> Self {
            self.fail_identity = true;
            self
        }

        fn with_star_count_failure(mut self) -> Self {
            self.fail_star_count = true;
            self
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn unauthorized(endpoint: &str) -> AdapterError {
        AdapterError::Status {
            endpoint: endpoint.to_string(),
            status: reqwest::StatusCode::UNAUTHORIZED,
        }
    }

    #[async_trait]
    impl BacklogApi for MockApi {
        async fn current_user(&self) -> Result<User, AdapterError> {
            self.record("current_user");
            if self.fail_identity {
                return Err(unauthorized("/users/myself"));
            }
            Ok(User {
                id: 42,
                name: "eguchi".to_string(),
            })
        }

        async fn issue_count(&self, filter: &IssueCountFilter) -> Result<u64, AdapterError> {
            self.record(format!("issue_count {filter:?}"));
            let closed = !filter.status_id.is_empty();
            Ok(match (!filter.created_user_id.is_empty(), closed) {
                (true, false) => 10,
                (true, true) => 3,
                (false, false) => 7,
                (false, true) => 2,
            })
        }

        async fn star_count(&self, _user_id: u64) -> Result<u64, AdapterError> {
            self.record("star_count");
            if self.fail_star_count {
                return Err(unauthorized("/users/42/stars/count"));
            }
            Ok(15)
        }

        async fn user_icon(&self, _user_id: u64) -> Result<Vec<u8>, AdapterError> {
            self.record("user_icon");
            Ok(png_bytes([200, 100, 50, 255]))
        }
    }

    fn png_bytes(rgba: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(8, 8, Rgba(rgba));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn valid_credentials() -> Credentials {
        Credentials {
            backlog_url: "https://example.backlog.com".to_string(),
            api_key: "secret".to_string(),
        }
    }

    /// Writes a 640×640 template PNG into a temp dir and returns its path.
    fn template_fixture(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("template.png");
        let img = RgbaImage::from_pixel(640, 640, Rgba([1, 2, 3, 255]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn identity_is_resolved_before_any_count() {
        let dir = tempfile::tempdir().unwrap();
        let template = template_fixture(&dir);
        let api = MockApi::new();
        let mut runner = ReportRunner::new();

        let report = runner
            .run(&api, &valid_credentials(), &template)
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls[0], "current_user");
        assert_eq!(
            calls.iter().filter(|c| *c == "current_user").count(),
            1,
            "identity endpoint must be hit exactly once"
        );
        assert_eq!(
            calls.iter().filter(|c| c.starts_with("issue_count")).count(),
            4,
            "all four issue-count queries must be issued"
        );
        assert_eq!(calls.iter().filter(|c| *c == "star_count").count(), 1);

        assert_eq!(runner.state(), RunState::Completed);
        assert_eq!(report.user.id, 42);
        assert_eq!(
            report.metrics,
            MetricSet {
                stars: 15,
                created: 10,
                created_completed: 3,
                assigned: 7,
                assigned_completed: 2,
            }
        );
        assert_eq!(report.card.dimensions(), (640, 640));
    }

    #[tokio::test]
    async fn empty_api_key_issues_no_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let template = template_fixture(&dir);
        let api = MockApi::new();
        let mut runner = ReportRunner::new();

        let credentials = Credentials {
            backlog_url: "https://example.backlog.com".to_string(),
            api_key: String::new(),
        };
        let err = runner.run(&api, &credentials, &template).await.unwrap_err();

        assert!(matches!(err, ReportError::Validation(_)));
        assert!(api.calls().is_empty());
        assert_eq!(runner.state(), RunState::Errored);
    }

    #[tokio::test]
    async fn empty_url_issues_no_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let template = template_fixture(&dir);
        let api = MockApi::new();
        let mut runner = ReportRunner::new();

        let credentials = Credentials {
            backlog_url: String::new(),
            api_key: "secret".to_string(),
        };
        let err = runner.run(&api, &credentials, &template).await.unwrap_err();

        assert!(matches!(err, ReportError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn identity_failure_stops_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let template = template_fixture(&dir);
        let api = MockApi::new().with_identity_failure();
        let mut runner = ReportRunner::new();

        let err = runner
            .run(&api, &valid_credentials(), &template)
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Fetch(_)));
        assert_eq!(api.calls(), vec!["current_user"]);
        assert_eq!(runner.state(), RunState::Errored);
    }

    #[tokio::test]
    async fn single_metric_failure_aborts_without_a_card() {
        let dir = tempfile::tempdir().unwrap();
        let template = template_fixture(&dir);
        let api = MockApi::new().with_star_count_failure();
        let mut runner = ReportRunner::new();

        let result = runner.run(&api, &valid_credentials(), &template).await;

        assert!(matches!(result, Err(ReportError::Fetch(_))));
        assert_eq!(runner.state(), RunState::Errored);
        // The avatar is never fetched, so nothing was composited.
        assert!(!api.calls().iter().any(|c| c == "user_icon"));
    }

    #[tokio::test]
    async fn missing_template_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let api = MockApi::new();
        let mut runner = ReportRunner::new();

        let err = runner
            .run(&api, &valid_credentials(), &dir.path().join("missing.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Fetch(_)));
        assert_eq!(runner.state(), RunState::Errored);
    }

    #[tokio::test]
    async fn repeated_runs_paint_identical_cards() {
        let dir = tempfile::tempdir().unwrap();
        let template = template_fixture(&dir);
        let api = MockApi::new();

        let first = ReportRunner::new()
            .run(&api, &valid_credentials(), &template)
            .await
            .unwrap();
        let second = ReportRunner::new()
            .run(&api, &valid_credentials(), &template)
            .await
            .unwrap();

        assert_eq!(first.card.as_raw(), second.card.as_raw());
    }
}
