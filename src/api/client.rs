use async_trait::async_trait;
use serde::Deserialize;

use super::{issue_count_query, star_count_query, BacklogApi, IssueCountFilter, YearWindow};
use crate::error::AdapterError;
use crate::model::user::User;

/// Production adapter talking to a Backlog space over REST.
///
/// The API key rides along as an `apiKey` query parameter on every call.
/// No retries, no caching, default transport timeout.
pub struct BacklogClient {
    base_url: String,
    api_key: String,
    window: YearWindow,
    client: reqwest::Client,
}

impl BacklogClient {
    pub fn new(space_url: &str, api_key: impl Into<String>, year: i32) -> Self {
        Self {
            base_url: normalize_base_url(space_url),
            api_key: api_key.into(),
            window: YearWindow::for_year(year),
            client: reqwest::Client::new(),
        }
    }

    async fn get_bytes(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Vec<u8>, AdapterError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|source| AdapterError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        let bytes = resp.bytes().await.map_err(|source| AdapterError::Request {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<T, AdapterError> {
        let bytes = self.get_bytes(endpoint, query).await?;
        serde_json::from_slice(&bytes).map_err(|source| {
            log::debug!(
                "unparseable response from {endpoint}: {}",
                String::from_utf8_lossy(&bytes)
            );
            AdapterError::Parse {
                endpoint: endpoint.to_string(),
                source,
            }
        })
    }
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[async_trait]
impl BacklogApi for BacklogClient {
    async fn current_user(&self) -> Result<User, AdapterError> {
        self.get_json("/users/myself", &[]).await
    }

    async fn issue_count(&self, filter: &IssueCountFilter) -> Result<u64, AdapterError> {
        let query = issue_count_query(filter, &self.window);
        let resp: CountResponse = self.get_json("/issues/count", &query).await?;
        Ok(resp.count)
    }

    async fn star_count(&self, user_id: u64) -> Result<u64, AdapterError> {
        let endpoint = format!("/users/{user_id}/stars/count");
        let query = star_count_query(&self.window);
        let resp: CountResponse = self.get_json(&endpoint, &query).await?;
        Ok(resp.count)
    }

    async fn user_icon(&self, user_id: u64) -> Result<Vec<u8>, AdapterError> {
        self.get_bytes(&format!("/users/{user_id}/icon"), &[]).await
    }
}

/// Strip any trailing slash from the space URL and append `/api/v2`
/// unless the caller already included it.
pub fn normalize_base_url(space_url: &str) -> String {
    let trimmed = space_url.trim_end_matches('/');
    if trimmed.ends_with("/api/v2") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v2")
    }
}
