//! HTTP client for the marketplace analytics server.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::config::Config;
use crate::controller::options::OptionsTree;

use super::types::{DashboardData, DashboardQuery, Notification};

/// Backend call failure. Cloneable because an options load may be shared by
/// several concurrent awaiters, each of which sees the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
  #[error("marketplace request failed: {0}")]
  Request(String),
  #[error("unexpected response from marketplace server: {0}")]
  Decode(String),
}

/// The backend contract the dashboard consumes. Implemented by [`HttpBackend`]
/// in production and by in-memory mocks in tests.
#[async_trait]
pub trait Backend: Send + Sync {
  /// Resolve and validate options for a report. The server may redirect to a
  /// different report/source pair; the returned tree's own ids are
  /// authoritative.
  async fn get_options(
    &self,
    report_id: &str,
    previous: OptionsTree,
  ) -> Result<OptionsTree, BackendError>;

  /// Fetch chart series and summary tiles for a date range.
  async fn get_dashboard_data(&self, query: DashboardQuery)
    -> Result<DashboardData, BackendError>;

  /// Fetch notifications newer than `after`.
  async fn poll_notifications(&self, after: u64) -> Result<Vec<Notification>, BackendError>;
}

/// reqwest-based [`Backend`] speaking JSON to the marketplace server.
#[derive(Clone)]
pub struct HttpBackend {
  http: reqwest::Client,
  base: Url,
  token: String,
}

impl HttpBackend {
  pub fn new(config: &Config) -> Result<Self> {
    let base = Url::parse(&config.marketplace.url)
      .map_err(|e| eyre!("Invalid marketplace URL {}: {}", config.marketplace.url, e))?;
    let token = Config::get_api_token()?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
    self
      .base
      .join(path)
      .map_err(|e| BackendError::Request(format!("bad endpoint {}: {}", path, e)))
  }

  async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
  where
    B: serde::Serialize + Sync,
    T: serde::de::DeserializeOwned,
  {
    let url = self.endpoint(path)?;

    let response = self
      .http
      .post(url)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await
      .map_err(|e| BackendError::Request(e.to_string()))?
      .error_for_status()
      .map_err(|e| BackendError::Request(e.to_string()))?;

    response
      .json()
      .await
      .map_err(|e| BackendError::Decode(e.to_string()))
  }
}

#[async_trait]
impl Backend for HttpBackend {
  async fn get_options(
    &self,
    report_id: &str,
    previous: OptionsTree,
  ) -> Result<OptionsTree, BackendError> {
    let body = serde_json::json!({
      "report_id": report_id,
      "options": previous,
    });

    self.post_json("/marketplace/get_options", &body).await
  }

  async fn get_dashboard_data(
    &self,
    query: DashboardQuery,
  ) -> Result<DashboardData, BackendError> {
    self.post_json("/marketplace/dashboard_data", &query).await
  }

  async fn poll_notifications(&self, after: u64) -> Result<Vec<Notification>, BackendError> {
    let mut url = self.endpoint("/marketplace/notifications")?;
    url
      .query_pairs_mut()
      .append_pair("after", &after.to_string());

    let response = self
      .http
      .get(url)
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| BackendError::Request(e.to_string()))?
      .error_for_status()
      .map_err(|e| BackendError::Request(e.to_string()))?;

    response
      .json()
      .await
      .map_err(|e| BackendError::Decode(e.to_string()))
  }
}
