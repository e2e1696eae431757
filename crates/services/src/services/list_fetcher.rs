//! Adapters that turn a paged list endpoint into `{labels, has_more}` pages.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use utils::pagination::{ListQuery, Paginated, SortOrder};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// One page request for a scoped, searchable list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub scope_id: String,
    pub page: u32,
    pub page_size: u32,
    pub search: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPage {
    pub labels: Vec<String>,
    pub has_more: bool,
}

/// Source of option labels for a selector.
///
/// Implementations only perform the request; they never touch selector state.
#[async_trait]
pub trait ListFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<LabelPage, FetchError>;
}

/// Settings for [`RestListFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetcherConfig {
    /// Backend origin, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Collection segment under `/api/mills/{mill_id}/`, e.g. `parties`.
    pub resource: String,
    /// Row field holding the display label.
    pub label_field: String,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub retry_min_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            resource: "parties".to_string(),
            label_field: "name".to_string(),
            sort_by: Some("name".to_string()),
            sort_order: SortOrder::Asc,
            timeout_secs: 30,
            max_retries: 3,
            retry_min_delay_ms: 500,
        }
    }
}

impl FetcherConfig {
    pub fn for_resource(base_url: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            resource: resource.into(),
            ..Self::default()
        }
    }
}

/// Fetches labels from `GET /api/mills/{scope}/{resource}` list endpoints.
#[derive(Debug, Clone)]
pub struct RestListFetcher {
    http: Client,
    config: FetcherConfig,
}

impl RestListFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("mill-desk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn list_url(&self, scope_id: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(["api", "mills", scope_id, self.config.resource.as_str()]);
        Ok(url)
    }

    async fn send_request(&self, request: &PageRequest) -> Result<LabelPage, FetchError> {
        let url = self.list_url(&request.scope_id)?;
        let query = ListQuery {
            page: Some(request.page),
            limit: Some(request.page_size),
            search: Some(request.search.clone()).filter(|s| !s.trim().is_empty()),
            sort_by: self.config.sort_by.clone(),
            sort_order: Some(self.config.sort_order),
        };

        let res = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let body = res
                    .json::<Paginated<Value>>()
                    .await
                    .map_err(|e| FetchError::Decode(e.to_string()))?;
                Ok(self.to_label_page(body))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(FetchError::Http { status, body })
            }
        }
    }

    fn to_label_page(&self, body: Paginated<Value>) -> LabelPage {
        let total_rows = body.data.len();
        let labels: Vec<String> = body
            .data
            .into_iter()
            .filter_map(|row| {
                row.get(&self.config.label_field)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .collect();

        if labels.len() != total_rows {
            debug!(
                resource = %self.config.resource,
                label_field = %self.config.label_field,
                skipped = total_rows - labels.len(),
                "Rows without a label were skipped"
            );
        }

        LabelPage {
            labels,
            has_more: body.pagination.has_more(),
        }
    }
}

#[async_trait]
impl ListFetcher for RestListFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<LabelPage, FetchError> {
        (|| async { self.send_request(request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(self.config.retry_min_delay_ms))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(self.config.max_retries)
                    .with_jitter(),
            )
            .when(|e: &FetchError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "List fetch for {} failed, retrying after {:.2}s: {}",
                    self.config.resource,
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

/// Fixed option list served page by page with a case-insensitive substring search.
///
/// Backs comboboxes whose options do not live on the server (months, purchase
/// types) and stands in for the backend in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticListFetcher {
    labels: Vec<String>,
}

impl StaticListFetcher {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn page(&self, request: &PageRequest) -> LabelPage {
        let needle = request.search.trim().to_lowercase();
        let matching: Vec<&String> = self
            .labels
            .iter()
            .filter(|label| needle.is_empty() || label.to_lowercase().contains(&needle))
            .collect();

        let size = request.page_size.max(1) as usize;
        let start = (request.page.max(1) as usize - 1).saturating_mul(size);
        let labels: Vec<String> = matching.iter().skip(start).take(size).map(|s| s.to_string()).collect();

        LabelPage {
            has_more: start + labels.len() < matching.len(),
            labels,
        }
    }
}

#[async_trait]
impl ListFetcher for StaticListFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<LabelPage, FetchError> {
        Ok(self.page(request))
    }
}
