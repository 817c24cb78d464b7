use std::time::Duration;

use async_trait::async_trait;
use deep_research_core::history::ReportsSource;
use deep_research_core::types::{Connectivity, HealthResponse, ReportDetail, ReportSummary};
use reqwest::StatusCode;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub const RESEARCH_ENDPOINT: &str = "research";
pub const HEALTH_ENDPOINT: &str = "health";
pub const REPORTS_ENDPOINT: &str = "reports";

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Bounds connection setup only; streamed bodies are never timed out.
    pub connect_timeout: Option<Duration>,
}

/// Thin wrapper over `reqwest::Client` rooted at the backend's API prefix.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    pub fn with_options(base_url: &str, options: ClientOptions) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Append path segments to the base URL; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // ---------- Health ----------

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let response = self.http.get(self.endpoint(&[HEALTH_ENDPOINT])).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json::<HealthResponse>().await?)
    }

    /// Any failure reads as "no health information".
    pub async fn check_health(&self) -> Option<HealthResponse> {
        match self.health().await {
            Ok(health) => Some(health),
            Err(e) => {
                tracing::warn!("Health check failed: {e}");
                None
            }
        }
    }

    pub async fn connectivity(&self) -> Connectivity {
        Connectivity::from_health(self.check_health().await.as_ref())
    }

    // ---------- Reports ----------

    pub async fn list_reports(&self) -> Result<Vec<ReportSummary>, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&[REPORTS_ENDPOINT]))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json::<Vec<ReportSummary>>().await?)
    }

    /// `Ok(None)` on 404.
    pub async fn get_report(&self, id: &str) -> Result<Option<ReportDetail>, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&[REPORTS_ENDPOINT, id]))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        Ok(Some(response.json::<ReportDetail>().await?))
    }
}

#[async_trait]
impl ReportsSource for ApiClient {
    type Error = ApiError;

    async fn list_reports(&self) -> Result<Vec<ReportSummary>, ApiError> {
        ApiClient::list_reports(self).await
    }

    async fn get_report(&self, id: &str) -> Result<Option<ReportDetail>, ApiError> {
        ApiClient::get_report(self, id).await
    }
}
