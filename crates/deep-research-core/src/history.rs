use async_trait::async_trait;

use crate::types::{ReportDetail, ReportSummary, ResearchReport, ResearchState};

/// Backend listing of saved reports.
#[async_trait]
pub trait ReportsSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn list_reports(&self) -> Result<Vec<ReportSummary>, Self::Error>;
    /// `Ok(None)` when the report does not exist.
    async fn get_report(&self, id: &str) -> Result<Option<ReportDetail>, Self::Error>;
}

/// Cached report list plus the current selection.
///
/// Fetch failures never propagate: a failed list is an empty list and a
/// failed detail lookup is no selection, both logged.
pub struct ReportHistory<S> {
    source: S,
    reports: Vec<ReportSummary>,
    is_loading: bool,
    selected_id: Option<String>,
    selected: Option<ReportDetail>,
}

impl<S: ReportsSource> ReportHistory<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            reports: Vec::new(),
            is_loading: true,
            selected_id: None,
            selected: None,
        }
    }

    pub fn reports(&self) -> &[ReportSummary] {
        &self.reports
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&ReportDetail> {
        self.selected.as_ref()
    }

    pub async fn load(&mut self) -> &[ReportSummary] {
        self.is_loading = true;
        self.reports = self.fetch_list().await;
        self.is_loading = false;
        &self.reports
    }

    pub async fn refresh(&mut self) -> &[ReportSummary] {
        self.reports = self.fetch_list().await;
        &self.reports
    }

    pub async fn select(&mut self, id: &str) -> Option<&ReportDetail> {
        self.selected_id = Some(id.to_string());
        self.selected = match self.source.get_report(id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!("Failed to fetch report {id}: {e}");
                None
            }
        };
        self.selected.as_ref()
    }

    /// Newest first.
    pub fn add(&mut self, summary: ReportSummary) {
        self.reports.insert(0, summary);
    }

    pub fn clear_selection(&mut self) {
        self.selected_id = None;
        self.selected = None;
    }

    /// What to show: a selected history report beats the live one.
    pub fn displayed_report(&self, live: &ResearchState) -> Option<ResearchReport> {
        if let Some(detail) = &self.selected {
            return Some(ResearchReport {
                content: detail.content.clone(),
                filename: detail.filename(),
            });
        }
        live.report.clone()
    }

    async fn fetch_list(&self) -> Vec<ReportSummary> {
        match self.source.list_reports().await {
            Ok(reports) => reports,
            Err(e) => {
                tracing::warn!("Failed to fetch report list: {e}");
                Vec::new()
            }
        }
    }
}
