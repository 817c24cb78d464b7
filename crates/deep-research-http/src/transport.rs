use async_trait::async_trait;
use deep_research_core::transport::{ByteStream, ResearchTransport, TransportError};
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::{ApiClient, RESEARCH_ENDPOINT};

const SSE_CONTENT_TYPE: &str = "text/event-stream";

#[derive(Debug, Serialize)]
struct ResearchRequest<'a> {
    query: &'a str,
}

/// `POST <base>/research`, streaming the SSE response body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ApiClient,
}

impl HttpTransport {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResearchTransport for HttpTransport {
    async fn open(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<ByteStream, TransportError> {
        let url = self.client.endpoint(&[RESEARCH_ENDPOINT]);
        let request = self
            .client
            .http()
            .post(url)
            .header(ACCEPT, SSE_CONTENT_TYPE)
            .header(CONTENT_TYPE, "application/json")
            .json(&ResearchRequest { query })
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = request => result.map_err(|e| TransportError::Io(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            // Only the status is surfaced; the error body is never read
            drop(response);
            tracing::debug!("Research request rejected: {status}");
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }
        // Statuses that never carry a body
        if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
            return Err(TransportError::MissingBody {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Io(format!("Stream read error: {e}"))));
        Ok(Box::pin(body))
    }
}
