use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Body of an opened research request, chunked however the transport likes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Non-success HTTP status.
    #[error("Request failed with status {status}")]
    Rejected { status: u16 },

    /// Success status but nothing to stream.
    #[error("Request failed with status {status}")]
    MissingBody { status: u16 },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("{0}")]
    Io(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

/// Opens the long-lived research request.
///
/// Implementations should observe `cancel` while connecting; the controller
/// also races every await against the same token.
#[async_trait]
pub trait ResearchTransport: Send + Sync {
    async fn open(&self, query: &str, cancel: CancellationToken)
    -> Result<ByteStream, TransportError>;
}
