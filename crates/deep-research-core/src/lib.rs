pub mod controller;
pub mod history;
pub mod sse;
pub mod transport;
pub mod types;

pub use controller::{ResearchController, ResearchListener, UNKNOWN_ERROR_MESSAGE};
pub use history::{ReportHistory, ReportsSource};
pub use sse::{DecodeError, LineDecoder, LineOutcome, classify_line, parse_event_line};
pub use transport::{ByteStream, ResearchTransport, TransportError};
pub use types::*;
