use serde::{Deserialize, Serialize};
use std::fmt;

// ---------- Wire constants ----------

pub const EVENT_TYPE_PROGRESS: &str = "progress";
pub const EVENT_TYPE_RESULT: &str = "result";
pub const EVENT_TYPE_ERROR: &str = "error";

// ---------- EventKind ----------

/// Known kinds of stream events. Anything else on the wire is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Result,
    Error,
}

impl EventKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            EVENT_TYPE_PROGRESS => Some(EventKind::Progress),
            EVENT_TYPE_RESULT => Some(EventKind::Result),
            EVENT_TYPE_ERROR => Some(EventKind::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Progress => EVENT_TYPE_PROGRESS,
            EventKind::Result => EVENT_TYPE_RESULT,
            EventKind::Error => EVENT_TYPE_ERROR,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------- StreamEvent ----------

/// One decoded event. Owns its data; holds nothing of the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    kind: EventKind,
    payload: String,
    filename: Option<String>,
}

impl StreamEvent {
    pub fn progress(payload: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Progress,
            payload: payload.into(),
            filename: None,
        }
    }

    pub fn result(payload: impl Into<String>, filename: Option<String>) -> Self {
        Self {
            kind: EventKind::Result,
            payload: payload.into(),
            filename,
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            payload: payload.into(),
            filename: None,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Only ever set on `Result` events.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

/// Raw JSON record carried after `data: `.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl WireEvent {
    /// Returns `None` for event types this client does not know.
    pub fn into_event(self) -> Option<StreamEvent> {
        let kind = EventKind::from_wire(&self.event_type)?;
        let filename = match kind {
            EventKind::Result => self.filename,
            _ => None,
        };
        Some(StreamEvent {
            kind,
            payload: self.data,
            filename,
        })
    }
}

// ---------- ResearchReport / ResearchState ----------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResearchReport {
    pub content: String,
    pub filename: String,
}

/// Snapshot of the controller as seen by a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    pub is_loading: bool,
    pub progress_messages: Vec<String>,
    pub report: Option<ResearchReport>,
    pub error: Option<String>,
}

impl ResearchState {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }
}

// ---------- SessionPhase ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Active => write!(f, "active"),
            SessionPhase::Completed => write!(f, "completed"),
            SessionPhase::Failed => write!(f, "failed"),
            SessionPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------- ResearchEvent ----------

/// Notifications emitted by the controller to registered listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    SessionStarted { session_id: u64, query: String },
    Progress { session_id: u64, message: String },
    Completed {
        session_id: u64,
        report: Option<ResearchReport>,
    },
    Failed { session_id: u64, error: String },
    Cancelled { session_id: u64 },
}

impl ResearchEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ResearchEvent::SessionStarted { .. } => "session_started",
            ResearchEvent::Progress { .. } => "progress",
            ResearchEvent::Completed { .. } => "completed",
            ResearchEvent::Failed { .. } => "failed",
            ResearchEvent::Cancelled { .. } => "cancelled",
        }
    }

    pub fn session_id(&self) -> u64 {
        match self {
            ResearchEvent::SessionStarted { session_id, .. }
            | ResearchEvent::Progress { session_id, .. }
            | ResearchEvent::Completed { session_id, .. }
            | ResearchEvent::Failed { session_id, .. }
            | ResearchEvent::Cancelled { session_id } => *session_id,
        }
    }
}

// ---------- Reports & health ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub query: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDetail {
    pub id: String,
    pub query: String,
    pub timestamp: String,
    pub content: String,
    #[serde(default)]
    pub models_used: Option<Vec<String>>,
}

impl ReportDetail {
    pub fn filename(&self) -> String {
        format!("{}.md", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthModels {
    pub orchestrator: String,
    pub medical: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models: HealthModels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    pub fn from_health(health: Option<&HealthResponse>) -> Self {
        if health.is_some() {
            Connectivity::Connected
        } else {
            Connectivity::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Connected => write!(f, "Connected"),
            Connectivity::Disconnected => write!(f, "Disconnected"),
        }
    }
}
