use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::sse::{LineDecoder, LineOutcome, classify_line};
use crate::transport::{ResearchTransport, TransportError};
use crate::types::*;

pub const UNKNOWN_ERROR_MESSAGE: &str = "An unexpected error occurred";

pub type ResearchListener = Arc<dyn Fn(&ResearchEvent) + Send + Sync>;

/// The single session slot. Whoever holds the matching id may write state.
struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
}

struct Inner {
    next_session_id: u64,
    session: Option<ActiveSession>,
    phase: SessionPhase,
    listeners: Vec<(usize, ResearchListener)>,
    next_listener_id: usize,
}

struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<ResearchState>,
    transport: Arc<dyn ResearchTransport>,
}

/// Handle returned by [`ResearchController::begin`], consumed by the drive loop.
struct SessionTicket {
    id: u64,
    query: String,
    cancel: CancellationToken,
}

enum Termination {
    Cancelled,
    Failed(String),
    Exhausted,
}

enum Applied {
    Continue,
    Finished(SessionPhase),
}

/// Drives one streamed research request at a time and publishes its state.
///
/// Cloning is cheap; clones share the same session slot and state.
#[derive(Clone)]
pub struct ResearchController {
    shared: Arc<Shared>,
}

impl ResearchController {
    pub fn new(transport: Arc<dyn ResearchTransport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    next_session_id: 1,
                    session: None,
                    phase: SessionPhase::Idle,
                    listeners: Vec::new(),
                    next_listener_id: 0,
                }),
                state: watch::Sender::new(ResearchState::default()),
                transport,
            }),
        }
    }

    // ---------- Observation ----------

    pub fn state(&self) -> ResearchState {
        self.shared.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResearchState> {
        self.shared.state.subscribe()
    }

    /// Snapshots as a stream, starting with the current one.
    pub fn state_stream(&self) -> WatchStream<ResearchState> {
        WatchStream::new(self.subscribe())
    }

    /// Register a listener. Listeners are called after the controller lock
    /// is released, so they may query or drive the controller.
    pub fn on_event(&self, listener: impl Fn(&ResearchEvent) + Send + Sync + 'static) -> usize {
        let mut inner = self.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: usize) {
        self.lock().listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    pub async fn wait_for_idle(&self) {
        let mut rx = self.subscribe();
        // Re-check after each change to avoid lost wakeups
        while rx.borrow_and_update().is_loading {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    // ---------- Lifecycle ----------

    /// Supersede any running session and stream `query` on a spawned task.
    ///
    /// The previous session is cancelled before this returns.
    pub fn start(&self, query: impl Into<String>) -> JoinHandle<SessionPhase> {
        let ticket = self.begin(query.into());
        let controller = self.clone();
        tokio::spawn(async move { controller.drive(ticket).await })
    }

    /// Like [`start`](Self::start) but drives the stream on the caller's task.
    pub async fn run(&self, query: impl Into<String>) -> SessionPhase {
        let ticket = self.begin(query.into());
        self.drive(ticket).await
    }

    /// Cancel the active session, if any. No error is surfaced.
    pub fn stop(&self) {
        let mut inner = self.lock();
        let Some(session) = inner.session.take() else {
            tracing::debug!("stop requested with no active research session");
            return;
        };
        session.cancel.cancel();
        inner.phase = SessionPhase::Cancelled;
        self.shared.state.send_modify(|state| state.is_loading = false);
        tracing::info!(session_id = session.id, "research session cancelled");
        let notice = Notice::new(
            &inner,
            ResearchEvent::Cancelled {
                session_id: session.id,
            },
        );
        drop(inner);
        notice.deliver();
    }

    fn begin(&self, query: String) -> SessionTicket {
        let mut inner = self.lock();
        let mut events = Vec::with_capacity(2);

        if let Some(previous) = inner.session.take() {
            previous.cancel.cancel();
            tracing::debug!(session_id = previous.id, "superseding active research session");
            events.push(ResearchEvent::Cancelled {
                session_id: previous.id,
            });
        }

        let id = inner.next_session_id;
        inner.next_session_id += 1;
        let cancel = CancellationToken::new();
        inner.session = Some(ActiveSession {
            id,
            cancel: cancel.clone(),
        });
        inner.phase = SessionPhase::Active;
        self.shared.state.send_replace(ResearchState::loading());

        tracing::info!(session_id = id, query = %query, "research session started");
        events.push(ResearchEvent::SessionStarted {
            session_id: id,
            query: query.clone(),
        });
        let notice = Notice::many(&inner, events);
        drop(inner);
        notice.deliver();

        SessionTicket { id, query, cancel }
    }

    async fn drive(&self, ticket: SessionTicket) -> SessionPhase {
        let SessionTicket { id, query, cancel } = ticket;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.shared.transport.open(&query, cancel.clone()) => result,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(err) => return self.finish(id, termination_for(err)),
        };

        let mut decoder = LineDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish(id, Termination::Cancelled),
                next = body.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => return self.finish(id, termination_for(err)),
                None => break,
            };

            let lines = match decoder.feed_bytes(&chunk) {
                Ok(lines) => lines,
                Err(err) => return self.finish(id, Termination::Failed(err.to_string())),
            };

            for line in lines {
                if let Applied::Finished(phase) = self.apply_line(id, line.trim()) {
                    return phase;
                }
            }
        }

        if let Some(fragment) = decoder.finish() {
            tracing::debug!(
                session_id = id,
                bytes = fragment.len(),
                "dropping unterminated trailing fragment"
            );
        }
        self.finish(id, Termination::Exhausted)
    }

    fn apply_line(&self, id: u64, line: &str) -> Applied {
        match classify_line(line) {
            LineOutcome::Event(event) => self.apply_event(id, event),
            LineOutcome::Ignored => Applied::Continue,
            LineOutcome::Malformed(reason) => {
                tracing::debug!(session_id = id, "skipping malformed event line: {reason}");
                Applied::Continue
            }
            LineOutcome::UnknownKind(kind) => {
                tracing::debug!(session_id = id, "skipping unknown event type: {kind}");
                Applied::Continue
            }
        }
    }

    fn apply_event(&self, id: u64, event: StreamEvent) -> Applied {
        let mut inner = self.lock();
        if !owns(&inner, id) {
            return Applied::Finished(SessionPhase::Cancelled);
        }

        let (applied, emitted) = match event.kind() {
            EventKind::Progress => {
                let message = event.payload().to_string();
                self.shared
                    .state
                    .send_modify(|state| state.progress_messages.push(message.clone()));
                (
                    Applied::Continue,
                    ResearchEvent::Progress {
                        session_id: id,
                        message,
                    },
                )
            }
            EventKind::Result => {
                inner.session = None;
                inner.phase = SessionPhase::Completed;
                let report = ResearchReport {
                    content: event.payload().to_string(),
                    filename: event.filename().unwrap_or_default().to_string(),
                };
                self.shared.state.send_modify(|state| {
                    state.is_loading = false;
                    state.report = Some(report.clone());
                });
                tracing::info!(session_id = id, filename = %report.filename, "research completed");
                (
                    Applied::Finished(SessionPhase::Completed),
                    ResearchEvent::Completed {
                        session_id: id,
                        report: Some(report),
                    },
                )
            }
            EventKind::Error => {
                inner.session = None;
                inner.phase = SessionPhase::Failed;
                let error = event.payload().to_string();
                self.shared.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(error.clone());
                });
                tracing::info!(session_id = id, "research failed: {error}");
                (
                    Applied::Finished(SessionPhase::Failed),
                    ResearchEvent::Failed { session_id: id, error },
                )
            }
        };

        let notice = Notice::new(&inner, emitted);
        drop(inner);
        notice.deliver();
        applied
    }

    fn finish(&self, id: u64, termination: Termination) -> SessionPhase {
        let mut inner = self.lock();
        if !owns(&inner, id) {
            // Already stopped or superseded; that path owns the state now.
            return SessionPhase::Cancelled;
        }
        inner.session = None;

        let (phase, event) = match termination {
            Termination::Cancelled => {
                self.shared.state.send_modify(|state| state.is_loading = false);
                tracing::info!(session_id = id, "research session cancelled");
                (
                    SessionPhase::Cancelled,
                    ResearchEvent::Cancelled { session_id: id },
                )
            }
            Termination::Failed(message) => {
                let error = if message.trim().is_empty() {
                    UNKNOWN_ERROR_MESSAGE.to_string()
                } else {
                    message
                };
                self.shared.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(error.clone());
                });
                tracing::warn!(session_id = id, "research request failed: {error}");
                (
                    SessionPhase::Failed,
                    ResearchEvent::Failed {
                        session_id: id,
                        error,
                    },
                )
            }
            Termination::Exhausted => {
                self.shared.state.send_modify(|state| state.is_loading = false);
                tracing::warn!(
                    session_id = id,
                    "research stream ended without a result or error event"
                );
                (
                    SessionPhase::Completed,
                    ResearchEvent::Completed {
                        session_id: id,
                        report: None,
                    },
                )
            }
        };

        inner.phase = phase;
        let notice = Notice::new(&inner, event);
        drop(inner);
        notice.deliver();
        phase
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn owns(inner: &Inner, id: u64) -> bool {
    inner.session.as_ref().is_some_and(|session| session.id == id)
}

fn termination_for(err: TransportError) -> Termination {
    if err.is_cancelled() {
        Termination::Cancelled
    } else {
        Termination::Failed(err.to_string())
    }
}

/// Events captured under the lock together with the listeners registered at
/// that moment. Delivered only after the guard is dropped.
struct Notice {
    listeners: Vec<ResearchListener>,
    events: Vec<ResearchEvent>,
}

impl Notice {
    fn new(inner: &Inner, event: ResearchEvent) -> Self {
        Self::many(inner, vec![event])
    }

    fn many(inner: &Inner, events: Vec<ResearchEvent>) -> Self {
        Self {
            listeners: inner.listeners.iter().map(|(_, l)| l.clone()).collect(),
            events,
        }
    }

    fn deliver(self) {
        for event in &self.events {
            for listener in &self.listeners {
                listener(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use crate::transport::ByteStream;

    type Chunk = Result<Bytes, TransportError>;

    enum Scripted {
        Body(mpsc::Receiver<Chunk>),
        Reject(TransportError),
        Hang,
    }

    #[derive(Default)]
    struct FakeTransport {
        scripts: Mutex<VecDeque<Scripted>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn push(&self, script: Scripted) {
            self.scripts.lock().unwrap().push_back(script);
        }

        /// Open channel the test keeps writing into.
        fn push_channel(&self) -> mpsc::Sender<Chunk> {
            let (tx, rx) = mpsc::channel(64);
            self.push(Scripted::Body(rx));
            tx
        }

        /// Body that delivers `text` then closes.
        fn push_body(&self, text: &str) {
            let tx = self.push_channel();
            tx.try_send(Ok(Bytes::from(text.to_string()))).unwrap();
        }
    }

    #[async_trait]
    impl ResearchTransport for FakeTransport {
        async fn open(
            &self,
            query: &str,
            _cancel: CancellationToken,
        ) -> Result<ByteStream, TransportError> {
            self.queries.lock().unwrap().push(query.to_string());
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Scripted::Body(rx)) => Ok(Box::pin(ReceiverStream::new(rx))),
                Some(Scripted::Reject(err)) => Err(err),
                Some(Scripted::Hang) => futures::future::pending().await,
                None => Err(TransportError::Io("no scripted response".to_string())),
            }
        }
    }

    fn data(json: &str) -> String {
        format!("data: {json}\n\n")
    }

    fn progress(msg: &str) -> String {
        data(&format!(r#"{{"type":"progress","data":"{msg}"}}"#))
    }

    fn result(content: &str, filename: &str) -> String {
        data(&format!(
            r#"{{"type":"result","data":"{content}","filename":"{filename}"}}"#
        ))
    }

    fn error(msg: &str) -> String {
        data(&format!(r#"{{"type":"error","data":"{msg}"}}"#))
    }

    fn setup() -> (Arc<FakeTransport>, ResearchController) {
        let transport = Arc::new(FakeTransport::default());
        let controller = ResearchController::new(transport.clone());
        (transport, controller)
    }

    fn record_events(controller: &ResearchController) -> Arc<Mutex<Vec<ResearchEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        controller.on_event(move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        events
    }

    async fn wait_for_state(
        controller: &ResearchController,
        predicate: impl FnMut(&ResearchState) -> bool,
    ) {
        let mut rx = controller.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    #[test]
    fn test_starts_idle() {
        let (_, controller) = setup();
        assert_eq!(controller.state(), ResearchState::default());
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_progress_then_result() {
        let (transport, controller) = setup();
        transport.push_body(&format!(
            "{}{}{}",
            progress("A"),
            progress("B"),
            result("# R", "f.md")
        ));

        let phase = controller.run("test query").await;

        assert_eq!(phase, SessionPhase::Completed);
        assert_eq!(
            controller.state(),
            ResearchState {
                is_loading: false,
                progress_messages: vec!["A".to_string(), "B".to_string()],
                report: Some(ResearchReport {
                    content: "# R".to_string(),
                    filename: "f.md".to_string(),
                }),
                error: None,
            }
        );
        assert_eq!(*transport.queries.lock().unwrap(), vec!["test query"]);
    }

    #[tokio::test]
    async fn test_error_event() {
        let (transport, controller) = setup();
        transport.push_body(&error("boom"));

        let phase = controller.run("q").await;

        assert_eq!(phase, SessionPhase::Failed);
        assert_eq!(
            controller.state(),
            ResearchState {
                is_loading: false,
                progress_messages: vec![],
                report: None,
                error: Some("boom".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_result_without_filename() {
        let (transport, controller) = setup();
        transport.push_body(&data(r##"{"type":"result","data":"# Only"}"##));

        controller.run("q").await;

        let report = controller.state().report.unwrap();
        assert_eq!(report.content, "# Only");
        assert_eq!(report.filename, "");
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let (transport, controller) = setup();
        let events = record_events(&controller);
        transport.push_body(&format!("{}{}", progress("one"), result("done", "r.md")));

        controller.run("ordered").await;

        let types: Vec<&str> = events
            .lock()
            .unwrap()
            .iter()
            .map(ResearchEvent::event_type)
            .collect();
        assert_eq!(types, vec!["session_started", "progress", "completed"]);
    }

    #[tokio::test]
    async fn test_noise_lines_are_skipped() {
        let (transport, controller) = setup();
        transport.push_body(&format!(
            ": keepalive\nevent: message\ndata: not-json\n\n{}{}{}",
            data(r#"{"type":"heartbeat","data":""}"#),
            progress("kept"),
            result("body", "x.md")
        ));

        controller.run("q").await;

        let state = controller.state();
        assert_eq!(state.progress_messages, vec!["kept"]);
        assert!(state.report.is_some());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status() {
        let (transport, controller) = setup();
        transport.push(Scripted::Reject(TransportError::Rejected { status: 500 }));

        let phase = controller.run("q").await;

        assert_eq!(phase, SessionPhase::Failed);
        let state = controller.state();
        assert!(!state.is_loading);
        assert!(state.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_missing_body_is_failure() {
        let (transport, controller) = setup();
        transport.push(Scripted::Reject(TransportError::MissingBody { status: 204 }));

        controller.run("q").await;

        assert_eq!(
            controller.state().error.as_deref(),
            Some("Request failed with status 204")
        );
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let (transport, controller) = setup();
        let tx = transport.push_channel();
        tx.send(Ok(Bytes::from(progress("working")))).await.unwrap();
        tx.send(Err(TransportError::Io("connection reset".to_string())))
            .await
            .unwrap();

        let phase = controller.run("q").await;

        assert_eq!(phase, SessionPhase::Failed);
        let state = controller.state();
        assert_eq!(state.progress_messages, vec!["working"]);
        assert_eq!(state.error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_blank_transport_error_uses_fallback() {
        let (transport, controller) = setup();
        transport.push(Scripted::Reject(TransportError::Io(String::new())));

        controller.run("q").await;

        assert_eq!(controller.state().error.as_deref(), Some(UNKNOWN_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_transport_cancellation_is_not_an_error() {
        let (transport, controller) = setup();
        transport.push(Scripted::Reject(TransportError::Cancelled));

        let phase = controller.run("q").await;

        assert_eq!(phase, SessionPhase::Cancelled);
        let state = controller.state();
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_stream_end_without_terminal_completes_quietly() {
        let (transport, controller) = setup();
        let events = record_events(&controller);
        transport.push_body(&format!("{}data: {{\"type\":\"res", progress("only")));

        let phase = controller.run("q").await;

        assert_eq!(phase, SessionPhase::Completed);
        let state = controller.state();
        assert!(!state.is_loading);
        assert!(state.report.is_none());
        assert!(state.error.is_none());
        assert_eq!(state.progress_messages, vec!["only"]);
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(ResearchEvent::Completed { report: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_first_terminal_event_wins() {
        let (transport, controller) = setup();
        transport.push_body(&format!(
            "{}{}{}",
            result("# R", "f.md"),
            error("late"),
            progress("after")
        ));

        let phase = controller.run("q").await;

        assert_eq!(phase, SessionPhase::Completed);
        let state = controller.state();
        assert!(state.error.is_none());
        assert!(state.progress_messages.is_empty());
        assert_eq!(state.report.unwrap().content, "# R");
    }

    #[tokio::test]
    async fn test_stop_while_active() {
        let (transport, controller) = setup();
        let tx = transport.push_channel();
        let handle = controller.start("q");

        tx.send(Ok(Bytes::from(progress("step")))).await.unwrap();
        wait_for_state(&controller, |s| s.progress_messages.len() == 1).await;

        // Buffered but not yet terminated
        tx.send(Ok(Bytes::from(r##"data: {"type":"result","data":"# R""##)))
            .await
            .unwrap();
        controller.stop();
        let _ = tx.send(Ok(Bytes::from("}\n\n"))).await;

        assert_eq!(handle.await.unwrap(), SessionPhase::Cancelled);
        let state = controller.state();
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert!(state.report.is_none());
        assert_eq!(controller.phase(), SessionPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_stop_unblocks_pending_open() {
        let (transport, controller) = setup();
        transport.push(Scripted::Hang);
        let handle = controller.start("q");

        tokio::task::yield_now().await;
        controller.stop();

        let phase = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("drive should exit after stop")
            .unwrap();
        assert_eq!(phase, SessionPhase::Cancelled);
        assert!(!controller.state().is_loading);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let (_, controller) = setup();
        let events = record_events(&controller);
        controller.stop();
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_session_supersedes_previous() {
        let (transport, controller) = setup();
        let first_tx = transport.push_channel();
        let first = controller.start("first");

        first_tx
            .send(Ok(Bytes::from(progress("old"))))
            .await
            .unwrap();
        wait_for_state(&controller, |s| s.progress_messages == ["old"]).await;

        let second_tx = transport.push_channel();
        let second = controller.start("second");
        assert_eq!(controller.state(), ResearchState::loading());

        let _ = first_tx
            .send(Ok(Bytes::from(format!(
                "{}{}",
                progress("stale"),
                result("stale", "old.md")
            ))))
            .await;
        assert_eq!(first.await.unwrap(), SessionPhase::Cancelled);

        second_tx
            .send(Ok(Bytes::from(format!(
                "{}{}",
                progress("fresh"),
                result("# New", "new.md")
            ))))
            .await
            .unwrap();
        drop(second_tx);
        assert_eq!(second.await.unwrap(), SessionPhase::Completed);

        let state = controller.state();
        assert_eq!(state.progress_messages, vec!["fresh"]);
        assert_eq!(state.report.unwrap().filename, "new.md");
        assert_eq!(*transport.queries.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_restart_resets_state() {
        let (transport, controller) = setup();
        transport.push_body(&error("first failure"));
        controller.run("one").await;
        assert!(controller.state().error.is_some());

        transport.push_body(&format!("{}{}", progress("again"), result("ok", "ok.md")));
        controller.run("two").await;

        let state = controller.state();
        assert!(state.error.is_none());
        assert_eq!(state.progress_messages, vec!["again"]);
    }

    #[tokio::test]
    async fn test_wait_for_idle() {
        let (transport, controller) = setup();
        let tx = transport.push_channel();
        let handle = controller.start("q");

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_for_idle().await })
        };

        tx.send(Ok(Bytes::from(result("# R", "f.md")))).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("wait_for_idle should resolve")
            .unwrap();
        assert_eq!(handle.await.unwrap(), SessionPhase::Completed);
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let (transport, controller) = setup();
        let events = Arc::new(Mutex::new(0usize));
        let sink = events.clone();
        let id = controller.on_event(move |_| *sink.lock().unwrap() += 1);
        controller.remove_listener(id);

        transport.push_body(&result("r", "r.md"));
        controller.run("q").await;

        assert_eq!(*events.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_listener_can_read_controller() {
        let (transport, controller) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = controller.clone();
        controller.on_event(move |event| {
            sink.lock()
                .unwrap()
                .push((event.event_type(), observer.phase(), observer.is_active()));
        });
        transport.push_body(&format!("{}{}", progress("A"), result("# R", "f.md")));

        let phase = tokio::time::timeout(Duration::from_secs(5), controller.run("q"))
            .await
            .expect("listener must not block the session");

        assert_eq!(phase, SessionPhase::Completed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("session_started", SessionPhase::Active, true),
                ("progress", SessionPhase::Active, true),
                ("completed", SessionPhase::Completed, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_listener_can_stop_session() {
        let (transport, controller) = setup();
        let tx = transport.push_channel();
        let stopper = controller.clone();
        controller.on_event(move |event| {
            if matches!(event, ResearchEvent::Progress { .. }) {
                stopper.stop();
            }
        });
        let handle = controller.start("q");

        tx.send(Ok(Bytes::from(format!("{}{}", progress("A"), result("# R", "f.md")))))
            .await
            .unwrap();

        let phase = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("stop from a listener must not deadlock")
            .unwrap();
        assert_eq!(phase, SessionPhase::Cancelled);
        let state = controller.state();
        assert_eq!(state.progress_messages, vec!["A"]);
        assert!(state.report.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_state_stream_yields_snapshots() {
        let (transport, controller) = setup();
        let mut stream = controller.state_stream();
        assert_eq!(stream.next().await, Some(ResearchState::default()));

        transport.push_body(&result("# R", "f.md"));
        controller.run("q").await;

        let latest = stream.next().await.unwrap();
        assert!(!latest.is_loading);
        assert!(latest.report.is_some());
    }
}
