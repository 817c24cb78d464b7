use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use deep_research_core::controller::ResearchController;
use deep_research_core::types::{ResearchEvent, ResearchReport, ResearchState, SessionPhase};
use tokio::sync::mpsc;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct ResearchModeOptions {
    pub mode: PrintOutputMode,
    pub query: String,
    /// Write the finished report into this directory.
    pub save_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub phase: SessionPhase,
    pub state: ResearchState,
    pub saved_to: Option<PathBuf>,
}

impl ResearchOutcome {
    pub fn exit_code(&self) -> i32 {
        match self.phase {
            SessionPhase::Completed => 0,
            SessionPhase::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Where rendered output goes. Progress and diagnostics stay off the report
/// stream so `> report.md` captures only the report.
pub struct Sinks<'a> {
    pub progress: &'a mut dyn Write,
    pub report: &'a mut dyn Write,
}

pub fn validate_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CliError::Research("Query must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Stream one research session, rendering events as they arrive.
/// `interrupt` resolving (e.g. Ctrl-C) stops the session.
pub async fn run_research_mode(
    controller: &ResearchController,
    options: ResearchModeOptions,
    interrupt: impl Future<Output = ()>,
    sinks: Sinks<'_>,
) -> Result<ResearchOutcome, CliError> {
    let query = validate_query(&options.query)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<ResearchEvent>();
    let listener_id = controller.on_event(move |event| {
        let _ = tx.send(event.clone());
    });

    let mut handle = controller.start(query);
    tokio::pin!(interrupt);
    let mut interrupted = false;

    let joined = loop {
        tokio::select! {
            Some(event) = rx.recv() => render_event(&event, options.mode, &mut *sinks.progress, &mut *sinks.report)?,
            joined = &mut handle => break joined,
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                controller.stop();
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        render_event(&event, options.mode, &mut *sinks.progress, &mut *sinks.report)?;
    }
    controller.remove_listener(listener_id);

    let phase = joined.map_err(|e| CliError::Research(format!("Research task failed: {e}")))?;
    let state = controller.state();

    let saved_to = match (&options.save_dir, &state.report) {
        (Some(dir), Some(report)) => {
            let path = save_report(dir, report)?;
            writeln!(sinks.progress, "Saved report to {}", path.display())?;
            Some(path)
        }
        _ => None,
    };

    if options.mode == PrintOutputMode::Json {
        writeln!(sinks.report, "{}", serde_json::to_string(&state)?)?;
    }
    sinks.report.flush()?;

    Ok(ResearchOutcome {
        phase,
        state,
        saved_to,
    })
}

fn render_event(
    event: &ResearchEvent,
    mode: PrintOutputMode,
    progress: &mut dyn Write,
    report: &mut dyn Write,
) -> Result<(), CliError> {
    if mode == PrintOutputMode::Json {
        writeln!(report, "{}", serde_json::to_string(event)?)?;
        report.flush()?;
        return Ok(());
    }

    match event {
        ResearchEvent::SessionStarted { query, .. } => writeln!(progress, "Researching: {query}")?,
        ResearchEvent::Progress { message, .. } => writeln!(progress, "  - {message}")?,
        ResearchEvent::Completed {
            report: Some(r), ..
        } => {
            writeln!(report, "{}", r.content)?;
        }
        ResearchEvent::Completed { report: None, .. } => {
            writeln!(progress, "Research finished without a report.")?
        }
        ResearchEvent::Failed { error, .. } => writeln!(progress, "Error: {error}")?,
        ResearchEvent::Cancelled { .. } => writeln!(progress, "Research cancelled.")?,
    }
    progress.flush()?;
    Ok(())
}

/// Write `report` under `dir` using the backend-chosen file name.
pub fn save_report(dir: &Path, report: &ResearchReport) -> Result<PathBuf, CliError> {
    // Keep only the final component so a crafted name cannot escape `dir`
    let name = Path::new(&report.filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            format!(
                "report-{}.md",
                chrono::Utc::now().format("%Y-%m-%d_%H%M%S")
            )
        });

    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, &report.content)?;
    Ok(path)
}
