use std::io::Write;

use chrono::{DateTime, Local};
use deep_research_core::history::{ReportHistory, ReportsSource};

use crate::error::CliError;
use crate::modes::research_mode::PrintOutputMode;

/// Render an ISO-8601 timestamp in local time, or echo it back unparsed.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => match chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(naive) => naive.format("%Y-%m-%d %H:%M").to_string(),
            Err(_) => raw.to_string(),
        },
    }
}

pub async fn run_list_reports<S: ReportsSource>(
    history: &mut ReportHistory<S>,
    mode: PrintOutputMode,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let reports = history.load().await;

    match mode {
        PrintOutputMode::Json => writeln!(out, "{}", serde_json::to_string(reports)?)?,
        PrintOutputMode::Text if reports.is_empty() => writeln!(out, "No saved reports.")?,
        PrintOutputMode::Text => {
            for report in reports {
                writeln!(
                    out,
                    "{}  {}  {}",
                    format_timestamp(&report.timestamp),
                    report.id,
                    report.query
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

pub async fn run_show_report<S: ReportsSource>(
    history: &mut ReportHistory<S>,
    id: &str,
    mode: PrintOutputMode,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let Some(detail) = history.select(id).await else {
        return Err(CliError::Other(format!("Report not found: {id}")));
    };

    match mode {
        PrintOutputMode::Json => writeln!(out, "{}", serde_json::to_string(detail)?)?,
        PrintOutputMode::Text => writeln!(out, "{}", detail.content)?,
    }
    out.flush()?;
    Ok(())
}
