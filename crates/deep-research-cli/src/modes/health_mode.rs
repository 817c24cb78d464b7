use std::io::Write;

use deep_research_core::types::{Connectivity, HealthResponse};

use crate::error::CliError;
use crate::modes::research_mode::PrintOutputMode;

/// Print the backend health probe result and return the connectivity it implies.
pub fn render_health(
    health: Option<&HealthResponse>,
    mode: PrintOutputMode,
    out: &mut dyn Write,
) -> Result<Connectivity, CliError> {
    let connectivity = Connectivity::from_health(health);

    match mode {
        PrintOutputMode::Json => {
            let value = serde_json::json!({
                "connected": connectivity.is_connected(),
                "health": health,
            });
            writeln!(out, "{value}")?;
        }
        PrintOutputMode::Text => match health {
            Some(h) => {
                writeln!(out, "{connectivity} ({})", h.status)?;
                writeln!(out, "  orchestrator: {}", h.models.orchestrator)?;
                writeln!(out, "  medical:      {}", h.models.medical)?;
            }
            None => writeln!(out, "{connectivity}")?,
        },
    }
    out.flush()?;
    Ok(connectivity)
}
