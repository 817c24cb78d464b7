use std::io::Write;
use std::path::Path;

use crate::config::paths;
use crate::error::CliError;
use crate::modes::research_mode::PrintOutputMode;
use crate::settings::manager::SettingsManager;
use crate::settings::resolved::ResolvedSettings;

pub fn show_config(
    resolved: &ResolvedSettings,
    user_dir: &Path,
    project_dir: &Path,
    mode: PrintOutputMode,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let output_dir = resolved
        .output_dir
        .as_ref()
        .map(|p| p.display().to_string());
    let user_file = paths::settings_file(user_dir).display().to_string();
    let project_file = paths::settings_file(project_dir).display().to_string();

    match mode {
        PrintOutputMode::Json => {
            let value = serde_json::json!({
                "apiUrl": resolved.api_url,
                "outputDir": output_dir,
                "logLevel": resolved.log_level,
                "connectTimeoutSecs": resolved.connect_timeout.map(|d| d.as_secs()),
                "userSettings": user_file,
                "projectSettings": project_file,
            });
            writeln!(out, "{value}")?;
        }
        PrintOutputMode::Text => {
            writeln!(out, "apiUrl:             {}", resolved.api_url)?;
            writeln!(
                out,
                "outputDir:          {}",
                output_dir.unwrap_or_else(|| format!("{} (when saving)", paths::DEFAULT_OUTPUT_DIR_NAME))
            )?;
            writeln!(out, "logLevel:           {}", resolved.log_level)?;
            match resolved.connect_timeout {
                Some(d) => writeln!(out, "connectTimeoutSecs: {}", d.as_secs())?,
                None => writeln!(out, "connectTimeoutSecs: none")?,
            }
            writeln!(out)?;
            writeln!(out, "user settings:      {user_file}")?;
            writeln!(out, "project settings:   {project_file}")?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Persist one key into the settings file under `dir`, keeping other keys.
pub fn set_config(dir: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let mut manager = SettingsManager::new(dir);
    manager.load()?;
    manager.settings_mut().set(key, value).map_err(CliError::Config)?;
    manager.save()?;
    tracing::debug!("Saved {key} to {}", paths::settings_file(dir).display());
    Ok(())
}
