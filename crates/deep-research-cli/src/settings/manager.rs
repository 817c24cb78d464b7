use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::paths;
use crate::error::CliError;
use crate::settings::types::Settings;

/// Manages loading, merging, and saving of settings.
pub struct SettingsManager {
    base_dir: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            settings: Settings::default(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Load settings from settings.json. A missing file leaves the defaults.
    pub fn load(&mut self) -> Result<&Settings, CliError> {
        let path = paths::settings_file(&self.base_dir);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            self.settings = serde_json::from_str(&content).map_err(|e| {
                CliError::Config(format!("Invalid settings file {}: {e}", path.display()))
            })?;
        }
        Ok(&self.settings)
    }

    /// Load the user file, then overlay project-level settings on top.
    pub fn load_and_merge(
        &mut self,
        project_settings: Option<&Settings>,
    ) -> Result<&Settings, CliError> {
        self.load()?;
        if let Some(project) = project_settings {
            self.update(project)?;
        }
        Ok(&self.settings)
    }

    /// Save current settings atomically (temp file + rename).
    /// On Unix the file is created owner-only (0600).
    pub fn save(&self) -> Result<(), CliError> {
        let path = paths::settings_file(&self.base_dir);
        paths::ensure_dir(&self.base_dir)?;
        let content = serde_json::to_string_pretty(&self.settings)?;

        let unique = uuid::Uuid::new_v4();
        let tmp_path = path.with_file_name(format!(".settings.{unique}.tmp"));

        {
            use std::io::Write;

            #[cfg(unix)]
            let mut file = {
                use std::os::unix::fs::OpenOptionsExt;
                std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(&tmp_path)?
            };
            #[cfg(not(unix))]
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;

            file.write_all(content.as_bytes()).map_err(|e| {
                let _ = std::fs::remove_file(&tmp_path);
                CliError::Io(e)
            })?;
        }

        std::fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            CliError::Io(e)
        })?;
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Merge a partial settings object into the current one.
    pub fn update(&mut self, partial: &Settings) -> Result<(), CliError> {
        let base = serde_json::to_value(&self.settings)?;
        let overlay = serde_json::to_value(partial)?;
        let merged = deep_merge(base, overlay);
        self.settings = serde_json::from_value(merged)?;
        Ok(())
    }
}

/// Read `<cwd>/.deep-research/settings.json` if present and valid.
pub fn load_project_settings(cwd: &Path) -> Option<Settings> {
    let mut manager = SettingsManager::new(&paths::project_dir(cwd));
    match manager.load() {
        Ok(_) => Some(manager.settings().clone()),
        Err(e) => {
            tracing::warn!("Ignoring project settings: {e}");
            None
        }
    }
}

/// Deep merge two JSON values. `overlay` values take precedence.
/// Objects are recursively merged; other types are replaced.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}
