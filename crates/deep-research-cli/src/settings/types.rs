use serde::{Deserialize, Serialize};

/// Persisted client settings, stored as camelCase JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Backend base URL including the API prefix, e.g. `http://localhost:8000/api`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Directory reports are written to when saving is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// `tracing` filter directive, e.g. `info` or `deep_research_core=debug`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

/// Keys accepted by `config set`.
pub const SETTING_KEYS: &[&str] = &["apiUrl", "outputDir", "logLevel", "connectTimeoutSecs"];

impl Settings {
    /// Set one field from its camelCase key and a string value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "apiUrl" => self.api_url = Some(value.to_string()),
            "outputDir" => self.output_dir = Some(value.to_string()),
            "logLevel" => self.log_level = Some(value.to_string()),
            "connectTimeoutSecs" => {
                let secs = value
                    .parse::<u64>()
                    .map_err(|_| format!("connectTimeoutSecs must be a whole number, got '{value}'"))?;
                self.connect_timeout_secs = Some(secs);
            }
            _ => {
                return Err(format!(
                    "Unknown setting '{key}'. Known settings: {}",
                    SETTING_KEYS.join(", ")
                ));
            }
        }
        Ok(())
    }
}
