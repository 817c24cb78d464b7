use std::path::PathBuf;
use std::time::Duration;

use deep_research_http::DEFAULT_API_URL;

use crate::cli::args::Args;
use crate::settings::types::Settings;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Settings after applying file, environment and command-line layers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub api_url: String,
    pub output_dir: Option<PathBuf>,
    pub log_level: String,
    pub connect_timeout: Option<Duration>,
}

/// Precedence, lowest first: settings files, `env_api_url`, flags.
pub fn resolve(settings: &Settings, env_api_url: Option<String>, args: &Args) -> ResolvedSettings {
    let api_url = args
        .api_url
        .clone()
        .or(env_api_url.filter(|v| !v.trim().is_empty()))
        .or_else(|| settings.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| settings.output_dir.clone())
        .map(PathBuf::from);

    let log_level = args
        .log_level
        .clone()
        .or_else(|| settings.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    ResolvedSettings {
        api_url,
        output_dir,
        log_level,
        connect_timeout: settings.connect_timeout_secs.map(Duration::from_secs),
    }
}
