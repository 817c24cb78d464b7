pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod modes;
pub mod settings;

pub use config::paths;
pub use error::CliError;
pub use modes::PrintOutputMode;
pub use settings::manager::SettingsManager;
pub use settings::resolved::{ResolvedSettings, resolve};
pub use settings::types::Settings;
