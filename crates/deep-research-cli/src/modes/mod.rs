pub mod config_mode;
pub mod health_mode;
pub mod reports_mode;
pub mod research_mode;

pub use research_mode::PrintOutputMode;
