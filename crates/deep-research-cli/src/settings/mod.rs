pub mod manager;
pub mod resolved;
pub mod types;
