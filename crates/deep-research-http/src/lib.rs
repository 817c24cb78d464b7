pub mod client;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_server;

pub use client::{ApiClient, ClientOptions, DEFAULT_API_URL};
pub use error::ApiError;
pub use transport::HttpTransport;
