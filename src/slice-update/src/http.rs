//! Blocking HTTP client factory.
//!
//! Every request made by the updater goes through a client built here so
//! that the user agent and deadlines stay consistent.

use std::time::Duration;

use reqwest::blocking::Client;

/// User-Agent string for all HTTP requests (GitHub rejects requests without one)
pub const USER_AGENT: &str = concat!("slice/", env!("CARGO_PKG_VERSION"));

/// Connect timeout applied on top of the overall request deadline
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a blocking HTTP client with a custom timeout.
pub fn create_blocking_client(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()
        .map_err(|e| format!("Failed to build blocking HTTP client: {e}"))
}
