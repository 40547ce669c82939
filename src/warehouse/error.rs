use thiserror::Error;

/// Errors surfaced by a warehouse backend
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Snowflake error {code} (SQL state {sql_state}, HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        sql_state: String,
        message: String,
    },

    #[error("Statement {handle} did not finish within {timeout_secs}s")]
    Timeout { handle: String, timeout_secs: u64 },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Statement rejected: {0}")]
    Rejected(String),
}
