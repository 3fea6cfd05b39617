use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Compute request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Compute engine returned {status}: {message}")]
    Engine { status: u16, message: String },

    #[error("Compute did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Compute engine returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid compute engine URL: {0}")]
    Url(String),
}
