use thiserror::Error;

/// Errors raised by the timeline pipeline, the model adapter and the exporters.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Invalid startingTime '{0}': expected YYYY-MM-DDTHH:MM:SS.sssZ")]
    InvalidStartTime(String),

    // Feed errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Too many requests for URL {0}")]
    RateLimited(String),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    // Model errors
    #[error("Model error: {0}")]
    Model(String),

    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Prediction task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, PredictError>;
