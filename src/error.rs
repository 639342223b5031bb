// Error taxonomy shared by every module.
//
// Only two boundaries swallow these errors (`RecordStore::insert_one` and
// `Assistant::send_message`); everything else propagates with `?`.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// The store or completion endpoint answered with a non-success status,
    /// or with a body we could not use.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Required CSV columns or form fields are absent.
    #[error("missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    #[error("malformed CSV: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("configuration error: {0}")]
    Config(String),
}
