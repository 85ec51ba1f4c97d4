use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("More than one visible element matches {locator} ({count} visible)")]
    AmbiguousElement { locator: String, count: usize },

    #[error("Typed value never matched for {locator}: wanted {expected:?}, field holds {actual:?} after {attempts} attempts")]
    InputMismatch {
        locator: String,
        expected: String,
        actual: String,
        attempts: u32,
    },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Response has no __VIEWSTATE token after step {0}")]
    MissingViewState(String),

    #[error("Not supported yet: {0}")]
    NotSupported(String),

    #[error("Unknown tax bracket: {0}")]
    UnknownTaxBracket(String),

    #[error("Invalid plan configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid date {0:?}, expected MM/DD/YYYY")]
    InvalidDate(String),

    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
