use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

/// Errors returned to callers of the scale manager.
#[derive(Error, Debug)]
pub enum ScaleError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("settings store error: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to write theme file: {0}")]
    ThemeFile(#[from] std::io::Error),

    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl ScaleError {
    pub fn to_http_response(&self) -> (StatusCode, String) {
        match self {
            ScaleError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ScaleError::Settings(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ScaleError::ThemeFile(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal I/O error".to_string()),
            ScaleError::JoinError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        }
    }
}

impl IntoResponse for ScaleError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg) = self.to_http_response();
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("key {key} does not hold a {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("settings lock poisoned")]
    Poisoned,
}

/// Failures of the external boot-splash re-theming operation. These are logged, never returned
/// to callers.
#[derive(Error, Debug)]
pub enum RethemeError {
    #[error("failed to read boot-splash config: {0}")]
    Config(#[from] std::io::Error),

    #[error("no boot-splash theme for factor {0}")]
    UnsupportedFactor(u8),

    #[error("failed to spawn {command}: {source}")]
    Spawn { command: String, source: std::io::Error },

    #[error("{command} exited with {status}")]
    ExitStatus { command: String, status: String },

    #[error("re-theming thread failed to join: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to deliver {signal}: {reason}")]
    Delivery { signal: &'static str, reason: String },
}
