//! Mapping of registry HTTP responses and transport failures onto [`CipError`].
//!
//! Nothing here is retried: every failure is final for the current command.

use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::error::CipError;

/// JSON error body returned by the registry: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Classifies a non-success status and its body.
///
/// The server's `error` field is surfaced verbatim when the body has one.
pub fn classify_status(status: StatusCode, body: &str, url: &str) -> CipError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .ok();

    match status {
        StatusCode::NOT_FOUND => {
            CipError::NotFound(message.unwrap_or_else(|| format!("{} not found", url)))
        }
        _ => CipError::RegistryError {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string()
            }),
        },
    }
}

/// Passes successful responses through and turns the rest into a [`CipError`].
pub async fn check_status(response: Response) -> Result<Response, CipError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body, &url))
}

/// Failures below HTTP (refused connection, DNS, TLS, broken body).
pub fn transport_error(error: reqwest::Error) -> CipError {
    CipError::RegistryUnavailable(error.to_string())
}
