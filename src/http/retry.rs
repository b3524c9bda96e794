//! Attempt policy and HTTP status classification for upstream lookups.

use reqwest::StatusCode;

/// Number of attempts per request unless configured otherwise.
/// Upstream version lookups are not retried: a failure degrades one package only.
pub const DEFAULT_ATTEMPTS: usize = 1;

/// Delay between attempts in milliseconds when more than one is configured.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Errors that a repeated request cannot fix.
#[derive(Debug, thiserror::Error)]
pub enum NonRetryableError {
    #[error("Rate limit exceeded: {0}. Try again later or set GITHUB_TOKEN environment variable.")]
    RateLimitExceeded(String),
    #[error("Authentication failed: {0}. Check your GITHUB_TOKEN.")]
    AuthenticationFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Access forbidden: {0}. You may need authentication.")]
    Forbidden(String),
    #[error("Request error: {0}")]
    ClientError(String),
}

/// Classifies an HTTP error.
/// Returns Ok(()) if another attempt could succeed, Err with a user-facing reason if not.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let Some(status) = error.status() else {
        // Connection errors, timeouts and the like
        return Ok(());
    };

    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "upstream resource".to_string());

    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(
            "Invalid or missing authentication token".to_string(),
        )),
        StatusCode::FORBIDDEN => {
            let msg = error.to_string();
            if msg.contains("rate limit") {
                Err(NonRetryableError::RateLimitExceeded(
                    "GitHub API rate limit exceeded".to_string(),
                ))
            } else {
                Err(NonRetryableError::Forbidden(url))
            }
        }
        StatusCode::TOO_MANY_REQUESTS => Err(NonRetryableError::RateLimitExceeded(
            "Too many requests".to_string(),
        )),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(url)),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "HTTP {} from {}",
            s.as_u16(),
            url
        ))),
        // 5xx may succeed later
        _ => Ok(()),
    }
}

/// Converts an error from `error_for_status()` into an anyhow error,
/// replacing it with a [`NonRetryableError`] when repeating cannot help.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
