use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Why creating or updating a post failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Message(s) reported by the forum.
    #[error("{0}")]
    Rejected(String),
    /// Non-200 response without a usable message.
    #[error("publish failed ({0})")]
    Status(u16),
    /// 200 response that did not carry a numeric post id.
    #[error("publish failed: response did not include a post id")]
    MissingPostId,
    #[error("publish failed: {0}")]
    Transport(String),
}

/// Outcome of an API key check that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiKeyError {
    #[error("missing settings: forum URL and user API key are required")]
    MissingSettings,
    #[error("API key invalid")]
    Invalid,
    #[error("API key invalid ({0})")]
    Rejected(u16),
    #[error("API key invalid: {0}")]
    Transport(String),
}

/// Failure of a read-only fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed ({0})")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("request failed: {0}")]
    Transport(String),
}

/// Error body shapes the forum uses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

/// Turn a failed response into a [`PublishError`].
///
/// Prefers the `errors` array (joined one per line), then the singular
/// `error` string, then a generic status message.
pub(crate) fn publish_error_from_body(status: StatusCode, body: &str) -> PublishError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        return PublishError::Rejected(errors.join("\n"));
    }
    if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
        return PublishError::Rejected(error);
    }
    PublishError::Status(status.as_u16())
}

/// Text for a transport-level failure.
pub(crate) fn transport_message(error: &reqwest::Error) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        "unknown error".to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_array_wins() {
        let body = r#"{"errors":["Title is too short","Body is too short"],"error":"ignored"}"#;
        assert_eq!(
            publish_error_from_body(StatusCode::UNPROCESSABLE_ENTITY, body),
            PublishError::Rejected("Title is too short\nBody is too short".to_string())
        );
    }

    #[test]
    fn test_singular_error_used_when_no_array() {
        let body = r#"{"error":"You are not permitted to view the requested resource."}"#;
        assert_eq!(
            publish_error_from_body(StatusCode::FORBIDDEN, body),
            PublishError::Rejected(
                "You are not permitted to view the requested resource.".to_string()
            )
        );
    }

    #[test]
    fn test_empty_array_falls_through() {
        let body = r#"{"errors":[],"error":"rate limited"}"#;
        assert_eq!(
            publish_error_from_body(StatusCode::TOO_MANY_REQUESTS, body),
            PublishError::Rejected("rate limited".to_string())
        );
    }

    #[test]
    fn test_unparseable_body_reports_status() {
        let err = publish_error_from_body(StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>");
        assert_eq!(err, PublishError::Status(502));
        assert_eq!(err.to_string(), "publish failed (502)");
    }

    #[test]
    fn test_wrongly_typed_errors_field_reports_status() {
        let body = r#"{"errors":"not a list"}"#;
        assert_eq!(
            publish_error_from_body(StatusCode::BAD_REQUEST, body),
            PublishError::Status(400)
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiKeyError::Rejected(403).to_string(),
            "API key invalid (403)"
        );
        assert_eq!(
            PublishError::Transport("connection refused".to_string()).to_string(),
            "publish failed: connection refused"
        );
    }
}
