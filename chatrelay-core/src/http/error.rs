//! HTTP error mapping utilities

use crate::error::RelayError;
use crate::providers::openai::types::OpenAIError;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

/// Map a non-success status and its body to an `UpstreamStatus` error
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> RelayError {
    let error_message = body
        .as_deref()
        .and_then(openai_error_message)
        .or_else(|| {
            body.as_deref()
                .and_then(|b| serde_json::from_str::<Value>(b).ok())
                .and_then(|v| extract_error_message(&v))
        })
        .or_else(|| body.filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()))
        });

    RelayError::UpstreamStatus {
        status: status.as_u16(),
        message: format!("{} [request_id: {}]", error_message, request_id),
    }
}

/// OpenAI format: { "error": { "message": "...", "type": "...", "code": "..." } }
fn openai_error_message(body: &str) -> Option<String> {
    let detail = serde_json::from_str::<OpenAIError>(body).ok()?.error;
    Some(match detail.error_type.or(detail.code) {
        Some(kind) => format!("{} ({})", detail.message, kind),
        None => detail.message,
    })
}

/// Looser shapes from compatible servers: a nested `error.message` with odd
/// field types, `{ "message": "..." }` or `{ "error": "..." }`
fn extract_error_message(json: &Value) -> Option<String> {
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
    {
        return Some(message.to_string());
    }

    json.get("message")
        .or_else(|| json.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(err: RelayError) -> (u16, String) {
        match err {
            RelayError::UpstreamStatus { status, message } => (status, message),
            other => panic!("Expected UpstreamStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_openai_error_body() {
        let id = Uuid::new_v4();
        let body =
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let (status, message) =
            message_of(map_http_error(StatusCode::UNAUTHORIZED, Some(body.into()), id));
        assert_eq!(status, 401);
        assert!(message.starts_with("Incorrect API key provided (invalid_request_error)"));
        assert!(message.contains(&id.to_string()));
    }

    #[test]
    fn test_openai_error_with_numeric_code_falls_back() {
        let body = r#"{"error":{"message":"model not loaded","code":503}}"#;
        let (_, message) = message_of(map_http_error(
            StatusCode::SERVICE_UNAVAILABLE,
            Some(body.into()),
            Uuid::new_v4(),
        ));
        assert!(message.starts_with("model not loaded"));
    }

    #[test]
    fn test_generic_error_body() {
        let (_, message) = message_of(map_http_error(
            StatusCode::BAD_REQUEST,
            Some(r#"{"error":"model is required"}"#.into()),
            Uuid::new_v4(),
        ));
        assert!(message.starts_with("model is required"));
    }

    #[test]
    fn test_plain_text_body() {
        let (status, message) = message_of(map_http_error(
            StatusCode::BAD_GATEWAY,
            Some("upstream exploded".into()),
            Uuid::new_v4(),
        ));
        assert_eq!(status, 502);
        assert!(message.starts_with("upstream exploded"));
    }

    #[test]
    fn test_missing_body_uses_reason() {
        let (_, message) = message_of(map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            Uuid::new_v4(),
        ));
        assert!(message.starts_with("Too Many Requests"));
    }
}
