use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::carrier::CarrierError;
use crate::services::documents::DocumentError;

const FALLBACK_CARRIER_MESSAGE: &str = "BRT returned an error without a readable message";
const MAX_CARRIER_MESSAGE_LEN: usize = 300;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// JSON body returned for every failed API call
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Operator-facing error description
    pub message: String,
    /// Structured extras: validation messages, suggested reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation failed: {}", .0.join("; "))]
    InvalidForm(Vec<String>),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The carrier kept rejecting the numeric reference; `suggested` is the next free value.
    #[error("Reference conflict: {message} (suggested reference {suggested})")]
    ReferenceConflict { suggested: i64, message: String },

    #[error(transparent)]
    Carrier(#[from] CarrierError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    /// True when the failure came from the carrier as a business rejection.
    pub fn is_carrier_rejection(&self) -> bool {
        matches!(self, ServiceError::Carrier(err) if err.is_rejection())
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidForm(_) | Self::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) | Self::ReferenceConflict { .. } => StatusCode::CONFLICT,
            Self::Carrier(err) if err.is_rejection() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Carrier(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_)
            | Self::Document(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operator-facing message. Carrier rejections are shown after normalization,
    /// unexpected failures are wrapped in a generic sentence.
    pub fn response_message(&self) -> String {
        match self {
            Self::Carrier(CarrierError::Rejected { message, .. }) => {
                format!("BRT: {}", normalize_carrier_message(message))
            }
            Self::Carrier(_) => {
                "Unexpected error while contacting BRT, please retry later".to_string()
            }
            Self::ReferenceConflict { suggested, message } => format!(
                "BRT: {}. The numeric reference has been moved to {}",
                normalize_carrier_message(message),
                suggested
            ),
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::Storage(_)
            | Self::Document(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Unexpected internal error".to_string(),
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidForm(errors) => Some(json!({ "errors": errors })),
            Self::ReferenceConflict { suggested, .. } => {
                Some(json!({ "suggested_reference": suggested }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

static NOISE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style>|<script[^>]*>.*?</script>|<head[^>]*>.*?</head>")
        .expect("static regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));
static CSS_RULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^{}<>]*\{[^{}]*\}").expect("static regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Extracts a clean sentence from a carrier error body that may be plain text,
/// an HTML error page, or a JSON document.
pub fn normalize_carrier_message(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FALLBACK_CARRIER_MESSAGE.to_string();
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return match extract_json_message(&value) {
                Some(found) if !found.trim_start().starts_with('{') => {
                    normalize_carrier_message(&found)
                }
                _ => FALLBACK_CARRIER_MESSAGE.to_string(),
            };
        }
    }

    let mut text = trimmed.to_string();
    if text.contains('<') {
        text = NOISE_BLOCK_RE.replace_all(&text, " ").into_owned();
        text = TAG_RE.replace_all(&text, " ").into_owned();
        text = CSS_RULE_RE.replace_all(&text, " ").into_owned();
    }
    let text = decode_entities(&text);
    let text = WHITESPACE_RE.replace_all(&text, " ");
    let text = text.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();

    if text.is_empty() {
        return FALLBACK_CARRIER_MESSAGE.to_string();
    }
    truncate_sentence(text)
}

fn extract_json_message(value: &Value) -> Option<String> {
    const KEYS: [&str; 7] = [
        "message",
        "executionMessage",
        "codeDesc",
        "error",
        "errors",
        "detail",
        "title",
    ];

    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(extract_json_message),
        Value::Object(map) => {
            for key in KEYS {
                if let Some(found) = map.get(key).and_then(extract_json_message) {
                    return Some(found);
                }
            }
            map.values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(extract_json_message)
        }
        _ => None,
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&egrave;", "è")
        .replace("&agrave;", "à")
        .replace("&amp;", "&")
}

fn truncate_sentence(text: &str) -> String {
    if text.chars().count() <= MAX_CARRIER_MESSAGE_LEN {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_CARRIER_MESSAGE_LEN).collect();
    match head.rfind(['.', '!', '?']) {
        Some(end) if end > MAX_CARRIER_MESSAGE_LEN / 3 => head[..=end].to_string(),
        _ => format!("{}…", head.trim_end()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[tokio::test]
    async fn reference_conflict_exposes_suggested_reference() {
        let response = ServiceError::ReferenceConflict {
            suggested: 42,
            message: "Numeric sender reference already used".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.details.unwrap()["suggested_reference"], 42);
    }

    #[test]
    fn status_code_distinguishes_carrier_failures() {
        let rejected = ServiceError::Carrier(CarrierError::Rejected {
            code: Some(-7),
            message: "bad zip".into(),
        });
        let transport = ServiceError::Carrier(CarrierError::Transport("timeout".into()));
        assert_eq!(rejected.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(transport.status_code(), StatusCode::BAD_GATEWAY);
        assert!(rejected.is_carrier_rejection());
        assert!(!transport.is_carrier_rejection());
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("disk layout".into()).response_message(),
            "Unexpected internal error"
        );
        assert_eq!(
            ServiceError::Carrier(CarrierError::Transport("dns".into())).response_message(),
            "Unexpected error while contacting BRT, please retry later"
        );
        assert_eq!(
            ServiceError::NotFound("Shipment 3 not found".into()).response_message(),
            "Not found: Shipment 3 not found"
        );
    }

    #[test]
    fn normalizes_html_error_page() {
        let raw = r#"<html><head><title>Error</title><style>body { color: red; }</style></head>
            <body><h1>Errore</h1><p>CAP destinatario non valido &amp; localit&agrave; errata</p></body></html>"#;
        assert_eq!(
            normalize_carrier_message(raw),
            "Errore CAP destinatario non valido & località errata"
        );
    }

    #[test]
    fn normalizes_json_error_body() {
        let raw = r#"{"createResponse":{"executionMessage":{"code":-63,"severity":"ERROR","codeDesc":"REFERENCE","message":"Numeric sender reference already used"}}}"#;
        assert_eq!(
            normalize_carrier_message(raw),
            "Numeric sender reference already used"
        );
    }

    #[test]
    fn normalizes_plain_text_and_empty_bodies() {
        assert_eq!(normalize_carrier_message("  weight   missing \n"), "weight missing");
        assert_eq!(normalize_carrier_message("   "), FALLBACK_CARRIER_MESSAGE);
        assert_eq!(normalize_carrier_message("{}"), FALLBACK_CARRIER_MESSAGE);
    }

    #[test]
    fn long_messages_are_cut_at_a_sentence_boundary() {
        let sentence = "The consignee address could not be routed to any depot. ";
        let raw = sentence.repeat(10);
        let normalized = normalize_carrier_message(&raw);
        assert!(normalized.chars().count() <= MAX_CARRIER_MESSAGE_LEN);
        assert!(normalized.ends_with('.'));
    }
}
