//! Error envelope parsing and classification.
//!
//! The Graph API reports failures in a JSON envelope, sometimes with a
//! non-2xx status and sometimes inside a 200 response. Classification uses a
//! two-level table: the top-level `code` picks a kind directly, except for
//! the OAuth codes (190 for the Graph API, 102 for the legacy REST API) which
//! share a second table keyed by `error_subcode`.

use crate::graph_api::types::{ApiError, ErrorKind};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// Second-level table for OAuth failures
static OAUTH_SUBCODES: Lazy<HashMap<i64, ErrorKind>> = Lazy::new(|| {
    HashMap::from([
        (458, ErrorKind::AppAuthError),
        (459, ErrorKind::UserCheckpointedError),
        (460, ErrorKind::PasswordChangedError),
        (463, ErrorKind::TokenExpiredError),
        (464, ErrorKind::UnconfirmedUserError),
        (467, ErrorKind::InvalidTokenError),
    ])
});

/// Entry of the top-level table
enum CodeEntry {
    Kind(ErrorKind),
    Subcodes(&'static Lazy<HashMap<i64, ErrorKind>>),
}

static ERROR_CODES: Lazy<HashMap<i64, CodeEntry>> = Lazy::new(|| {
    HashMap::from([
        (1, CodeEntry::Kind(ErrorKind::ServerError)),
        (2, CodeEntry::Kind(ErrorKind::ServerError)),
        (4, CodeEntry::Kind(ErrorKind::ServerError)),
        (17, CodeEntry::Kind(ErrorKind::ServerError)),
        (10, CodeEntry::Kind(ErrorKind::UserError)),
        (190, CodeEntry::Subcodes(&OAUTH_SUBCODES)),
        // legacy REST code for the same OAuth conditions
        (102, CodeEntry::Subcodes(&OAUTH_SUBCODES)),
    ])
});

/// Map an error code (and subcode, for OAuth codes) to an error kind
///
/// Never fails: anything missing from the table is `UnknownError`.
pub fn classify(code: i64, subcode: Option<i64>) -> ErrorKind {
    match ERROR_CODES.get(&code) {
        Some(CodeEntry::Kind(kind)) => *kind,
        Some(CodeEntry::Subcodes(table)) => subcode
            .and_then(|sub| table.get(&sub).copied())
            .unwrap_or(ErrorKind::UnknownError),
        None => ErrorKind::UnknownError,
    }
}

/// Raw fields of an error envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorEnvelope {
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    pub message: String,
    pub error_type: String,
}

impl ErrorEnvelope {
    /// Extract an error envelope from a decoded body
    ///
    /// Recognises the Graph form `{"error": {...}}`, the legacy REST form
    /// `{"error_code", "error_msg"}` and the OAuth form
    /// `{"error": "...", "error_description"}`. Returns `None` for anything
    /// else, including non-object bodies such as a bare `false`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        match object.get("error") {
            Some(Value::Object(error)) => {
                return Some(Self {
                    code: error.get("code").and_then(as_i64),
                    subcode: error
                        .get("error_subcode")
                        .or_else(|| error.get("subcode"))
                        .and_then(as_i64),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    error_type: error
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            Some(Value::String(error)) if !error.is_empty() => {
                let message = object
                    .get("error_description")
                    .and_then(Value::as_str)
                    .unwrap_or(error.as_str());
                return Some(Self {
                    code: None,
                    subcode: None,
                    message: message.to_string(),
                    error_type: error.clone(),
                });
            }
            _ => {}
        }

        let code = object.get("error_code")?;
        Some(Self {
            code: as_i64(code),
            subcode: object.get("error_subcode").and_then(as_i64),
            message: object
                .get("error_msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            error_type: String::new(),
        })
    }

    /// Only the OAuth codes consult the subcode
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            Some(code) => {
                let subcode = if matches!(code, 190 | 102) {
                    self.subcode
                } else {
                    None
                };
                classify(code, subcode)
            }
            None => ErrorKind::UnknownError,
        }
    }

    pub fn into_api_error(self, http_status: Option<u16>) -> ApiError {
        ApiError {
            kind: self.kind(),
            code: self.code,
            subcode: self.subcode,
            message: self.message,
            error_type: self.error_type,
            http_status,
        }
    }
}

/// Classify a decoded body if it is an error envelope
pub fn api_error_from_value(value: &Value, http_status: Option<u16>) -> Option<ApiError> {
    ErrorEnvelope::from_value(value).map(|envelope| envelope.into_api_error(http_status))
}

/// The legacy API sends numeric codes as strings on some endpoints
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_error_codes() {
        for code in [1, 2, 4, 17] {
            assert_eq!(classify(code, None), ErrorKind::ServerError);
            assert_eq!(classify(code, Some(463)), ErrorKind::ServerError);
        }
    }

    #[test]
    fn test_user_error_code() {
        assert_eq!(classify(10, None), ErrorKind::UserError);
    }

    #[test]
    fn test_oauth_alias() {
        for code in [190, 102] {
            assert_eq!(classify(code, Some(458)), ErrorKind::AppAuthError);
            assert_eq!(classify(code, Some(459)), ErrorKind::UserCheckpointedError);
            assert_eq!(classify(code, Some(460)), ErrorKind::PasswordChangedError);
            assert_eq!(classify(code, Some(463)), ErrorKind::TokenExpiredError);
            assert_eq!(classify(code, Some(464)), ErrorKind::UnconfirmedUserError);
            assert_eq!(classify(code, Some(467)), ErrorKind::InvalidTokenError);
        }
    }

    #[test]
    fn test_unknown_lookups() {
        assert_eq!(classify(9999, None), ErrorKind::UnknownError);
        assert_eq!(classify(190, None), ErrorKind::UnknownError);
        assert_eq!(classify(190, Some(1)), ErrorKind::UnknownError);
        assert_eq!(classify(-1, Some(463)), ErrorKind::UnknownError);
    }

    #[test]
    fn test_graph_envelope() {
        let body = json!({
            "error": {
                "code": 190,
                "error_subcode": 463,
                "message": "Expired",
                "type": "OAuthException"
            }
        });
        let err = api_error_from_value(&body, None).unwrap();
        assert_eq!(err.kind, ErrorKind::TokenExpiredError);
        assert_eq!(err.code, Some(190));
        assert_eq!(err.subcode, Some(463));
        assert_eq!(err.message, "Expired");
        assert_eq!(err.error_type, "OAuthException");
    }

    #[test]
    fn test_subcode_ignored_outside_oauth_codes() {
        let body = json!({"error": {"code": 10, "error_subcode": 463, "message": "nope"}});
        let err = api_error_from_value(&body, None).unwrap();
        assert_eq!(err.kind, ErrorKind::UserError);
        assert_eq!(err.subcode, Some(463));
    }

    #[test]
    fn test_legacy_envelope() {
        let body = json!({"error_code": "102", "error_msg": "Session key invalid"});
        let envelope = ErrorEnvelope::from_value(&body).unwrap();
        assert_eq!(envelope.code, Some(102));
        assert_eq!(envelope.message, "Session key invalid");
        assert_eq!(envelope.kind(), ErrorKind::UnknownError);
    }

    #[test]
    fn test_oauth_draft_envelope() {
        let body = json!({"error": "invalid_request", "error_description": "Bad code"});
        let err = api_error_from_value(&body, Some(400)).unwrap();
        assert_eq!(err.kind, ErrorKind::UnknownError);
        assert_eq!(err.message, "Bad code");
        assert_eq!(err.http_status, Some(400));
    }

    #[test]
    fn test_non_error_bodies() {
        assert!(ErrorEnvelope::from_value(&json!(false)).is_none());
        assert!(ErrorEnvelope::from_value(&json!(true)).is_none());
        assert!(ErrorEnvelope::from_value(&json!([1, 2, 3])).is_none());
        assert!(ErrorEnvelope::from_value(&json!({"id": "123"})).is_none());
        assert!(ErrorEnvelope::from_value(&json!({"error": null})).is_none());
    }
}
