use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Graph API client error type
///
/// Represents all possible errors that can occur when talking to the
/// Graph API or one of its OAuth endpoints.
#[derive(Debug)]
pub enum GraphError {
    /// The server answered with an error envelope (classified)
    Api(ApiError),
    /// The request never produced a usable response (network, timeout, parsing)
    Transport(TransportError),
    /// Client-side misuse, e.g. a write call without an access token
    Config(String),
}

impl GraphError {
    /// The classified API error, if this is one
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            GraphError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// The error kind, if this is a classified API error
    pub fn kind(&self) -> Option<ErrorKind> {
        self.api_error().map(|err| err.kind)
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::Api(err) => write!(f, "Graph API error: {}", err),
            GraphError::Transport(err) => write!(f, "Transport error: {}", err),
            GraphError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<ApiError> for GraphError {
    fn from(err: ApiError) -> Self {
        GraphError::Api(err)
    }
}

impl From<TransportError> for GraphError {
    fn from(err: TransportError) -> Self {
        GraphError::Transport(err)
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        GraphError::Transport(TransportError::from(err))
    }
}

/// Failures below the API layer. These are never classified.
#[derive(Debug)]
pub enum TransportError {
    /// Network error (connection refused, reset, DNS, ...)
    Network(String),
    /// The configured per-call timeout elapsed
    Timeout,
    /// Response carried a content type the client cannot decode
    UnsupportedContentType(String),
    /// Failed to parse the response body
    Parse(String),
    /// Request building failed
    Request(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "Network error: {}", msg),
            TransportError::Timeout => write!(f, "Request timeout"),
            TransportError::UnsupportedContentType(ct) => {
                write!(f, "Unsupported content type: {}", ct)
            }
            TransportError::Parse(msg) => write!(f, "Parse error: {}", msg),
            TransportError::Request(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Network(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            TransportError::Request(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Classified kind of a Graph API error
///
/// The OAuth kinds all mean the access token can no longer be used and the
/// user has to go through authentication again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transient server-side failure, retry later (codes 1, 2, 4, 17)
    ServerError,
    /// Permission not granted or revoked by the user (code 10)
    UserError,
    /// User removed the app from their settings (subcode 458)
    AppAuthError,
    /// User is checkpointed and must log in on the website (subcode 459)
    UserCheckpointedError,
    /// User changed their password (subcode 460)
    PasswordChangedError,
    /// Access token expired (subcode 463)
    TokenExpiredError,
    /// User must confirm their account on the website (subcode 464)
    UnconfirmedUserError,
    /// Access token is invalid (subcode 467)
    InvalidTokenError,
    /// Code or subcode not present in the classification table
    UnknownError,
}

impl ErrorKind {
    /// Whether this kind belongs to the OAuth branch of the hierarchy
    pub fn is_oauth(&self) -> bool {
        matches!(
            self,
            ErrorKind::AppAuthError
                | ErrorKind::UserCheckpointedError
                | ErrorKind::PasswordChangedError
                | ErrorKind::TokenExpiredError
                | ErrorKind::UnconfirmedUserError
                | ErrorKind::InvalidTokenError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ServerError => "ServerError",
            ErrorKind::UserError => "UserError",
            ErrorKind::AppAuthError => "AppAuthError",
            ErrorKind::UserCheckpointedError => "UserCheckpointedError",
            ErrorKind::PasswordChangedError => "PasswordChangedError",
            ErrorKind::TokenExpiredError => "TokenExpiredError",
            ErrorKind::UnconfirmedUserError => "UnconfirmedUserError",
            ErrorKind::InvalidTokenError => "InvalidTokenError",
            ErrorKind::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified error returned by the Graph API
///
/// `message` is passed through verbatim from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    pub message: String,
    pub error_type: String,
    /// HTTP status, when the error came from a non-2xx response
    pub http_status: Option<u16>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(code) = self.code {
            write!(f, " (code {}", code)?;
            if let Some(subcode) = self.subcode {
                write!(f, ", subcode {}", subcode)?;
            }
            write!(f, ")")?;
        }
        if let Some(status) = self.http_status {
            write!(f, " HTTP {}", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// A decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON document (object, list or scalar)
    Json(serde_json::Value),
    /// Binary payload, e.g. a profile picture connection
    Binary {
        data: Vec<u8>,
        mime_type: String,
        /// Final URL after redirects
        url: String,
    },
}

impl ApiResponse {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            ApiResponse::Binary { .. } => None,
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            ApiResponse::Binary { .. } => None,
        }
    }
}

/// One page of a connection listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// The `data` field of the envelope, or the whole body if there is none
    pub value: ApiResponse,
    /// `paging.next` from the envelope
    pub next: Option<String>,
}

/// Result of an OAuth token exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResult {
    pub access_token: String,
    /// Lifetime in seconds, exactly as sent by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// `expires` resolved against the time the response was parsed
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExchangeResult {
    pub fn new(access_token: impl Into<String>, expires: Option<String>) -> Self {
        let expires_at = expires
            .as_deref()
            .and_then(|secs| secs.trim().parse::<i64>().ok())
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        Self {
            access_token: access_token.into(),
            expires,
            expires_at,
        }
    }

    /// Check if the token has expired. Tokens without an expiry never do.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at < Utc::now()).unwrap_or(false)
    }
}

/// Session identity resolved from a signed-request cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieUser {
    #[serde(flatten)]
    pub token: ExchangeResult,
    pub uid: String,
}

/// Token introspection result from the debug endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugTokenInfo {
    pub is_valid: bool,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub app_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Ids are sent as numbers by older API versions and as strings by newer ones
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oauth_branch() {
        assert!(ErrorKind::TokenExpiredError.is_oauth());
        assert!(ErrorKind::InvalidTokenError.is_oauth());
        assert!(!ErrorKind::ServerError.is_oauth());
        assert!(!ErrorKind::UnknownError.is_oauth());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError {
            kind: ErrorKind::TokenExpiredError,
            code: Some(190),
            subcode: Some(463),
            message: "Expired".to_string(),
            error_type: "OAuthException".to_string(),
            http_status: None,
        };
        assert_eq!(
            err.to_string(),
            "TokenExpiredError (code 190, subcode 463): Expired"
        );
    }

    #[test]
    fn test_exchange_result_expiry() {
        let result = ExchangeResult::new("T123", Some("5183999".to_string()));
        assert!(result.expires_at.is_some());
        assert!(!result.is_expired());

        let no_expiry = ExchangeResult::new("T123", None);
        assert!(no_expiry.expires_at.is_none());
        assert!(!no_expiry.is_expired());
    }

    #[test]
    fn test_debug_token_info_numeric_ids() {
        let info: DebugTokenInfo = serde_json::from_value(json!({
            "app_id": 138483919580948u64,
            "application": "Social Cafe",
            "expires_at": 1352419328,
            "is_valid": true,
            "issued_at": 1347235328,
            "metadata": {"sso": "iphone-safari"},
            "scopes": ["email", "publish_actions"],
            "user_id": 1207059
        }))
        .unwrap();

        assert!(info.is_valid);
        assert_eq!(info.app_id.as_deref(), Some("138483919580948"));
        assert_eq!(info.user_id.as_deref(), Some("1207059"));
        assert_eq!(info.expires_at.unwrap().timestamp(), 1352419328);
        assert_eq!(info.scopes, vec!["email", "publish_actions"]);
    }
}
