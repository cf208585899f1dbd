use crate::graph_api::classify::api_error_from_value;
use crate::graph_api::types::{ApiError, ApiResponse, ErrorKind, GraphError, TransportError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;

/// Query or form arguments of a Graph API call
pub type Args = BTreeMap<String, String>;

/// Body of a POST request
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    /// `application/x-www-form-urlencoded`
    Form(Args),
    /// Pre-encoded body with its content type (multipart uploads)
    Raw { content_type: String, body: Vec<u8> },
}

/// Performs single HTTP round trips against the API hosts
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Perform one request and decode the body
    ///
    /// Error envelopes are classified whatever the HTTP status. The body is
    /// read to the end before decoding, so the connection goes back to the
    /// pool on every path.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse, GraphError> {
        tracing::debug!("Sending {} request to: {}", method, redact(url));

        let mut request = self.http.request(method.clone(), url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        request = match body {
            Some(RequestBody::Form(args)) => request.form(&args),
            Some(RequestBody::Raw { content_type, body }) => {
                request.header(CONTENT_TYPE, content_type).body(body)
            }
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send {} request to {}: {}", method, redact(url), e);
            TransportError::from(e)
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        tracing::debug!(
            "Received response with status: {} ({})",
            status,
            if content_type.is_empty() { "no content type" } else { content_type.as_str() }
        );

        let body = response.bytes().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            TransportError::from(e)
        })?;

        decode_response(status.as_u16(), &content_type, &final_url, body.to_vec())
    }

    /// Perform one GET and return the status and raw body text
    ///
    /// Used by the OAuth endpoints, whose success bodies are not always JSON.
    pub async fn get_text(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<(u16, String), GraphError> {
        tracing::debug!("Sending GET request to: {}", redact(url));

        let mut request = self.http.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send GET request to {}: {}", redact(url), e);
            TransportError::from(e)
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            TransportError::from(e)
        })?;

        tracing::debug!("Received response with status: {}", status);
        Ok((status, text))
    }
}

/// Decode a response body by status and content type
pub(crate) fn decode_response(
    status: u16,
    content_type: &str,
    url: &str,
    body: Vec<u8>,
) -> Result<ApiResponse, GraphError> {
    if !(200..300).contains(&status) {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&body) {
            if let Some(err) = api_error_from_value(&value, Some(status)) {
                tracing::error!("Request failed: HTTP {} - {}", status, err);
                return Err(GraphError::Api(err));
            }
        }

        let message = String::from_utf8_lossy(&body).into_owned();
        tracing::error!("Request failed: HTTP {} - {}", status, message);
        return Err(GraphError::Api(ApiError {
            kind: ErrorKind::UnknownError,
            code: None,
            subcode: None,
            message,
            error_type: String::new(),
            http_status: Some(status),
        }));
    }

    let mut mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime.is_empty() {
        // no header means plain text
        mime = "text/plain".to_string();
    }

    if is_json_mime(&mime) {
        let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!("Failed to parse response JSON: {}", e);
            TransportError::Parse(format!("Failed to parse response JSON: {}", e))
        })?;

        // some failures arrive with a 200 status
        if let Some(err) = api_error_from_value(&value, None) {
            tracing::error!("Request failed inside a successful response: {}", err);
            return Err(GraphError::Api(err));
        }

        Ok(ApiResponse::Json(value))
    } else if mime.starts_with("image/") {
        Ok(ApiResponse::Binary {
            data: body,
            mime_type: content_type.to_string(),
            url: url.to_string(),
        })
    } else {
        tracing::error!("Unsupported response content type: {:?}", content_type);
        Err(TransportError::UnsupportedContentType(content_type.to_string()).into())
    }
}

/// `text/*` is what the API historically sends for JSON bodies
fn is_json_mime(mime: &str) -> bool {
    mime.starts_with("text/") || mime == "application/json" || mime.ends_with("+json")
}

/// Strip the query string so access tokens never reach the logs
pub(crate) fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_body(value: &str) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    #[test]
    fn test_decode_json_object() {
        let response = decode_response(
            200,
            "text/javascript; charset=UTF-8",
            "https://graph.test/me",
            json_body(r#"{"id": "123"}"#),
        )
        .unwrap();
        assert_eq!(response, ApiResponse::Json(serde_json::json!({"id": "123"})));
    }

    #[test]
    fn test_decode_non_object_success() {
        let response =
            decode_response(200, "application/json", "https://graph.test/1_2", json_body("false"))
                .unwrap();
        assert_eq!(response, ApiResponse::Json(serde_json::Value::Bool(false)));
    }

    #[test]
    fn test_decode_error_in_200() {
        let err = decode_response(
            200,
            "text/javascript",
            "https://graph.test/me",
            json_body(r#"{"error":{"code":190,"error_subcode":463,"message":"Expired"}}"#),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TokenExpiredError));
        assert_eq!(err.api_error().unwrap().message, "Expired");
    }

    #[test]
    fn test_decode_image() {
        let response = decode_response(
            200,
            "image/jpeg",
            "https://cdn.test/pic.jpg",
            vec![0xff, 0xd8, 0xff],
        )
        .unwrap();
        match response {
            ApiResponse::Binary { data, mime_type, url } => {
                assert_eq!(data, vec![0xff, 0xd8, 0xff]);
                assert_eq!(mime_type, "image/jpeg");
                assert_eq!(url, "https://cdn.test/pic.jpg");
            }
            other => panic!("expected binary response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unsupported_content_type() {
        let err = decode_response(200, "application/octet-stream", "u", vec![1, 2]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Transport(TransportError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_decode_missing_content_type_as_json() {
        let response = decode_response(200, "", "https://graph.test/1_2", json_body("true")).unwrap();
        assert_eq!(response, ApiResponse::Json(serde_json::Value::Bool(true)));

        let err = decode_response(
            200,
            "",
            "https://graph.test/me",
            json_body(r#"{"error":{"code":2,"message":"Service temporarily unavailable"}}"#),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ServerError));
    }

    #[test]
    fn test_decode_non_2xx_without_envelope() {
        let err = decode_response(502, "text/html", "u", json_body("Bad Gateway")).unwrap_err();
        let api = err.api_error().unwrap();
        assert_eq!(api.kind, ErrorKind::UnknownError);
        assert_eq!(api.http_status, Some(502));
        assert_eq!(api.message, "Bad Gateway");
    }

    #[test]
    fn test_decode_non_2xx_with_envelope() {
        let err = decode_response(
            400,
            "text/javascript",
            "u",
            json_body(r#"{"error":{"code":10,"message":"Permission denied","type":"OAuthException"}}"#),
        )
        .unwrap_err();
        let api = err.api_error().unwrap();
        assert_eq!(api.kind, ErrorKind::UserError);
        assert_eq!(api.http_status, Some(400));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("https://graph.test/me?access_token=secret"), "https://graph.test/me");
        assert_eq!(redact("https://graph.test/me"), "https://graph.test/me");
    }
}
