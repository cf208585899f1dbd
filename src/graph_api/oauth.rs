//! OAuth token exchange against `/oauth/access_token` and `/debug_token`.
//!
//! The access-token endpoint answers successes in the classic
//! `key=value&key=value` form (newer API versions send JSON) and failures as a
//! JSON error envelope. Both are parsed structurally, never by position.

use crate::graph_api::classify::api_error_from_value;
use crate::graph_api::client::{build_url, GraphClient};
use crate::graph_api::signed_request::parse_signed_request;
use crate::graph_api::transport::Args;
use crate::graph_api::types::{
    ApiResponse, CookieUser, DebugTokenInfo, ExchangeResult, GraphError, TransportError,
};
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;

/// Prefix of the cookie set by the JavaScript SDK, followed by the app id
pub const SIGNED_REQUEST_COOKIE_PREFIX: &str = "fbsr_";

impl GraphClient {
    /// Exchange the `code` returned from an OAuth dialog for an access token
    pub async fn get_access_token_from_code(
        &self,
        code: &str,
        redirect_uri: &str,
        app_id: &str,
        app_secret: &str,
    ) -> Result<ExchangeResult, GraphError> {
        let args = Args::from([
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("client_id".to_string(), app_id.to_string()),
            ("client_secret".to_string(), app_secret.to_string()),
        ]);
        self.exchange_token(args).await
    }

    /// Exchange a short-lived user token for a long-lived one
    pub async fn get_long_lived_access_token(
        &self,
        app_id: &str,
        app_secret: &str,
        short_lived_token: &str,
    ) -> Result<ExchangeResult, GraphError> {
        let args = Args::from([
            ("grant_type".to_string(), "fb_exchange_token".to_string()),
            ("client_id".to_string(), app_id.to_string()),
            ("client_secret".to_string(), app_secret.to_string()),
            ("fb_exchange_token".to_string(), short_lived_token.to_string()),
        ]);
        self.exchange_token(args).await
    }

    /// Extend the expiration time of this client's own access token
    pub async fn extend_access_token(
        &self,
        app_id: &str,
        app_secret: &str,
    ) -> Result<ExchangeResult, GraphError> {
        let token = self.access_token().ok_or_else(|| {
            GraphError::Config("Extending a token requires an access token".to_string())
        })?;
        self.get_long_lived_access_token(app_id, app_secret, token)
            .await
    }

    /// Get an app access token via the client-credentials grant
    ///
    /// The endpoint sends no structured error for this grant, so anything
    /// other than an `access_token` is a transport error.
    pub async fn get_app_access_token(
        &self,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, GraphError> {
        let args = Args::from([
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), app_id.to_string()),
            ("client_secret".to_string(), app_secret.to_string()),
        ]);
        let url = build_url(&self.config().graph_endpoint("oauth/access_token"), &args)?;
        let (status, body) = self
            .transport()
            .get_text(&url, self.config().timeout)
            .await?;

        let token = if looks_like_json(&body) {
            serde_json::from_str::<Value>(body.trim())
                .ok()
                .and_then(|value| {
                    value
                        .get("access_token")
                        .and_then(Value::as_str)
                        .map(String::from)
                })
        } else {
            parse_key_value(&body).remove("access_token")
        };

        match token {
            Some(token) => {
                tracing::info!("Obtained app access token for app_id={}", app_id);
                Ok(token)
            }
            None => {
                tracing::error!(
                    "App access token request failed: HTTP {} ({} byte body)",
                    status,
                    body.len()
                );
                Err(TransportError::Parse(format!(
                    "No access_token in app token response (HTTP {})",
                    status
                ))
                .into())
            }
        }
    }

    /// Introspect `input_token` using an app token or a developer's user token
    pub async fn debug_access_token(
        &self,
        input_token: &str,
        access_token: &str,
    ) -> Result<DebugTokenInfo, GraphError> {
        let args = Args::from([
            ("input_token".to_string(), input_token.to_string()),
            ("access_token".to_string(), access_token.to_string()),
        ]);
        let url = build_url(&self.config().graph_endpoint("debug_token"), &args)?;
        let page = self.fetch_page(Method::GET, &url, None).await?;

        match page.value {
            ApiResponse::Json(value) => serde_json::from_value(value).map_err(|e| {
                tracing::error!("Failed to parse debug_token response: {}", e);
                TransportError::Parse(format!("Failed to parse debug_token response: {}", e))
                    .into()
            }),
            ApiResponse::Binary { mime_type, .. } => {
                Err(TransportError::UnsupportedContentType(mime_type).into())
            }
        }
    }

    /// Introspect `input_token`, returning its details only if it is valid
    pub async fn valid_access_token(
        &self,
        input_token: &str,
        access_token: &str,
    ) -> Result<Option<DebugTokenInfo>, GraphError> {
        let info = self.debug_access_token(input_token, access_token).await?;
        Ok(info.is_valid.then_some(info))
    }

    /// Resolve the session of a visitor from the JavaScript SDK cookie
    ///
    /// Reads `fbsr_<app_id>` from `cookies`, verifies it with `app_secret`
    /// and exchanges the embedded code for an access token. Returns
    /// `Ok(None)` when there is no usable session: missing cookie, failed
    /// verification, or an API error during the exchange. Transport errors
    /// are propagated.
    ///
    /// # Arguments
    ///
    /// * `cookies` - Cookie name to value mapping of the incoming request
    /// * `app_id` - Application id; selects the `fbsr_<app_id>` cookie
    /// * `app_secret` - Application secret used to verify the signature and
    ///   to exchange the code
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(CookieUser))` with the access token, its lifetime and
    /// the user id, `Ok(None)` when the visitor has no session, or
    /// `Err(GraphError)` on transport failure.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use graph_api_sdk::GraphClient;
    /// use std::collections::HashMap;
    ///
    /// # async fn example(cookies: HashMap<String, String>) -> Result<(), Box<dyn std::error::Error>> {
    /// let client = GraphClient::anonymous();
    /// match client.get_user_from_cookie(&cookies, "app_id", "app_secret").await? {
    ///     Some(user) => println!("Logged in as {}", user.uid),
    ///     None => println!("No session"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_user_from_cookie(
        &self,
        cookies: &HashMap<String, String>,
        app_id: &str,
        app_secret: &str,
    ) -> Result<Option<CookieUser>, GraphError> {
        let cookie_name = format!("{}{}", SIGNED_REQUEST_COOKIE_PREFIX, app_id);
        let Some(cookie) = cookies.get(&cookie_name).filter(|c| !c.is_empty()) else {
            tracing::debug!("No {} cookie present", cookie_name);
            return Ok(None);
        };

        let Some(parsed) = parse_signed_request(cookie, app_secret.as_bytes()) else {
            return Ok(None);
        };

        let (Some(code), Some(uid)) = (parsed.code, parsed.user_id) else {
            tracing::debug!("Signed request carries no code or user_id");
            return Ok(None);
        };

        match self
            .get_access_token_from_code(&code, "", app_id, app_secret)
            .await
        {
            Ok(token) => Ok(Some(CookieUser { token, uid })),
            Err(GraphError::Api(e)) => {
                tracing::warn!("Code exchange for cookie session failed: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Build the URL of the OAuth authorization dialog
    pub fn auth_url(
        &self,
        app_id: &str,
        canvas_url: &str,
        perms: &[&str],
        extra: Args,
    ) -> Result<String, GraphError> {
        let mut args = Args::from([
            ("client_id".to_string(), app_id.to_string()),
            ("redirect_uri".to_string(), canvas_url.to_string()),
        ]);
        if !perms.is_empty() {
            args.insert("scope".to_string(), perms.join(","));
        }
        args.extend(extra);
        build_url(&self.config().dialog_url, &args)
    }

    async fn exchange_token(&self, args: Args) -> Result<ExchangeResult, GraphError> {
        let url = build_url(&self.config().graph_endpoint("oauth/access_token"), &args)?;
        let (status, body) = self
            .transport()
            .get_text(&url, self.config().timeout)
            .await?;

        let result = parse_exchange_response(status, &body)?;
        tracing::info!(
            "Token exchange succeeded: expires={:?}, token length={}",
            result.expires,
            result.access_token.len()
        );
        Ok(result)
    }
}

/// Parse an `/oauth/access_token` response body
///
/// Successes are `access_token=...&expires=...` or a JSON object with
/// `access_token` and `expires_in`; failures are classified error envelopes.
pub fn parse_exchange_response(status: u16, body: &str) -> Result<ExchangeResult, GraphError> {
    if !looks_like_json(body) {
        let mut pairs = parse_key_value(body);
        return match pairs.remove("access_token") {
            Some(token) => Ok(ExchangeResult::new(token, pairs.remove("expires"))),
            None => {
                tracing::error!("Token exchange returned an unrecognised body (HTTP {})", status);
                Err(TransportError::Parse(format!(
                    "Unrecognised token exchange response (HTTP {})",
                    status
                ))
                .into())
            }
        };
    }

    let value: Value = serde_json::from_str(body.trim()).map_err(|e| {
        tracing::error!("Failed to parse token exchange JSON: {}", e);
        TransportError::Parse(format!("Failed to parse token exchange JSON: {}", e))
    })?;

    let http_status = (!(200..300).contains(&status)).then_some(status);
    if let Some(err) = api_error_from_value(&value, http_status) {
        tracing::error!("Token exchange failed: {}", err);
        return Err(GraphError::Api(err));
    }

    match value.get("access_token").and_then(Value::as_str) {
        Some(token) => {
            let expires = value
                .get("expires_in")
                .or_else(|| value.get("expires"))
                .and_then(|v| match v {
                    Value::Number(n) => Some(n.to_string()),
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                });
            Ok(ExchangeResult::new(token, expires))
        }
        None => Err(TransportError::Parse(
            "Token exchange response has no access_token".to_string(),
        )
        .into()),
    }
}

fn looks_like_json(body: &str) -> bool {
    body.trim_start().starts_with('{')
}

/// Decode a `key=value&key=value` body; the first occurrence of a key wins
fn parse_key_value(body: &str) -> HashMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(body.trim()).unwrap_or_default();
    let mut map = HashMap::new();
    for (key, value) in pairs {
        map.entry(key).or_insert(value);
    }
    map
}
