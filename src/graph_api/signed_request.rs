//! Verification of signed requests issued by the client-side login widget.
//!
//! A signed request is `<signature>.<payload>`, both parts base64url with
//! the padding stripped. The signature is HMAC-SHA256 over the *encoded*
//! payload using the app secret. Anything malformed or forged yields `None`:
//! an unauthenticated visitor is an expected outcome, not an error.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// The only algorithm accepted in a signed request
pub const SIGNED_REQUEST_ALGORITHM: &str = "HMAC-SHA256";

/// Decoded payload of a signed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub algorithm: String,
    /// Present once the user has authorised the app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Short-lived authorization code, exchangeable for an access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Any other claims carried by the payload
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Verify a signed request and return its payload
///
/// Returns `None` if the input is malformed, uses another algorithm, or the
/// signature does not match `app_secret`.
pub fn parse_signed_request(signed_request: &str, app_secret: &[u8]) -> Option<SignedRequest> {
    if !signed_request.is_ascii() {
        tracing::warn!("Rejecting signed request: non-ASCII input");
        return None;
    }

    let Some((encoded_sig, payload)) = signed_request.split_once('.') else {
        tracing::warn!("Rejecting signed request: missing '.' separator");
        return None;
    };

    let sig = match decode_segment(encoded_sig) {
        Some(sig) => sig,
        None => {
            tracing::warn!("Rejecting signed request: signature is not valid base64url");
            return None;
        }
    };
    let data = match decode_segment(payload) {
        Some(data) => data,
        None => {
            tracing::warn!("Rejecting signed request: payload is not valid base64url");
            return None;
        }
    };

    let parsed: SignedRequest = match serde_json::from_slice(&data) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Rejecting signed request: payload is not valid JSON: {}", e);
            return None;
        }
    };

    if !parsed.algorithm.eq_ignore_ascii_case(SIGNED_REQUEST_ALGORITHM) {
        tracing::warn!(
            "Rejecting signed request: unsupported algorithm {:?}",
            parsed.algorithm
        );
        return None;
    }

    let expected = compute_signature(app_secret, payload.as_bytes());
    if !bool::from(expected.as_slice().ct_eq(&sig)) {
        tracing::warn!("Rejecting signed request: signature mismatch");
        return None;
    }

    tracing::debug!(
        "Signed request verified: user_id={:?}, has_code={}",
        parsed.user_id,
        parsed.code.is_some()
    );
    Some(parsed)
}

/// Encode and sign a payload in the signed-request format
///
/// The inverse of [`parse_signed_request`]. Useful for tests and for apps
/// that hand signed requests to their own components.
pub fn sign_request(payload: &serde_json::Value, app_secret: &[u8]) -> String {
    let encoded_payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    let sig = compute_signature(app_secret, encoded_payload.as_bytes());
    format!("{}.{}", URL_SAFE_NO_PAD.encode(sig), encoded_payload)
}

fn compute_signature(app_secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(app_secret).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Decode one base64url segment, restoring `=` padding to a multiple of 4
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let padding = (4 - segment.len() % 4) % 4;
    let padded = format!("{}{}", segment, "=".repeat(padding));
    URL_SAFE.decode(padded).ok()
}
