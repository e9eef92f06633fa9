use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use time::{Duration, OffsetDateTime};

use crate::error::Error;

/// Claims read from an access token payload **without** verifying its signature.
///
/// Only used client-side to schedule refreshes; the backends verify the token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl TokenClaims {
    /// Expiry instant from the `exp` claim.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
    }

    /// Gets any claim by key, including the typed ones.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<JsonValue> {
        match key {
            "exp" => self.exp.map(JsonValue::from),
            "iat" => self.iat.map(JsonValue::from),
            "sub" => self.sub.clone().map(JsonValue::from),
            "preferred_username" => self.preferred_username.clone().map(JsonValue::from),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// Decodes the payload segment of a compact JWT (`header.payload.signature`).
///
/// # Errors
///
/// Returns `Error::Token` if the token does not have three segments or the
/// payload is not base64url-encoded JSON.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    // Some issuers pad their segments; base64url without padding rejects '='.
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    serde_json::from_slice(&payload).map_err(|e| Error::Token(format!("invalid payload: {e}")))
}

/// `true` when `expires_at` falls within `threshold` of `now` (or is past).
#[must_use]
pub fn expires_within(expires_at: OffsetDateTime, now: OffsetDateTime, threshold: Duration) -> bool {
    expires_at - now <= threshold
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
