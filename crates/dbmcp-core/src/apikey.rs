//! API key interpretation
//!
//! An API key resolves to the websocket endpoint and optional bearer token
//! for one app. Two formats coexist:
//!
//! - *Signed keys* (`dbtk-v1-` prefix): base64url JSON carrying a refresh
//!   token, which is exchanged for a bearer token whose claims determine the
//!   endpoint.
//! - *Legacy keys* from initial testing: a self-contained JSON object
//!   (optionally base64-encoded) carrying the endpoint directly.
//!
//! Legacy decoding tries an ordered list of strategies and swallows
//! per-strategy failures; only exhaustion of all strategies is an error.
//! This is deliberate tolerance for key-format drift, not silent success
//! masking.

use serde::Deserialize;

use crate::claims::BearerClaims;
use crate::encoding::decode_base64url_padded;
use crate::error::CredentialError;
use crate::token::TokenExchanger;

/// Prefix identifying the signed API key format
pub const SIGNED_KEY_PREFIX: &str = "dbtk-v1-";

/// Host of the derived websocket endpoint for signed keys
pub const API_HOST: &str = "api.databutton.com";

/// Where to connect and how to authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Websocket endpoint (`ws://localhost...`, `ws://127.0.0.1:...` or `wss://...`)
    pub uri: String,
    /// Bearer token for the `Authorization` header, if the key carried one
    pub bearer: Option<String>,
}

/// Payload of a signed API key
#[derive(Debug, Deserialize)]
struct SignedKeyPayload {
    /// Opaque refresh token
    tok: String,
}

/// Decoded legacy key contents
#[derive(Debug, Deserialize)]
struct LegacyKey {
    uri: Option<String>,
    #[serde(rename = "authCode", alias = "accessToken")]
    auth_code: Option<String>,
}

/// Resolve an API key into a connection target.
///
/// Fails with [`CredentialError::InvalidCredential`] on any structural
/// problem and never partially succeeds. The token exchange happens only
/// for signed keys.
pub async fn resolve(
    apikey: &str,
    exchanger: &dyn TokenExchanger,
) -> Result<ConnectionTarget, CredentialError> {
    if apikey.is_empty() {
        return Err(CredentialError::InvalidCredential(
            "API key must be provided".to_string(),
        ));
    }

    if let Some(encoded) = apikey.strip_prefix(SIGNED_KEY_PREFIX) {
        resolve_signed(encoded, exchanger).await
    } else {
        resolve_legacy(apikey)
    }
}

/// Signed path: decode the key payload, exchange the refresh token, then
/// derive the endpoint from the bearer token's claims.
async fn resolve_signed(
    encoded: &str,
    exchanger: &dyn TokenExchanger,
) -> Result<ConnectionTarget, CredentialError> {
    let bytes = decode_base64url_padded(encoded).map_err(|e| {
        CredentialError::InvalidCredential(format!("signed key payload is not base64url: {e}"))
    })?;
    let payload: SignedKeyPayload = serde_json::from_slice(&bytes).map_err(|e| {
        CredentialError::InvalidCredential(format!("signed key payload is not valid JSON: {e}"))
    })?;

    let bearer = exchanger.exchange(&payload.tok).await?;

    let claims = BearerClaims::from_token(&bearer)?;
    let (app_id, env) = claims.app_identity()?;

    let uri = format!("wss://{API_HOST}/_projects/{app_id}/dbtn/{env}/app/mcp/ws");

    Ok(ConnectionTarget {
        uri,
        bearer: Some(bearer),
    })
}

/// Legacy decoding strategies, applied in order; the first success wins.
///
/// Each strategy is a pure total function so the sequence is testable in
/// isolation. Encodings here are strict about padding, matching how legacy
/// keys were issued.
const LEGACY_STRATEGIES: &[fn(&str) -> Option<LegacyKey>] = &[
    decode_base64url_key,
    decode_base64_key,
    decode_raw_json_key,
];

fn decode_base64url_key(apikey: &str) -> Option<LegacyKey> {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine;
    let bytes = URL_SAFE.decode(apikey).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn decode_base64_key(apikey: &str) -> Option<LegacyKey> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    let bytes = STANDARD.decode(apikey).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn decode_raw_json_key(apikey: &str) -> Option<LegacyKey> {
    serde_json::from_str(apikey).ok()
}

/// Legacy path: try each decoding strategy, then validate the embedded URI.
fn resolve_legacy(apikey: &str) -> Result<ConnectionTarget, CredentialError> {
    let key = LEGACY_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(apikey))
        .ok_or_else(|| CredentialError::InvalidCredential("Invalid API key".to_string()))?;

    let uri = key.uri.ok_or_else(|| {
        CredentialError::InvalidCredential("Missing URI in api key".to_string())
    })?;

    if !is_allowed_uri(&uri) {
        return Err(CredentialError::InvalidCredential(
            "URI must start with 'ws://' or 'wss://'".to_string(),
        ));
    }

    Ok(ConnectionTarget {
        uri,
        bearer: key.auth_code,
    })
}

/// Scheme whitelist: loopback plaintext or TLS only
fn is_allowed_uri(uri: &str) -> bool {
    uri.starts_with("ws://localhost")
        || uri.starts_with("ws://127.0.0.1:")
        || uri.starts_with("wss://")
}
