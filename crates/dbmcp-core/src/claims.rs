//! Typed bearer-token claims
//!
//! The connection URI is derived from claims carried in the bearer token's
//! payload segment. The token is decoded, not verified: this module is a
//! pure reader of self-asserted claims, and the server still authenticates
//! the bearer on the websocket handshake.

use serde::Deserialize;

use crate::encoding::decode_base64url_padded;
use crate::error::CredentialError;

/// Claims decoded from the payload segment of a bearer token
#[derive(Debug, Deserialize)]
pub struct BearerClaims {
    /// Databutton-specific claims object
    pub dbtn: Option<DbtnClaims>,
}

/// The nested claims object identifying the target app deployment
#[derive(Debug, Deserialize)]
pub struct DbtnClaims {
    /// App identifier
    #[serde(rename = "appId")]
    pub app_id: Option<String>,
    /// Deployment environment (e.g. `prod`)
    pub env: Option<String>,
}

impl BearerClaims {
    /// Decode claims from the middle dot-separated segment of a JWT-like
    /// bearer token. No signature verification is performed.
    pub fn from_token(token: &str) -> Result<Self, CredentialError> {
        let payload = token.split('.').nth(1).ok_or_else(|| {
            CredentialError::InvalidCredential("bearer token has no claims segment".to_string())
        })?;

        let bytes = decode_base64url_padded(payload).map_err(|e| {
            CredentialError::InvalidCredential(format!("bearer claims are not base64url: {e}"))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            CredentialError::InvalidCredential(format!("bearer claims are not valid JSON: {e}"))
        })
    }

    /// Extract the `appId` and `env` fields, failing fast on absence
    pub fn app_identity(&self) -> Result<(&str, &str), CredentialError> {
        let dbtn = self.dbtn.as_ref().ok_or_else(|| {
            CredentialError::InvalidCredential("missing dbtn claims object".to_string())
        })?;
        let app_id = dbtn.app_id.as_deref().ok_or_else(|| {
            CredentialError::InvalidCredential("missing appId claim".to_string())
        })?;
        let env = dbtn
            .env
            .as_deref()
            .ok_or_else(|| CredentialError::InvalidCredential("missing env claim".to_string()))?;
        Ok((app_id, env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn token_with_claims(claims: &str) -> String {
        format!("header.{}.signature", URL_SAFE_NO_PAD.encode(claims))
    }

    #[test]
    fn decodes_well_formed_claims() {
        let token = token_with_claims(r#"{"dbtn":{"appId":"abc","env":"prod"}}"#);
        let claims = BearerClaims::from_token(&token).unwrap();
        assert_eq!(claims.app_identity().unwrap(), ("abc", "prod"));
    }

    #[test]
    fn rejects_token_without_claims_segment() {
        let err = BearerClaims::from_token("no-dots-here").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidCredential(_)));
    }

    #[test]
    fn rejects_missing_dbtn_object() {
        let token = token_with_claims(r#"{"sub":"user"}"#);
        let claims = BearerClaims::from_token(&token).unwrap();
        assert!(claims.app_identity().is_err());
    }

    #[test]
    fn rejects_missing_app_id() {
        let token = token_with_claims(r#"{"dbtn":{"env":"prod"}}"#);
        let claims = BearerClaims::from_token(&token).unwrap();
        let err = claims.app_identity().unwrap_err();
        assert!(err.to_string().contains("appId"));
    }

    #[test]
    fn rejects_missing_env() {
        let token = token_with_claims(r#"{"dbtn":{"appId":"abc"}}"#);
        let claims = BearerClaims::from_token(&token).unwrap();
        let err = claims.app_identity().unwrap_err();
        assert!(err.to_string().contains("env"));
    }

    #[test]
    fn rejects_non_json_claims() {
        let token = format!("header.{}.sig", URL_SAFE_NO_PAD.encode("not json"));
        assert!(BearerClaims::from_token(&token).is_err());
    }
}
