//! Error types for credential resolution

use thiserror::Error;

/// Errors produced while turning an API key into a connection target
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The API key could not be decoded under any supported format,
    /// or a required field was missing from the decoded payload
    #[error("Invalid API key: {0}")]
    InvalidCredential(String),

    /// The refresh-token exchange with the token issuer did not
    /// yield an access token
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),
}
