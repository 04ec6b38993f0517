//! dbmcp-core: Credential resolution for the Databutton app MCP proxy
//!
//! Turns an opaque API key into the websocket endpoint and bearer token
//! needed to open an authenticated MCP session. Two key formats are
//! supported: the current signed format (requires a refresh-token exchange
//! with the token issuer) and a legacy self-contained format from initial
//! testing.

pub mod apikey;
pub mod claims;
mod encoding;
pub mod error;
pub mod token;

pub use apikey::{resolve, ConnectionTarget};
pub use error::CredentialError;
pub use token::{FirebaseTokenExchanger, TokenExchanger};
