//! dbmcp-relay: Bidirectional stdio/websocket relay for MCP
//!
//! Owns one authenticated websocket session and runs two concurrent pumps
//! (stdin → socket, socket → stdout) until either side closes or the
//! process is asked to stop. Payloads are opaque: one line per message, no
//! interpretation. Stdout is reserved exclusively for relayed payloads; all
//! diagnostics go to the log stream.

mod config;
mod pump;
mod session;

pub use config::RelayConfig;
pub use session::{RelayError, RelaySession};
