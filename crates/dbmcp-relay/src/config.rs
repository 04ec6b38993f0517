//! Relay session tuning

use std::time::Duration;

/// Timing knobs for a relay session.
///
/// Timeouts apply only to the connecting phase and the keepalive; the
/// steady-state relay itself has none.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Bound on the websocket handshake
    pub connect_timeout: Duration,
    /// Interval between keepalive pings
    pub ping_interval: Duration,
    /// How long after a ping a pong reply may take before the connection
    /// is treated as closed
    pub ping_timeout: Duration,
    /// Grace period for a canceled pump to wind down
    pub shutdown_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}
