//! Relay session lifecycle
//!
//! One session = one websocket connection + two pump tasks. The session
//! supervises the pumps and tears everything down together on any
//! termination trigger: socket closure, stdin EOF, a pump error, or
//! external cancellation. Teardown happens exactly once; there is no
//! reconnect.

use std::time::Duration;

use futures::{Sink, Stream, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderMap, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use dbmcp_core::ConnectionTarget;

use crate::config::RelayConfig;
use crate::pump::{inbound_pump, outbound_pump};

/// Subprotocol offered on the handshake
const MCP_SUBPROTOCOL: &str = "mcp";

/// User agent identifying the proxy
const USER_AGENT: &str = "databutton-app-mcp";

/// Relay and connection errors
#[derive(Error, Debug)]
pub enum RelayError {
    /// TLS/handshake/subprotocol negotiation failure
    #[error("Connection handshake failed: {0}")]
    Handshake(String),

    /// The gateway refused the connection; the app-side bridge is likely
    /// disabled or not deployed
    #[error("Connection refused: {0}")]
    GatewayUnavailable(String),

    /// The socket closed after being successfully opened
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// No keepalive reply arrived in time
    #[error("No keepalive reply within {0:?}, treating connection as closed")]
    KeepaliveTimeout(Duration),

    /// Local I/O error (stdin/stdout)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns one websocket session and its two pump tasks
pub struct RelaySession {
    config: RelayConfig,
    cancel: CancellationToken,
}

impl RelaySession {
    /// Create a session. `cancel` is the external stop signal; the caller
    /// wires it to process signals.
    pub fn new(config: RelayConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Connect to the target and relay between stdio and the socket until
    /// the session ends.
    pub async fn run(&self, target: &ConnectionTarget) -> Result<(), RelayError> {
        let ws = tokio::select! {
            ws = self.connect(target) => ws?,
            _ = self.cancel.cancelled() => {
                tracing::info!("Stop requested while connecting");
                return Ok(());
            }
        };
        tracing::info!("Connection established");

        let (sink, stream) = ws.split();
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();

        self.relay(sink, stream, stdin, stdout).await
    }

    /// Open the websocket with subprotocol, auth header and user agent.
    /// TLS (system trust store) is used for `wss://`; plain transport
    /// otherwise, with a visible warning.
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, RelayError> {
        tracing::info!("Connecting to mcp server at {}", target.uri);

        if !target.uri.starts_with("wss://") {
            tracing::warn!("Using insecure websocket connection");
        }

        let mut request = target
            .uri
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::Handshake(format!("invalid uri: {e}")))?;

        let headers = request.headers_mut();
        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(MCP_SUBPROTOCOL),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        if let Some(bearer) = &target.bearer {
            let value = HeaderValue::from_str(&format!("Bearer {bearer}")).map_err(|e| {
                RelayError::Handshake(format!("bearer token is not a valid header value: {e}"))
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let (ws, response) =
            tokio::time::timeout(self.config.connect_timeout, connect_async(request))
                .await
                .map_err(|_| RelayError::Handshake("connection attempt timed out".to_string()))?
                .map_err(|e| classify_handshake_error(e, &target.uri))?;

        verify_negotiated_subprotocol(response.headers())?;

        tracing::debug!("Handshake complete: HTTP status {}", response.status());
        Ok(ws)
    }

    /// Run both pumps to completion under a shared child token.
    ///
    /// Termination rules:
    /// - outbound pump ends (socket closed or read error): cancel inbound,
    ///   report the outbound result;
    /// - inbound pump ends cleanly (stdin EOF): keep the outbound pump
    ///   draining until the socket closes, so nothing in flight is lost;
    /// - inbound pump errs, or the external token fires: cancel both.
    ///
    /// Canceled pumps get a bounded grace period, then are aborted. No
    /// task outlives this call.
    async fn relay<S, T, E, R, W>(
        &self,
        sink: S,
        stream: T,
        stdin: R,
        stdout: W,
    ) -> Result<(), RelayError>
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: std::error::Error + Send,
        T: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: std::error::Error + Send + 'static,
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pump_cancel = self.cancel.child_token();

        let mut inbound = tokio::spawn(inbound_pump(
            stdin,
            sink,
            self.config,
            pump_cancel.clone(),
        ));
        let mut outbound = tokio::spawn(outbound_pump(
            stream,
            stdout,
            self.config,
            pump_cancel.clone(),
        ));

        tokio::select! {
            res = &mut outbound => {
                pump_cancel.cancel();
                self.await_pump(&mut inbound).await;
                join_flatten(res)
            }

            res = &mut inbound => match join_flatten(res) {
                Ok(()) => {
                    // Clean EOF on stdin: drain the socket side.
                    tokio::select! {
                        res = &mut outbound => join_flatten(res),
                        _ = self.cancel.cancelled() => {
                            pump_cancel.cancel();
                            self.await_pump(&mut outbound).await;
                            Ok(())
                        }
                    }
                }
                Err(e) => {
                    pump_cancel.cancel();
                    self.await_pump(&mut outbound).await;
                    Err(e)
                }
            },

            _ = self.cancel.cancelled() => {
                tracing::info!("Stop requested, closing session");
                pump_cancel.cancel();
                self.await_pump(&mut inbound).await;
                self.await_pump(&mut outbound).await;
                Ok(())
            }
        }
    }

    /// Wait out the grace period for a canceled pump, then abort it
    async fn await_pump(&self, handle: &mut JoinHandle<Result<(), RelayError>>) {
        if tokio::time::timeout(self.config.shutdown_grace, &mut *handle)
            .await
            .is_err()
        {
            tracing::debug!("Pump did not stop within grace period, aborting");
            handle.abort();
        }
    }
}

fn join_flatten(res: Result<Result<(), RelayError>, JoinError>) -> Result<(), RelayError> {
    match res {
        Ok(result) => result,
        Err(e) => Err(RelayError::ConnectionLost(format!("pump task failed: {e}"))),
    }
}

/// The server must select the offered subprotocol; a missing or different
/// selection means the endpoint is not speaking MCP.
fn verify_negotiated_subprotocol(headers: &HeaderMap) -> Result<(), RelayError> {
    match headers.get(header::SEC_WEBSOCKET_PROTOCOL) {
        Some(proto) if proto.as_bytes() == MCP_SUBPROTOCOL.as_bytes() => Ok(()),
        Some(proto) => Err(RelayError::Handshake(format!(
            "server selected unexpected subprotocol {:?}",
            proto
        ))),
        None => Err(RelayError::Handshake(format!(
            "server did not accept the {MCP_SUBPROTOCOL} subprotocol"
        ))),
    }
}

/// Map a handshake failure to the error taxonomy. A bad-gateway response
/// gets an actionable message: it almost always means the app-side bridge
/// is disabled or the app has not been redeployed since enabling it.
fn classify_handshake_error(error: WsError, uri: &str) -> RelayError {
    match error {
        WsError::Http(response) if response.status() == StatusCode::BAD_GATEWAY => {
            let hint = if uri.contains("prodx") {
                "has the Databutton app been deployed after enabling MCP?"
            } else {
                "has MCP been enabled in the Databutton app?"
            };
            RelayError::GatewayUnavailable(hint.to_string())
        }
        WsError::Http(response) => RelayError::Handshake(format!(
            "server rejected the handshake with status {}",
            response.status()
        )),
        other => RelayError::Handshake(other.to_string()),
    }
}
