//! The two relay pumps
//!
//! Each pump owns one half of the split socket and runs as its own task, so
//! a slow or blocked side never stalls the other. Both are generic over
//! their I/O endpoints so they can be exercised against in-memory pipes and
//! channels.

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::session::RelayError;

/// Inbound pump: stdin lines → outbound text messages.
///
/// Owns the write half of the socket, and with it the ping ticker: pings go
/// out every `ping_interval`. The pong deadline is enforced by the outbound
/// pump, which lives for the whole connection. End-of-input is a clean stop
/// (a close frame is sent); it is not an error.
pub(crate) async fn inbound_pump<R, S>(
    reader: R,
    mut sink: S,
    config: RelayConfig,
    cancel: CancellationToken,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error,
{
    let mut lines = reader.lines();
    let mut ticker = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                tracing::debug!("Inbound pump canceled");
                return Ok(());
            }

            _ = ticker.tick() => {
                sink.send(Message::Ping(Vec::new()))
                    .await
                    .map_err(|e| RelayError::ConnectionLost(format!("ping failed: {e}")))?;
            }

            line = lines.next_line() => match line? {
                Some(line) => {
                    tracing::trace!("Forwarding {} bytes from stdin", line.len());
                    sink.send(Message::Text(line))
                        .await
                        .map_err(|e| RelayError::ConnectionLost(format!("send failed: {e}")))?;
                }
                None => {
                    tracing::debug!("EOF reached on stdin, closing");
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}

/// Outbound pump: inbound text messages → stdout lines.
///
/// Owns the read half of the socket and, because it runs for the whole
/// connection (it keeps draining after stdin EOF), the keepalive deadline:
/// a pong not observed within `ping_interval + ping_timeout` of the last
/// one means the connection is gone. Every text message becomes one line,
/// flushed immediately - the far side expects timely delivery. Non-text
/// frames other than pong and close are ignored.
pub(crate) async fn outbound_pump<T, E, W>(
    mut stream: T,
    mut writer: W,
    config: RelayConfig,
    cancel: CancellationToken,
) -> Result<(), RelayError>
where
    T: Stream<Item = Result<Message, E>> + Unpin,
    E: std::error::Error,
    W: AsyncWrite + Unpin,
{
    let keepalive_deadline = config.ping_interval + config.ping_timeout;
    let mut last_pong = Instant::now();
    let mut ticker = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Outbound pump canceled");
                return Ok(());
            }

            _ = ticker.tick() => {
                if last_pong.elapsed() > keepalive_deadline {
                    return Err(RelayError::KeepaliveTimeout(keepalive_deadline));
                }
            }

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    writer.write_all(text.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                Some(Ok(Message::Pong(_))) => {
                    last_pong = Instant::now();
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Connection closed by peer: {:?}", frame);
                    return Ok(());
                }
                Some(Ok(other)) => {
                    tracing::trace!("Ignoring non-text message: {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(RelayError::ConnectionLost(e.to_string()));
                }
                None => {
                    tracing::info!("Websocket stream ended");
                    return Ok(());
                }
            }
        }
    }
}
