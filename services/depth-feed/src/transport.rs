//! WebSocket transport
//!
//! One task per stream. Text frames are forwarded verbatim to the session;
//! control messages from the session are serialized and written back. The
//! transport never interprets payloads.

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::events::ControlMessage;
use crate::session::TransportEnds;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),

    #[error("failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode a control message as a text frame payload.
pub fn encode_control(msg: &ControlMessage) -> Result<String, TransportError> {
    Ok(serde_json::to_string(msg)?)
}

/// Connect to `url` and pump frames until the peer closes, the session drops
/// its inbound receiver, or the control sender is dropped.
pub async fn run_feed(url: &str, ends: TransportEnds) -> Result<(), TransportError> {
    let TransportEnds {
        inbound,
        mut control,
    } = ends;

    let (socket, _) = connect_async(url)
        .await
        .map_err(|source| TransportError::Connect {
            url: url.to_string(),
            source,
        })?;
    info!(url, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = control.recv() => {
                let Some(msg) = outbound else {
                    debug!(url, "Control channel closed, closing socket");
                    sink.send(Message::Close(None)).await?;
                    return Ok(());
                };
                let payload = encode_control(&msg)?;
                debug!(url, payload = %payload, "Sending control message");
                sink.send(Message::Text(payload.into())).await?;
            }

            frame = stream.next() => {
                let Some(frame) = frame else {
                    info!(url, "WebSocket stream ended");
                    return Ok(());
                };

                match frame? {
                    Message::Text(text) => {
                        if inbound.send(text.to_string()).await.is_err() {
                            debug!(url, "Session gone, stopping transport");
                            return Ok(());
                        }
                    }
                    Message::Ping(payload) => {
                        sink.send(Message::Pong(payload)).await?;
                    }
                    Message::Close(frame) => {
                        info!(url, ?frame, "WebSocket closed by peer");
                        return Ok(());
                    }
                    other => {
                        warn!(url, kind = ?other, "Ignoring non-text frame");
                    }
                }
            }
        }
    }
}
