//! WebSocket channel implementation for Blade.
//!
//! Each channel owns one spawned task that connects, then pumps frames in
//! both directions until either side closes. Outgoing frames reach the task
//! through an unbounded queue so `send` never blocks the session.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use blade_core::{BladeError, BladeResult};

use super::{Channel, ChannelEvents, ChannelFactory};

/// What the session asks the socket task to do.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// Creates [`WebSocketChannel`]s with `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketFactory;

impl ChannelFactory for WebSocketFactory {
    fn create(&self, host: &str, events: ChannelEvents) -> BladeResult<Box<dyn Channel>> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(socket_loop(host.to_string(), events, out_rx));
        Ok(Box::new(WebSocketChannel { out_tx }))
    }
}

/// Handle to a socket task.
pub struct WebSocketChannel {
    out_tx: mpsc::UnboundedSender<Outgoing>,
}

impl Channel for WebSocketChannel {
    fn send(&mut self, text: String) -> BladeResult<()> {
        self.out_tx
            .send(Outgoing::Text(text))
            .map_err(|_| BladeError::Transport("socket task has ended".into()))
    }

    fn close(&mut self) {
        let _ = self.out_tx.send(Outgoing::Close);
    }
}

/// Connect, report `Opened`, then route frames until the socket goes down.
async fn socket_loop(
    url: String,
    events: ChannelEvents,
    mut out_rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            tracing::error!(host = %url, "WebSocket connect error: {}", e);
            events.errored(format!("WebSocket connect error: {e}"));
            events.closed(None, "connect failed");
            return;
        }
    };

    tracing::info!(host = %url, "WebSocket connected");
    events.opened();

    let (mut ws_sink, mut ws_read) = ws_stream.split();
    let mut close_code = None;
    let mut close_reason = String::new();

    loop {
        tokio::select! {
            outgoing = out_rx.recv() => match outgoing {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = ws_sink.send(Message::Text(text)).await {
                        events.errored(format!("WS send error: {e}"));
                        break;
                    }
                }
                // Close requested, or the session dropped the channel.
                Some(Outgoing::Close) | None => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    close_reason = "closed by client".into();
                    break;
                }
            },

            incoming = ws_read.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.message(text),
                Some(Ok(Message::Binary(data))) => {
                    events.message(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws_sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("WebSocket close frame received");
                    if let Some(frame) = frame {
                        close_code = Some(u16::from(frame.code));
                        close_reason = frame.reason.into_owned();
                    }
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!("WebSocket read error: {}", e);
                    events.errored(e.to_string());
                    break;
                }
                None => break,
            },
        }
    }

    events.closed(close_code, close_reason);
    tracing::debug!(host = %url, "WebSocket loop ended");
}
