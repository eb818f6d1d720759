//! WebSocket transport: bridges a tungstenite connection to the plain
//! channel ends a [`crate::StateSyncChannel`] and session consume.

use crate::error::ViewerError;
use bpdash_core::ChannelEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

pub struct Transport {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// `http://hub:8080` -> `ws://hub:8080/ws`
pub fn ws_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let rest = base
        .strip_prefix("https://")
        .map(|r| format!("wss://{r}"))
        .or_else(|| base.strip_prefix("http://").map(|r| format!("ws://{r}")))
        .unwrap_or_else(|| base.to_string());
    format!("{rest}/ws")
}

pub async fn connect(base_url: &str) -> Result<Transport, ViewerError> {
    let url = ws_url(base_url);
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|source| ViewerError::Connect { url: url.clone(), source })?;
    info!(target: "channel", "connected to {url}");

    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    // writer: ends when the session drops its sender or the socket fails,
    // which makes the session's next send fail and close the channel
    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(target: "channel", "write failed: {e}");
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        let closed = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if inbound_tx.send(ChannelEvent::Message(text)).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| format!("{} ({})", f.reason, u16::from(f.code)));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            }
        };
        let _ = inbound_tx.send(ChannelEvent::Closed(closed));
    });

    Ok(Transport {
        outbound: outbound_tx,
        inbound: inbound_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url() {
        assert_eq!(ws_url("http://localhost:8080"), "ws://localhost:8080/ws");
        assert_eq!(ws_url("https://hub.example.org/"), "wss://hub.example.org/ws");
        assert_eq!(ws_url("ws://hub:1"), "ws://hub:1/ws");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = connect(&format!("http://{addr}")).await.err().unwrap();
        assert!(matches!(err, ViewerError::Connect { .. }));
    }
}
