//! Trait abstraction for the live subscription transport to enable testing

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::{Result, TelloTwinError};

/// An open, inbound-only subscription
#[async_trait]
pub trait LiveStream: Send {
    /// Next text message, or `None` once the peer has closed
    async fn next_text(&mut self) -> Option<Result<String>>;

    /// Close the subscription from our side
    async fn close(&mut self) -> Result<()>;
}

/// Opens subscriptions to the live telemetry endpoint
#[async_trait]
pub trait LiveSource: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Box<dyn LiveStream>>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket transport backed by `tokio_tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsLiveSource;

/// Wrapper around a `tokio_tungstenite` stream that implements [`LiveStream`]
pub struct WsLiveStream {
    inner: WsStream,
}

#[async_trait]
impl LiveSource for WsLiveSource {
    async fn open(&self, url: &Url) -> Result<Box<dyn LiveStream>> {
        let (inner, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TelloTwinError::Transport(format!("WebSocket connect failed: {}", e)))?;

        Ok(Box::new(WsLiveStream { inner }))
    }
}

#[async_trait]
impl LiveStream for WsLiveStream {
    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await {
                None => return None,
                Some(Err(e)) => {
                    return Some(Err(TelloTwinError::Transport(format!(
                        "WebSocket read failed: {}",
                        e
                    ))))
                }
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Close(_))) => return None,
                // Ping/pong are answered by tungstenite; binary frames are not payloads
                Some(Ok(_)) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close(None)
            .await
            .map_err(|e| TelloTwinError::Transport(format!("WebSocket close failed: {}", e)))
    }
}
