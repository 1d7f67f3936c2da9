use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{NetError, NetResult};

/// Thin wrapper over `tokio_tungstenite`. Ping/pong answering is handled by
/// the underlying protocol implementation, so this layer only has to expose
/// text-message send/receive.
pub struct WsConnection {
  stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsConnection {
  pub async fn connect(url: &str) -> NetResult<Self> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(WsConnection { stream })
  }

  /// Upgrades an already-accepted local TCP connection to a WebSocket
  /// server stream, used by the local publisher JSON-RPC/WS port (the
  /// tx-forwarder's own ingress port uses the raw magic-prefixed framing in
  /// `frame.rs` instead, on a different port).
  pub async fn accept(stream: TcpStream) -> NetResult<Self> {
    let stream = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream)).await?;
    Ok(WsConnection { stream })
  }

  pub async fn send_text(&mut self, text: String) -> NetResult<()> {
    self.stream.send(Message::Text(text)).await?;
    Ok(())
  }

  /// Returns the next text payload, skipping ping/pong/close control frames
  /// that tungstenite surfaces but that carry no application data.
  pub async fn next_event(&mut self) -> NetResult<String> {
    loop {
      match self.stream.next().await {
        Some(Ok(Message::Text(t))) => return Ok(t),
        Some(Ok(Message::Binary(b))) => return Ok(String::from_utf8_lossy(&b).into_owned()),
        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
        Some(Ok(Message::Close(_))) => return Err(NetError::Closed),
        Some(Ok(Message::Frame(_))) => continue,
        Some(Err(e)) => return Err(NetError::Ws(e)),
        None => return Err(NetError::Closed),
      }
    }
  }

  pub async fn close(&mut self) -> NetResult<()> {
    self.stream.close(None).await?;
    Ok(())
  }
}
