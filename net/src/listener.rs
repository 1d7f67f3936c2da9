use tokio::net::{TcpListener, TcpStream};

use crate::error::NetResult;

/// Accepts raw TCP connections on a local port. Two local protocols share
/// this listener: the tx-forwarder's magic-prefixed framing (`frame.rs`) for
/// the ingress port, and a `tokio_tungstenite` upgrade for the local
/// publisher JSON-RPC/WS port. Which one applies is a property of which port
/// the caller bound, not of the connection itself, so this type just hands
/// back the raw stream.
pub struct LocalListener {
  inner: TcpListener,
}

impl LocalListener {
  pub async fn bind(addr: &str) -> NetResult<Self> {
    let inner = TcpListener::bind(addr).await?;
    Ok(LocalListener { inner })
  }

  pub async fn accept(&self) -> NetResult<TcpStream> {
    let (stream, _peer) = self.inner.accept().await?;
    Ok(stream)
  }

  pub fn local_addr(&self) -> NetResult<std::net::SocketAddr> {
    Ok(self.inner.local_addr()?)
  }
}
