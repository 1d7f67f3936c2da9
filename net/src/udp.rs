use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::error::{NetError, NetResult};

/// Maximum payload this sender will hand to a single `send_to`, matching the
/// practical ceiling for a UDP datagram that must survive typical MTUs
/// without IP fragmentation on the path to a cluster's TPU port.
pub const MAX_UDP_PAYLOAD: usize = 1232;

/// Wraps a bound `UdpSocket` for fire-and-forget fan-out to many peers, as
/// used by the tx forwarder to blast one transaction to every current slot
/// leader.
pub struct UdpSender {
  socket: UdpSocket,
}

impl UdpSender {
  pub async fn bind(local: SocketAddr) -> NetResult<Self> {
    let socket = UdpSocket::bind(local).await?;
    Ok(UdpSender { socket })
  }

  pub async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> NetResult<()> {
    if payload.len() > MAX_UDP_PAYLOAD {
      return Err(NetError::PayloadTooLarge(payload.len(), MAX_UDP_PAYLOAD));
    }
    self.socket.send_to(payload, dest).await?;
    Ok(())
  }

  /// Sends `payload` to every address in `dests`, logging (but not failing
  /// on) per-destination errors so one unreachable leader doesn't block
  /// delivery to the rest.
  pub async fn fan_out(&self, payload: &[u8], dests: &[SocketAddr]) {
    for &dest in dests {
      if let Err(e) = self.send_to(payload, dest).await {
        log::warn!("udp send to {} failed: {}", dest, e);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn rejects_oversized_payload() {
    let sender = UdpSender::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let payload = vec![0u8; MAX_UDP_PAYLOAD + 1];
    let dest: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let err = sender.send_to(&payload, dest).await.unwrap_err();
    matches!(err, NetError::PayloadTooLarge(_, _));
  }
}
