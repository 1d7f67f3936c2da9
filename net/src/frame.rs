use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::NetResult;

/// Magic prefix identifying a framed transaction record on the tx-forwarder
/// ingress port, distinguishing it from a JSON-RPC/WebSocket upgrade request
/// arriving on the same listener.
pub const FRAME_MAGIC: u32 = 0xa1b2_c3d4;

/// Reads one `u32 magic | u32 len | len bytes` frame from `stream`. Used by
/// the tx forwarder's TCP ingress, which accepts raw signed-transaction bytes
/// from the local publisher rather than JSON.
pub async fn read_framed<R: AsyncReadExt + Unpin>(stream: &mut R) -> NetResult<Vec<u8>> {
  let magic = stream.read_u32().await?;
  if magic != FRAME_MAGIC {
    return Err(crate::error::NetError::Io(std::io::Error::new(
      std::io::ErrorKind::InvalidData,
      "bad frame magic",
    )));
  }
  let len = stream.read_u32().await? as usize;
  let mut buf = vec![0u8; len];
  stream.read_exact(&mut buf).await?;
  Ok(buf)
}

pub async fn write_framed<W: AsyncWriteExt + Unpin>(stream: &mut W, payload: &[u8]) -> NetResult<()> {
  stream.write_u32(FRAME_MAGIC).await?;
  stream.write_u32(payload.len() as u32).await?;
  stream.write_all(payload).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[tokio::test]
  async fn round_trips_a_frame() {
    let mut buf = Vec::new();
    write_framed(&mut buf, b"hello").await.unwrap();
    let mut cursor = Cursor::new(buf);
    let out = read_framed(&mut cursor).await.unwrap();
    assert_eq!(out, b"hello");
  }

  #[tokio::test]
  async fn rejects_bad_magic() {
    let mut cursor = Cursor::new(vec![0u8, 0, 0, 0, 0, 0, 0, 0]);
    let err = read_framed(&mut cursor).await;
    assert!(err.is_err());
  }
}
