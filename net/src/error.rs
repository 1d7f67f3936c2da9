use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
  #[error("connect failed: {0}")]
  Connect(#[source] std::io::Error),

  #[error("websocket error: {0}")]
  Ws(#[from] tokio_tungstenite::tungstenite::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("payload of {0} bytes exceeds the maximum UDP datagram size of {1}")]
  PayloadTooLarge(usize, usize),

  #[error("socket closed by peer")]
  Closed,
}

pub type NetResult<T> = Result<T, NetError>;
