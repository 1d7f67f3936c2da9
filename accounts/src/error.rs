use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
  #[error("rpc error: {0}")]
  Rpc(#[from] rpc::RpcError),

  #[error("account data failed to decode as {0}")]
  Decode(&'static str),

  #[error("base64 decode failed: {0}")]
  Base64(String),
}

pub type MirrorResult<T> = Result<T, MirrorError>;
