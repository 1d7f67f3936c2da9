use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("rpc error: {0}")]
  Rpc(#[from] rpc::RpcError),

  #[error("no pending entry registered for this price account")]
  UnknownAccount,

  #[error("signing error: {0}")]
  Signing(String),
}

pub type PublishResult<T> = Result<T, PublishError>;
