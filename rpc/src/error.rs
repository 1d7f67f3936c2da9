use thiserror::Error;

/// Error taxonomy split along the same three lines used throughout the
/// daemon: transport failures (socket/IO), protocol failures (malformed or
/// unexpected JSON-RPC framing), and application failures (the cluster
/// answered but reported an error for the requested method).
#[derive(Debug, Error)]
pub enum RpcError {
  #[error("transport error: {0}")]
  Transport(#[from] net::NetError),

  #[error("protocol error: {0}")]
  Protocol(String),

  #[error("rpc application error {code}: {message}")]
  Application { code: i64, message: String },

  #[error("request {0} has no matching pending entry")]
  UnknownId(u64),

  #[error("subscription {0} is not registered")]
  UnknownSubscription(u64),

  #[error("the response channel was dropped before a reply arrived")]
  Cancelled,
}

impl From<json::JsonError> for RpcError {
  fn from(e: json::JsonError) -> Self {
    RpcError::Protocol(e.to_string())
  }
}

pub type RpcResult<T> = Result<T, RpcError>;
