use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxSvcError {
  #[error("rpc error: {0}")]
  Rpc(#[from] rpc::RpcError),

  #[error("net error: {0}")]
  Net(#[from] net::NetError),

  #[error("no known TPU address for leader {0}")]
  UnknownLeader(String),
}

pub type TxSvcResult<T> = Result<T, TxSvcError>;
