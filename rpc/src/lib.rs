pub mod client;
pub mod error;
pub mod id;
pub mod methods;
pub mod pending;
pub mod subscription;

pub use client::RpcClient;
pub use error::{RpcError, RpcResult};
pub use id::IdAllocator;
pub use methods::Blockhash;
pub use subscription::StreamUnsub;
