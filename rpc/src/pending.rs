use tokio::sync::oneshot;

use crate::error::RpcResult;
use json::JsonTree;

/// A parsed JSON-RPC response body, handed to whichever caller is waiting on
/// the matching id.
pub struct RpcResponse {
  pub tree: JsonTree,
}

/// Back-pointer table from request id to the caller awaiting its reply.
/// Indexed directly by id (ids are small and reused via `IdAllocator`, so a
/// `Vec` outperforms a `HashMap` here and matches the "vector indexed by id"
/// shape of the original correlation table).
#[derive(Default)]
pub struct PendingTable {
  slots: Vec<Option<oneshot::Sender<RpcResult<RpcResponse>>>>,
}

impl PendingTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, id: u64, tx: oneshot::Sender<RpcResult<RpcResponse>>) {
    let idx = id as usize;
    if idx >= self.slots.len() {
      self.slots.resize_with(idx + 1, || None);
    }
    self.slots[idx] = Some(tx);
  }

  /// Removes and returns the waiter for `id`, if still registered. Returns
  /// `None` for an id that already resolved or was never outstanding (e.g. a
  /// duplicate or late notification).
  pub fn take(&mut self, id: u64) -> Option<oneshot::Sender<RpcResult<RpcResponse>>> {
    self.slots.get_mut(id as usize).and_then(|s| s.take())
  }
}
