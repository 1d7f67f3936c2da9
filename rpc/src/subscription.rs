use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use json::JsonTree;

/// A boxed cancellation thunk returned alongside every subscription, matching
/// the unsubscribe-closure shape used for the daemon's other streaming
/// sources: calling it tears down server-side state without the caller
/// needing to know which RPC method created the subscription.
pub type StreamUnsub = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// One live subscription: the method that created it (for building the
/// matching `*Unsubscribe` request) and the channel notifications are
/// delivered on.
pub struct Subscription {
  pub method: &'static str,
  pub tx: mpsc::UnboundedSender<JsonTree>,
}

/// Maps the `params.subscription` id the cluster assigns to the local
/// subscriber that should receive each notification for it.
#[derive(Default)]
pub struct SubscriptionMap {
  subs: HashMap<u64, Subscription>,
}

impl SubscriptionMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, sub_id: u64, sub: Subscription) {
    self.subs.insert(sub_id, sub);
  }

  pub fn remove(&mut self, sub_id: u64) -> Option<Subscription> {
    self.subs.remove(&sub_id)
  }

  pub fn dispatch(&self, sub_id: u64, tree: JsonTree) -> bool {
    if let Some(sub) = self.subs.get(&sub_id) {
      sub.tx.send(tree).is_ok()
    } else {
      false
    }
  }
}
