use std::collections::HashMap;

use accounts::PriceStatus;

/// Which phase of the idle -> pending -> inflight -> idle cycle a price
/// account's pending publish is in. `Pending` and `Inflight` are not
/// mutually exclusive in the underlying `PendingEntry`: a fresh update that
/// arrives while a previous send is still unconfirmed marks the entry dirty
/// again without disturbing the outstanding signature, so the next flush
/// sends an updated value without waiting on the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  Idle,
  Pending,
  Inflight,
}

#[derive(Debug, Clone)]
pub struct PendingEntry {
  pub price: i64,
  pub conf: u64,
  pub status: PriceStatus,
  pub pub_slot: u64,
  dirty: bool,
  inflight_signature: Option<String>,
  pub num_sub_drop: u64,
}

impl Default for PendingEntry {
  fn default() -> Self {
    PendingEntry {
      price: 0,
      conf: 0,
      status: PriceStatus::Unknown,
      pub_slot: 0,
      dirty: false,
      inflight_signature: None,
      num_sub_drop: 0,
    }
  }
}

impl PendingEntry {
  pub fn state(&self) -> EntryState {
    match (&self.inflight_signature, self.dirty) {
      (None, false) => EntryState::Idle,
      (None, true) => EntryState::Pending,
      (Some(_), _) => EntryState::Inflight,
    }
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  pub fn inflight_signature(&self) -> Option<&str> {
    self.inflight_signature.as_deref()
  }
}

/// Owns one `PendingEntry` per price account this publisher is configured to
/// update. `update_price`/`update_no_send` are the entry points local
/// clients call; `drain_dirty` is how the manager's flush-on-slot step pulls
/// a batch out for transaction assembly.
#[derive(Debug, Default)]
pub struct PublishPipeline {
  entries: HashMap<[u8; 32], PendingEntry>,
}

impl PublishPipeline {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a new price/conf/status for `price_account` to be sent on the
  /// next flush. If an earlier update for this account had not been sent
  /// yet, it is silently replaced and counted in `num_sub_drop` — the local
  /// client only ever cares about the latest value, not every intermediate
  /// one.
  pub fn update_price(&mut self, price_account: [u8; 32], price: i64, conf: u64, status: PriceStatus, pub_slot: u64) {
    let entry = self.entries.entry(price_account).or_default();
    if entry.dirty {
      entry.num_sub_drop += 1;
    }
    entry.price = price;
    entry.conf = conf;
    entry.status = status;
    entry.pub_slot = pub_slot;
    entry.dirty = true;
  }

  /// Records the latest value without marking it dirty, for a local client
  /// that wants its price visible to the next batch assembled for other
  /// reasons but does not want to force an extra transaction by itself.
  pub fn update_no_send(&mut self, price_account: [u8; 32], price: i64, conf: u64, status: PriceStatus, pub_slot: u64) {
    let entry = self.entries.entry(price_account).or_default();
    entry.price = price;
    entry.conf = conf;
    entry.status = status;
    entry.pub_slot = pub_slot;
  }

  /// Returns up to `max_batch` dirty accounts, in arbitrary but stable
  /// iteration order, clearing their dirty flag and stamping the given
  /// signature as their new in-flight marker. Accounts not selected (because
  /// the batch filled up) remain dirty for the next flush.
  pub fn take_batch(&mut self, max_batch: usize, signature: &str) -> Vec<([u8; 32], PendingEntry)> {
    let keys: Vec<[u8; 32]> = self
      .entries
      .iter()
      .filter(|(_, e)| e.is_dirty())
      .map(|(k, _)| *k)
      .take(max_batch)
      .collect();
    let mut batch = Vec::with_capacity(keys.len());
    for key in keys {
      if let Some(entry) = self.entries.get_mut(&key) {
        entry.dirty = false;
        entry.inflight_signature = Some(signature.to_string());
        batch.push((key, entry.clone()));
      }
    }
    batch
  }

  /// Overwrites the in-flight marker stamped by `take_batch` with the real
  /// transaction signature once it is known (signing happens after the
  /// batch is selected, so `take_batch` uses a placeholder).
  pub fn set_inflight_signature(&mut self, keys: &[[u8; 32]], signature: &str) {
    for key in keys {
      if let Some(entry) = self.entries.get_mut(key) {
        entry.inflight_signature = Some(signature.to_string());
      }
    }
  }

  pub fn dirty_count(&self) -> usize {
    self.entries.values().filter(|e| e.is_dirty()).count()
  }

  /// Clears the in-flight marker for `price_account` once the mirror has
  /// observed this publisher's own component advance to at least
  /// `confirmed_slot`, completing the inflight -> idle transition.
  pub fn clear_inflight(&mut self, price_account: [u8; 32], confirmed_slot: u64) {
    if let Some(entry) = self.entries.get_mut(&price_account) {
      if entry.pub_slot <= confirmed_slot {
        entry.inflight_signature = None;
      }
    }
  }

  pub fn entry(&self, price_account: &[u8; 32]) -> Option<&PendingEntry> {
    self.entries.get(price_account)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_update_moves_idle_to_pending() {
    let mut p = PublishPipeline::new();
    let key = [1u8; 32];
    p.update_price(key, 100, 1, PriceStatus::Trading, 5);
    assert_eq!(p.entry(&key).unwrap().state(), EntryState::Pending);
  }

  #[test]
  fn replacing_an_unsent_update_counts_as_a_drop() {
    let mut p = PublishPipeline::new();
    let key = [1u8; 32];
    p.update_price(key, 100, 1, PriceStatus::Trading, 5);
    p.update_price(key, 101, 1, PriceStatus::Trading, 6);
    assert_eq!(p.entry(&key).unwrap().num_sub_drop, 1);
  }

  #[test]
  fn take_batch_moves_pending_to_inflight() {
    let mut p = PublishPipeline::new();
    let key = [1u8; 32];
    p.update_price(key, 100, 1, PriceStatus::Trading, 5);
    let batch = p.take_batch(8, "sig1");
    assert_eq!(batch.len(), 1);
    assert_eq!(p.entry(&key).unwrap().state(), EntryState::Inflight);
  }

  #[test]
  fn update_while_inflight_does_not_block_the_next_send() {
    let mut p = PublishPipeline::new();
    let key = [1u8; 32];
    p.update_price(key, 100, 1, PriceStatus::Trading, 5);
    p.take_batch(8, "sig1");
    assert_eq!(p.entry(&key).unwrap().state(), EntryState::Inflight);
    p.update_price(key, 105, 1, PriceStatus::Trading, 6);
    assert_eq!(p.entry(&key).unwrap().state(), EntryState::Inflight);
    assert!(p.entry(&key).unwrap().is_dirty());
    assert_eq!(p.dirty_count(), 1);
  }

  #[test]
  fn clear_inflight_completes_the_cycle() {
    let mut p = PublishPipeline::new();
    let key = [1u8; 32];
    p.update_price(key, 100, 1, PriceStatus::Trading, 5);
    p.take_batch(8, "sig1");
    p.clear_inflight(key, 5);
    assert_eq!(p.entry(&key).unwrap().state(), EntryState::Idle);
  }

  #[test]
  fn batch_respects_max_size() {
    let mut p = PublishPipeline::new();
    for i in 0..20u8 {
      p.update_price([i; 32], 1, 1, PriceStatus::Trading, 1);
    }
    let batch = p.take_batch(8, "sig1");
    assert_eq!(batch.len(), 8);
    assert_eq!(p.dirty_count(), 12);
  }
}
