use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Mutex;

use json::{JsonTree, NodeId};
use rpc::RpcClient;

use crate::error::{MirrorError, MirrorResult};
use crate::wire::{self, MappingAccount, PriceAccount, ProductAccount};

/// Callback surface the mirror drives as account state arrives. Implemented
/// by whichever parts of the daemon care about product/price updates (the
/// publish pipeline, a future metrics exporter); the mirror itself holds no
/// opinion about what subscribers do with a notification.
pub trait MirrorSubscriber: Send + Sync {
  /// `data` is the product account's raw bytes, so subscribers that care
  /// about its trailing attribute dictionary can decode it via
  /// [`ProductAccount::attr_dict_bytes`] without the mirror re-fetching.
  fn on_response_product(&self, pubkey: [u8; 32], product: &ProductAccount, data: &[u8]);
  fn on_response_price_init(&self, pubkey: [u8; 32], price: &PriceAccount);
  fn on_response_price(&self, pubkey: [u8; 32], price: &PriceAccount);
}

struct MirrorInner {
  rpc: Arc<RpcClient>,
  commitment: String,
  subscribers: Vec<Arc<dyn MirrorSubscriber>>,
  last_slot: Mutex<HashMap<[u8; 32], u64>>,
}

/// Bootstraps account state by walking the mapping-account chain from a
/// configured root, fetches each product and its price-account chain, and
/// keeps every price account's snapshot current via an `accountSubscribe`
/// per account for the lifetime of the process.
#[derive(Clone)]
pub struct Mirror {
  inner: Arc<MirrorInner>,
}

fn decode_account_data(tree: &JsonTree, result: NodeId) -> MirrorResult<Vec<u8>> {
  let value = tree.find_val(result, "value").ok_or(MirrorError::Decode("value"))?;
  let data_node = tree.find_val(value, "data").ok_or(MirrorError::Decode("data"))?;
  let b64 = tree
    .children(data_node)
    .first()
    .and_then(|&c| tree.get_text(c))
    .ok_or(MirrorError::Decode("data[0]"))?;
  STANDARD.decode(b64).map_err(|e| MirrorError::Base64(e.to_string()))
}

const ZERO_KEY: [u8; 32] = [0u8; 32];

impl Mirror {
  pub fn new(rpc: Arc<RpcClient>, commitment: impl Into<String>, subscribers: Vec<Arc<dyn MirrorSubscriber>>) -> Self {
    Mirror {
      inner: Arc::new(MirrorInner {
        rpc,
        commitment: commitment.into(),
        subscribers,
        last_slot: Mutex::new(HashMap::new()),
      }),
    }
  }

  async fn fetch(&self, pubkey: [u8; 32]) -> MirrorResult<Vec<u8>> {
    let key_str = Pubkey::new_from_array(pubkey).to_string();
    let (tree, result) = self.inner.rpc.get_account_info(&key_str, &self.inner.commitment).await?;
    decode_account_data(&tree, result)
  }

  pub async fn bootstrap(&self, mapping_root: [u8; 32]) -> MirrorResult<()> {
    let mut next = Some(mapping_root);
    while let Some(pk) = next {
      let data = self.fetch(pk).await?;
      let mapping = MappingAccount::from_bytes(&data).ok_or(MirrorError::Decode("MappingAccount"))?;
      let product_keys: Vec<[u8; 32]> = mapping.product_keys().copied().collect();
      let next_mapping = mapping.next_mapping_account;
      for product_key in product_keys {
        self.bootstrap_product(product_key).await?;
      }
      next = if next_mapping != ZERO_KEY { Some(next_mapping) } else { None };
    }
    Ok(())
  }

  async fn bootstrap_product(&self, pubkey: [u8; 32]) -> MirrorResult<()> {
    let data = self.fetch(pubkey).await?;
    let product = *ProductAccount::from_bytes(&data).ok_or(MirrorError::Decode("ProductAccount"))?;
    for sub in &self.inner.subscribers {
      sub.on_response_product(pubkey, &product, &data);
    }
    if product.price_account != ZERO_KEY {
      self.bootstrap_price_chain(product.price_account).await?;
    }
    Ok(())
  }

  async fn bootstrap_price_chain(&self, first: [u8; 32]) -> MirrorResult<()> {
    let mut next = Some(first);
    while let Some(pubkey) = next {
      let data = self.fetch(pubkey).await?;
      let price = *PriceAccount::from_bytes(&data).ok_or(MirrorError::Decode("PriceAccount"))?;
      for sub in &self.inner.subscribers {
        sub.on_response_price_init(pubkey, &price);
      }
      self.inner.last_slot.lock().await.insert(pubkey, price.last_slot);
      self.subscribe_price(pubkey).await?;
      next = if price.next_price_account != ZERO_KEY {
        Some(price.next_price_account)
      } else {
        None
      };
    }
    Ok(())
  }

  async fn subscribe_price(&self, pubkey: [u8; 32]) -> MirrorResult<()> {
    let key_str = Pubkey::new_from_array(pubkey).to_string();
    let (_sub_id, mut rx, _unsub) = self
      .inner
      .rpc
      .account_subscribe(&key_str, &self.inner.commitment)
      .await?;
    let inner = self.inner.clone();
    tokio::spawn(async move {
      while let Some(tree) = rx.recv().await {
        if let Err(e) =
          apply_price_notification(&inner.last_slot, &inner.subscribers, pubkey, &tree).await
        {
          log::warn!("mirror: failed to apply price update for {}: {}", key_str, e);
        }
      }
    });
    Ok(())
  }
}

/// Applies the five-step update rule for one price-account notification:
/// reject anything not newer than the last slot seen for this account,
/// overwrite the cached snapshot, fan the decoded account out to every
/// subscriber (who is responsible for clearing in-flight publish state and
/// updating its own statistics), and record the new high-water slot.
async fn apply_price_notification(
  last_slot: &Mutex<HashMap<[u8; 32], u64>>,
  subscribers: &[Arc<dyn MirrorSubscriber>],
  pubkey: [u8; 32],
  tree: &JsonTree,
) -> MirrorResult<()> {
  let root = tree.root().ok_or(MirrorError::Decode("notification root"))?;
  let params = tree.find_val(root, "params").ok_or(MirrorError::Decode("params"))?;
  let result = tree.find_val(params, "result").ok_or(MirrorError::Decode("result"))?;
  let data = decode_account_data(tree, result)?;
  let price = *PriceAccount::from_bytes(&data).ok_or(MirrorError::Decode("PriceAccount"))?;

  let mut guard = last_slot.lock().await;
  let seen = guard.get(&pubkey).copied().unwrap_or(0);
  if price.last_slot <= seen {
    return Ok(());
  }
  guard.insert(pubkey, price.last_slot);
  drop(guard);

  for sub in subscribers {
    sub.on_response_price(pubkey, &price);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::wire::{AccountType, PriceInfo};
  use std::sync::atomic::{AtomicU64, Ordering};

  struct CountingSubscriber {
    count: AtomicU64,
  }

  impl MirrorSubscriber for CountingSubscriber {
    fn on_response_product(&self, _pubkey: [u8; 32], _product: &ProductAccount, _data: &[u8]) {}
    fn on_response_price_init(&self, _pubkey: [u8; 32], _price: &PriceAccount) {}
    fn on_response_price(&self, _pubkey: [u8; 32], _price: &PriceAccount) {
      self.count.fetch_add(1, Ordering::SeqCst);
    }
  }

  fn price_with_slot(slot: u64) -> PriceAccount {
    PriceAccount {
      magic: wire::PC_MAGIC,
      version: wire::PC_VERSION_2,
      atype: AccountType::Price as u32,
      size: 0,
      price_type: 1,
      expo: -9,
      num: 0,
      num_qt: 0,
      last_slot: slot,
      valid_slot: slot,
      twap: wire::EmaWire { val: 0, numer: 0, denom: 1 },
      twac: wire::EmaWire { val: 0, numer: 0, denom: 1 },
      timestamp: 0,
      min_pub: 1,
      quote_type: 0,
      drv2: 0,
      drv3: 0,
      drv4: 0,
      product_account: [0u8; 32],
      next_price_account: [0u8; 32],
      prev_slot: 0,
      prev_price: 0,
      prev_conf: 0,
      prev_timestamp: 0,
      agg: PriceInfo {
        price: 0,
        conf: 0,
        status: 1,
        corp_act: 0,
        pub_slot: slot,
      },
      comp: [wire::PriceComponent {
        publisher: [0u8; 32],
        agg: PriceInfo {
          price: 0,
          conf: 0,
          status: 0,
          corp_act: 0,
          pub_slot: 0,
        },
        latest: PriceInfo {
          price: 0,
          conf: 0,
          status: 0,
          corp_act: 0,
          pub_slot: 0,
        },
      }; wire::PC_COMP_SIZE],
    }
  }

  #[tokio::test]
  async fn stale_slot_notifications_are_dropped() {
    let last_slot = Mutex::new(HashMap::from([([1u8; 32], 10u64)]));
    let counter = Arc::new(CountingSubscriber { count: AtomicU64::new(0) });
    let subscribers: Vec<Arc<dyn MirrorSubscriber>> = vec![counter.clone()];
    let pubkey = [1u8; 32];
    let price = price_with_slot(5);
    let bytes = bytemuck::bytes_of(&price);
    let tree = make_notification_tree(bytes);
    apply_price_notification(&last_slot, &subscribers, pubkey, &tree)
      .await
      .unwrap();
    assert_eq!(counter.count.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn newer_slot_notifications_fan_out_to_subscribers() {
    let last_slot = Mutex::new(HashMap::from([([1u8; 32], 10u64)]));
    let counter = Arc::new(CountingSubscriber { count: AtomicU64::new(0) });
    let subscribers: Vec<Arc<dyn MirrorSubscriber>> = vec![counter.clone()];
    let pubkey = [1u8; 32];
    let price = price_with_slot(20);
    let bytes = bytemuck::bytes_of(&price);
    let tree = make_notification_tree(bytes);
    apply_price_notification(&last_slot, &subscribers, pubkey, &tree)
      .await
      .unwrap();
    assert_eq!(counter.count.load(Ordering::SeqCst), 1);
    assert_eq!(*last_slot.lock().await.get(&pubkey).unwrap(), 20);
  }

  fn make_notification_tree(account_bytes: &[u8]) -> JsonTree {
    let b64 = STANDARD.encode(account_bytes);
    let body = format!(
      r#"{{"jsonrpc":"2.0","method":"accountNotification","params":{{"result":{{"context":{{"slot":1}},"value":{{"data":["{}","base64"],"lamports":1}}}},"subscription":1}}}}"#,
      b64
    );
    let (tree, _) = JsonTree::parse(body.as_bytes()).unwrap();
    tree
  }
}
