use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use tokio::sync::{mpsc, Mutex};

use accounts::{AggregateVerifier, Mirror, MirrorSubscriber, PriceAccount, PriceStatus, ProductAccount};
use json::{JsonTree, JsonWriter};
use net::{LocalListener, WsConnection};
use publish::{Dispatcher, PipelineSubscriber, PublishPipeline, PublishStats};
use rpc::RpcClient;
use txsvc::TxForwarder;

use crate::capture::CaptureWriter;
use crate::config::Config;
use crate::key_store::KeyStore;

/// Rolling window size for the publish-latency histogram kept per daemon
/// instance (shared across all price accounts, matching the teacher's
/// single-ring-buffer-per-concern convention rather than one per symbol).
const STATS_WINDOW: usize = 256;

fn parse_status(s: &str) -> PriceStatus {
  match s {
    "trading" => PriceStatus::Trading,
    "halted" => PriceStatus::Halted,
    "auction" => PriceStatus::Auction,
    "ignored" => PriceStatus::Ignored,
    _ => PriceStatus::Unknown,
  }
}

fn status_name(s: PriceStatus) -> &'static str {
  match s {
    PriceStatus::Trading => "trading",
    PriceStatus::Halted => "halted",
    PriceStatus::Auction => "auction",
    PriceStatus::Ignored => "ignored",
    PriceStatus::Unknown => "unknown",
  }
}

/// Tracks which local clients subscribed to `notify_price`/`notify_price_sched`
/// for which price accounts, and the set of product accounts observed so far
/// so `get_product_list` has something to answer with. Plain `std::sync::Mutex`
/// is enough here: every critical section is synchronous and short, and
/// `MirrorSubscriber`'s callbacks are not `async`.
struct LocalBroadcast {
  products: StdMutex<Vec<[u8; 32]>>,
  attrs: StdMutex<HashMap<[u8; 32], Vec<(String, String)>>>,
  price_subs: StdMutex<HashMap<[u8; 32], Vec<(u64, mpsc::UnboundedSender<String>)>>>,
}

impl LocalBroadcast {
  fn new() -> Self {
    LocalBroadcast {
      products: StdMutex::new(Vec::new()),
      attrs: StdMutex::new(HashMap::new()),
      price_subs: StdMutex::new(HashMap::new()),
    }
  }

  fn record_product(&self, pubkey: [u8; 32], product: &ProductAccount, data: &[u8]) {
    let mut products = self.products.lock().unwrap();
    if !products.contains(&pubkey) {
      products.push(pubkey);
    }
    drop(products);
    if let Some(dict) = product.attr_dict_bytes(data) {
      let pairs: Vec<(String, String)> = accounts::iter_attr_dict(dict)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
      self.attrs.lock().unwrap().insert(pubkey, pairs);
    }
  }

  fn product_list(&self) -> Vec<[u8; 32]> {
    self.products.lock().unwrap().clone()
  }

  fn product_attrs(&self, pubkey: [u8; 32]) -> Vec<(String, String)> {
    self.attrs.lock().unwrap().get(&pubkey).cloned().unwrap_or_default()
  }

  fn subscribe_price(&self, account: [u8; 32], client_id: u64, tx: mpsc::UnboundedSender<String>) {
    self.price_subs.lock().unwrap().entry(account).or_default().push((client_id, tx));
  }

  fn drop_client(&self, client_id: u64) {
    for subs in self.price_subs.lock().unwrap().values_mut() {
      subs.retain(|(id, _)| *id != client_id);
    }
  }

  fn notify_price(&self, account: [u8; 32], price: &PriceAccount) {
    let Some(subs) = self.price_subs.lock().unwrap().get(&account).cloned() else {
      return;
    };
    if subs.is_empty() {
      return;
    }
    let msg = build_notify_price(account, price);
    for (_, tx) in subs {
      let _ = tx.send(msg.clone());
    }
  }
}

struct LocalBroadcastSubscriber {
  broadcast: Arc<LocalBroadcast>,
}

impl MirrorSubscriber for LocalBroadcastSubscriber {
  fn on_response_product(&self, pubkey: [u8; 32], product: &ProductAccount, data: &[u8]) {
    self.broadcast.record_product(pubkey, product, data);
  }

  fn on_response_price_init(&self, _pubkey: [u8; 32], _price: &PriceAccount) {}

  fn on_response_price(&self, pubkey: [u8; 32], price: &PriceAccount) {
    self.broadcast.notify_price(pubkey, price);
  }
}

/// Feeds every price-account update into the capture sink, reconstructing
/// the raw account bytes via `bytemuck` rather than re-fetching them, since
/// `PriceAccount` is `#[repr(C)]`/`Pod` and already matches the on-chain
/// layout byte for byte.
struct CaptureSubscriber {
  capture: Arc<CaptureWriter>,
}

impl MirrorSubscriber for CaptureSubscriber {
  fn on_response_product(&self, _pubkey: [u8; 32], _product: &ProductAccount, _data: &[u8]) {}

  fn on_response_price_init(&self, pubkey: [u8; 32], price: &PriceAccount) {
    self.capture.record(price.timestamp, pubkey, bytemuck::bytes_of(price));
  }

  fn on_response_price(&self, pubkey: [u8; 32], price: &PriceAccount) {
    self.capture.record(price.timestamp, pubkey, bytemuck::bytes_of(price));
  }
}

fn build_notify_price(account: [u8; 32], price: &PriceAccount) -> String {
  let mut w = JsonWriter::new();
  w.start_obj()
    .key("jsonrpc")
    .str("2.0")
    .key("method")
    .str("notify_price")
    .key("params")
    .start_obj()
    .key("result")
    .start_obj()
    .key("account")
    .str(&Pubkey::new_from_array(account).to_string())
    .key("price")
    .num(price.agg.price)
    .key("conf")
    .num(price.agg.conf)
    .key("status")
    .str(status_name(price.agg.status()))
    .key("valid_slot")
    .num(price.valid_slot)
    .end_obj()
    .end_obj()
    .end_obj();
  String::from_utf8(w.into_bytes()).unwrap_or_default()
}

fn jsonrpc_result(id: Option<i64>, build: impl FnOnce(&mut JsonWriter)) -> String {
  let mut w = JsonWriter::new();
  w.start_obj().key("jsonrpc").str("2.0");
  w.key("result");
  build(&mut w);
  w.key("id");
  match id {
    Some(id) => {
      w.num(id);
    }
    None => {
      w.null();
    }
  };
  w.end_obj();
  String::from_utf8(w.into_bytes()).unwrap_or_default()
}

fn jsonrpc_error(id: Option<i64>, code: i64, message: &str) -> String {
  let mut w = JsonWriter::new();
  w.start_obj()
    .key("jsonrpc")
    .str("2.0")
    .key("error")
    .start_obj()
    .key("code")
    .num(code)
    .key("message")
    .str(message)
    .end_obj()
    .key("id");
  match id {
    Some(id) => {
      w.num(id);
    }
    None => {
      w.null();
    }
  };
  w.end_obj();
  String::from_utf8(w.into_bytes()).unwrap_or_default()
}

/// Owns every long-lived piece of daemon state and drives the event loop.
/// Per the single-owner concurrency model, local-client connections and the
/// mirror's subscriber callbacks only ever touch state behind `Arc<Mutex<_>>`
/// or `Arc<std::sync::Mutex<_>>`; the loop in `run` itself is the only task
/// that reaches into `self` directly.
pub struct Manager {
  config: Config,
  rpc: Arc<RpcClient>,
  pipeline: Arc<Mutex<PublishPipeline>>,
  stats: Arc<Mutex<PublishStats>>,
  dispatcher: Dispatcher,
  mirror: Mirror,
  broadcast: Arc<LocalBroadcast>,
  listener: LocalListener,
  forwarder: Option<Arc<TxForwarder>>,
  capture: Option<Arc<CaptureWriter>>,
  next_client_id: AtomicU64,
}

impl Manager {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let key_store = KeyStore::open(&config.key_store_dir)?;
    let publisher = key_store.load_publish_key()?;
    let publisher_pubkey = publisher.pubkey().to_bytes();

    let (http_url, ws_url) = config.rpc_urls();
    let rpc = Arc::new(RpcClient::connect(http_url, ws_url).await?);

    let program_id = Pubkey::from_str(&config.program_id)?;
    let mapping_account = Pubkey::from_str(&config.mapping_account)?;

    let pipeline = Arc::new(Mutex::new(PublishPipeline::new()));
    let stats = Arc::new(Mutex::new(PublishStats::new(STATS_WINDOW)));
    let broadcast = Arc::new(LocalBroadcast::new());

    let dispatcher = Dispatcher {
      program_id,
      publisher,
      cu_units: config.cu_units,
      cu_price: config.cu_price,
      max_batch_size: config.max_batch_size,
    };

    let capture = match &config.capture_file {
      Some(path) if !path.is_empty() => Some(Arc::new(CaptureWriter::start(path)?)),
      _ => None,
    };

    let mut subscribers: Vec<Arc<dyn MirrorSubscriber>> = vec![
      Arc::new(PipelineSubscriber::new(pipeline.clone(), publisher_pubkey)),
      Arc::new(LocalBroadcastSubscriber { broadcast: broadcast.clone() }),
      Arc::new(AggregateVerifier::new()),
    ];
    if let Some(capture) = &capture {
      subscribers.push(Arc::new(CaptureSubscriber { capture: capture.clone() }));
    }
    let mirror = Mirror::new(rpc.clone(), config.commitment.clone(), subscribers);

    let listener = LocalListener::bind(&format!("0.0.0.0:{}", config.listen_port)).await?;

    let forwarder = match &config.tx_host {
      Some(tx_host) => {
        let bind_addr: std::net::SocketAddr = "0.0.0.0:0".parse().expect("static bind addr");
        let forwarder = TxForwarder::new(rpc.clone(), bind_addr).await?;
        let forwarder = Arc::new(forwarder);
        log::info!("tx forwarder configured for {}", tx_host);
        Some(forwarder)
      }
      None => None,
    };

    let manager = Manager {
      config,
      rpc,
      pipeline,
      stats,
      dispatcher,
      mirror,
      broadcast,
      listener,
      forwarder,
      capture,
      next_client_id: AtomicU64::new(1),
    };

    manager.mirror.bootstrap(mapping_account.to_bytes()).await?;
    Ok(manager)
  }

  /// Runs every long-lived subsystem concurrently and blocks until a
  /// termination signal arrives or an unrecoverable task error occurs.
  pub async fn run(self) -> anyhow::Result<()> {
    let manager = Arc::new(self);

    if let Some(forwarder) = manager.forwarder.clone() {
      let f = forwarder.clone();
      tokio::spawn(async move {
        if let Err(e) = f.run_slot_tracker().await {
          log::error!("tx forwarder slot tracker exited: {}", e);
        }
      });
      let f = forwarder.clone();
      let ingress_addr = format!("0.0.0.0:{}", manager.config.listen_port + 1);
      tokio::spawn(async move {
        if let Err(e) = f.run_ingress(&ingress_addr).await {
          log::error!("tx forwarder ingress exited: {}", e);
        }
      });
    }

    let accept_manager = manager.clone();
    tokio::spawn(async move { accept_manager.run_local_listener().await });

    let tick_manager = manager.clone();
    let publish_interval = tick_manager.config.publish_interval_ms;
    let tick_handle = tokio::spawn(async move {
      let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(publish_interval.max(1)));
      loop {
        interval.tick().await;
        if let Err(e) = tick_manager.flush_once().await {
          log::warn!("publish flush failed: {}", e);
        }
      }
    });

    wait_for_shutdown_signal().await;
    log::info!("shutdown signal received, stopping");
    tick_handle.abort();
    Ok(())
  }

  async fn flush_once(&self) -> anyhow::Result<()> {
    match self.dispatcher.flush(&self.pipeline, &self.stats, &self.rpc).await {
      Ok(Some((signature, batch))) => {
        log::debug!("dispatched batch of {} accounts, signature {}", batch.len(), signature);
        Ok(())
      }
      Ok(None) => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  async fn run_local_listener(&self) {
    loop {
      let stream = match self.listener.accept().await {
        Ok(s) => s,
        Err(e) => {
          log::warn!("local listener accept failed: {}", e);
          continue;
        }
      };
      let ws = match WsConnection::accept(stream).await {
        Ok(ws) => ws,
        Err(e) => {
          log::warn!("local client ws upgrade failed: {}", e);
          continue;
        }
      };
      let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
      let pipeline = self.pipeline.clone();
      let broadcast = self.broadcast.clone();
      tokio::spawn(async move {
        run_local_client(client_id, ws, pipeline, broadcast).await;
      });
    }
  }
}

async fn run_local_client(
  client_id: u64,
  mut ws: WsConnection,
  pipeline: Arc<Mutex<PublishPipeline>>,
  broadcast: Arc<LocalBroadcast>,
) {
  let (tx, mut rx) = mpsc::unbounded_channel::<String>();
  loop {
    tokio::select! {
      incoming = ws.next_event() => {
        match incoming {
          Ok(text) => {
            if let Some(response) = handle_local_request(&text, client_id, &pipeline, &broadcast, &tx).await {
              if ws.send_text(response).await.is_err() {
                break;
              }
            }
          }
          Err(_) => break,
        }
      }
      Some(payload) = rx.recv() => {
        if ws.send_text(payload).await.is_err() {
          break;
        }
      }
    }
  }
  broadcast.drop_client(client_id);
}

async fn handle_local_request(
  text: &str,
  client_id: u64,
  pipeline: &Arc<Mutex<PublishPipeline>>,
  broadcast: &Arc<LocalBroadcast>,
  client_tx: &mpsc::UnboundedSender<String>,
) -> Option<String> {
  let (tree, _) = match JsonTree::parse(text.as_bytes()) {
    Ok(v) => v,
    Err(e) => {
      log::warn!("local client sent malformed json: {}", e);
      return None;
    }
  };
  let root = tree.root()?;
  let id = tree.find_val(root, "id").and_then(|n| tree.get_int(n));
  let method = tree.find_val(root, "method").and_then(|n| tree.get_text(n))?;
  let params = tree.find_val(root, "params");

  match method {
    "get_product_list" => {
      let products = broadcast.product_list();
      Some(jsonrpc_result(id, |w| {
        w.start_arr();
        for pubkey in &products {
          w.start_obj();
          w.key("account").str(&Pubkey::new_from_array(*pubkey).to_string());
          w.key("attr_dict").start_obj();
          for (k, v) in broadcast.product_attrs(*pubkey) {
            w.key(&k).str(&v);
          }
          w.end_obj();
          w.end_obj();
        }
        w.end_arr();
      }))
    }
    "subscribe_price_sched" => {
      let Some(params) = params else {
        return Some(jsonrpc_error(id, -32602, "missing params"));
      };
      let Some(account_str) = tree.find_val(params, "account").and_then(|n| tree.get_text(n)) else {
        return Some(jsonrpc_error(id, -32602, "missing account"));
      };
      let Ok(pubkey) = Pubkey::from_str(account_str) else {
        return Some(jsonrpc_error(id, -32602, "invalid account pubkey"));
      };
      broadcast.subscribe_price(pubkey.to_bytes(), client_id, client_tx.clone());
      Some(jsonrpc_result(id, |w| {
        w.num(client_id);
      }))
    }
    "update_price" | "update_no_send" => {
      let Some(params) = params else {
        return Some(jsonrpc_error(id, -32602, "missing params"));
      };
      let account_str = tree.find_val(params, "account").and_then(|n| tree.get_text(n));
      let price = tree.find_val(params, "price").and_then(|n| tree.get_int(n));
      let conf = tree.find_val(params, "conf").and_then(|n| tree.get_uint(n));
      let status_str = tree.find_val(params, "status").and_then(|n| tree.get_text(n));
      let (Some(account_str), Some(price), Some(conf), Some(status_str)) = (account_str, price, conf, status_str)
      else {
        return Some(jsonrpc_error(id, -32602, "malformed price update"));
      };
      let Ok(pubkey) = Pubkey::from_str(account_str) else {
        return Some(jsonrpc_error(id, -32602, "invalid account pubkey"));
      };
      let status = parse_status(status_str);
      let mut guard = pipeline.lock().await;
      if method == "update_price" {
        guard.update_price(pubkey.to_bytes(), price, conf, status, 0);
      } else {
        guard.update_no_send(pubkey.to_bytes(), price, conf, status, 0);
      }
      drop(guard);
      Some(jsonrpc_result(id, |w| {
        w.boolean(true);
      }))
    }
    other => Some(jsonrpc_error(id, -32601, &format!("unknown method {}", other))),
  }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
  use tokio::signal::unix::{signal, SignalKind};
  let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
  let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
  let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
  tokio::select! {
    _ = sigint.recv() => {}
    _ = sigterm.recv() => {}
    _ = sighup.recv() => {}
  }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
  let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_names_round_trip() {
    for status in [
      PriceStatus::Unknown,
      PriceStatus::Trading,
      PriceStatus::Halted,
      PriceStatus::Auction,
      PriceStatus::Ignored,
    ] {
      assert_eq!(parse_status(status_name(status)), status);
    }
  }

  #[test]
  fn local_broadcast_tracks_products_and_drops_clients() {
    let broadcast = LocalBroadcast::new();
    broadcast.record_product([1u8; 32]);
    broadcast.record_product([1u8; 32]);
    assert_eq!(broadcast.product_list(), vec![[1u8; 32]]);

    let (tx, _rx) = mpsc::unbounded_channel();
    broadcast.subscribe_price([2u8; 32], 7, tx);
    assert_eq!(broadcast.price_subs.lock().unwrap().get(&[2u8; 32]).unwrap().len(), 1);
    broadcast.drop_client(7);
    assert_eq!(broadcast.price_subs.lock().unwrap().get(&[2u8; 32]).unwrap().len(), 0);
  }
}
