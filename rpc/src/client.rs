use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use json::{JsonTree, JsonWriter};
use net::{HttpRpcClient, WsConnection};

use crate::error::{RpcError, RpcResult};
use crate::id::IdAllocator;
use crate::pending::{PendingTable, RpcResponse};
use crate::subscription::{StreamUnsub, Subscription, SubscriptionMap};

/// Owns one HTTP socket for request/response RPC calls and one WebSocket
/// socket for subscriptions, matching the two-socket shape of the original
/// client. The WebSocket's read/write halves are driven by a single
/// background task (`run_ws_loop`) so response correlation and subscription
/// dispatch stay single-threaded even though callers invoke `call`/
/// `subscribe` concurrently.
pub struct RpcClient {
  http: HttpRpcClient,
  ws_out: mpsc::UnboundedSender<String>,
  id_alloc: Mutex<IdAllocator>,
  pending: Arc<Mutex<PendingTable>>,
  subs: Arc<Mutex<SubscriptionMap>>,
}

impl RpcClient {
  pub async fn connect(http_url: impl Into<String>, ws_url: impl Into<String>) -> RpcResult<Self> {
    let ws = WsConnection::connect(&ws_url.into()).await?;
    let pending = Arc::new(Mutex::new(PendingTable::new()));
    let subs = Arc::new(Mutex::new(SubscriptionMap::new()));
    let (ws_out, ws_out_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_ws_loop(ws, ws_out_rx, pending.clone(), subs.clone()));

    Ok(RpcClient {
      http: HttpRpcClient::new(http_url),
      ws_out,
      id_alloc: Mutex::new(IdAllocator::new()),
      pending,
      subs,
    })
  }

  async fn next_id(&self) -> u64 {
    self.id_alloc.lock().await.alloc()
  }

  fn build_request(id: u64, method: &str, params_json: &str) -> Vec<u8> {
    let mut w = JsonWriter::new();
    w.start_obj()
      .key("jsonrpc")
      .str("2.0")
      .key("id")
      .num(id)
      .key("method")
      .str(method)
      .key("params")
      .raw(params_json.as_bytes())
      .end_obj();
    w.into_bytes()
  }

  fn result_node(tree: &JsonTree) -> RpcResult<json::NodeId> {
    let root = tree
      .root()
      .ok_or_else(|| RpcError::Protocol("empty response body".into()))?;
    if let Some(err) = tree.find_val(root, "error") {
      let code = tree
        .find_val(err, "code")
        .and_then(|c| tree.get_int(c))
        .unwrap_or(0);
      let message = tree
        .find_val(err, "message")
        .and_then(|m| tree.get_text(m))
        .unwrap_or("")
        .to_string();
      return Err(RpcError::Application { code, message });
    }
    tree
      .find_val(root, "result")
      .ok_or_else(|| RpcError::Protocol("response missing both result and error".into()))
  }

  /// Issues a one-shot HTTP JSON-RPC call and returns the parsed response
  /// tree plus the node id of its `result` field.
  pub async fn call(&self, method: &str, params_json: &str) -> RpcResult<(JsonTree, json::NodeId)> {
    let id = self.next_id().await;
    let body = Self::build_request(id, method, params_json);
    let resp_bytes = self.http.post_json(body).await?;
    let (tree, _) = JsonTree::parse(&resp_bytes)?;
    let result = Self::result_node(&tree)?;
    Ok((tree, result))
  }

  /// Issues a JSON-RPC call over the WebSocket connection and awaits the
  /// correlated response, for cases where a caller wants the subscription
  /// socket's ordering guarantees rather than a fresh HTTP round trip.
  pub async fn call_ws(&self, method: &str, params_json: &str) -> RpcResult<(JsonTree, json::NodeId)> {
    let id = self.next_id().await;
    let body = Self::build_request(id, method, params_json);
    let (tx, rx) = oneshot::channel();
    self.pending.lock().await.insert(id, tx);
    self
      .ws_out
      .send(String::from_utf8(body).expect("writer emits valid utf8"))
      .map_err(|_| RpcError::Cancelled)?;
    let resp = rx.await.map_err(|_| RpcError::Cancelled)??;
    let result = Self::result_node(&resp.tree)?;
    Ok((resp.tree, result))
  }

  /// Subscribes via `method`, returning the cluster-assigned subscription id,
  /// a receiver for each notification's parsed tree, and an unsubscribe
  /// thunk that sends the matching `<noun>Unsubscribe` request.
  pub async fn subscribe(
    &self,
    method: &'static str,
    unsub_method: &'static str,
    params_json: &str,
  ) -> RpcResult<(u64, mpsc::UnboundedReceiver<JsonTree>, StreamUnsub)> {
    let (tree, result) = self.call_ws(method, params_json).await?;
    let sub_id = tree
      .get_uint(result)
      .ok_or_else(|| RpcError::Protocol("subscribe result was not an integer id".into()))?;
    let (tx, rx) = mpsc::unbounded_channel();
    self.subs.lock().await.insert(sub_id, Subscription { method, tx });

    let subs = self.subs.clone();
    let ws_out = self.ws_out.clone();
    let unsub: StreamUnsub = Box::new(move || {
      Box::pin(async move {
        subs.lock().await.remove(sub_id);
        let mut w = JsonWriter::new();
        w.start_obj()
          .key("jsonrpc")
          .str("2.0")
          .key("id")
          .num(0)
          .key("method")
          .str(unsub_method)
          .key("params")
          .start_arr()
          .num(sub_id)
          .end_arr()
          .end_obj();
        let _ = ws_out.send(String::from_utf8(w.into_bytes()).unwrap());
      })
    });
    Ok((sub_id, rx, unsub))
  }
}

async fn run_ws_loop(
  mut ws: WsConnection,
  mut outbound: mpsc::UnboundedReceiver<String>,
  pending: Arc<Mutex<PendingTable>>,
  subs: Arc<Mutex<SubscriptionMap>>,
) {
  loop {
    tokio::select! {
      msg = outbound.recv() => {
        match msg {
          Some(text) => {
            if let Err(e) = ws.send_text(text).await {
              log::warn!("rpc ws send failed: {}", e);
              return;
            }
          }
          None => return,
        }
      }
      event = ws.next_event() => {
        match event {
          Ok(text) => handle_incoming(text.as_bytes(), &pending, &subs).await,
          Err(e) => {
            log::warn!("rpc ws closed: {}", e);
            return;
          }
        }
      }
    }
  }
}

async fn handle_incoming(bytes: &[u8], pending: &Arc<Mutex<PendingTable>>, subs: &Arc<Mutex<SubscriptionMap>>) {
  let (tree, _) = match JsonTree::parse(bytes) {
    Ok(t) => t,
    Err(e) => {
      log::warn!("rpc received malformed json: {}", e);
      return;
    }
  };
  let Some(root) = tree.root() else { return };

  if let Some(id_node) = tree.find_val(root, "id") {
    if let Some(id) = tree.get_uint(id_node) {
      if let Some(tx) = pending.lock().await.take(id) {
        let _ = tx.send(Ok(RpcResponse { tree }));
        return;
      }
    }
  }

  if let Some(params) = tree.find_val(root, "params") {
    if let Some(sub_node) = tree.find_val(params, "subscription") {
      if let Some(sub_id) = tree.get_uint(sub_node) {
        subs.lock().await.dispatch(sub_id, tree);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn build_request_shapes_jsonrpc_envelope() {
    let body = RpcClient::build_request(7, "getHealth", "[]");
    assert_eq!(
      String::from_utf8(body).unwrap(),
      r#"{"jsonrpc":"2.0","id":7,"method":"getHealth","params":[]}"#
    );
  }

  #[test]
  fn result_node_extracts_result_field() {
    let (tree, _) = JsonTree::parse(br#"{"jsonrpc":"2.0","id":1,"result":42}"#).unwrap();
    let result = RpcClient::result_node(&tree).unwrap();
    assert_eq!(tree.get_int(result), Some(42));
  }

  #[test]
  fn result_node_surfaces_application_errors() {
    let (tree, _) =
      JsonTree::parse(br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#).unwrap();
    let err = RpcClient::result_node(&tree).unwrap_err();
    match err {
      RpcError::Application { code, message } => {
        assert_eq!(code, -32601);
        assert_eq!(message, "method not found");
      }
      _ => panic!("expected Application error"),
    }
  }
}
