use json::{JsonTree, NodeId};

use crate::client::RpcClient;
use crate::error::{RpcError, RpcResult};

/// Result of a `getLatestBlockhash` / `getRecentBlockhash` call: the
/// blockhash callers attach to a transaction and the slot the cluster's last
/// valid height is computed from.
pub struct Blockhash {
  pub blockhash: String,
  pub last_valid_block_height: u64,
}

impl RpcClient {
  pub async fn get_account_info(&self, pubkey: &str, commitment: &str) -> RpcResult<(JsonTree, NodeId)> {
    let params = format!(
      r#"["{}",{{"encoding":"base64","commitment":"{}"}}]"#,
      pubkey, commitment
    );
    self.call("getAccountInfo", &params).await
  }

  pub async fn get_program_accounts(&self, program_id: &str, commitment: &str) -> RpcResult<(JsonTree, NodeId)> {
    let params = format!(
      r#"["{}",{{"encoding":"base64","commitment":"{}"}}]"#,
      program_id, commitment
    );
    self.call("getProgramAccounts", &params).await
  }

  /// Prefers `getLatestBlockhash`, falling back to the deprecated
  /// `getRecentBlockhash` if the cluster reports method-not-found (code
  /// -32601), since older validators only implement the latter.
  pub async fn get_blockhash(&self, commitment: &str) -> RpcResult<Blockhash> {
    let params = format!(r#"[{{"commitment":"{}"}}]"#, commitment);
    match self.call("getLatestBlockhash", &params).await {
      Ok((tree, result)) => {
        let value = tree
          .find_val(result, "value")
          .ok_or_else(|| RpcError::Protocol("getLatestBlockhash missing value".into()))?;
        let blockhash = tree
          .find_val(value, "blockhash")
          .and_then(|n| tree.get_text(n))
          .ok_or_else(|| RpcError::Protocol("missing blockhash".into()))?
          .to_string();
        let last_valid_block_height = tree
          .find_val(value, "lastValidBlockHeight")
          .and_then(|n| tree.get_uint(n))
          .unwrap_or(0);
        Ok(Blockhash {
          blockhash,
          last_valid_block_height,
        })
      }
      Err(RpcError::Application { code: -32601, .. }) => {
        let (tree, result) = self.call("getRecentBlockhash", &params).await?;
        let value = tree
          .find_val(result, "value")
          .ok_or_else(|| RpcError::Protocol("getRecentBlockhash missing value".into()))?;
        let blockhash = tree
          .find_val(value, "blockhash")
          .and_then(|n| tree.get_text(n))
          .ok_or_else(|| RpcError::Protocol("missing blockhash".into()))?
          .to_string();
        Ok(Blockhash {
          blockhash,
          last_valid_block_height: 0,
        })
      }
      Err(e) => Err(e),
    }
  }

  pub async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> RpcResult<u64> {
    let params = format!("[{}]", data_len);
    let (tree, result) = self.call("getMinimumBalanceForRentExemption", &params).await?;
    tree
      .get_uint(result)
      .ok_or_else(|| RpcError::Protocol("expected integer lamports".into()))
  }

  pub async fn get_slot_leaders(&self, start_slot: u64, limit: u64) -> RpcResult<Vec<String>> {
    let params = format!("[{},{}]", start_slot, limit);
    let (tree, result) = self.call("getSlotLeaders", &params).await?;
    Ok(
      tree
        .children(result)
        .iter()
        .filter_map(|&c| tree.get_text(c).map(|s| s.to_string()))
        .collect(),
    )
  }

  pub async fn get_cluster_nodes(&self) -> RpcResult<Vec<(String, Option<String>)>> {
    let (tree, result) = self.call("getClusterNodes", "[]").await?;
    let mut out = Vec::new();
    for &node in tree.children(result) {
      let Some(pubkey_node) = tree.find_val(node, "pubkey") else { continue };
      let Some(pubkey) = tree.get_text(pubkey_node) else { continue };
      let tpu = tree
        .find_val(node, "tpu")
        .and_then(|n| tree.get_text(n))
        .map(|s| s.to_string());
      out.push((pubkey.to_string(), tpu));
    }
    Ok(out)
  }

  pub async fn get_health(&self) -> RpcResult<bool> {
    match self.call("getHealth", "[]").await {
      Ok(_) => Ok(true),
      Err(RpcError::Application { .. }) => Ok(false),
      Err(e) => Err(e),
    }
  }

  pub async fn send_transaction(&self, tx_base64: &str) -> RpcResult<String> {
    let params = format!(r#"["{}",{{"encoding":"base64"}}]"#, tx_base64);
    let (tree, result) = self.call("sendTransaction", &params).await?;
    tree
      .get_text(result)
      .map(|s| s.to_string())
      .ok_or_else(|| RpcError::Protocol("sendTransaction did not return a signature".into()))
  }

  pub async fn account_subscribe(
    &self,
    pubkey: &str,
    commitment: &str,
  ) -> RpcResult<(u64, tokio::sync::mpsc::UnboundedReceiver<JsonTree>, crate::subscription::StreamUnsub)> {
    let params = format!(
      r#"["{}",{{"encoding":"base64","commitment":"{}"}}]"#,
      pubkey, commitment
    );
    self.subscribe("accountSubscribe", "accountUnsubscribe", &params).await
  }

  pub async fn program_subscribe(
    &self,
    program_id: &str,
    commitment: &str,
  ) -> RpcResult<(u64, tokio::sync::mpsc::UnboundedReceiver<JsonTree>, crate::subscription::StreamUnsub)> {
    let params = format!(
      r#"["{}",{{"encoding":"base64","commitment":"{}"}}]"#,
      program_id, commitment
    );
    self.subscribe("programSubscribe", "programUnsubscribe", &params).await
  }

  pub async fn slot_subscribe(
    &self,
  ) -> RpcResult<(u64, tokio::sync::mpsc::UnboundedReceiver<JsonTree>, crate::subscription::StreamUnsub)> {
    self.subscribe("slotSubscribe", "slotUnsubscribe", "[]").await
  }

  pub async fn signature_subscribe(
    &self,
    signature: &str,
    commitment: &str,
  ) -> RpcResult<(u64, tokio::sync::mpsc::UnboundedReceiver<JsonTree>, crate::subscription::StreamUnsub)> {
    let params = format!(r#"["{}",{{"commitment":"{}"}}]"#, signature, commitment);
    self
      .subscribe("signatureSubscribe", "signatureUnsubscribe", &params)
      .await
  }
}
