use std::sync::Arc;

use base64::Engine as _;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tokio::sync::Mutex;

use rpc::RpcClient;

use crate::error::PublishResult;
use crate::instr::build_batch_transaction;
use crate::state::{PendingEntry, PublishPipeline};
use crate::stats::PublishStats;

/// Drives one flush-on-slot cycle: pulls a batch of dirty accounts out of
/// the pipeline, assembles and signs a transaction, and sends it over the
/// RPC client's `sendTransaction`. The tx-forwarder path (direct UDP to slot
/// leaders) is a separate dispatch route the manager chooses between based
/// on configuration; both consume the same assembled transaction bytes.
pub struct Dispatcher {
  pub program_id: Pubkey,
  pub publisher: Keypair,
  pub cu_units: u32,
  pub cu_price: u64,
  pub max_batch_size: usize,
}

impl Dispatcher {
  /// Returns the base64-encoded signed transaction and the batch it covers,
  /// or `None` if there was nothing dirty to send.
  pub async fn flush(
    &self,
    pipeline: &Arc<Mutex<PublishPipeline>>,
    stats: &Arc<Mutex<PublishStats>>,
    rpc: &RpcClient,
  ) -> PublishResult<Option<(String, Vec<(Pubkey, PendingEntry)>)>> {
    let recent = rpc.get_blockhash("confirmed").await?;
    let blockhash: Hash = recent
      .blockhash
      .parse()
      .map_err(|_| crate::error::PublishError::Signing("malformed blockhash".into()))?;

    let mut guard = pipeline.lock().await;
    if guard.dirty_count() == 0 {
      return Ok(None);
    }
    // take_batch wants the eventual signature up front so the pipeline can
    // mark accounts in-flight atomically with the batch selection; we don't
    // have it until we sign, so use a placeholder and patch afterward.
    let placeholder = "pending";
    let raw_batch = guard.take_batch(self.max_batch_size, placeholder);
    drop(guard);

    let batch: Vec<(Pubkey, PendingEntry)> = raw_batch
      .into_iter()
      .map(|(k, e)| (Pubkey::new_from_array(k), e))
      .collect();

    let tx = build_batch_transaction(
      self.program_id,
      &self.publisher,
      &batch,
      blockhash,
      self.cu_units,
      self.cu_price,
    );
    let signature = tx.signatures[0].to_string();
    let tx_b64 = base64::engine::general_purpose::STANDARD_NO_PAD.encode(bincode::serialize(&tx).unwrap_or_default());

    stats.lock().await.record_attempt();
    let sent_sig = rpc.send_transaction(&tx_b64).await?;
    debug_assert_eq!(sent_sig, signature);

    let keys: Vec<[u8; 32]> = batch.iter().map(|(k, _)| k.to_bytes()).collect();
    pipeline.lock().await.set_inflight_signature(&keys, &signature);

    Ok(Some((signature, batch)))
  }
}
