use std::sync::Arc;

use tokio::sync::Mutex;

use net::{frame, LocalListener, UdpSender};
use rpc::RpcClient;

use crate::cluster::ClusterMap;
use crate::error::TxSvcResult;
use crate::leader::LeaderSchedule;

/// How many slots pass between `getHealth` heartbeats while idle, matching
/// the cadence a TPU connection needs to notice a stalled cluster before the
/// next batch of leaders goes stale.
pub const HBEAT_INTERVAL: u64 = 50;

/// How many slots ahead of the current one the forwarder fans a transaction
/// out to, covering both the current and the next few leaders so a
/// transaction lands even if it arrives just before a leader rotation.
const FAN_OUT_HORIZON: u64 = 4;

struct ForwarderState {
  schedule: LeaderSchedule,
  cluster: ClusterMap,
  current_slot: u64,
}

/// Accepts locally-forwarded transactions over TCP and fans each one out as
/// a UDP datagram to every current slot leader's TPU address. Tracks the
/// leader schedule via a rolling window refreshed as the cluster's slot
/// advances and the cluster node map via periodic `getClusterNodes` polls.
pub struct TxForwarder {
  rpc: Arc<RpcClient>,
  udp: Arc<UdpSender>,
  state: Arc<Mutex<ForwarderState>>,
}

impl TxForwarder {
  pub async fn new(rpc: Arc<RpcClient>, udp_bind_addr: std::net::SocketAddr) -> TxSvcResult<Self> {
    let udp = Arc::new(UdpSender::bind(udp_bind_addr).await?);
    Ok(TxForwarder {
      rpc,
      udp,
      state: Arc::new(Mutex::new(ForwarderState {
        schedule: LeaderSchedule::new(),
        cluster: ClusterMap::new(),
        current_slot: 0,
      })),
    })
  }

  async fn refresh_cluster_map(&self) -> TxSvcResult<()> {
    let nodes = self.rpc.get_cluster_nodes().await?;
    self.state.lock().await.cluster.replace(nodes);
    Ok(())
  }

  async fn refresh_schedule(&self, slot: u64) -> TxSvcResult<()> {
    let leaders = self.rpc.get_slot_leaders(slot, 5000).await?;
    self.state.lock().await.schedule.replace(slot, leaders);
    Ok(())
  }

  /// Runs the slot-driven side of the forwarder: tracks the current slot,
  /// refreshes the leader schedule when the window runs low, and heartbeats
  /// the cluster via `getHealth` every `HBEAT_INTERVAL` slots.
  pub async fn run_slot_tracker(&self) -> TxSvcResult<()> {
    self.refresh_cluster_map().await?;
    let (_sub_id, mut rx, _unsub) = self.rpc.slot_subscribe().await?;
    let mut last_heartbeat_slot = 0u64;
    while let Some(tree) = rx.recv().await {
      let Some(root) = tree.root() else { continue };
      let Some(params) = tree.find_val(root, "params") else { continue };
      let Some(result) = tree.find_val(params, "result") else { continue };
      let Some(slot_node) = tree.find_val(result, "slot") else { continue };
      let Some(slot) = tree.get_uint(slot_node) else { continue };

      self.state.lock().await.current_slot = slot;

      let needs_refresh = self.state.lock().await.schedule.needs_refresh(slot);
      if needs_refresh {
        if let Err(e) = self.refresh_schedule(slot).await {
          log::warn!("txsvc: failed to refresh leader schedule: {}", e);
        }
      }

      if slot.saturating_sub(last_heartbeat_slot) >= HBEAT_INTERVAL {
        last_heartbeat_slot = slot;
        match self.rpc.get_health().await {
          Ok(true) => {}
          Ok(false) => log::warn!("txsvc: cluster reports unhealthy"),
          Err(e) => log::warn!("txsvc: getHealth failed: {}", e),
        }
        if let Err(e) = self.refresh_cluster_map().await {
          log::warn!("txsvc: failed to refresh cluster map: {}", e);
        }
      }
    }
    Ok(())
  }

  /// Runs the TCP ingress side: accepts connections on `listen_addr`, reads
  /// one framed transaction per connection, and fans it out over UDP to the
  /// current leader set.
  pub async fn run_ingress(&self, listen_addr: &str) -> TxSvcResult<()> {
    let listener = LocalListener::bind(listen_addr).await?;
    loop {
      let mut stream = listener.accept().await?;
      let state = self.state.clone();
      let udp = self.udp.clone();
      tokio::spawn(async move {
        match frame::read_framed(&mut stream).await {
          Ok(payload) => {
            let guard = state.lock().await;
            let slot = guard.current_slot;
            let leaders = guard.schedule.fan_out_set(slot, FAN_OUT_HORIZON);
            let addrs = guard.cluster.resolve_all(leaders);
            drop(guard);
            udp.fan_out(&payload, &addrs).await;
          }
          Err(e) => log::warn!("txsvc: failed to read forwarded transaction: {}", e),
        }
      });
    }
  }
}
