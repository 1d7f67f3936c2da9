use std::collections::HashMap;
use std::net::SocketAddr;

/// Maps a validator's identity pubkey (as reported by `getClusterNodes`) to
/// its TPU UDP address, so the forwarder can translate a slot's leader
/// pubkey into somewhere to actually send a datagram.
#[derive(Debug, Default)]
pub struct ClusterMap {
  tpu: HashMap<String, SocketAddr>,
}

impl ClusterMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn replace(&mut self, nodes: Vec<(String, Option<String>)>) {
    self.tpu.clear();
    for (pubkey, tpu) in nodes {
      if let Some(tpu) = tpu.and_then(|s| s.parse().ok()) {
        self.tpu.insert(pubkey, tpu);
      }
    }
  }

  pub fn addr_for(&self, leader: &str) -> Option<SocketAddr> {
    self.tpu.get(leader).copied()
  }

  pub fn resolve_all<'a>(&self, leaders: impl IntoIterator<Item = &'a str>) -> Vec<SocketAddr> {
    leaders.into_iter().filter_map(|l| self.addr_for(l)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_known_leaders_and_skips_unknown() {
    let mut c = ClusterMap::new();
    c.replace(vec![
      ("leader1".into(), Some("127.0.0.1:8001".into())),
      ("leader2".into(), None),
    ]);
    let addrs = c.resolve_all(["leader1", "leader2", "leader3"]);
    assert_eq!(addrs.len(), 1);
  }
}
