/// Size of one buffer node in a `WriteQueue` chain, matching the original
/// daemon's fixed 1270-byte wire buffer.
pub const NET_BUF_SIZE: usize = 1270;

#[derive(Debug, Clone)]
struct NetBuf {
  data: [u8; NET_BUF_SIZE],
  len: usize,
  sent: usize,
  next: Option<usize>,
}

impl NetBuf {
  fn empty() -> Self {
    NetBuf {
      data: [0u8; NET_BUF_SIZE],
      len: 0,
      sent: 0,
      next: None,
    }
  }

  fn remaining_cap(&self) -> usize {
    NET_BUF_SIZE - self.len
  }

  fn unsent(&self) -> &[u8] {
    &self.data[self.sent..self.len]
  }
}

/// A chain of fixed-size buffers addressed by index into an arena, with a
/// free list of reclaimed slots. Modeling this as an index-addressed arena
/// rather than raw pointers avoids ABA hazards on free-list pop when nodes
/// are recycled across the lifetime of a long-running connection.
///
/// The chain supports manual, buffer-at-a-time flushing (`drain_front`) for
/// callers that want to observe backpressure directly; most callers instead
/// hand `take_all()` to a tokio socket write loop.
#[derive(Debug, Default)]
pub struct WriteQueue {
  arena: Vec<NetBuf>,
  free: Vec<usize>,
  head: Option<usize>,
  tail: Option<usize>,
}

impl WriteQueue {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  fn alloc(&mut self) -> usize {
    if let Some(idx) = self.free.pop() {
      self.arena[idx] = NetBuf::empty();
      idx
    } else {
      self.arena.push(NetBuf::empty());
      self.arena.len() - 1
    }
  }

  /// Appends `bytes` to the chain, splitting across as many buffer nodes as
  /// needed.
  pub fn queue_send(&mut self, mut bytes: &[u8]) {
    while !bytes.is_empty() {
      let idx = match self.tail {
        Some(t) if self.arena[t].remaining_cap() > 0 => t,
        _ => {
          let idx = self.alloc();
          if let Some(t) = self.tail {
            self.arena[t].next = Some(idx);
          } else {
            self.head = Some(idx);
          }
          self.tail = Some(idx);
          idx
        }
      };
      let cap = self.arena[idx].remaining_cap();
      let take = cap.min(bytes.len());
      let node = &mut self.arena[idx];
      node.data[node.len..node.len + take].copy_from_slice(&bytes[..take]);
      node.len += take;
      bytes = &bytes[take..];
    }
  }

  /// Returns the unsent bytes of the head buffer, if any.
  pub fn front(&self) -> Option<&[u8]> {
    self.head.map(|h| self.arena[h].unsent())
  }

  /// Marks `n` bytes of the head buffer as sent, reclaiming the node onto the
  /// free list once fully drained.
  pub fn advance(&mut self, n: usize) {
    let Some(h) = self.head else { return };
    self.arena[h].sent += n;
    if self.arena[h].sent >= self.arena[h].len {
      let next = self.arena[h].next;
      self.free.push(h);
      self.head = next;
      if self.head.is_none() {
        self.tail = None;
      }
    }
  }

  /// Concatenates and drains the entire chain, for callers (e.g. an async
  /// write-all loop) that don't need manual partial-send bookkeeping.
  pub fn take_all(&mut self) -> Vec<u8> {
    let mut out = Vec::new();
    let mut cur = self.head;
    while let Some(idx) = cur {
      out.extend_from_slice(self.arena[idx].unsent());
      cur = self.arena[idx].next;
    }
    self.free.extend(self.collect_chain_indices());
    self.head = None;
    self.tail = None;
    out
  }

  fn collect_chain_indices(&self) -> Vec<usize> {
    let mut v = Vec::new();
    let mut cur = self.head;
    while let Some(idx) = cur {
      v.push(idx);
      cur = self.arena[idx].next;
    }
    v
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_across_nodes() {
    let mut q = WriteQueue::new();
    let payload = vec![7u8; NET_BUF_SIZE + 10];
    q.queue_send(&payload);
    assert_eq!(q.take_all(), payload);
  }

  #[test]
  fn advance_reclaims_nodes() {
    let mut q = WriteQueue::new();
    q.queue_send(b"hello");
    q.advance(5);
    assert!(q.is_empty());
    q.queue_send(b"world");
    assert_eq!(q.take_all(), b"world");
  }

  #[test]
  fn partial_advance_keeps_remainder() {
    let mut q = WriteQueue::new();
    q.queue_send(b"hello world");
    q.advance(6);
    assert_eq!(q.front(), Some(&b"world"[..]));
  }
}
