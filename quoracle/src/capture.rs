use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread::JoinHandle;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Bound on the number of unwritten records the capture queue holds before a
/// caller blocks on `record`, keeping a slow disk from growing memory use
/// without limit.
const QUEUE_CAPACITY: usize = 1024;

/// Optional gzip-append capture sink. A bounded queue feeds one dedicated
/// writer thread so account-update processing on the manager's event loop
/// never blocks on disk IO; the queue itself is the `SyncSender` half of a
/// bounded channel, giving the same backpressure a mutex-guarded queue with
/// a capacity bound would.
pub struct CaptureWriter {
  tx: SyncSender<Vec<u8>>,
  handle: Option<JoinHandle<()>>,
}

impl CaptureWriter {
  pub fn start(path: impl AsRef<Path>) -> io::Result<Self> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (tx, rx) = sync_channel::<Vec<u8>>(QUEUE_CAPACITY);
    let handle = std::thread::spawn(move || {
      let mut encoder = GzEncoder::new(file, Compression::default());
      while let Ok(record) = rx.recv() {
        if let Err(e) = encoder.write_all(&record) {
          log::error!("capture writer: failed to append record: {}", e);
          break;
        }
      }
      if let Err(e) = encoder.finish() {
        log::error!("capture writer: failed to finalize gzip stream: {}", e);
      }
    });
    Ok(CaptureWriter {
      tx,
      handle: Some(handle),
    })
  }

  /// Queues one `i64 timestamp | 32-byte pubkey | account bytes` record.
  /// Never blocks the caller past the queue's capacity bound; if the writer
  /// thread has already exited (e.g. a disk error), the record is dropped
  /// and logged rather than panicking the daemon.
  pub fn record(&self, timestamp_millis: i64, pubkey: [u8; 32], account_bytes: &[u8]) {
    let mut buf = Vec::with_capacity(8 + 32 + account_bytes.len());
    buf.extend_from_slice(&timestamp_millis.to_le_bytes());
    buf.extend_from_slice(&pubkey);
    buf.extend_from_slice(account_bytes);
    if self.tx.send(buf).is_err() {
      log::warn!("capture writer thread has exited; dropping record");
    }
  }
}

impl Drop for CaptureWriter {
  fn drop(&mut self) {
    if let Some(handle) = self.handle.take() {
      let _ = handle.join();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_and_closes_cleanly() {
    let dir = std::env::temp_dir().join(format!("quoracle-capture-test-{:?}", std::thread::current().id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("capture.gz");
    {
      let writer = CaptureWriter::start(&path).unwrap();
      writer.record(1, [7u8; 32], b"account-bytes");
    }
    let meta = std::fs::metadata(&path).unwrap();
    assert!(meta.len() > 0);
    let _ = std::fs::remove_dir_all(&dir);
  }
}
