use common::RingBuffer;

/// Tracks publish hit rate and latency quartiles for one price account,
/// sized to the same rolling window the slot-latency histogram in the
/// account mirror uses. Percentiles reuse `aggregate`'s unweighted
/// percentile computation (every sample has equal weight) rather than
/// re-deriving a second implementation of the same interpolation.
pub struct PublishStats {
  samples_ms: RingBuffer<f64>,
  attempts: u64,
  confirmed: u64,
}

impl PublishStats {
  pub fn new(capacity: usize) -> Self {
    PublishStats {
      samples_ms: RingBuffer::new(capacity),
      attempts: 0,
      confirmed: 0,
    }
  }

  pub fn record_attempt(&mut self) {
    self.attempts += 1;
  }

  pub fn record_confirmed(&mut self, latency_ms: f64) {
    self.confirmed += 1;
    self.samples_ms.push(latency_ms);
  }

  pub fn hit_rate(&self) -> f64 {
    if self.attempts == 0 {
      return 0.0;
    }
    self.confirmed as f64 / self.attempts as f64
  }

  /// Returns `(p25, p50, p75)` latency in milliseconds, or `None` if no
  /// confirmations have landed yet.
  pub fn latency_quartiles(&self) -> Option<(f64, f64, f64)> {
    if self.samples_ms.is_empty() {
      return None;
    }
    let mut sorted: Vec<f64> = self.samples_ms.vec.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Some((
      aggregate::unweighted_percentile(&sorted, 0.25),
      aggregate::unweighted_percentile(&sorted, 0.5),
      aggregate::unweighted_percentile(&sorted, 0.75),
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hit_rate_is_zero_with_no_attempts() {
    let s = PublishStats::new(16);
    assert_eq!(s.hit_rate(), 0.0);
  }

  #[test]
  fn hit_rate_tracks_confirmations_over_attempts() {
    let mut s = PublishStats::new(16);
    s.record_attempt();
    s.record_attempt();
    s.record_confirmed(10.0);
    assert!((s.hit_rate() - 0.5).abs() < 1e-9);
  }

  #[test]
  fn quartiles_are_none_until_a_confirmation_lands() {
    let s = PublishStats::new(16);
    assert!(s.latency_quartiles().is_none());
  }

  #[test]
  fn quartiles_over_known_samples() {
    let mut s = PublishStats::new(16);
    for ms in [10.0, 20.0, 30.0, 40.0] {
      s.record_confirmed(ms);
    }
    let (p25, p50, p75) = s.latency_quartiles().unwrap();
    assert!(p25 <= p50 && p50 <= p75);
  }
}
