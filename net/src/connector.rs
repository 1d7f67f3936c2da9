use std::time::Duration;

/// Connection lifecycle shared by the RPC client and the tx forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
  Disconnected,
  Connecting,
  Ready,
  Error,
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Exponential backoff with a 1s floor and 120s ceiling, doubling on every
/// failed attempt and resetting on success.
#[derive(Debug)]
pub struct Backoff {
  current: Duration,
}

impl Default for Backoff {
  fn default() -> Self {
    Backoff {
      current: INITIAL_BACKOFF,
    }
  }
}

impl Backoff {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    self.current = INITIAL_BACKOFF;
  }

  /// Returns the delay to wait before the next attempt, then doubles it
  /// (capped at `MAX_BACKOFF`) for the attempt after that.
  pub fn next_delay(&mut self) -> Duration {
    let delay = self.current;
    self.current = (self.current * 2).min(MAX_BACKOFF);
    delay
  }
}

/// Retries `connect` with doubling backoff until it succeeds, logging each
/// failure. Intended for long-lived sockets (RPC, tx forwarder ingress) that
/// should never give up, as opposed to one-shot requests.
pub async fn connect_with_backoff<F, Fut, T, E>(mut connect: F) -> T
where
  F: FnMut() -> Fut,
  Fut: std::future::Future<Output = Result<T, E>>,
  E: std::fmt::Display,
{
  let mut backoff = Backoff::new();
  loop {
    match connect().await {
      Ok(v) => return v,
      Err(e) => {
        let delay = backoff.next_delay();
        log::warn!("connect failed: {}, retrying in {:?}", e, delay);
        tokio::time::sleep(delay).await;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles_and_caps() {
    let mut b = Backoff::new();
    assert_eq!(b.next_delay(), Duration::from_secs(1));
    assert_eq!(b.next_delay(), Duration::from_secs(2));
    assert_eq!(b.next_delay(), Duration::from_secs(4));
    for _ in 0..10 {
      b.next_delay();
    }
    assert_eq!(b.next_delay(), MAX_BACKOFF);
  }

  #[test]
  fn reset_returns_to_floor() {
    let mut b = Backoff::new();
    b.next_delay();
    b.next_delay();
    b.reset();
    assert_eq!(b.next_delay(), Duration::from_secs(1));
  }

  #[tokio::test]
  async fn connect_with_backoff_returns_first_success() {
    let mut attempt = 0;
    let v = connect_with_backoff(|| {
      attempt += 1;
      async move {
        if attempt < 2 {
          Err("not yet")
        } else {
          Ok(42)
        }
      }
    })
    .await;
    assert_eq!(v, 42);
  }
}
