use crate::decimal::Decimal;

/// Ported from the on-chain `upd_ema`: slots further apart than this are
/// treated as a gap too large for the rational decay approximation to stay
/// accurate, and the average is reset to the latest observation instead.
pub const PD_EMA_MAX_DIFF: i64 = 4145;

/// Exponent the decay-per-slot constant and the `numer`/`denom` carry state
/// are expressed at.
pub const PD_EMA_EXPO: i32 = -9;

/// `-ln(2) / tau` pre-scaled to `PD_EMA_EXPO`, i.e. the per-slot decay factor
/// for a tau chosen so a ~1 hour-scale window halves its weight on the
/// schedule the original publisher used.
pub const PD_EMA_DECAY: i64 = -117_065;

/// Running state for one of the three decaying averages a price account
/// carries (EMA price, TWAP, TWAC). `numer`/`denom` carry the rational
/// accumulator forward between updates at `PD_EMA_EXPO`; `val` is always
/// `numer/denom`, cached so callers don't redo the division every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmaState {
  pub val: Decimal,
  pub numer: i64,
  pub denom: i64,
}

impl EmaState {
  pub fn new(initial: Decimal) -> Self {
    EmaState {
      val: initial,
      numer: initial.scale_to(PD_EMA_EXPO).v,
      denom: Decimal::new(1, 0).scale_to(PD_EMA_EXPO).v,
    }
  }
}

/// A fresh observation's weight is the inverse of its confidence: a tight
/// quote pulls the average toward itself harder than a wide one does. An
/// observation with zero confidence is treated as maximally informative
/// (weight 1) rather than divided by zero.
fn conf_weight(conf: Decimal) -> Decimal {
  if conf.is_zero() {
    Decimal::new(1, 0)
  } else {
    Decimal::new(1, 0).div(conf)
  }
}

fn reset_to(obs: Decimal, cwgt: Decimal) -> EmaState {
  EmaState {
    val: obs,
    numer: obs.mul(cwgt).scale_to(PD_EMA_EXPO).v,
    denom: cwgt.scale_to(PD_EMA_EXPO).v,
  }
}

/// Advances an EMA-style average by `nslots` (the caller is responsible for
/// rejecting updates from a slot older than the account's last one, and for
/// treating a zero slot gap as a no-op). For gaps under `PD_EMA_MAX_DIFF`,
/// decays the previous `numer`/`denom` by `1 + nslots * PD_EMA_DECAY` and
/// folds in the new observation weighted by `1/conf`; for a larger gap, or
/// if the decayed accumulator goes negative, resets to the observation
/// alone.
pub fn update_ema(state: EmaState, obs: Decimal, conf: Decimal, nslots: i64) -> EmaState {
  if nslots <= 0 {
    return state;
  }
  let cwgt = conf_weight(conf);
  if nslots >= PD_EMA_MAX_DIFF {
    return reset_to(obs, cwgt);
  }

  let decay_per_slot = Decimal::new(PD_EMA_DECAY, PD_EMA_EXPO);
  let decay = Decimal::new(1, 0).add(decay_per_slot.mul(Decimal::new(nslots, 0)));

  let numer_prev = Decimal::new(state.numer, PD_EMA_EXPO);
  let denom_prev = Decimal::new(state.denom, PD_EMA_EXPO);

  let numer = numer_prev.mul(decay).add(obs.mul(cwgt));
  let denom = denom_prev.mul(decay).add(cwgt);

  if numer.lt(Decimal::zero()) || denom.lt(Decimal::zero()) || denom.is_zero() {
    return reset_to(obs, cwgt);
  }

  EmaState {
    val: numer.div(denom),
    numer: numer.scale_to(PD_EMA_EXPO).v,
    denom: denom.scale_to(PD_EMA_EXPO).v,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_slot_gap_is_a_no_op() {
    let s = EmaState::new(Decimal::new(100, 0));
    let s2 = update_ema(s, Decimal::new(200, 0), Decimal::new(1, 0), 0);
    assert_eq!(s2.val, s.val);
  }

  #[test]
  fn negative_gap_is_ignored() {
    let s = EmaState::new(Decimal::new(100, 0));
    let s2 = update_ema(s, Decimal::new(200, 0), Decimal::new(1, 0), -5);
    assert_eq!(s2.val, s.val);
  }

  #[test]
  fn large_gap_resets_to_observation() {
    let s = EmaState::new(Decimal::new(100, 0));
    let s2 = update_ema(s, Decimal::new(200, 0), Decimal::new(1, 0), PD_EMA_MAX_DIFF);
    assert_eq!(s2.val.to_f64(), 200.0);
  }

  #[test]
  fn a_tight_observation_pulls_the_average_harder_than_a_wide_one() {
    let s = EmaState::new(Decimal::new(100, 0));
    let tight = update_ema(s, Decimal::new(200, 0), Decimal::new(1, 0), 10);
    let wide = update_ema(s, Decimal::new(200, 0), Decimal::new(1_000, 0), 10);
    assert!(tight.val.to_f64() > wide.val.to_f64());
    assert!(wide.val.to_f64() > 100.0);
  }

  #[test]
  fn repeated_updates_converge_toward_the_observation() {
    let mut s = EmaState::new(Decimal::new(100, 0));
    let mut last_gap = (s.val.to_f64() - 200.0).abs();
    for _ in 0..5 {
      s = update_ema(s, Decimal::new(200, 0), Decimal::new(1, 0), 10);
      let gap = (s.val.to_f64() - 200.0).abs();
      assert!(gap <= last_gap);
      last_gap = gap;
    }
  }
}
