use crate::decimal::Decimal;

/// Slots a component's `pub_slot` may lag the current slot and still count
/// as fresh, matching the wire crate's `PC_MAX_SEND_LATENCY` (duplicated
/// here rather than depended on, since this crate has no dependency on the
/// account wire layout).
pub const PC_MAX_SEND_LATENCY: i64 = 25;

/// Per-slot decay table, `DECAY_TABLE[n] == round(sqrt(n) * 1e9)`, ported
/// verbatim from the on-chain `qs->decay_` table. Used two ways: to widen a
/// component's confidence interval by `sqrt(slot_diff)` before it enters the
/// weighting step, and to cap any single publisher's share of the total
/// weight at `1/sqrt(numa)`. Both uses index with `n.max(1)` since index 0
/// is never meaningfully distinct from index 1 in either usage.
pub const DECAY_TABLE: [i64; 26] = [
  0,
  1_000_000_000,
  1_414_213_562,
  1_732_050_808,
  2_000_000_000,
  2_236_067_977,
  2_449_489_743,
  2_645_751_311,
  2_828_427_125,
  3_000_000_000,
  3_162_277_660,
  3_316_624_790,
  3_464_101_615,
  3_605_551_275,
  3_741_657_387,
  3_872_983_346,
  4_000_000_000,
  4_123_105_626,
  4_242_640_687,
  4_358_898_944,
  4_472_135_955,
  4_582_575_695,
  4_690_415_760,
  4_795_831_523,
  4_898_979_486,
  5_000_000_000,
];

fn decay_sqrt(n: usize) -> Decimal {
  let idx = n.max(1).min(DECAY_TABLE.len() - 1);
  Decimal::new(DECAY_TABLE[idx], -9)
}

/// Trading state of one publisher's submitted component, narrowed from the
/// wire `PriceStatus` to the only distinction the filter step cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
  Trading,
  NotTrading,
}

/// One publisher's latest submitted quote for the current aggregation
/// round, carrying just the fields the filter and weighting steps need.
/// Deliberately not the wire `PriceAccount`/`PriceComponent` types: this
/// crate has no dependency on the wire layout, so callers (the account
/// mirror's verification subscriber) build this from whichever component
/// slots they're replaying.
#[derive(Debug, Clone, Copy)]
pub struct Component {
  pub price: Decimal,
  pub conf: Decimal,
  pub status: ComponentStatus,
  pub pub_slot: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggStatus {
  Unknown,
  Trading,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateOutcome {
  pub price: Decimal,
  pub conf: Decimal,
  pub status: AggStatus,
  pub num_quotes: usize,
}

impl AggregateOutcome {
  fn unknown(num_quotes: usize) -> Self {
    AggregateOutcome {
      price: Decimal::zero(),
      conf: Decimal::zero(),
      status: AggStatus::Unknown,
      num_quotes,
    }
  }
}

struct Valid {
  price: Decimal,
  conf: Decimal,
  slot_diff: i64,
}

fn decimal_abs(d: Decimal) -> Decimal {
  if d.lt(Decimal::zero()) {
    Decimal::zero().sub(d)
  } else {
    d
  }
}

/// Computes one slot's aggregate price, confidence, and status from the set
/// of components currently attached to a price account.
///
/// Mirrors the nine-step on-chain aggregation: filters components to those
/// trading, with a positive price and confidence, and published no more
/// than `PC_MAX_SEND_LATENCY` slots ago; rejects outliers whose price falls
/// outside five times the band around the median of the valid components'
/// `price ± conf` bounds; bails out to `AggStatus::Unknown` if nothing
/// survives, fewer than `min_pub` components survive, or the surviving set
/// isn't a majority of the valid set; otherwise decays each surviving
/// component's confidence by `sqrt(slot_diff)`, weights each by
/// `1/(conf + distance to its nearest neighbouring price)`, caps any single
/// weight at `1/sqrt(numa)` redistributing the excess proportionally, and
/// reads the aggregate price and confidence off the weighted percentile
/// curve. A lone surviving component is reported directly, with its
/// confidence widened five-fold to reflect that no cross-check was
/// possible.
pub fn aggregate_price(components: &[Component], slot: u64, min_pub: u8) -> AggregateOutcome {
  let mut valid = Vec::with_capacity(components.len());
  for c in components {
    if c.status != ComponentStatus::Trading {
      continue;
    }
    if !c.conf.gt(Decimal::zero()) || !c.price.gt(Decimal::zero()) {
      continue;
    }
    if c.pub_slot > slot {
      continue;
    }
    let diff = (slot - c.pub_slot) as i64;
    if diff > PC_MAX_SEND_LATENCY {
      continue;
    }
    valid.push(Valid {
      price: c.price,
      conf: c.conf,
      slot_diff: diff,
    });
  }
  let numv = valid.len();
  if numv == 0 {
    return AggregateOutcome::unknown(0);
  }

  let mut bounds: Vec<Decimal> = Vec::with_capacity(numv * 2);
  for v in &valid {
    bounds.push(v.price.sub(v.conf));
    bounds.push(v.price.add(v.conf));
  }
  bounds.sort_by(|a, b| decimal_cmp(*a, *b));
  let mprc = bounds[numv - 1].add(bounds[numv]).div(Decimal::new(2, 0));
  let band_lo = mprc.div(Decimal::new(5, 0));
  let band_hi = mprc.mul(Decimal::new(5, 0));

  let mut surv: Vec<Valid> = valid
    .into_iter()
    .filter(|v| !v.price.lt(band_lo) && !v.price.gt(band_hi))
    .collect();
  surv.sort_by(|a, b| decimal_cmp(a.price, b.price));
  let numa = surv.len();

  if numa == 0 || (numa as u8) < min_pub || numa * 2 <= numv {
    return AggregateOutcome::unknown(numv);
  }

  if numa == 1 {
    let only = &surv[0];
    let decayed = only.conf.mul(decay_sqrt(only.slot_diff.max(0) as usize));
    return AggregateOutcome {
      price: only.price,
      conf: decayed.mul(Decimal::new(5, 0)),
      status: AggStatus::Trading,
      num_quotes: 1,
    };
  }

  let prices: Vec<Decimal> = surv.iter().map(|v| v.price).collect();
  let decayed_conf: Vec<Decimal> = surv
    .iter()
    .map(|v| v.conf.mul(decay_sqrt(v.slot_diff.max(0) as usize)))
    .collect();

  let mut raw_weights = vec![Decimal::zero(); numa];
  for i in 0..numa {
    let dist = if i == 0 {
      prices[1].sub(prices[0])
    } else if i == numa - 1 {
      prices[numa - 1].sub(prices[numa - 2])
    } else {
      let left = prices[i].sub(prices[i - 1]);
      let right = prices[i + 1].sub(prices[i]);
      if left.lt(right) {
        left
      } else {
        right
      }
    };
    let denom = decayed_conf[i].add(decimal_abs(dist));
    raw_weights[i] = if denom.is_zero() {
      Decimal::new(1, 0)
    } else {
      Decimal::new(1, 0).div(denom)
    };
  }

  let total = raw_weights.iter().fold(Decimal::zero(), |a, &b| a.add(b));
  let mut weights: Vec<Decimal> = raw_weights.iter().map(|&w| w.div(total)).collect();

  let cap = Decimal::new(1, 0).div(decay_sqrt(numa));
  let epsilon = Decimal::new(1, -6);
  loop {
    let mut excess = Decimal::zero();
    let mut capped = vec![false; numa];
    for i in 0..numa {
      if weights[i].gt(cap) {
        excess = excess.add(weights[i].sub(cap));
        weights[i] = cap;
        capped[i] = true;
      }
    }
    if !excess.gt(epsilon) {
      break;
    }
    let uncapped_total = (0..numa).filter(|&i| !capped[i]).fold(Decimal::zero(), |a, i| a.add(weights[i]));
    if !uncapped_total.gt(epsilon) {
      break;
    }
    for i in 0..numa {
      if !capped[i] {
        weights[i] = weights[i].add(excess.mul(weights[i].div(uncapped_total)));
      }
    }
  }

  let order: Vec<usize> = (0..numa).collect();
  let p25 = weighted_percentile(&order, &prices, &weights, Decimal::new(25, -2));
  let p50 = weighted_percentile(&order, &prices, &weights, Decimal::new(5, -1));
  let p75 = weighted_percentile(&order, &prices, &weights, Decimal::new(75, -2));

  let lowers: Vec<Decimal> = (0..numa).map(|i| prices[i].sub(decayed_conf[i])).collect();
  let uppers: Vec<Decimal> = (0..numa).map(|i| prices[i].add(decayed_conf[i])).collect();
  let mut lower_order: Vec<usize> = (0..numa).collect();
  lower_order.sort_by(|&a, &b| decimal_cmp(lowers[a], lowers[b]));
  let mut upper_order: Vec<usize> = (0..numa).collect();
  upper_order.sort_by(|&a, &b| decimal_cmp(uppers[a], uppers[b]));
  let band_lower = weighted_percentile(&lower_order, &lowers, &weights, Decimal::new(5, -1));
  let band_upper = weighted_percentile(&upper_order, &uppers, &weights, Decimal::new(5, -1));

  let band_spread_half = decimal_abs(band_upper.sub(band_lower)).div(Decimal::new(2, 0));
  let iqr_half = decimal_abs(p75.sub(p25)).div(Decimal::new(2, 0));
  let conf = if band_spread_half.gt(iqr_half) { band_spread_half } else { iqr_half };

  AggregateOutcome {
    price: p50,
    conf,
    status: AggStatus::Trading,
    num_quotes: numa,
  }
}

fn decimal_cmp(a: Decimal, b: Decimal) -> std::cmp::Ordering {
  if a.lt(b) {
    std::cmp::Ordering::Less
  } else if a.gt(b) {
    std::cmp::Ordering::Greater
  } else {
    std::cmp::Ordering::Equal
  }
}

/// Reads the `q`-th weighted percentile (`q` in `[0,1]`) off the cumulative
/// weight curve built from `order` (indices into `values`/`weights` sorted
/// ascending by `values`). Each point's weight mass is centered at the
/// midpoint of its cumulative span (`cumwgt[i] = running + weight[i]/2`)
/// the way the original `wgt_ptile` places it, then the target is linearly
/// interpolated between the two straddling midpoints.
pub(crate) fn weighted_percentile(order: &[usize], values: &[Decimal], weights: &[Decimal], q: Decimal) -> Decimal {
  let n = order.len();
  if n == 0 {
    return Decimal::zero();
  }
  let total = order.iter().fold(Decimal::zero(), |a, &i| a.add(weights[i]));
  if !total.gt(Decimal::zero()) {
    return values[order[n / 2]];
  }
  let half = Decimal::new(5, -1);
  let mut mids = Vec::with_capacity(n);
  let mut running = Decimal::zero();
  for &idx in order {
    let w = weights[idx];
    mids.push(running.add(w.mul(half)));
    running = running.add(w);
  }
  let target = q.mul(total);
  if !target.gt(mids[0]) {
    return values[order[0]];
  }
  if target.gt(mids[n - 1]) {
    return values[order[n - 1]];
  }
  for w in 1..n {
    if !target.gt(mids[w]) {
      let prev_idx = order[w - 1];
      let idx = order[w];
      let span = mids[w].sub(mids[w - 1]);
      let frac = if span.gt(Decimal::zero()) {
        target.sub(mids[w - 1]).div(span)
      } else {
        Decimal::zero()
      };
      return values[prev_idx].add(frac.mul(values[idx].sub(values[prev_idx])));
    }
  }
  values[order[n - 1]]
}

/// Same interpolation as [`weighted_percentile`], but every sample carries
/// equal weight. Used by `publish`'s latency-quartile tracking so the two
/// don't maintain separate percentile implementations.
pub fn unweighted_percentile(sorted_values: &[f64], q: f64) -> f64 {
  if sorted_values.is_empty() {
    return 0.0;
  }
  let values: Vec<Decimal> = sorted_values.iter().map(|&v| to_fixed(v)).collect();
  let weights = vec![Decimal::new(1, 0); values.len()];
  let order: Vec<usize> = (0..values.len()).collect();
  weighted_percentile(&order, &values, &weights, to_fixed(q)).to_f64()
}

const FIXED_EXPO: i32 = -9;

fn to_fixed(x: f64) -> Decimal {
  Decimal::new((x * 1e9).round() as i64, FIXED_EXPO)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn comp(price: f64, conf: f64, pub_slot: u64) -> Component {
    Component {
      price: to_fixed(price),
      conf: to_fixed(conf),
      status: ComponentStatus::Trading,
      pub_slot,
    }
  }

  #[test]
  fn no_components_is_unknown() {
    let out = aggregate_price(&[], 10, 1);
    assert_eq!(out.status, AggStatus::Unknown);
    assert_eq!(out.num_quotes, 0);
  }

  #[test]
  fn stale_publisher_is_filtered_out() {
    let components = [comp(100.0, 1.0, 0)];
    let out = aggregate_price(&components, 100, 1);
    assert_eq!(out.status, AggStatus::Unknown);
  }

  #[test]
  fn single_quote_widens_confidence_five_fold() {
    let out = aggregate_price(&[comp(100.0, 10.0, 10)], 10, 1);
    assert_eq!(out.status, AggStatus::Trading);
    assert!((out.price.to_f64() - 100.0).abs() < 1e-6);
    assert!((out.conf.to_f64() - 50.0).abs() < 1e-6);
    assert_eq!(out.num_quotes, 1);
  }

  #[test]
  fn below_min_pub_is_unknown_even_with_valid_quotes() {
    let components = [comp(100.0, 1.0, 10), comp(101.0, 1.0, 10)];
    let out = aggregate_price(&components, 10, 3);
    assert_eq!(out.status, AggStatus::Unknown);
  }

  #[test]
  fn two_publishers_land_between_their_prices_closer_to_the_tighter_quote() {
    let components = [comp(100.0, 10.0, 10), comp(200.0, 20.0, 10)];
    let out = aggregate_price(&components, 10, 1);
    assert_eq!(out.status, AggStatus::Trading);
    // the tighter-confidence publisher pulls the aggregate toward it, so the
    // result sits below the plain midpoint of 150
    assert!(out.price.to_f64() > 100.0 && out.price.to_f64() < 150.0);
    assert!(out.conf.to_f64() > 0.0);
  }

  #[test]
  fn three_publishers_land_within_their_price_range() {
    let components = [comp(100.0, 10.0, 10), comp(200.0, 20.0, 10), comp(300.0, 30.0, 10)];
    let out = aggregate_price(&components, 10, 1);
    assert_eq!(out.status, AggStatus::Trading);
    assert!(out.price.to_f64() > 100.0 && out.price.to_f64() < 300.0);
  }

  #[test]
  fn four_publishers_land_within_their_price_range() {
    let components = [
      comp(100.0, 10.0, 10),
      comp(200.0, 20.0, 10),
      comp(300.0, 30.0, 10),
      comp(400.0, 40.0, 10),
    ];
    let out = aggregate_price(&components, 10, 1);
    assert_eq!(out.status, AggStatus::Trading);
    assert!(out.price.to_f64() > 100.0 && out.price.to_f64() < 400.0);
  }

  #[test]
  fn an_outlier_is_excluded_by_the_median_band() {
    let components = [comp(100.0, 1.0, 10), comp(101.0, 1.0, 10), comp(1000.0, 1.0, 10)];
    let out = aggregate_price(&components, 10, 1);
    assert_eq!(out.status, AggStatus::Trading);
    // 1000 sits well outside 5x the band around the other two, so the
    // aggregate stays close to the surviving pair instead of being dragged
    // toward a plain mean of roughly 400
    assert!(out.price.to_f64() < 150.0);
  }

  #[test]
  fn stale_components_are_excluded_even_when_others_are_fresh() {
    let components = [comp(100.0, 1.0, 10), comp(101.0, 1.0, 0)];
    let out = aggregate_price(&components, 100, 1);
    // only one component is within PC_MAX_SEND_LATENCY of slot 100
    assert_eq!(out.num_quotes, 1);
  }

  #[test]
  fn unweighted_percentile_matches_middle_of_an_even_sample() {
    let sorted = [10.0, 20.0, 30.0, 40.0];
    let p50 = unweighted_percentile(&sorted, 0.5);
    assert!((p50 - 25.0).abs() < 1e-6);
  }

  #[test]
  fn unweighted_percentile_of_a_single_sample_is_itself() {
    assert!((unweighted_percentile(&[42.0], 0.5) - 42.0).abs() < 1e-6);
  }
}
