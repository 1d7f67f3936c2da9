pub mod aggregate;
pub mod decimal;
pub mod ema;

pub use aggregate::{
  aggregate_price, unweighted_percentile, AggStatus, AggregateOutcome, Component, ComponentStatus, DECAY_TABLE,
  PC_MAX_SEND_LATENCY,
};
pub use decimal::{Decimal, FACT, PC_FACTOR_SIZE, PD_SCALE9};
pub use ema::{update_ema, EmaState, PD_EMA_DECAY, PD_EMA_EXPO, PD_EMA_MAX_DIFF};
