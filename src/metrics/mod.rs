// Windowed-aggregation and anomaly-scoring engine.
//
// Pure, synchronous state machines: the per-area worker in `detector` owns
// the timer cadence and calls into these on readings and window ticks.

mod area;
mod consistency;
mod household;

pub use area::{AreaAggregator, AreaWindow};
pub use consistency::check_consistency;
pub use household::{DeviceAnomaly, HouseholdAggregator};
