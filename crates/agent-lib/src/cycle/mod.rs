//! Per-device cycle aggregation
//!
//! Maintains the currently-open cycle's running statistics for each device
//! and detects cycle boundaries from changes in the stream's cycle id. The
//! id change is the only closure signal; cycles are never closed on elapsed
//! time or sample count.

mod accumulator;
mod aggregator;

pub use accumulator::CycleAccumulator;
pub use aggregator::{ClosedCycle, CycleAggregator, DEFAULT_MAX_DEVICES};
