//! Aggregation over normalized change entries.

pub mod net_changes;
pub mod statistics;

pub use net_changes::{net_changes, NetChange};
pub use statistics::{compute, CountEntry, DayCount, Statistics};
