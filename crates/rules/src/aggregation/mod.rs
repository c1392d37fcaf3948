//! Sliding-window aggregation counters.
//!
//! Windows are approximated with fixed buckets of `hop_ms` width. An event
//! increments the bucket containing its event time; a read sums every bucket
//! overlapping the trailing `size_ms` window. Buckets expire after
//! `size_ms * 1.2`, so counters disappear once no event in the window remains.

mod runtime;
mod service;
mod store;

pub use runtime::{runtime_args_for_item, AggregationRuntimeArgs};
pub use service::{bucket_key, bucket_start, AggregationsService};
pub use store::{CounterStore, InMemoryCounterStore};
