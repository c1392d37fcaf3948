//! Bucketed window reads and writes over a [`CounterStore`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::StoreError;
use crate::schema::{AggregationClause, AggregationKind};

use super::runtime::AggregationRuntimeArgs;
use super::store::CounterStore;

/// Start of the hop-aligned bucket containing `time_ms`.
pub fn bucket_start(time_ms: i64, hop_ms: u64) -> i64 {
    let hop = hop_ms.max(1) as i64;
    time_ms.div_euclid(hop) * hop
}

/// Store key of one bucket:
/// `aggregation:COUNT:{id}:[:{group values joined by ','}]:{bucket}`.
pub fn bucket_key(clause: &AggregationClause, group_values: &[String], bucket: i64) -> String {
    let kind = match clause.aggregation {
        AggregationKind::Count => "COUNT",
    };
    let mut key = format!("aggregation:{kind}:{}:", clause.id);
    if !clause.group_by.is_empty() {
        key.push(':');
        key.push_str(&group_values.join(","));
    }
    key.push(':');
    key.push_str(&bucket.to_string());
    key
}

/// Reads and updates windowed aggregation values.
pub struct AggregationsService {
    store: Arc<dyn CounterStore>,
}

impl AggregationsService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Count one event in the bucket containing `args.event_time_ms`.
    pub async fn update_aggregation(
        &self,
        clause: &AggregationClause,
        args: &AggregationRuntimeArgs,
    ) -> Result<(), StoreError> {
        let bucket = bucket_start(args.event_time_ms, clause.window.hop_ms);
        let key = bucket_key(clause, &args.group_values, bucket);
        let ttl = Duration::from_millis(clause.window.size_ms.saturating_mul(6) / 5);
        let value = self.store.increment(&key, ttl).await?;
        debug!(aggregation_id = %clause.id, key = %key, value, "aggregation bucket incremented");
        Ok(())
    }

    /// Current value of the window ending at `args.event_time_ms`: the sum of
    /// buckets from `floor((t - size) / hop)` through `floor(t / hop)`, inclusive.
    pub async fn evaluate_aggregation(
        &self,
        clause: &AggregationClause,
        args: &AggregationRuntimeArgs,
    ) -> Result<u64, StoreError> {
        let hop = clause.window.hop_ms.max(1) as i64;
        let size = clause.window.size_ms as i64;
        let last = bucket_start(args.event_time_ms, clause.window.hop_ms);
        let first = bucket_start(args.event_time_ms - size, clause.window.hop_ms);

        let keys: Vec<String> = (0..)
            .map(|i| first + i * hop)
            .take_while(|bucket| *bucket <= last)
            .map(|bucket| bucket_key(clause, &args.group_values, bucket))
            .collect();

        let values = self.store.get_many(&keys).await?;
        Ok(values.into_iter().sum())
    }
}
