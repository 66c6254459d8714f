use dashmap::DashMap;
use dashmap::mapref::entry::Entry as DashEntry;
use edge_core_types::metrics::normalize_target_attribute;
use edge_core_types::{AggregationKey, EdgeError, EdgeResult, MetricDatum, MetricRecord, TargetDatum};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct EnvBucket {
    metrics_by_key: HashMap<AggregationKey, MetricDatum>,
    target_data: Vec<TargetDatum>,
}

/// Per-environment map keyed by aggregation key, with count summation and additive
/// size accounting: a key only charges `size` bytes the first time it is seen since
/// the last flush, no matter how many subsequent `add` calls touch it.
pub struct MetricsAggregator {
    buckets: DashMap<String, Mutex<EnvBucket>>,
    total_size: AtomicU64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            total_size: AtomicU64::new(0),
        }
    }

    /// Merges `record` into its environment's bucket. Duplicate aggregation keys,
    /// whether within this single record or across prior `add` calls, only sum
    /// counts; only a key's first-ever occurrence charges `record.size`.
    pub fn add(&self, record: &MetricRecord) {
        let bucket_ref = self
            .buckets
            .entry(record.environment_id.clone())
            .or_insert_with(|| Mutex::new(EnvBucket::default()));
        let mut bucket = bucket_ref.lock().unwrap();

        let mut new_keys: u64 = 0;
        for datum in &record.metrics_data {
            let key = AggregationKey::from_datum(&record.environment_id, datum);
            match bucket.metrics_by_key.entry(key) {
                Entry::Occupied(mut occupied) => {
                    occupied.get_mut().count += datum.count;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(datum.clone());
                    new_keys += 1;
                }
            }
        }
        bucket.target_data.extend(record.target_data.iter().cloned());

        // Target data has no aggregation key to dedup against, so a record that
        // carries only target data charges its size directly on every add instead
        // of once per distinct key.
        let charge = if new_keys > 0 {
            record.size * new_keys
        } else if !record.target_data.is_empty() {
            record.size
        } else {
            0
        };
        if charge > 0 {
            self.total_size.fetch_add(charge, Ordering::SeqCst);
        }
    }

    /// Total bytes charged across all environments since the last flush.
    pub fn size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    /// Deep-copies every environment's bucket into a plain map the caller can
    /// marshal without holding this aggregator's locks during serialization.
    pub fn get(&self) -> HashMap<String, MetricRecord> {
        self.buckets
            .iter()
            .map(|entry| {
                let env = entry.key().clone();
                let bucket = entry.value().lock().unwrap();
                let record = MetricRecord {
                    environment_id: env.clone(),
                    metrics_data: bucket.metrics_by_key.values().cloned().collect(),
                    target_data: bucket.target_data.clone(),
                    size: 0,
                };
                (env, record)
            })
            .collect()
    }

    /// Zeroes both the per-environment buckets and the size counter.
    pub fn flush(&self) {
        for entry in self.buckets.iter() {
            let mut bucket = entry.value().lock().unwrap();
            bucket.metrics_by_key.clear();
            bucket.target_data.clear();
        }
        self.total_size.store(0, Ordering::SeqCst);
    }

    /// Whether `environment_id` has ever been added to since the last flush.
    pub fn contains_environment(&self, environment_id: &str) -> bool {
        matches!(self.buckets.entry(environment_id.to_string()), DashEntry::Occupied(_))
    }

    /// Target-analytics variant: rewrites every `target` attribute on `record`'s
    /// metrics to the global sentinel, then groups by aggregation key within just
    /// this record (it does not touch the aggregator's own buckets).
    pub fn aggregate_target_analytics(record: &MetricRecord) -> EdgeResult<Vec<MetricDatum>> {
        if record.metrics_data.is_empty() {
            return Err(EdgeError::InvalidAggregationRecord(
                "record has no metricsData".into(),
            ));
        }

        let mut grouped: HashMap<AggregationKey, MetricDatum> = HashMap::new();
        for datum in &record.metrics_data {
            let mut datum = datum.clone();
            normalize_target_attribute(&mut datum.attributes);
            let key = AggregationKey::from_datum(&record.environment_id, &datum);
            match grouped.entry(key) {
                Entry::Occupied(mut occupied) => occupied.get_mut().count += datum.count,
                Entry::Vacant(vacant) => {
                    vacant.insert(datum);
                }
            }
        }
        Ok(grouped.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core_types::metrics::{ATTR_FEATURE_IDENTIFIER, ATTR_VARIATION_IDENTIFIER};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn datum(variation: &str) -> MetricDatum {
        MetricDatum {
            attributes: vec![
                (ATTR_FEATURE_IDENTIFIER.to_string(), "flag-one".to_string()),
                (ATTR_VARIATION_IDENTIFIER.to_string(), variation.to_string()),
            ],
            count: 1,
            metrics_type: "evaluation".to_string(),
            timestamp: 0,
        }
    }

    fn record(size: u64, data: Vec<MetricDatum>) -> MetricRecord {
        MetricRecord {
            environment_id: "123".to_string(),
            metrics_data: data,
            target_data: Vec::new(),
            size,
        }
    }

    #[test_case(
        vec![vec![datum("true")], vec![datum("true")]],
        12, 1, 2;
        "s1_duplicate_count_aggregation"
    )]
    #[test_case(
        vec![vec![datum("true")], vec![datum("false")]],
        24, 2, 1;
        "s2_distinct_variations"
    )]
    #[test_case(
        vec![vec![datum("true"), datum("true")]],
        12, 1, 2;
        "s3_duplicates_within_one_payload"
    )]
    fn aggregation_scenarios(
        payloads: Vec<Vec<MetricDatum>>,
        expected_size: u64,
        expected_entries: usize,
        expected_count_per_entry: u64,
    ) {
        let aggregator = MetricsAggregator::new();
        for data in payloads {
            aggregator.add(&record(12, data));
        }

        assert_eq!(aggregator.size(), expected_size);
        let snapshot = aggregator.get();
        let env = snapshot.get("123").unwrap();
        assert_eq!(env.metrics_data.len(), expected_entries);
        assert!(
            env.metrics_data
                .iter()
                .all(|d| d.count == expected_count_per_entry)
        );
    }

    #[test]
    fn flush_is_idempotent() {
        let aggregator = MetricsAggregator::new();
        aggregator.add(&record(12, vec![datum("true")]));
        aggregator.flush();
        aggregator.flush();

        assert_eq!(aggregator.size(), 0);
        assert!(aggregator.get().get("123").unwrap().metrics_data.is_empty());
    }

    #[test]
    fn target_analytics_normalizes_and_groups_without_touching_buckets() {
        let mut with_target = datum("true");
        with_target
            .attributes
            .push(("target".to_string(), "user-42".to_string()));
        let mut with_target_dup = with_target.clone();
        with_target_dup
            .attributes
            .iter_mut()
            .find(|(k, _)| k == "target")
            .unwrap()
            .1 = "user-99".to_string();

        let rec = record(12, vec![with_target, with_target_dup]);
        let grouped = MetricsAggregator::aggregate_target_analytics(&rec).unwrap();

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].count, 2);
        assert_eq!(
            edge_core_types::metrics::attribute(&grouped[0].attributes, "target"),
            Some(edge_core_types::metrics::GLOBAL_TARGET_SENTINEL)
        );

        let aggregator = MetricsAggregator::new();
        assert!(!aggregator.contains_environment("123"));
    }

    #[test]
    fn target_analytics_errors_on_empty_metrics_data() {
        let rec = record(12, vec![]);
        assert!(MetricsAggregator::aggregate_target_analytics(&rec).is_err());
    }
}
