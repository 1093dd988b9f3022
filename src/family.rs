use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{Error, Result};
use crate::model::{Bucket, Metric, MetricFamily, MetricKind, MetricValue, Quantile};

/// Timestamp applied to generated metric instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Leave instances unstamped.
    Unset,
    /// Stamp each instance with the wall clock at build time.
    Now,
    /// Stamp each instance with a fixed millisecond UTC offset.
    At(i64),
}

impl Default for Timestamp {
    fn default() -> Timestamp {
        Timestamp::Unset
    }
}

impl Timestamp {
    fn resolve(self) -> Option<i64> {
        match self {
            Timestamp::Unset => None,
            Timestamp::Now => Some(now_ms()),
            Timestamp::At(ms) => Some(ms),
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Options shared by every instance generated in one builder call.
#[derive(Debug, Clone)]
pub struct FamilyOpts {
    /// Timestamp policy for generated instances.
    pub timestamp: Timestamp,
    /// Labels merged into every generated instance.
    pub const_labels: Vec<(String, String)>,
    /// Emit unified labels sorted by name.
    pub ordered: bool,
}

impl Default for FamilyOpts {
    fn default() -> FamilyOpts {
        FamilyOpts {
            timestamp: Timestamp::Unset,
            const_labels: Vec::new(),
            ordered: true,
        }
    }
}

impl FamilyOpts {
    /// Create options with the defaults: unstamped, no const labels,
    /// name-sorted labels.
    pub fn new() -> FamilyOpts {
        FamilyOpts::default()
    }

    /// Set the timestamp policy.
    pub fn timestamp(mut self, timestamp: Timestamp) -> FamilyOpts {
        self.timestamp = timestamp;
        self
    }

    /// Add a label applied to every generated instance.
    pub fn const_label<S1, S2>(mut self, name: S1, value: S2) -> FamilyOpts
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.const_labels.push((name.into(), value.into()));
        self
    }

    /// Choose between name-sorted (`true`, the default) and
    /// insertion-ordered label emission.
    pub fn ordered(mut self, ordered: bool) -> FamilyOpts {
        self.ordered = ordered;
        self
    }
}

/// Merge instance labels over const labels.
///
/// An instance label replaces a same-named const label in place, so the
/// merge never produces duplicate names. With `ordered` the unified
/// sequence is sorted by label name; otherwise const labels keep their
/// positions and new instance labels follow.
fn unify_labels(labels: &[(&str, &str)], opts: &FamilyOpts) -> Vec<(String, String)> {
    let mut unified: Vec<(String, String)> = opts.const_labels.clone();
    for &(name, value) in labels {
        match unified.iter_mut().find(|pair| pair.0 == name) {
            Some(pair) => pair.1 = value.to_owned(),
            None => unified.push((name.to_owned(), value.to_owned())),
        }
    }
    if opts.ordered {
        unified.sort_by(|a, b| a.0.cmp(&b.0));
    }
    unified
}

/// Build a counter instance from raw labels and a value.
pub fn counter_metric(labels: &[(&str, &str)], value: f64, opts: &FamilyOpts) -> Metric {
    Metric::new(
        unify_labels(labels, opts),
        opts.timestamp.resolve(),
        MetricValue::Counter { value },
    )
}

/// Build a gauge instance from raw labels and a value.
pub fn gauge_metric(labels: &[(&str, &str)], value: f64, opts: &FamilyOpts) -> Metric {
    Metric::new(
        unify_labels(labels, opts),
        opts.timestamp.resolve(),
        MetricValue::Gauge { value },
    )
}

/// Build a summary instance from raw labels, the aggregate count and sum,
/// and `(quantile, value)` pairs.
pub fn summary_metric(
    labels: &[(&str, &str)],
    sample_count: u64,
    sample_sum: f64,
    quantiles: &[(f64, f64)],
    opts: &FamilyOpts,
) -> Metric {
    Metric::new(
        unify_labels(labels, opts),
        opts.timestamp.resolve(),
        MetricValue::Summary {
            sample_count,
            sample_sum,
            quantiles: quantiles
                .iter()
                .map(|&(quantile, value)| Quantile { quantile, value })
                .collect(),
        },
    )
}

/// Build a histogram instance from raw labels, the aggregate count and
/// sum, and `(upper_bound, cumulative_count)` pairs.
///
/// The conventional overflow bucket carries `f64::INFINITY` as its bound.
pub fn histogram_metric(
    labels: &[(&str, &str)],
    sample_count: u64,
    sample_sum: f64,
    buckets: &[(f64, u64)],
    opts: &FamilyOpts,
) -> Metric {
    Metric::new(
        unify_labels(labels, opts),
        opts.timestamp.resolve(),
        MetricValue::Histogram {
            sample_count,
            sample_sum,
            buckets: buckets
                .iter()
                .map(|&(upper_bound, cumulative_count)| Bucket {
                    upper_bound,
                    cumulative_count,
                })
                .collect(),
        },
    )
}

/// One raw summary observation: labels plus pre-aggregated fields.
#[derive(Debug, Clone, Copy)]
pub struct SummarySample<'a> {
    /// Instance-specific labels.
    pub labels: &'a [(&'a str, &'a str)],
    /// Number of observations; required for family assembly.
    pub count: Option<u64>,
    /// Sum of observations; required for family assembly.
    pub sum: Option<f64>,
    /// `(quantile, value)` pairs in emission order.
    pub quantiles: &'a [(f64, f64)],
}

/// One raw histogram observation: labels plus pre-aggregated fields.
#[derive(Debug, Clone, Copy)]
pub struct HistogramSample<'a> {
    /// Instance-specific labels.
    pub labels: &'a [(&'a str, &'a str)],
    /// Number of observations; required for family assembly.
    pub count: Option<u64>,
    /// Sum of observations; required for family assembly.
    pub sum: Option<f64>,
    /// `(upper_bound, cumulative_count)` pairs in emission order.
    pub buckets: &'a [(f64, u64)],
}

/// Build a counter family from raw `(labels, value)` samples.
///
/// An empty `samples` slice declares the family without instances.
pub fn create_counter(
    name: &str,
    help: &str,
    samples: &[(&[(&str, &str)], f64)],
    opts: &FamilyOpts,
) -> Result<MetricFamily> {
    let metrics = samples
        .iter()
        .map(|&(labels, value)| counter_metric(labels, value, opts))
        .collect();
    MetricFamily::new(name, help, MetricKind::Counter, metrics)
}

/// Build a gauge family from raw `(labels, value)` samples.
///
/// An empty `samples` slice declares the family without instances.
pub fn create_gauge(
    name: &str,
    help: &str,
    samples: &[(&[(&str, &str)], f64)],
    opts: &FamilyOpts,
) -> Result<MetricFamily> {
    let metrics = samples
        .iter()
        .map(|&(labels, value)| gauge_metric(labels, value, opts))
        .collect();
    MetricFamily::new(name, help, MetricKind::Gauge, metrics)
}

/// Build a summary family from raw samples.
///
/// Every sample must carry its `count` and `sum` aggregate fields.
pub fn create_summary(
    name: &str,
    help: &str,
    samples: &[SummarySample<'_>],
    opts: &FamilyOpts,
) -> Result<MetricFamily> {
    let mut metrics = Vec::with_capacity(samples.len());
    for sample in samples {
        let count = sample.count.ok_or(Error::MissingAggregateField("count"))?;
        let sum = sample.sum.ok_or(Error::MissingAggregateField("sum"))?;
        metrics.push(summary_metric(
            sample.labels,
            count,
            sum,
            sample.quantiles,
            opts,
        ));
    }
    MetricFamily::new(name, help, MetricKind::Summary, metrics)
}

/// Build a histogram family from raw samples.
///
/// Every sample must carry its `count` and `sum` aggregate fields.
pub fn create_histogram(
    name: &str,
    help: &str,
    samples: &[HistogramSample<'_>],
    opts: &FamilyOpts,
) -> Result<MetricFamily> {
    let mut metrics = Vec::with_capacity(samples.len());
    for sample in samples {
        let count = sample.count.ok_or(Error::MissingAggregateField("count"))?;
        let sum = sample.sum.ok_or(Error::MissingAggregateField("sum"))?;
        metrics.push(histogram_metric(
            sample.labels,
            count,
            sum,
            sample.buckets,
            opts,
        ));
    }
    MetricFamily::new(name, help, MetricKind::Histogram, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|&(name, value)| (name.to_owned(), value.to_owned()))
            .collect()
    }

    #[test]
    fn instance_label_wins_over_const_label() {
        let opts = FamilyOpts::new().const_label("a", "2").const_label("b", "3");
        let unified = unify_labels(&[("a", "1")], &opts);
        assert_eq!(unified, owned(&[("a", "1"), ("b", "3")]));
    }

    #[test]
    fn ordered_labels_sort_by_name() {
        let opts = FamilyOpts::new().const_label("zz", "1");
        let unified = unify_labels(&[("mm", "2"), ("aa", "3")], &opts);
        assert_eq!(unified, owned(&[("aa", "3"), ("mm", "2"), ("zz", "1")]));
    }

    #[test]
    fn unordered_labels_keep_insertion_order() {
        let opts = FamilyOpts::new().const_label("zz", "1").ordered(false);
        let unified = unify_labels(&[("mm", "2"), ("aa", "3")], &opts);
        assert_eq!(unified, owned(&[("zz", "1"), ("mm", "2"), ("aa", "3")]));
    }

    #[test]
    fn default_build_is_unstamped() {
        let metric = counter_metric(&[("host", "a")], 1.0, &FamilyOpts::new());
        assert_eq!(metric.timestamp_ms(), None);
    }

    #[test]
    fn wall_clock_stamp_is_nonzero() {
        let opts = FamilyOpts::new().timestamp(Timestamp::Now);
        let metric = counter_metric(&[], 1.0, &opts);
        assert!(metric.timestamp_ms().unwrap() > 0);
    }

    #[test]
    fn fixed_stamp_is_reproducible() {
        let opts = FamilyOpts::new().timestamp(Timestamp::At(1_600_000_000_000));
        let first = gauge_metric(&[("host", "a")], 5.0, &opts);
        let second = gauge_metric(&[("host", "a")], 5.0, &opts);
        assert_eq!(first, second);
        assert_eq!(first.timestamp_ms(), Some(1_600_000_000_000));
    }

    #[test]
    fn declared_but_empty_family() {
        let family = create_counter("x", "help", &[], &FamilyOpts::new()).unwrap();
        assert_eq!(family.name(), "x");
        assert_eq!(family.help(), "help");
        assert_eq!(family.kind(), MetricKind::Counter);
        assert!(family.metrics().is_empty());
    }

    #[test]
    fn summary_requires_count_and_sum() {
        let sample = SummarySample {
            labels: &[("host", "a")],
            count: None,
            sum: Some(25.2),
            quantiles: &[(0.5, 4.0)],
        };
        let err = create_summary("s", "h", &[sample], &FamilyOpts::new()).unwrap_err();
        assert!(matches!(err, Error::MissingAggregateField("count")));

        let sample = SummarySample {
            labels: &[("host", "a")],
            count: Some(4),
            sum: None,
            quantiles: &[(0.5, 4.0)],
        };
        let err = create_summary("s", "h", &[sample], &FamilyOpts::new()).unwrap_err();
        assert!(matches!(err, Error::MissingAggregateField("sum")));
    }

    #[test]
    fn histogram_requires_count_and_sum() {
        let sample = HistogramSample {
            labels: &[],
            count: None,
            sum: None,
            buckets: &[(5.0, 3)],
        };
        let err = create_histogram("h", "h", &[sample], &FamilyOpts::new()).unwrap_err();
        assert!(matches!(err, Error::MissingAggregateField("count")));
    }

    #[test]
    fn histogram_keeps_overflow_bucket() {
        let sample = HistogramSample {
            labels: &[("host", "examplehost")],
            count: Some(6),
            sum: Some(46.0),
            buckets: &[(5.0, 3), (10.0, 2), (15.0, 1), (f64::INFINITY, 0)],
        };
        let family = create_histogram(
            "request_latency_seconds",
            "Request latency in seconds.",
            &[sample],
            &FamilyOpts::new(),
        )
        .unwrap();
        match family.metrics()[0].value() {
            MetricValue::Histogram {
                sample_count,
                sample_sum,
                buckets,
            } => {
                assert_eq!(*sample_count, 6);
                assert_eq!(*sample_sum, 46.0);
                assert_eq!(buckets.len(), 4);
                let overflow = &buckets[3];
                assert!(overflow.upper_bound.is_infinite());
                assert!(overflow.upper_bound.is_sign_positive());
                assert_eq!(overflow.cumulative_count, 0);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn summary_keeps_quantiles_in_order() {
        let sample = SummarySample {
            labels: &[("route", "/")],
            count: Some(4),
            sum: Some(25.2),
            quantiles: &[(0.5, 4.0), (0.9, 5.2), (0.99, 5.2)],
        };
        let family = create_summary(
            "request_payload_size_bytes",
            "Request payload size in bytes.",
            &[sample],
            &FamilyOpts::new(),
        )
        .unwrap();
        match family.metrics()[0].value() {
            MetricValue::Summary { quantiles, .. } => {
                let fractions: Vec<f64> = quantiles.iter().map(|q| q.quantile).collect();
                assert_eq!(fractions, vec![0.5, 0.9, 0.99]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
