use std::convert::TryFrom;

use crate::errors::{Error, Result};
use crate::proto;

/// The four metric kinds understood by the builder and the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// A value that only ever goes up.
    Counter,
    /// A point-in-time value that can go up and down.
    Gauge,
    /// Pre-computed quantiles over an observed distribution.
    Summary,
    /// Pre-computed cumulative buckets over an observed distribution.
    Histogram,
}

impl MetricKind {
    pub(crate) fn to_proto(self) -> proto::MetricType {
        match self {
            MetricKind::Counter => proto::MetricType::Counter,
            MetricKind::Gauge => proto::MetricType::Gauge,
            MetricKind::Summary => proto::MetricType::Summary,
            MetricKind::Histogram => proto::MetricType::Histogram,
        }
    }
}

impl TryFrom<i32> for MetricKind {
    type Error = Error;

    fn try_from(value: i32) -> Result<MetricKind> {
        match proto::MetricType::from_i32(value) {
            Some(proto::MetricType::Counter) => Ok(MetricKind::Counter),
            Some(proto::MetricType::Gauge) => Ok(MetricKind::Gauge),
            Some(proto::MetricType::Summary) => Ok(MetricKind::Summary),
            Some(proto::MetricType::Histogram) => Ok(MetricKind::Histogram),
            _ => Err(Error::InvalidMetricType(value)),
        }
    }
}

/// One quantile of a summary: the observed value at a fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    /// Fraction of observations, in the `0.0..=1.0` range.
    pub quantile: f64,
    /// Observed value at that fraction.
    pub value: f64,
}

/// One cumulative histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Inclusive upper bound; `f64::INFINITY` marks the overflow bucket.
    pub upper_bound: f64,
    /// Number of observations at or below the bound.
    pub cumulative_count: u64,
}

/// The payload of one metric instance, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Counter sample.
    Counter {
        /// Counter value.
        value: f64,
    },
    /// Gauge sample.
    Gauge {
        /// Gauge value.
        value: f64,
    },
    /// Summary sample.
    Summary {
        /// Number of observations.
        sample_count: u64,
        /// Sum of observations.
        sample_sum: f64,
        /// Quantiles in emission order.
        quantiles: Vec<Quantile>,
    },
    /// Histogram sample.
    Histogram {
        /// Number of observations.
        sample_count: u64,
        /// Sum of observations.
        sample_sum: f64,
        /// Cumulative buckets in emission order.
        buckets: Vec<Bucket>,
    },
}

impl MetricValue {
    /// The kind of this payload.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter { .. } => MetricKind::Counter,
            MetricValue::Gauge { .. } => MetricKind::Gauge,
            MetricValue::Summary { .. } => MetricKind::Summary,
            MetricValue::Histogram { .. } => MetricKind::Histogram,
        }
    }

    fn zero(kind: MetricKind) -> MetricValue {
        match kind {
            MetricKind::Counter => MetricValue::Counter { value: 0.0 },
            MetricKind::Gauge => MetricValue::Gauge { value: 0.0 },
            MetricKind::Summary => MetricValue::Summary {
                sample_count: 0,
                sample_sum: 0.0,
                quantiles: Vec::new(),
            },
            MetricKind::Histogram => MetricValue::Histogram {
                sample_count: 0,
                sample_sum: 0.0,
                buckets: Vec::new(),
            },
        }
    }
}

/// One concrete observation of a family, distinguished by its label set.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    labels: Vec<(String, String)>,
    timestamp_ms: Option<i64>,
    value: MetricValue,
}

impl Metric {
    /// Create an instance from an already-unified label sequence.
    pub fn new(
        labels: Vec<(String, String)>,
        timestamp_ms: Option<i64>,
        value: MetricValue,
    ) -> Metric {
        Metric {
            labels,
            timestamp_ms,
            value,
        }
    }

    /// Unified labels, in emission order.
    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Millisecond UTC timestamp, if the instance is stamped.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.timestamp_ms
    }

    /// Payload of the instance.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    fn to_proto(&self) -> proto::Metric {
        let mut pb = proto::Metric {
            label: self
                .labels
                .iter()
                .map(|(name, value)| proto::LabelPair {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            timestamp_ms: self.timestamp_ms.unwrap_or(0),
            ..Default::default()
        };
        match &self.value {
            MetricValue::Counter { value } => {
                pb.counter = Some(proto::Counter { value: *value });
            }
            MetricValue::Gauge { value } => {
                pb.gauge = Some(proto::Gauge { value: *value });
            }
            MetricValue::Summary {
                sample_count,
                sample_sum,
                quantiles,
            } => {
                pb.summary = Some(proto::Summary {
                    sample_count: *sample_count,
                    sample_sum: *sample_sum,
                    quantile: quantiles
                        .iter()
                        .map(|q| proto::Quantile {
                            quantile: q.quantile,
                            value: q.value,
                        })
                        .collect(),
                });
            }
            MetricValue::Histogram {
                sample_count,
                sample_sum,
                buckets,
            } => {
                pb.histogram = Some(proto::Histogram {
                    sample_count: *sample_count,
                    sample_sum: *sample_sum,
                    bucket: buckets
                        .iter()
                        .map(|b| proto::Bucket {
                            cumulative_count: b.cumulative_count,
                            upper_bound: b.upper_bound,
                        })
                        .collect(),
                });
            }
        }
        pb
    }

    /// A wire instance carries the payload field of its family's declared
    /// kind; an absent payload decodes as that kind's zero value.
    fn from_proto(kind: MetricKind, pb: proto::Metric) -> Metric {
        let labels = pb
            .label
            .into_iter()
            .map(|pair| (pair.name, pair.value))
            .collect();
        let timestamp_ms = match pb.timestamp_ms {
            0 => None,
            ms => Some(ms),
        };
        let value = match kind {
            MetricKind::Counter => pb
                .counter
                .map(|c| MetricValue::Counter { value: c.value })
                .unwrap_or_else(|| MetricValue::zero(kind)),
            MetricKind::Gauge => pb
                .gauge
                .map(|g| MetricValue::Gauge { value: g.value })
                .unwrap_or_else(|| MetricValue::zero(kind)),
            MetricKind::Summary => pb
                .summary
                .map(|s| MetricValue::Summary {
                    sample_count: s.sample_count,
                    sample_sum: s.sample_sum,
                    quantiles: s
                        .quantile
                        .into_iter()
                        .map(|q| Quantile {
                            quantile: q.quantile,
                            value: q.value,
                        })
                        .collect(),
                })
                .unwrap_or_else(|| MetricValue::zero(kind)),
            MetricKind::Histogram => pb
                .histogram
                .map(|h| MetricValue::Histogram {
                    sample_count: h.sample_count,
                    sample_sum: h.sample_sum,
                    buckets: h
                        .bucket
                        .into_iter()
                        .map(|b| Bucket {
                            upper_bound: b.upper_bound,
                            cumulative_count: b.cumulative_count,
                        })
                        .collect(),
                })
                .unwrap_or_else(|| MetricValue::zero(kind)),
        };
        Metric {
            labels,
            timestamp_ms,
            value,
        }
    }
}

/// A named, typed collection of metric instances sharing one name and
/// help string.
///
/// Families are immutable once assembled; every instance payload is
/// guaranteed to match the declared kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    name: String,
    help: String,
    kind: MetricKind,
    metrics: Vec<Metric>,
}

impl MetricFamily {
    /// Assemble a family from already-built instances.
    ///
    /// An empty `metrics` vector declares the family without instances.
    pub fn new<S1, S2>(
        name: S1,
        help: S2,
        kind: MetricKind,
        metrics: Vec<Metric>,
    ) -> Result<MetricFamily>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let name = name.into();
        for metric in &metrics {
            let found = metric.value().kind();
            if found != kind {
                return Err(Error::TypeMismatch {
                    family: name,
                    expected: kind,
                    found,
                });
            }
        }
        Ok(MetricFamily {
            name,
            help: help.into(),
            kind,
            metrics,
        })
    }

    /// Family name, e.g. `http_requests_total`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Declared kind, shared by every instance.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Instances in insertion order.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Convert to the wire message shape.
    pub fn to_proto(&self) -> proto::MetricFamily {
        proto::MetricFamily {
            name: self.name.clone(),
            help: self.help.clone(),
            r#type: self.kind.to_proto() as i32,
            metric: self.metrics.iter().map(Metric::to_proto).collect(),
        }
    }

    /// Rebuild a family from its wire message shape.
    pub fn from_proto(pb: proto::MetricFamily) -> Result<MetricFamily> {
        let kind = MetricKind::try_from(pb.r#type)?;
        Ok(MetricFamily {
            name: pb.name,
            help: pb.help,
            kind,
            metrics: pb
                .metric
                .into_iter()
                .map(|m| Metric::from_proto(kind, m))
                .collect(),
        })
    }
}
