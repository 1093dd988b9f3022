/*!
Assembly and wire framing for [Prometheus](https://prometheus.io/)
protobuf exposition metrics.

Callers supply already-computed label/value data; this crate shapes it
into typed [`MetricFamily`] records and converts sequences of families
to and from the delimited protobuf exposition format (a varint
byte-length prefix before each encoded family). It performs no metric
collection or aggregation of its own.

```
# fn main() -> promwire::Result<()> {
use promwire::{create_counter, decode, encode, FamilyOpts};

let opts = FamilyOpts::new().const_label("type", "counter");
let family = create_counter(
    "counter_test",
    "A counter.",
    &[(&[("c_sample", "1"), ("c_subsample", "b")], 400.0)],
    &opts,
)?;

let payload = encode(&[family.clone()]);
assert_eq!(decode(&payload)?, vec![family]);
# Ok(())
# }
```
*/

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

/// Protocol buffers wire model of metrics.
#[allow(warnings)]
#[allow(missing_docs, missing_debug_implementations)]
#[rustfmt::skip]
pub mod proto;

mod encoder;
mod errors;
mod family;
mod model;

pub use self::encoder::{decode, encode, encode_into, PROTOBUF_FORMAT};
pub use self::errors::{Error, Result};
pub use self::family::{
    counter_metric, create_counter, create_gauge, create_histogram, create_summary, gauge_metric,
    histogram_metric, summary_metric, FamilyOpts, HistogramSample, SummarySample, Timestamp,
};
pub use self::model::{Bucket, Metric, MetricFamily, MetricKind, MetricValue, Quantile};
