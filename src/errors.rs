use std::io;

use thiserror::Error;

use crate::model::MetricKind;

/// The error types for metric assembly and wire framing.
#[derive(Debug, Error)]
pub enum Error {
    /// A family declared one metric kind but was handed an instance of another.
    #[error("metric family {family:?} declares {expected:?} but holds a {found:?} instance")]
    TypeMismatch {
        /// Name of the offending family.
        family: String,
        /// Kind the family was declared with.
        expected: MetricKind,
        /// Kind of the rejected instance payload.
        found: MetricKind,
    },
    /// A metric type discriminant outside the four supported kinds.
    #[error("invalid metric type: {0}")]
    InvalidMetricType(i32),
    /// An aggregate sample was assembled without its count or sum.
    #[error("aggregate sample is missing its `{0}` field")]
    MissingAggregateField(&'static str),
    /// The byte stream was truncated or held an undecodable frame.
    #[error("malformed metric stream: {0}")]
    MalformedStream(String),
    /// An error writing encoded frames out.
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::MalformedStream(err.to_string())
    }
}

/// A specialized Result type for metric assembly and framing.
pub type Result<T> = std::result::Result<T, Error>;
