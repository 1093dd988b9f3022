use std::io::Write;

use log::trace;
use prost::encoding::decode_varint;
use prost::Message;

use crate::errors::{Error, Result};
use crate::model::MetricFamily;
use crate::proto;

/// The delimited protocol buffer format of metric families.
pub const PROTOBUF_FORMAT: &str = "application/vnd.google.protobuf; \
                                   proto=io.prometheus.client.MetricFamily; \
                                   encoding=delimited";

/// Encode families into a single delimited-protobuf buffer.
///
/// Each family is framed as a varint byte-length prefix followed by its
/// canonical protobuf encoding, in the order given. Zero families yield
/// an empty buffer.
pub fn encode(families: &[MetricFamily]) -> Vec<u8> {
    let mut buf = Vec::new();
    for family in families {
        buf.extend_from_slice(&family.to_proto().encode_length_delimited_to_vec());
    }
    trace!("encoded {} families into {} bytes", families.len(), buf.len());
    buf
}

/// Encode families into `writer`, one delimited frame per family.
pub fn encode_into<W: Write>(families: &[MetricFamily], writer: &mut W) -> Result<()> {
    for family in families {
        writer.write_all(&family.to_proto().encode_length_delimited_to_vec())?;
    }
    Ok(())
}

/// Decode a delimited-protobuf buffer back into families.
///
/// Frames are read until the buffer is exhausted; an empty buffer yields
/// an empty vector. Truncated or unparseable input fails without
/// returning any partially-decoded families.
pub fn decode(data: &[u8]) -> Result<Vec<MetricFamily>> {
    let mut buf = data;
    let mut families = Vec::new();
    while !buf.is_empty() {
        let len = decode_varint(&mut buf)?;
        if len > buf.len() as u64 {
            return Err(Error::MalformedStream(format!(
                "frame declares {} bytes, {} left in buffer",
                len,
                buf.len()
            )));
        }
        let (frame, rest) = buf.split_at(len as usize);
        let family = proto::MetricFamily::decode(frame)?;
        families.push(MetricFamily::from_proto(family)?);
        buf = rest;
    }
    trace!("decoded {} families from {} bytes", families.len(), data.len());
    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{create_counter, FamilyOpts};

    #[test]
    fn zero_families_encode_to_empty_buffer() {
        assert!(encode(&[]).is_empty());
    }

    #[test]
    fn empty_buffer_decodes_to_no_families() {
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn frame_is_length_prefixed() {
        let family = create_counter(
            "requests_total",
            "Requests.",
            &[(&[("code", "200")], 7.0)],
            &FamilyOpts::new(),
        )
        .unwrap();
        let buf = encode(&[family.clone()]);
        // Short frame, so the varint prefix is a single byte holding the
        // payload length.
        assert_eq!(buf[0] as usize, buf.len() - 1);
        assert_eq!(decode(&buf).unwrap(), vec![family]);
    }

    #[test]
    fn writer_and_buffer_encodings_agree() {
        let family = create_counter(
            "requests_total",
            "Requests.",
            &[(&[("code", "200")], 7.0)],
            &FamilyOpts::new(),
        )
        .unwrap();
        let mut written = Vec::new();
        encode_into(&[family.clone()], &mut written).unwrap();
        assert_eq!(written, encode(&[family]));
    }

    #[test]
    fn truncated_varint_is_rejected() {
        // A lone continuation byte never terminates a varint.
        let err = decode(&[0x80]).unwrap_err();
        assert!(matches!(err, Error::MalformedStream(_)));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let family = create_counter(
            "requests_total",
            "Requests.",
            &[(&[("code", "200")], 7.0)],
            &FamilyOpts::new(),
        )
        .unwrap();
        let buf = encode(&[family]);
        let err = decode(&buf[..buf.len() - 1]).unwrap_err();
        assert!(matches!(err, Error::MalformedStream(_)));
    }

    #[test]
    fn garbage_frame_is_rejected() {
        // Valid length prefix, payload that is not a MetricFamily message.
        let err = decode(&[0x03, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, Error::MalformedStream(_)));
    }

    #[test]
    fn unsupported_family_type_is_rejected() {
        let pb = proto::MetricFamily {
            name: "x".to_owned(),
            help: "y".to_owned(),
            r#type: proto::MetricType::Untyped as i32,
            metric: Vec::new(),
        };
        let buf = pb.encode_length_delimited_to_vec();
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, Error::InvalidMetricType(3)));
    }
}
