//! Frame encoding, decoding and multi unwrapping

use std::io::Read;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::GzDecoder;
use prost::Message;
use tracing::trace;

use crate::error::{Error, Result};
use crate::kind::MsgKind;
use crate::proto::header::{FrameHeader, Multi};

/// High bit of the kind word, set on every protobuf-encoded frame.
pub const PROTO_FLAG: u32 = 0x8000_0000;

/// Fixed prefix: kind word plus header length, both little-endian.
const PREFIX_LEN: usize = 8;

/// One decoded wire frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: MsgKind,
    pub header: FrameHeader,
    pub body: Bytes,
}

/// Encodes a frame: prefix, serialized header, body.
pub fn encode(kind: MsgKind, header: &FrameHeader, body: &[u8]) -> Bytes {
    let header_bytes = header.encode_to_vec();
    let mut out = BytesMut::with_capacity(PREFIX_LEN + header_bytes.len() + body.len());
    out.put_u32_le(kind.as_raw() | PROTO_FLAG);
    out.put_u32_le(header_bytes.len() as u32);
    out.put_slice(&header_bytes);
    out.put_slice(body);
    out.freeze()
}

/// Decodes a frame from raw transport bytes.
///
/// Frames shorter than the prefix and frames without the protobuf flag
/// are reported as errors the caller is expected to log and drop; they
/// never tear the connection down.
pub fn decode(raw: &[u8]) -> Result<Frame> {
    if raw.len() < PREFIX_LEN {
        return Err(Error::Truncated { len: raw.len() });
    }
    let mut prefix = &raw[..PREFIX_LEN];
    let tagged = prefix.get_u32_le();
    if tagged & PROTO_FLAG == 0 {
        return Err(Error::NotProtobuf { raw: tagged });
    }
    let kind = MsgKind::from_raw(tagged & !PROTO_FLAG);
    let header_len = prefix.get_u32_le() as usize;
    let body_start = PREFIX_LEN
        .checked_add(header_len)
        .ok_or(Error::Truncated { len: raw.len() })?;
    if raw.len() < body_start {
        return Err(Error::Truncated { len: raw.len() });
    }
    let header = FrameHeader::decode(&raw[PREFIX_LEN..body_start])?;
    trace!(%kind, body_len = raw.len() - body_start, "decoded frame");
    Ok(Frame {
        kind,
        header,
        body: Bytes::copy_from_slice(&raw[body_start..]),
    })
}

/// Unwraps a multi body into its nested frame buffers, in order.
///
/// A nonzero `size_unzipped` means the payload is gzip-compressed and
/// must inflate to exactly that many bytes.
pub fn unwrap_multi(body: &[u8]) -> Result<Vec<Bytes>> {
    let multi = Multi::decode(body)?;
    let packed = multi.message_body.unwrap_or_default();
    let payload = match multi.size_unzipped {
        Some(expected) if expected > 0 => {
            let mut inflated = Vec::with_capacity(expected as usize);
            GzDecoder::new(packed.as_slice()).read_to_end(&mut inflated)?;
            if inflated.len() != expected as usize {
                return Err(Error::SizeMismatch {
                    expected: expected as usize,
                    actual: inflated.len(),
                });
            }
            Bytes::from(inflated)
        }
        _ => Bytes::from(packed),
    };

    let mut rest = payload;
    let mut frames = Vec::new();
    while rest.remaining() >= 4 {
        let len = rest.get_u32_le() as usize;
        if rest.remaining() < len {
            return Err(Error::Truncated {
                len: rest.remaining(),
            });
        }
        frames.push(rest.copy_to_bytes(len));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn sample_header() -> FrameHeader {
        FrameHeader {
            steam_id: Some(76561198000000000),
            session_id: Some(7),
            source_job_id: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let header = sample_header();
        let raw = encode(MsgKind::ClientHello, &header, b"payload");
        let frame = decode(&raw).unwrap();
        assert_eq!(frame.kind, MsgKind::ClientHello);
        assert_eq!(frame.header, header);
        assert_eq!(frame.body.as_ref(), b"payload");
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let err = decode(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, Error::Truncated { len: 3 }));
    }

    #[test]
    fn test_decode_rejects_non_proto() {
        let mut raw = BytesMut::new();
        raw.put_u32_le(703);
        raw.put_u32_le(0);
        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, Error::NotProtobuf { raw: 703 }));
    }

    #[test]
    fn test_decode_rejects_header_overrun() {
        let mut raw = BytesMut::new();
        raw.put_u32_le(703 | PROTO_FLAG);
        raw.put_u32_le(100);
        raw.put_slice(&[0u8; 4]);
        assert!(matches!(
            decode(&raw).unwrap_err(),
            Error::Truncated { .. }
        ));
    }

    fn pack_entries(entries: &[Bytes]) -> Vec<u8> {
        let mut packed = Vec::new();
        for entry in entries {
            packed.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            packed.extend_from_slice(entry);
        }
        packed
    }

    #[test]
    fn test_unwrap_multi_preserves_order() {
        let first = encode(MsgKind::ClientHeartBeat, &FrameHeader::default(), b"a");
        let second = encode(MsgKind::ClientLogOff, &FrameHeader::default(), b"bb");
        let envelope = Multi {
            size_unzipped: None,
            message_body: Some(pack_entries(&[first.clone(), second.clone()])),
        };
        let frames = unwrap_multi(&envelope.encode_to_vec()).unwrap();
        assert_eq!(frames, vec![first, second]);
    }

    #[test]
    fn test_unwrap_multi_gzip() {
        let inner = encode(MsgKind::ClientHeartBeat, &FrameHeader::default(), b"x");
        let packed = pack_entries(std::slice::from_ref(&inner));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&packed).unwrap();
        let envelope = Multi {
            size_unzipped: Some(packed.len() as u32),
            message_body: Some(encoder.finish().unwrap()),
        };
        let frames = unwrap_multi(&envelope.encode_to_vec()).unwrap();
        assert_eq!(frames, vec![inner]);
    }

    #[test]
    fn test_unwrap_multi_size_mismatch() {
        let packed = pack_entries(&[Bytes::from_static(b"abcd")]);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&packed).unwrap();
        let envelope = Multi {
            size_unzipped: Some(packed.len() as u32 + 1),
            message_body: Some(encoder.finish().unwrap()),
        };
        assert!(matches!(
            unwrap_multi(&envelope.encode_to_vec()).unwrap_err(),
            Error::SizeMismatch { .. }
        ));
    }

    #[test]
    fn test_unwrap_multi_truncated_entry() {
        let mut packed = Vec::new();
        packed.extend_from_slice(&10u32.to_le_bytes());
        packed.extend_from_slice(b"abc");
        let envelope = Multi {
            size_unzipped: None,
            message_body: Some(packed),
        };
        assert!(matches!(
            unwrap_multi(&envelope.encode_to_vec()).unwrap_err(),
            Error::Truncated { .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            raw_kind in 1u32..0x7fff_ffff,
            steam_id in proptest::option::of(any::<u64>()),
            session_id in proptest::option::of(any::<i32>()),
            target_job_id in proptest::option::of(any::<u64>()),
            body in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let header = FrameHeader {
                steam_id,
                session_id,
                target_job_id,
                ..Default::default()
            };
            let kind = MsgKind::from_raw(raw_kind);
            let frame = decode(&encode(kind, &header, &body)).unwrap();
            prop_assert_eq!(frame.kind, kind);
            prop_assert_eq!(frame.header, header);
            prop_assert_eq!(frame.body.as_ref(), body.as_slice());
        }
    }
}
