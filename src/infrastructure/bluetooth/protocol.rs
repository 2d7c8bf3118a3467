//! Casambi Advertisement Protocol
//!
//! Identifiers and the vendor-specific frame layout used by Casambi nodes in
//! their BLE advertisements.

use crate::domain::models::{DecodedPayload, LongFrame, ShortFrame, UnitId};
use tracing::trace;
use uuid::Uuid;

/// Bluetooth SIG company identifier assigned to Casambi (963)
pub const CASAMBI_COMPANY_ID: u16 = 0x03C3;

/// Service UUID advertised by virtual aliases of a configured network
pub const CONFIGURED_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fe4d_0000_1000_8000_00805f9b34fb);

/// Service UUID registered for the Casambi client library
pub const LIBRARY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000febb_0000_1000_8000_00805f9b34fb);

/// Frames at or below this length use the short (virtual alias) form
pub const SHORT_FRAME_MAX_LEN: usize = 8;

/// Unit id plus status byte
pub const SHORT_FRAME_MIN_LEN: usize = 7;

/// Unit id, flags, status, reference header and reference field
pub const LONG_FRAME_MIN_LEN: usize = 18;

/// Long frame layout
///
/// ```text
/// [0-5]   : Persistent unit identifier
/// [6-8]   : Protocol / flag bytes (opaque)
/// [9]     : Status / sequence byte
/// [10-11] : Reference header (opaque)
/// [12-17] : Reference field, all-zero or another node's transport address
/// [18..]  : Trailer (opaque)
/// ```
pub mod layout {
    use std::ops::Range;

    pub const UNIT_ID: Range<usize> = 0..6;
    pub const FLAGS: Range<usize> = 6..9;
    pub const STATUS: usize = 9;
    pub const REFERENCE_HEADER: Range<usize> = 10..12;
    pub const REFERENCE: Range<usize> = 12..18;
    pub const TRAILER_START: usize = 18;

    /// Short frames carry the status right after the identifier
    pub const SHORT_STATUS: usize = 6;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {len} bytes fits neither the short (7-8) nor the long (>= 18) frame")]
    MalformedPayload { len: usize },
}

fn six(bytes: &[u8]) -> [u8; 6] {
    let mut out = [0u8; 6];
    out.copy_from_slice(&bytes[..6]);
    out
}

/// Parse the raw Casambi vendor payload (company id already stripped)
pub fn decode_payload(bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
    let len = bytes.len();
    trace!("Decoding vendor payload: {:02x?}", bytes);

    if len <= SHORT_FRAME_MAX_LEN {
        if len < SHORT_FRAME_MIN_LEN {
            return Err(DecodeError::MalformedPayload { len });
        }
        return Ok(DecodedPayload::Short(ShortFrame {
            unit_id: UnitId(six(&bytes[layout::UNIT_ID])),
            status: bytes[layout::SHORT_STATUS],
            trailer: bytes[layout::SHORT_STATUS + 1..].to_vec(),
        }));
    }

    if len < LONG_FRAME_MIN_LEN {
        return Err(DecodeError::MalformedPayload { len });
    }

    let mut flags = [0u8; 3];
    flags.copy_from_slice(&bytes[layout::FLAGS]);
    let mut reference_header = [0u8; 2];
    reference_header.copy_from_slice(&bytes[layout::REFERENCE_HEADER]);

    Ok(DecodedPayload::Long(LongFrame {
        unit_id: UnitId(six(&bytes[layout::UNIT_ID])),
        flags,
        status: bytes[layout::STATUS],
        reference_header,
        reference: six(&bytes[layout::REFERENCE]),
        trailer: bytes[layout::TRAILER_START..].to_vec(),
    }))
}

/// Re-assemble the wire bytes of a decoded payload
pub fn encode_payload(payload: &DecodedPayload) -> Vec<u8> {
    match payload {
        DecodedPayload::Long(frame) => {
            let mut buf = Vec::with_capacity(LONG_FRAME_MIN_LEN + frame.trailer.len());
            buf.extend_from_slice(&frame.unit_id.0);
            buf.extend_from_slice(&frame.flags);
            buf.push(frame.status);
            buf.extend_from_slice(&frame.reference_header);
            buf.extend_from_slice(&frame.reference);
            buf.extend_from_slice(&frame.trailer);
            buf
        }
        DecodedPayload::Short(frame) => {
            let mut buf = Vec::with_capacity(SHORT_FRAME_MIN_LEN + frame.trailer.len());
            buf.extend_from_slice(&frame.unit_id.0);
            buf.push(frame.status);
            buf.extend_from_slice(&frame.trailer);
            buf
        }
    }
}

/// Parse a hex string (whitespace and `:` separators allowed) into bytes
pub fn parse_hex(input: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    data_encoding::HEXLOWER_PERMISSIVE.decode(compact.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FrameForm, TransportAddress};

    const UNCONFIGURED: &str = "184b109da3052328f22c2800000000000000004b0000f0";
    const CONFIGURED: &str = "184b109da3052328f22c280036b69daf62ae094b0000f0";
    const ALIAS: &str = "36b69daf62ae0b";

    #[test]
    fn test_decode_unconfigured_frame() {
        let payload = decode_payload(&parse_hex(UNCONFIGURED).unwrap()).unwrap();
        assert_eq!(payload.form(), FrameForm::Long);
        assert_eq!(payload.unit_id().to_string(), "184b109da305");
        assert_eq!(payload.status(), 0x2c);
        assert_eq!(payload.reference(), None);
    }

    #[test]
    fn test_decode_configured_frame() {
        let payload = decode_payload(&parse_hex(CONFIGURED).unwrap()).unwrap();
        let expected: TransportAddress = "36:b6:9d:af:62:ae".parse().unwrap();
        assert_eq!(payload.unit_id().to_string(), "184b109da305");
        assert_eq!(payload.reference(), Some(expected));
        match payload {
            DecodedPayload::Long(frame) => {
                assert_eq!(frame.flags, [0x23, 0x28, 0xf2]);
                assert_eq!(frame.reference_header, [0x28, 0x00]);
                assert_eq!(frame.trailer, vec![0x09, 0x4b, 0x00, 0x00, 0xf0]);
            }
            DecodedPayload::Short(_) => panic!("expected long frame"),
        }
    }

    #[test]
    fn test_decode_short_frame() {
        let payload = decode_payload(&parse_hex(ALIAS).unwrap()).unwrap();
        assert_eq!(payload.form(), FrameForm::Short);
        assert_eq!(payload.unit_id().to_string(), "36b69daf62ae");
        assert_eq!(payload.status(), 0x0b);
        assert_eq!(payload.reference(), None);
    }

    #[test]
    fn test_eight_byte_frame_is_short_form() {
        let payload = decode_payload(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        match payload {
            DecodedPayload::Short(frame) => {
                assert_eq!(frame.status, 7);
                assert_eq!(frame.trailer, vec![8]);
            }
            DecodedPayload::Long(_) => panic!("expected short frame"),
        }
    }

    #[test]
    fn test_malformed_lengths() {
        for len in [0usize, 1, 6, 9, 12, 17] {
            let bytes = vec![0xAB; len];
            assert_eq!(
                decode_payload(&bytes),
                Err(DecodeError::MalformedPayload { len }),
                "length {len}"
            );
        }
        assert!(decode_payload(&[0xAB; 18]).is_ok());
    }

    #[test]
    fn test_encode_reproduces_wire_bytes() {
        for hex in [UNCONFIGURED, CONFIGURED, ALIAS, "0102030405060708090a0b0c0d0e0f101112"] {
            let bytes = parse_hex(hex).unwrap();
            let payload = decode_payload(&bytes).unwrap();
            assert_eq!(encode_payload(&payload), bytes, "{hex}");
        }
    }

    #[test]
    fn test_parse_hex_accepts_separators() {
        assert_eq!(parse_hex("36:B6 9d").unwrap(), vec![0x36, 0xb6, 0x9d]);
        assert!(parse_hex("3").is_err());
    }
}
