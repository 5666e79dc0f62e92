//! BER length encoding and decoding.
//!
//! X.690 Section 8.1.3: short form is one byte with the high bit clear;
//! long form sets the high bit of the first byte, whose low 7 bits count
//! the big-endian length octets that follow. The indefinite form (0x80)
//! is forbidden in SNMP and rejected here.

use crate::error::{DecodeErrorKind, Error, Result};

/// Maximum message length this library accepts.
///
/// SNMP messages ride in single UDP datagrams, so 64 KiB bounds any valid
/// message. Longer claims are hostile or corrupt input.
pub const MAX_MESSAGE_LEN: usize = 65535;

/// Maximum number of long-form length octets accepted.
const MAX_LENGTH_OCTETS: usize = 4;

/// Encode a length value.
///
/// Returns the length bytes **in reverse order** (for the reverse-building
/// [`EncodeBuf`](super::EncodeBuf)) together with how many are valid.
/// Minimal form: short for values up to 127, shortest long form above.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        (buf, 1)
    } else if len <= 0xFF {
        buf[0] = len as u8;
        buf[1] = 0x81;
        (buf, 2)
    } else if len <= 0xFFFF {
        buf[0] = len as u8;
        buf[1] = (len >> 8) as u8;
        buf[2] = 0x82;
        (buf, 3)
    } else if len <= 0xFF_FFFF {
        buf[0] = len as u8;
        buf[1] = (len >> 8) as u8;
        buf[2] = (len >> 16) as u8;
        buf[3] = 0x83;
        (buf, 4)
    } else {
        buf[0] = len as u8;
        buf[1] = (len >> 8) as u8;
        buf[2] = (len >> 16) as u8;
        buf[3] = (len >> 24) as u8;
        buf[4] = 0x84;
        (buf, 5)
    }
}

/// Decode a length field, returning (length, bytes_consumed).
///
/// `base_offset` positions error reports within the enclosing buffer.
/// Non-minimal long forms are accepted (X.690 8.1.3.5 Note 2); indefinite
/// length, more than [`MAX_LENGTH_OCTETS`] octets, and lengths above
/// [`MAX_MESSAGE_LEN`] are rejected.
pub fn decode_length(data: &[u8], base_offset: usize) -> Result<(usize, usize)> {
    if data.is_empty() {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    }

    let first = data[0];

    if first == 0x80 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::IndefiniteLength,
        ));
    }

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;

    if num_octets == 0 {
        return Err(Error::decode(base_offset, DecodeErrorKind::InvalidLength));
    }
    if num_octets > MAX_LENGTH_OCTETS {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthTooLong { octets: num_octets },
        ));
    }
    if data.len() < 1 + num_octets {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    }

    let mut len: usize = 0;
    for &byte in &data[1..=num_octets] {
        len = (len << 8) | (byte as usize);
    }

    if len > MAX_MESSAGE_LEN {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_MESSAGE_LEN,
            },
        ));
    }

    Ok((len, 1 + num_octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(len: usize) -> Vec<u8> {
        let (buf, n) = encode_length(len);
        let mut v = buf[..n].to_vec();
        v.reverse();
        v
    }

    #[test]
    fn test_short_form() {
        assert_eq!(wire(0), vec![0]);
        assert_eq!(wire(1), vec![1]);
        assert_eq!(wire(127), vec![127]);
    }

    #[test]
    fn test_long_form() {
        assert_eq!(wire(128), vec![0x81, 128]);
        assert_eq!(wire(255), vec![0x81, 255]);
        assert_eq!(wire(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(wire(65535), vec![0x82, 0xFF, 0xFF]);
    }

    #[test]
    fn test_roundtrip_boundaries() {
        for len in [0usize, 1, 127, 128, 255, 256, 65535] {
            let bytes = wire(len);
            let (decoded, consumed) = decode_length(&bytes, 0).unwrap();
            assert_eq!(decoded, len);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_decode_short() {
        assert_eq!(decode_length(&[0], 0).unwrap(), (0, 1));
        assert_eq!(decode_length(&[127], 0).unwrap(), (127, 1));
    }

    #[test]
    fn test_decode_long() {
        assert_eq!(decode_length(&[0x81, 200], 0).unwrap(), (200, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00], 0).unwrap(), (256, 3));
    }

    #[test]
    fn test_indefinite_rejected() {
        assert!(decode_length(&[0x80], 0).is_err());
    }

    #[test]
    fn test_non_minimal_accepted() {
        // Length 5 in two octets: legal but non-minimal
        assert_eq!(decode_length(&[0x82, 0x00, 0x05], 0).unwrap(), (5, 3));
        assert_eq!(decode_length(&[0x81, 0x01], 0).unwrap(), (1, 2));
    }

    #[test]
    fn test_too_many_octets_rejected() {
        let result = decode_length(&[0x85, 0x00, 0x00, 0x00, 0x00, 0x01], 0);
        assert!(matches!(
            result,
            Err(Error::Decode {
                kind: DecodeErrorKind::LengthTooLong { octets: 5 },
                ..
            })
        ));
    }

    #[test]
    fn test_max_message_len_enforced() {
        assert_eq!(
            decode_length(&[0x82, 0xFF, 0xFF], 0).unwrap(),
            (MAX_MESSAGE_LEN, 3)
        );
        // 65536 is one past the bound
        let result = decode_length(&[0x83, 0x01, 0x00, 0x00], 0);
        assert!(matches!(
            result,
            Err(Error::Decode {
                kind: DecodeErrorKind::LengthExceedsMax { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_long_form() {
        assert!(decode_length(&[0x82, 0x01], 0).is_err());
        assert!(decode_length(&[], 0).is_err());
    }
}
