//! ASN.1 Basic Encoding Rules for SNMP.
//!
//! The encoder produces canonical output: minimal two's-complement
//! integers, minimal unsigned content with a single 0x00 prepended when the
//! top bit would flip the sign, and definite short/long-form lengths. The
//! decoder is permissive about non-minimal input but rejects indefinite
//! lengths and anything beyond the 64 KiB message bound.

mod decode;
pub mod length;

pub use decode::Decoder;
pub use length::{decode_length, encode_length, MAX_MESSAGE_LEN};

use crate::oid::Oid;
use bytes::Bytes;

/// BER tag constants used by SNMP.
pub mod tag {
    /// Universal class tags.
    pub mod universal {
        pub const INTEGER: u8 = 0x02;
        pub const OCTET_STRING: u8 = 0x04;
        pub const NULL: u8 = 0x05;
        pub const OBJECT_IDENTIFIER: u8 = 0x06;
        pub const SEQUENCE: u8 = 0x30;
    }

    /// Application class tags (RFC 2578 SMI types).
    pub mod application {
        pub const IP_ADDRESS: u8 = 0x40;
        pub const COUNTER32: u8 = 0x41;
        pub const GAUGE32: u8 = 0x42;
        pub const TIMETICKS: u8 = 0x43;
        pub const OPAQUE: u8 = 0x44;
        pub const COUNTER64: u8 = 0x46;
    }

    /// Context class tags: v2c exception markers inside varbinds.
    pub mod context {
        pub const NO_SUCH_OBJECT: u8 = 0x80;
        pub const NO_SUCH_INSTANCE: u8 = 0x81;
        pub const END_OF_MIB_VIEW: u8 = 0x82;
    }

    /// PDU tags (context class, constructed).
    pub mod pdu {
        pub const GET_REQUEST: u8 = 0xA0;
        pub const GET_NEXT_REQUEST: u8 = 0xA1;
        pub const RESPONSE: u8 = 0xA2;
        pub const SET_REQUEST: u8 = 0xA3;
        pub const TRAP_V1: u8 = 0xA4;
        pub const GET_BULK_REQUEST: u8 = 0xA5;
        pub const INFORM_REQUEST: u8 = 0xA6;
        pub const TRAP_V2: u8 = 0xA7;
        pub const REPORT: u8 = 0xA8;
    }
}

/// Reverse-building BER encode buffer.
///
/// BER lengths precede their content, so encoding front-to-back would need
/// either length pre-computation or buffer shifting. This buffer is built
/// back-to-front instead: callers push fields in reverse order (content,
/// then length, then tag), and [`finish`](Self::finish) reverses once.
///
/// ```
/// use edgesnmp::ber::EncodeBuf;
///
/// let mut buf = EncodeBuf::new();
/// buf.push_sequence(|buf| {
///     buf.push_integer(2); // fields pushed in reverse order
///     buf.push_integer(1);
/// });
/// assert_eq!(&buf.finish()[..], &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
/// ```
pub struct EncodeBuf {
    // Output bytes in reverse order.
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(128),
        }
    }

    /// Number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Push a single tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Push a length field for `len` content bytes.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        // encode_length already yields bytes in reverse order
        self.buf.extend_from_slice(&bytes[..n]);
    }

    /// Push raw bytes that appear verbatim in the output.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().rev());
    }

    /// Push a complete INTEGER TLV (minimal two's-complement content).
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        // Strip redundant sign octets: 0x00 before a clear top bit,
        // 0xFF before a set top bit.
        while start < 3
            && ((bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0))
        {
            start += 1;
        }
        let content = &bytes[start..];
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag::universal::INTEGER);
    }

    /// Push an unsigned 32-bit TLV with the given application tag
    /// (Counter32, Gauge32, TimeTicks).
    ///
    /// A 0x00 octet is prepended when the top content bit is set so the
    /// value survives a signed decode path.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 3 && bytes[start] == 0 {
            start += 1;
        }

        let needs_pad = bytes[start] & 0x80 != 0;
        let content_len = (4 - start) + usize::from(needs_pad);

        self.push_bytes(&bytes[start..]);
        if needs_pad {
            self.buf.push(0x00);
        }
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Push a Counter64 TLV.
    pub fn push_counter64(&mut self, value: u64) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 7 && bytes[start] == 0 {
            start += 1;
        }

        let needs_pad = bytes[start] & 0x80 != 0;
        let content_len = (8 - start) + usize::from(needs_pad);

        self.push_bytes(&bytes[start..]);
        if needs_pad {
            self.buf.push(0x00);
        }
        self.push_length(content_len);
        self.push_tag(tag::application::COUNTER64);
    }

    /// Push an OCTET STRING TLV.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Push a NULL TLV.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Push an OBJECT IDENTIFIER TLV.
    pub fn push_oid(&mut self, oid: &Oid) {
        let content = oid.to_ber();
        self.push_bytes(&content);
        self.push_length(content.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Push an IpAddress TLV (always 4 content bytes).
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Push a SEQUENCE whose content is produced by `f`.
    ///
    /// `f` must push the sequence fields in reverse order.
    pub fn push_sequence(&mut self, f: impl FnOnce(&mut EncodeBuf)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Push a constructed TLV with an arbitrary tag (SEQUENCE, PDU tags).
    ///
    /// `f` must push the content fields in reverse order.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut EncodeBuf)) {
        let mark = self.buf.len();
        f(self);
        let content_len = self.buf.len() - mark;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Finalize and return the encoded bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}
