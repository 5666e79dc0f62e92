//! SNMP message envelope.
//!
//! Every SNMP message is `SEQUENCE { version INTEGER, community OCTET
//! STRING, pdu }`. The version field encodes 0 for v1, 1 for v2c, and 3
//! for v3; v3 security processing is an attachable layer above this
//! envelope (see [`crate::v3`]).

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// A community-authenticated SNMP message.
#[derive(Debug, Clone)]
pub struct Message {
    /// SNMP version.
    pub version: Version,
    /// Community string.
    pub community: Bytes,
    /// Protocol data unit.
    pub pdu: Pdu,
}

impl Message {
    /// Create a new message.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Encode to BER wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });

        buf.finish()
    }

    /// Decode from BER wire bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
        })?;

        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;

        Ok(Message {
            version,
            community,
            pdu,
        })
    }

    /// Consume and return the PDU.
    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}
