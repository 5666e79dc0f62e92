//! SNMP protocol version.

/// SNMP protocol version.
///
/// The wire encoding is 0 for v1, 1 for v2c, and 3 for v3 (2 was assigned
/// to the abandoned SNMPv2p).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// SNMPv1 (RFC 1157)
    V1,
    /// SNMPv2c (RFC 1901)
    V2c,
    /// SNMPv3 (RFC 3412)
    V3,
}

impl Version {
    /// Create from the wire version number.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::V1),
            1 => Some(Self::V2c),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// Get the wire version number.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
            Self::V3 => 3,
        }
    }

    /// Whether this version supports GETBULK and Counter64.
    pub fn supports_bulk(self) -> bool {
        !matches!(self, Self::V1)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2c => write!(f, "v2c"),
            Self::V3 => write!(f, "v3"),
        }
    }
}
