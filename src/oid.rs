//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` so that common MIB paths stay
//! off the heap.

use crate::error::{DecodeErrorKind, Error, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) in an OID.
///
/// RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
/// Enforced during BER decoding as protection against hostile input.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier - an ordered, non-empty sequence of arc values.
///
/// OIDs are immutable value objects: equality is componentwise and ordering
/// is lexicographic over the arcs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an OID from arc values.
    ///
    /// ```
    /// use edgesnmp::Oid;
    ///
    /// let oid = Oid::new(vec![1, 3, 6, 1, 2, 1]);
    /// assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1]);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted-decimal notation.
    ///
    /// One leading dot is accepted (`".1.3.6.1"` and `"1.3.6.1"` are the
    /// same OID). Empty strings and non-numeric components are rejected.
    ///
    /// ```
    /// use edgesnmp::Oid;
    ///
    /// let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
    /// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    ///
    /// assert!(Oid::parse("").is_err());
    /// assert!(Oid::parse("1.3.x.1").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.strip_prefix('.').unwrap_or(s);
        if s.is_empty() {
            return Err(Error::invalid_oid("empty OID string"));
        }

        let mut arcs = SmallVec::new();
        for part in s.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid(format!("component '{}' in '{}'", part, s)))?;
            arcs.push(arc);
        }

        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with the arcs of `prefix`.
    ///
    /// Every OID starts with itself and with the empty OID. This is the
    /// containment test the walk engine uses to detect subtree escape.
    ///
    /// ```
    /// use edgesnmp::Oid;
    ///
    /// let leaf = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
    /// let system = Oid::parse("1.3.6.1.2.1.1").unwrap();
    /// assert!(leaf.starts_with(&system));
    /// assert!(!system.starts_with(&leaf));
    /// ```
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.len() >= prefix.arcs.len() && self.arcs[..prefix.arcs.len()] == prefix.arcs[..]
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Validate arc constraints per X.690 Section 8.19.4.
    ///
    /// The first arc must be 0, 1, or 2; when the first arc is below 2
    /// the second arc must be at most 39. The constraint exists because
    /// BER packs the first two arcs into one subidentifier as
    /// `first * 40 + second`.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.is_empty() {
            return Err(Error::invalid_oid("OID must have at least one arc"));
        }

        let first = self.arcs[0];
        if first > 2 {
            return Err(Error::invalid_oid(format!(
                "first arc must be 0, 1, or 2 (got {})",
                first
            )));
        }

        if self.arcs.len() >= 2 {
            let second = self.arcs[1];
            if first < 2 && second > 39 {
                return Err(Error::invalid_oid(format!(
                    "second arc must be <= 39 when first arc is {} (got {})",
                    first, second
                )));
            }
        }

        Ok(())
    }

    /// Encode the arcs to BER content bytes.
    ///
    /// X.690 Section 8.19: the first two arcs combine into one
    /// subidentifier; every subidentifier is base-128 big-endian with the
    /// high bit set on all but its final byte.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        if self.arcs.is_empty() {
            return bytes;
        }

        // Base-128 even for the first subidentifier: arc2 may exceed 127
        // when arc1 is 2.
        let first_subid = if self.arcs.len() >= 2 {
            self.arcs[0] * 40 + self.arcs[1]
        } else {
            self.arcs[0] * 40
        };
        encode_subidentifier(&mut bytes, first_subid);

        for &arc in self.arcs.iter().skip(2) {
            encode_subidentifier(&mut bytes, arc);
        }

        bytes
    }

    /// Decode arcs from BER content bytes.
    ///
    /// Enforces [`MAX_OID_LEN`].
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::TruncatedData));
        }

        let mut arcs = SmallVec::new();

        let (first_subid, consumed) = decode_subidentifier(data)?;
        if first_subid < 40 {
            arcs.push(0);
            arcs.push(first_subid);
        } else if first_subid < 80 {
            arcs.push(1);
            arcs.push(first_subid - 40);
        } else {
            arcs.push(2);
            arcs.push(first_subid - 80);
        }

        let mut i = consumed;
        while i < data.len() {
            let (arc, n) = decode_subidentifier(&data[i..])?;
            arcs.push(arc);
            i += n;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }

        Ok(Self { arcs })
    }
}

/// Encode one subidentifier in base-128 with continuation bits.
#[inline]
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    if value == 0 {
        bytes.push(0);
        return;
    }

    let mut groups = 0;
    let mut tmp = value;
    while tmp > 0 {
        groups += 1;
        tmp >>= 7;
    }

    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one subidentifier, returning (value, bytes_consumed).
fn decode_subidentifier(data: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut i = 0;

    loop {
        if i >= data.len() {
            return Err(Error::decode(i, DecodeErrorKind::TruncatedData));
        }

        let byte = data[i];
        i += 1;

        if value > (u32::MAX >> 7) {
            return Err(Error::decode(i, DecodeErrorKind::SubidentifierOverflow));
        }

        value = (value << 7) | ((byte & 0x7F) as u32);

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((value, i))
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Create an [`Oid`] from literal arcs.
///
/// ```
/// use edgesnmp::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
    }

    #[test]
    fn test_parse_leading_dot() {
        let oid = Oid::parse(".1.3.6.1").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1]);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(Oid::parse("").is_err());
        assert!(Oid::parse(".").is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(Oid::parse("1.3.abc.1").is_err());
        assert!(Oid::parse("1.3.-6.1").is_err());
        assert!(Oid::parse("1..3").is_err());
    }

    #[test]
    fn test_display() {
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    }

    #[test]
    fn test_display_parse_roundtrip() {
        let original = oid!(1, 3, 6, 1, 4, 1, 9, 9, 42);
        let parsed: Oid = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_starts_with() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let prefix = Oid::parse("1.3.6.1").unwrap();
        assert!(oid.starts_with(&prefix));
        assert!(!prefix.starts_with(&oid));
        assert!(oid.starts_with(&oid));
    }

    #[test]
    fn test_ordering_lexicographic() {
        let a = oid!(1, 3, 6, 1, 2);
        let b = oid!(1, 3, 6, 1, 2, 0);
        let c = oid!(1, 3, 6, 1, 3);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_ber_encoding() {
        // 1.3.6.1 encodes as (1*40+3)=43, 6, 1
        let oid = Oid::parse("1.3.6.1").unwrap();
        assert_eq!(&oid.to_ber()[..], &[0x2B, 0x06, 0x01]);
    }

    #[test]
    fn test_ber_roundtrip() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let ber = oid.to_ber();
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_ber_large_arc() {
        // Arcs >= 128 take multiple base-128 bytes: 9999 = 0x4E 0x0F with
        // continuation -> 0xCE 0x0F
        let oid = oid!(1, 3, 6, 1, 4, 1, 9999);
        let ber = oid.to_ber();
        assert_eq!(&ber[..], &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xCE, 0x0F]);
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_ber_large_second_arc() {
        // X.690 Section 8.19 example: {2 999 3} has first subid 1079
        let oid = Oid::from_slice(&[2, 999, 3]);
        let ber = oid.to_ber();
        assert_eq!(&ber[..], &[0x88, 0x37, 0x03]);
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_ber_first_subid_boundaries() {
        assert_eq!(&Oid::from_slice(&[2, 0]).to_ber()[..], &[80]);
        assert_eq!(&Oid::from_slice(&[2, 47]).to_ber()[..], &[127]);
        assert_eq!(&Oid::from_slice(&[2, 48]).to_ber()[..], &[0x81, 0x00]);
    }

    #[test]
    fn test_ber_non_minimal_subidentifier_accepted() {
        // Leading 0x80 continuation bytes are non-minimal but tolerated
        let oid = Oid::from_ber(&[0x2B, 0x80, 0x01]).unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 1]);
    }

    #[test]
    fn test_ber_max_len_enforced() {
        // 1.3 plus (MAX_OID_LEN - 2) single-byte arcs is exactly at the cap
        let mut at_limit = vec![0x2B];
        at_limit.extend(std::iter::repeat_n(0x01, MAX_OID_LEN - 2));
        assert_eq!(Oid::from_ber(&at_limit).unwrap().len(), MAX_OID_LEN);

        let mut over_limit = vec![0x2B];
        over_limit.extend(std::iter::repeat_n(0x01, MAX_OID_LEN - 1));
        assert!(Oid::from_ber(&over_limit).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(oid!(1, 3, 6, 1).validate().is_ok());
        assert!(oid!(2, 999).validate().is_ok());
        assert!(oid!(3, 0).validate().is_err());
        assert!(oid!(0, 40).validate().is_err());
        assert!(oid!(1, 39).validate().is_ok());
    }

    #[test]
    fn test_child() {
        let system = oid!(1, 3, 6, 1, 2, 1, 1);
        assert_eq!(system.child(1).to_string(), "1.3.6.1.2.1.1.1");
    }
}
