//! SNMPv3 User-based Security Model contract.
//!
//! This crate carries the outward USM contract - the configuration a
//! caller supplies and the error surface a security subsystem reports
//! through ([`Error::AuthFailure`](crate::Error::AuthFailure),
//! [`Error::PrivFailure`](crate::Error::PrivFailure)). Key localization,
//! engine discovery, and cipher IV sequencing live in an attachable
//! subsystem; consult RFC 3414/3826 for bit-exact behavior.

use bytes::Bytes;

/// SNMPv3 security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    /// No authentication, no privacy.
    #[default]
    NoAuthNoPriv,
    /// Authentication without privacy.
    AuthNoPriv,
    /// Authentication and privacy.
    AuthPriv,
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthNoPriv => write!(f, "noAuthNoPriv"),
            Self::AuthNoPriv => write!(f, "authNoPriv"),
            Self::AuthPriv => write!(f, "authPriv"),
        }
    }
}

/// SNMPv3 authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Sha224 => write!(f, "SHA-224"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha384 => write!(f, "SHA-384"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// SNMPv3 privacy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    Des,
    Aes128,
    Aes192,
    Aes256,
    /// Cisco-variant key extension.
    Aes192c,
    /// Cisco-variant key extension.
    Aes256c,
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Des => write!(f, "DES"),
            Self::Aes128 => write!(f, "AES-128"),
            Self::Aes192 => write!(f, "AES-192"),
            Self::Aes256 => write!(f, "AES-256"),
            Self::Aes192c => write!(f, "AES-192-C"),
            Self::Aes256c => write!(f, "AES-256-C"),
        }
    }
}

/// SNMPv3 security configuration accepted by the client builder.
#[derive(Debug, Clone, Default)]
pub struct V3Security {
    /// Security name (username).
    pub security_name: String,
    /// Requested security level.
    pub level: SecurityLevel,
    /// Authentication protocol and passphrase.
    pub auth: Option<(AuthProtocol, String)>,
    /// Privacy protocol and passphrase.
    pub privacy: Option<(PrivProtocol, String)>,
    /// Context name.
    pub context_name: String,
    /// Context engine ID, when known ahead of discovery.
    pub context_engine_id: Option<Bytes>,
}

impl V3Security {
    /// Create a configuration for the given security name.
    pub fn new(security_name: impl Into<String>) -> Self {
        Self {
            security_name: security_name.into(),
            ..Default::default()
        }
    }

    /// Enable authentication.
    pub fn auth(mut self, protocol: AuthProtocol, passphrase: impl Into<String>) -> Self {
        self.auth = Some((protocol, passphrase.into()));
        if matches!(self.level, SecurityLevel::NoAuthNoPriv) {
            self.level = SecurityLevel::AuthNoPriv;
        }
        self
    }

    /// Enable privacy (requires authentication).
    pub fn privacy(mut self, protocol: PrivProtocol, passphrase: impl Into<String>) -> Self {
        self.privacy = Some((protocol, passphrase.into()));
        self.level = SecurityLevel::AuthPriv;
        self
    }

    /// Set the context name.
    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = name.into();
        self
    }
}
