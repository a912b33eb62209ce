//! Stable error taxonomy for the data-plane core.
//!
//! Numeric codes match the wire-stable values callers may log or branch on
//! (spec §6/§7); they are never renumbered, only appended to.

use thiserror::Error;

/// All failure kinds the core can surface.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The CSPRNG or its seed source failed.
    #[error("random generator failure")]
    RandomGenerator,

    /// HMAC computation or key installation failed.
    #[error("hmac failure")]
    Hmac,

    /// Authenticated encryption or decryption failed: a MAC/tag mismatch,
    /// a malformed envelope, or an invalid compression marker.
    #[error("crypto box encryption/decryption failure")]
    CryptoEncryption,

    /// Unknown cipher or digest name at construction time.
    #[error("unknown cipher or digest algorithm")]
    CryptoAlgorithm,

    /// The send-side packet-id counter would exceed the configured cap.
    #[error("data path packet-id space exhausted")]
    DataPathOverflow,

    /// A DataV2 packet's embedded peer-id did not match the installed one.
    #[error("data path peer-id mismatch")]
    DataPathPeerIdMismatch,
}

impl Error {
    /// Stable numeric code, matching spec §6's error domain table.
    pub const fn code(self) -> i32 {
        match self {
            Error::RandomGenerator => 101,
            Error::Hmac => 102,
            Error::CryptoEncryption => 103,
            Error::CryptoAlgorithm => 104,
            Error::DataPathOverflow => 301,
            Error::DataPathPeerIdMismatch => 302,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
