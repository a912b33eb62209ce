//! Data-plane core for an OpenVPN-compatible tunnel client: packet framing,
//! authenticated encryption, replay protection and zero-on-drop key storage.
//!
//! This crate covers only the per-packet pipeline. Session negotiation, key
//! derivation, socket I/O and platform integration live above it.

pub mod crypto;
pub mod datapath;
pub mod error;
pub mod framing;
pub mod random;
pub mod replay;
pub mod securebuffer;

pub use datapath::{DataPath, DecryptOutcome};
pub use error::{Error, Result};
pub use securebuffer::SecureBuffer;
