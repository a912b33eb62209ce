//! Heap-allocated byte region that is scrubbed on release.
//!
//! Every buffer holding key material or plaintext passes through here
//! rather than a bare `Vec<u8>`, so a leak of the backing allocation never
//! leaks key bytes after the buffer's owner drops it.

use zeroize::Zeroize;

/// An owned, mutable byte sequence whose storage is zeroed before it is
/// freed.
#[derive(Clone)]
pub struct SecureBuffer {
    data: Vec<u8>,
}

impl SecureBuffer {
    /// `n` zero bytes.
    pub fn with_count(n: usize) -> Self {
        Self { data: vec![0u8; n] }
    }

    /// Copies `bytes` into a new buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec() }
    }

    /// Takes ownership of an already-allocated `Vec<u8>` without copying,
    /// recovering `ZeroingData`'s "wrap a region the caller already owns"
    /// constructor from the original source.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Copies a UTF-8 string, optionally appending a NUL terminator.
    pub fn from_str(s: &str, null_terminated: bool) -> Self {
        let mut data = s.as_bytes().to_vec();
        if null_terminated {
            data.push(0);
        }
        Self { data }
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Appends another buffer's contents.
    pub fn append(&mut self, other: &SecureBuffer) {
        self.data.extend_from_slice(&other.data);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Discards the first `k` bytes, zeroing them first.
    pub fn remove_until(&mut self, k: usize) {
        assert!(k <= self.data.len(), "remove_until: k exceeds buffer length");
        self.data[..k].zeroize();
        self.data.drain(..k);
    }

    /// A new buffer holding a copy of `self[offset..offset + count]`.
    ///
    /// Caller is responsible for `offset + count <= self.count()`; this is a
    /// contract violation, not a runtime error, per spec §4.A.
    pub fn slice(&self, offset: usize, count: usize) -> SecureBuffer {
        SecureBuffer::from_bytes(&self.data[offset..offset + count])
    }

    /// Reads a little-endian 16-bit integer at `offset`.
    pub fn read_u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Reads a big-endian 16-bit integer at `offset`.
    pub fn read_u16_be(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Reads a NUL-terminated string starting at `offset`.
    pub fn read_nul_terminated_string(&self, offset: usize) -> String {
        let rest = &self.data[offset..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        String::from_utf8_lossy(&rest[..end]).into_owned()
    }

    /// Explicitly scrubs the buffer in place without releasing storage.
    pub fn zero(&mut self) {
        self.data.zeroize();
    }

    /// Lowercase hex dump, no separators.
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        let mut s = String::with_capacity(self.data.len() * 2);
        for b in &self.data {
            let _ = write!(s, "{:02x}", b);
        }
        s
    }
}

impl PartialEq<[u8]> for SecureBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        use subtle::ConstantTimeEq;
        self.data.ct_eq(other).into()
    }
}

impl PartialEq for SecureBuffer {
    fn eq(&self, other: &Self) -> bool {
        self == other.data.as_slice()
    }
}

impl std::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureBuffer").field("count", &self.data.len()).finish()
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
