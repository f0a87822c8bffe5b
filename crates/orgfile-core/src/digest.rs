//! Content digest type.

use std::fmt::Write;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Content fingerprint used as file identity.
///
/// Stored as a lowercase hex string so digests produced in-process and
/// digests read back from an external hashing command compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(CompactString);

impl Digest {
    /// Create a digest from its textual form.
    pub fn new(hex: impl AsRef<str>) -> Self {
        Self(CompactString::new(hex.as_ref().trim().to_ascii_lowercase()))
    }

    /// Create a digest from raw hash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hex = CompactString::with_capacity(bytes.len() * 2);
        for b in bytes {
            // Writing into a string cannot fail.
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    /// Get the digest as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_is_hex() {
        let digest = Digest::from_bytes(&[0xab, 0x01, 0xff]);
        assert_eq!(digest.as_str(), "ab01ff");
    }

    #[test]
    fn test_new_normalizes_case_and_whitespace() {
        assert_eq!(Digest::new("  ABCDEF\n"), Digest::new("abcdef"));
    }

    #[test]
    fn test_short() {
        let digest = Digest::from_bytes(&[0xaa; 32]);
        assert_eq!(digest.short(), "aaaaaaaaaaaa");
        assert_eq!(Digest::new("abc").short(), "abc");
    }
}
