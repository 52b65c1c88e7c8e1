//! Name hashing and CRC32 folding.
//!
//! Class, field and enum member names are identified by a 32-bit Jenkins
//! one-at-a-time hash ([`JenHash`]). Names that were not recorded are written
//! as `h:<HEX>` so they can still be resolved back to the same hash.
//!
//! Archive entries use the standard (IEEE) CRC32, folded incrementally so a
//! payload can be hashed as it streams through.

use std::fmt;

/// Prefix used when a name is rendered from its raw hash.
pub const HASH_NAME_PREFIX: &str = "h:";

/// A 32-bit Jenkins one-at-a-time hash of a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct JenHash(u32);

impl JenHash {
    /// Hash a name.
    pub const fn new(name: &str) -> Self {
        Self(jenkins_bytes(name.as_bytes()))
    }

    /// Wrap an already computed hash.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw hash value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is the zero (absent) hash.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Resolve a node or attribute name to a hash.
    ///
    /// Names of the form `h:<HEX>` are parsed back into the raw hash they were
    /// rendered from; anything else is hashed. A malformed hex part hashes to
    /// zero, which matches no field.
    pub fn from_name(name: &str) -> Self {
        match name.strip_prefix(HASH_NAME_PREFIX) {
            Some(hex) => Self(u32::from_str_radix(hex, 16).unwrap_or(0)),
            None => Self::new(name),
        }
    }

    /// Render as an `h:<HEX>` fallback name.
    pub fn to_name(self) -> String {
        format!("{HASH_NAME_PREFIX}{:X}", self.0)
    }
}

impl From<&str> for JenHash {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for JenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

const fn jenkins_bytes(data: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    let mut i = 0;

    while i < data.len() {
        hash = hash.wrapping_add(data[i] as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
        i += 1;
    }

    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Compute the CRC32 (IEEE) of a byte slice.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Continue a CRC32 computation.
///
/// `seed` is the result of a previous call (or 0 to start), so
/// `crc32_append(crc32(a), b) == crc32(a ++ b)`.
#[inline]
pub fn crc32_append(seed: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_jenkins_values() {
        assert_eq!(JenHash::new("a").raw(), 0xca2e9442);
        assert_eq!(
            JenHash::new("The quick brown fox jumps over the lazy dog").raw(),
            0x519e91f5
        );
        assert!(JenHash::new("").is_zero());
    }

    #[test]
    fn test_hash_name_round_trip() {
        let hash = JenHash::new("roomSize");
        let name = hash.to_name();
        assert!(name.starts_with("h:"));
        assert_eq!(JenHash::from_name(&name), hash);
        assert_eq!(JenHash::from_name("roomSize"), hash);
    }

    #[test]
    fn test_malformed_hash_name() {
        assert!(JenHash::from_name("h:zz").is_zero());
    }

    #[test]
    fn test_crc_continuation() {
        let data = b"hello world, streamed in pieces";
        let whole = crc32(data);
        let folded = data
            .chunks(7)
            .fold(0, |crc, chunk| crc32_append(crc, chunk));
        assert_eq!(whole, folded);
        assert_eq!(crc32(b"123456789"), 0xcbf43926);
    }
}
