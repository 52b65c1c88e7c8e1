//! Base64 for embedded data URIs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::{Error, Result};

/// Encode bytes with the standard alphabet and `=` padding.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64.
///
/// The input length must be a multiple of four and only trailing `=` may
/// fall outside the alphabet. Nothing is returned on failure.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    if text.len() % 4 != 0 {
        return Err(Error::new("malformed base64").with_value(format!("length {}", text.len())));
    }
    STANDARD
        .decode(text)
        .map_err(|e| Error::new("malformed base64").with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_lengths() {
        for len in 0..300usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes, "length {len}");
        }
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(decode("Zm9vYmFy").unwrap(), b"foobar");
    }

    #[test]
    fn test_rejects_bad_length() {
        assert!(decode("Zm9").is_err());
        assert!(decode("Zm9vY").is_err());
    }

    #[test]
    fn test_rejects_bad_characters() {
        assert!(decode("Zm9*").is_err());
        assert!(decode("Z=9v").is_err());
        assert!(decode("Zg=A").is_err());
        assert!(decode("====").is_err());
    }
}
