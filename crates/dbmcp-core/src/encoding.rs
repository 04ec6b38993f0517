//! Base64url helpers for key payloads and token claims

use base64::engine::general_purpose::URL_SAFE;
use base64::{DecodeError, Engine};

/// Decode base64url data, tolerating stripped padding.
///
/// Key payloads and JWT segments are commonly transmitted without the
/// trailing `=` characters; pad back up to a multiple of 4 before decoding.
pub(crate) fn decode_base64url_padded(data: &str) -> Result<Vec<u8>, DecodeError> {
    let data = data.trim();
    let mut padded = data.to_string();
    padded.push_str(&"=".repeat((4 - data.len() % 4) % 4));
    URL_SAFE.decode(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_with_padding_intact() {
        assert_eq!(decode_base64url_padded("aGk=").unwrap(), b"hi");
    }

    #[test]
    fn decodes_with_padding_stripped() {
        assert_eq!(decode_base64url_padded("aGk").unwrap(), b"hi");
        assert_eq!(decode_base64url_padded("aGV5YQ").unwrap(), b"heya");
    }

    #[test]
    fn decodes_url_safe_alphabet() {
        // '-' and '_' instead of '+' and '/'
        assert_eq!(decode_base64url_padded("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_base64url_padded("!!!").is_err());
    }
}
