//! Handshake token text codec.
//!
//! Clients carry the handshake in an HTTP header as url-safe base64. Decoding
//! also accepts the standard alphabet and missing padding.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::prelude::BASE64_URL_SAFE_NO_PAD;

use crate::HandshakeError;

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a handshake token into raw bytes.
pub fn decode_token(token: &str) -> Result<Vec<u8>, HandshakeError> {
    let normalized: String = token
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    LENIENT_STANDARD
        .decode(normalized)
        .map_err(|_| HandshakeError::MalformedEncoding)
}

/// Encode raw handshake bytes as an unpadded url-safe token.
pub fn encode_token(blob: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_safe_and_standard_alphabets_agree() {
        let blob = [0xfb, 0xff, 0xbf, 0x00, 0x10];
        let url = encode_token(&blob);
        assert!(url.contains('-') || url.contains('_'));
        assert_eq!(decode_token(&url).unwrap(), blob);

        let standard = base64::prelude::BASE64_STANDARD.encode(blob);
        assert_eq!(decode_token(&standard).unwrap(), blob);
    }

    #[test]
    fn padding_is_optional() {
        assert_eq!(decode_token("YWI").unwrap(), b"ab");
        assert_eq!(decode_token("YWI=").unwrap(), b"ab");
    }

    #[test]
    fn invalid_input_is_malformed() {
        assert_eq!(decode_token("a*b"), Err(HandshakeError::MalformedEncoding));
        assert_eq!(decode_token("YWJjZ"), Err(HandshakeError::MalformedEncoding));
    }
}
