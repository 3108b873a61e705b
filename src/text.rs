//! Conversion between string-object bytes and Unicode text.

use encoding_rs::UTF_16BE;

use crate::object::{Object, StringFormat};

/// Decode the bytes of a string object. A UTF-16BE byte-order mark selects
/// UTF-16 decoding; anything else is treated as Latin text, one byte per
/// character.
pub fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (text, _, _) = UTF_16BE.decode(&bytes[2..]);
        text.into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encode text as UTF-16BE with a leading byte-order mark.
pub fn encode_utf16_be(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// Creates a text string object.
/// If the input only contains ASCII characters, the string is stored
/// byte-per-character as a literal, otherwise as a UTF-16BE hex string.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.into(), StringFormat::Literal);
    }
    Object::String(encode_utf16_be(text), StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let object = text_string("Hello");
        assert_eq!(object.as_str().unwrap(), b"Hello");
        assert_eq!(decode_text(object.as_str().unwrap()), "Hello");
    }

    #[test]
    fn non_ascii_uses_utf16() {
        let object = text_string("Grüße");
        let bytes = object.as_str().unwrap();
        assert!(bytes.starts_with(&[0xFE, 0xFF]));
        assert_eq!(decode_text(bytes), "Grüße");
    }
}
