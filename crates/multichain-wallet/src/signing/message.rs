/*
[INPUT]:  Message text, hex text or raw bytes
[OUTPUT]: Canonical message bytes and EIP-191 digests
[POS]:    Signing layer - personal-message encoding
[UPDATE]: When accepted message encodings change
*/

use alloy_primitives::{B256, eip191_hash_message};

use crate::error::SigningError;

/// A message as callers hand it in.
///
/// Hashing is defined over bytes: `Utf8("hi")` and `Hex("0x6869")` are the same message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageInput {
    Utf8(String),
    Hex(String),
    Raw(Vec<u8>),
}

impl MessageInput {
    /// Interpret a string the way web3 tooling does: `0x`-prefixed hex is bytes, anything else is text
    pub fn parse(input: &str) -> Self {
        if is_hex_string(input) {
            MessageInput::Hex(input.to_string())
        } else {
            MessageInput::Utf8(input.to_string())
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SigningError> {
        match self {
            MessageInput::Utf8(text) => Ok(text.as_bytes().to_vec()),
            MessageInput::Hex(text) => {
                let stripped = text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                    .unwrap_or(text);
                hex::decode(stripped)
                    .map_err(|e| SigningError::InvalidMessage(format!("invalid hex message: {e}")))
            }
            MessageInput::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<&str> for MessageInput {
    fn from(value: &str) -> Self {
        MessageInput::Utf8(value.to_string())
    }
}

impl From<&[u8]> for MessageInput {
    fn from(value: &[u8]) -> Self {
        MessageInput::Raw(value.to_vec())
    }
}

impl From<Vec<u8>> for MessageInput {
    fn from(value: Vec<u8>) -> Self {
        MessageInput::Raw(value)
    }
}

/// EIP-191 personal-message digest
pub fn personal_digest(message: &[u8]) -> B256 {
    eip191_hash_message(message)
}

fn is_hex_string(input: &str) -> bool {
    match input.strip_prefix("0x") {
        Some(rest) => rest.len() % 2 == 0 && rest.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_hex_give_same_bytes() {
        let text = MessageInput::from("Two roads diverged in a yellow wood");
        let hex_text = format!("0x{}", hex::encode("Two roads diverged in a yellow wood"));
        let hexed = MessageInput::parse(&hex_text);

        assert!(matches!(hexed, MessageInput::Hex(_)));
        assert_eq!(text.to_bytes().unwrap(), hexed.to_bytes().unwrap());
        assert_eq!(
            personal_digest(&text.to_bytes().unwrap()),
            personal_digest(&hexed.to_bytes().unwrap())
        );
    }

    #[test]
    fn test_parse_keeps_non_hex_as_text() {
        assert!(matches!(MessageInput::parse("hello"), MessageInput::Utf8(_)));
        assert!(matches!(MessageInput::parse("0xabc"), MessageInput::Utf8(_)));
        assert!(matches!(MessageInput::parse("0xzz"), MessageInput::Utf8(_)));
    }

    #[test]
    fn test_malformed_hex_is_an_error() {
        let err = MessageInput::Hex("0x123".to_string()).to_bytes().unwrap_err();
        assert!(matches!(err, SigningError::InvalidMessage(_)));
    }
}
