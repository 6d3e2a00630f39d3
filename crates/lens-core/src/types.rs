use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// One bytecode sample, either as hex text or as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bytecode<'a> {
    /// Hex text, optionally `0x`-prefixed. Surrounding whitespace is ignored.
    Hex(&'a str),
    Raw(&'a [u8]),
}

impl<'a> Bytecode<'a> {
    /// Resolve to raw bytes. Malformed hex yields an empty sequence.
    pub fn to_bytes(&self) -> Cow<'a, [u8]> {
        match *self {
            Bytecode::Hex(text) => Cow::Owned(parse_hex(text)),
            Bytecode::Raw(bytes) => Cow::Borrowed(bytes),
        }
    }
}

impl<'a> From<&'a str> for Bytecode<'a> {
    fn from(text: &'a str) -> Self {
        Bytecode::Hex(text)
    }
}

impl<'a> From<&'a String> for Bytecode<'a> {
    fn from(text: &'a String) -> Self {
        Bytecode::Hex(text.as_str())
    }
}

impl<'a> From<&'a [u8]> for Bytecode<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Bytecode::Raw(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Bytecode<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Bytecode::Raw(bytes.as_slice())
    }
}

/// Decode hex text into bytes.
///
/// Accepts an optional `0x`/`0X` prefix and either letter case. Odd-length
/// input or any non-hex character yields an empty vector.
pub fn parse_hex(text: &str) -> Vec<u8> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    hex::decode(digits).unwrap_or_default()
}

/// Yellow-paper classification of an opcode, derived from its high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OpcodeGroup {
    StopAndArithmetic,
    ComparisonAndBitwise,
    Sha3,
    Environmental,
    Block,
    StackMemoryStorageFlow,
    Push,
    Duplication,
    Exchange,
    Logging,
    System,
    Invalid,
}

impl OpcodeGroup {
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode >> 4 {
            0x0 => Self::StopAndArithmetic,
            0x1 => Self::ComparisonAndBitwise,
            0x2 => Self::Sha3,
            0x3 => Self::Environmental,
            0x4 => Self::Block,
            0x5 => Self::StackMemoryStorageFlow,
            0x6 | 0x7 => Self::Push,
            0x8 => Self::Duplication,
            0x9 => Self::Exchange,
            0xA => Self::Logging,
            0xF => Self::System,
            _ => Self::Invalid,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::StopAndArithmetic => "Stop and Arithmetic Operations",
            Self::ComparisonAndBitwise => "Comparison & Bitwise Logic Operations",
            Self::Sha3 => "SHA3",
            Self::Environmental => "Environmental Information",
            Self::Block => "Block Information",
            Self::StackMemoryStorageFlow => "Stack, Memory, Storage and Flow Operations",
            Self::Push => "Push Operations",
            Self::Duplication => "Duplication Operations",
            Self::Exchange => "Exchange Operations",
            Self::Logging => "Logging Operations",
            Self::System => "System operations",
            Self::Invalid => "Invalid instruction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_with_prefix() {
        assert_eq!(parse_hex("0x6001"), vec![0x60, 0x01]);
        assert_eq!(parse_hex("0X6001"), vec![0x60, 0x01]);
        assert_eq!(parse_hex("6001"), vec![0x60, 0x01]);
    }

    #[test]
    fn parse_hex_mixed_case_and_whitespace() {
        assert_eq!(parse_hex("  0xAbCd\n"), vec![0xAB, 0xCD]);
    }

    #[test]
    fn parse_hex_malformed_is_empty() {
        assert!(parse_hex("0x600").is_empty());
        assert!(parse_hex("0xzz").is_empty());
        assert!(parse_hex("hello").is_empty());
        assert!(parse_hex("").is_empty());
        assert!(parse_hex("0x").is_empty());
    }

    #[test]
    fn raw_bytecode_is_borrowed() {
        let data = vec![0x00u8, 0x01];
        let code = Bytecode::from(&data);
        assert!(matches!(code.to_bytes(), Cow::Borrowed(_)));
        assert_eq!(&*code.to_bytes(), &[0x00, 0x01]);
    }

    #[test]
    fn group_from_opcode() {
        assert_eq!(OpcodeGroup::from_opcode(0x01), OpcodeGroup::StopAndArithmetic);
        assert_eq!(OpcodeGroup::from_opcode(0x33), OpcodeGroup::Environmental);
        assert_eq!(OpcodeGroup::from_opcode(0x42), OpcodeGroup::Block);
        assert_eq!(OpcodeGroup::from_opcode(0x7F), OpcodeGroup::Push);
        assert_eq!(OpcodeGroup::from_opcode(0xF1), OpcodeGroup::System);
        assert_eq!(OpcodeGroup::from_opcode(0xC0), OpcodeGroup::Invalid);
    }

    #[test]
    fn environmental_label() {
        assert_eq!(OpcodeGroup::Environmental.label(), "Environmental Information");
    }
}
