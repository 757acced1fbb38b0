//! Minimal EVM ABI codec for the lottery contract.
//!
//! Everything the contract exchanges is static: addresses, booleans and
//! unsigned integers, each occupying one 32-byte big-endian word. Amounts are
//! carried as `u128`; a `uint256` that does not fit is treated as undecodable.

use sha3::{
    Digest,
    Keccak256,
};
use std::{
    fmt,
    str::FromStr,
};

pub type Word = [u8; 32];

pub const WORD_LEN: usize = 32;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn to_word(self) -> Word {
        let mut word = [0u8; WORD_LEN];
        word[12..].copy_from_slice(&self.0);
        word
    }

    pub fn from_word(word: &Word) -> Option<Self> {
        if word[..12].iter().any(|b| *b != 0) {
            return None;
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Some(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Address(parse_fixed_hex::<20>(s)?))
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

impl FromStr for TxHash {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TxHash(parse_fixed_hex::<32>(s)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexParseError {
    #[error("invalid hex: {0}")]
    Invalid(String),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn parse_fixed_hex<const N: usize>(raw: &str) -> Result<[u8; N], HexParseError> {
    let bytes = decode_hex(raw)?;
    if bytes.len() != N {
        return Err(HexParseError::Length {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decodes `0x`-prefixed (or bare) hex. `"0x"` decodes to an empty buffer.
pub fn decode_hex(raw: &str) -> Result<Vec<u8>, HexParseError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| HexParseError::Invalid(format!("{raw}: {e}")))
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a JSON-RPC quantity such as `"0x1b4"`.
pub fn parse_quantity(raw: &str) -> Result<u128, HexParseError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| HexParseError::Invalid(format!("{raw}: missing 0x prefix")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| HexParseError::Invalid(format!("{raw}: {e}")))
}

pub fn encode_quantity(value: u128) -> String {
    format!("{value:#x}")
}

pub fn keccak256(bytes: &[u8]) -> Word {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_topic(signature: &str) -> Word {
    keccak256(signature.as_bytes())
}

pub fn uint_word(value: u128) -> Word {
    let mut word = [0u8; WORD_LEN];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn word_to_u128(word: &Word) -> Option<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(bytes))
}

pub fn word_to_u32(word: &Word) -> Option<u32> {
    word_to_u128(word).and_then(|v| u32::try_from(v).ok())
}

pub fn word_to_bool(word: &Word) -> Option<bool> {
    match word_to_u128(word)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// Splits `data` into words; `None` unless the length is a multiple of 32.
pub fn split_words(data: &[u8]) -> Option<Vec<Word>> {
    if data.len() % WORD_LEN != 0 {
        return None;
    }
    Some(
        data.chunks_exact(WORD_LEN)
            .map(|chunk| {
                let mut word = [0u8; WORD_LEN];
                word.copy_from_slice(chunk);
                word
            })
            .collect(),
    )
}

pub fn encode_call(signature: &str, args: &[Word]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD_LEN);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

/// Parses a decimal string into a full 256-bit word.
pub fn parse_decimal_word(raw: &str) -> Option<Word> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut word = [0u8; WORD_LEN];
    for d in digits.bytes() {
        let mut carry = u16::from(d - b'0');
        for byte in word.iter_mut().rev() {
            let v = u16::from(*byte) * 10 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return None;
        }
    }
    Some(word)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn selector__matches_known_erc20_transfer() {
        assert_eq!(
            selector("transfer(address,uint256)"),
            [0xa9, 0x05, 0x9c, 0xbb]
        );
    }

    #[test]
    fn event_topic__matches_known_erc20_transfer_event() {
        let topic = event_topic("Transfer(address,address,uint256)");
        assert_eq!(
            encode_hex(&topic),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn address__parses_and_displays_lowercase_hex() {
        let addr: Address = "0x00000000000000000000000000000000000000Ab".parse().unwrap();
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ab");
        assert_eq!(Address::from_word(&addr.to_word()), Some(addr));
    }

    #[test]
    fn address__rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            HexParseError::Length {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn address_from_word__rejects_dirty_high_bytes() {
        let mut word = Address([7u8; 20]).to_word();
        word[0] = 1;
        assert_eq!(Address::from_word(&word), None);
    }

    #[test]
    fn word_to_u128__rejects_values_above_u128() {
        let mut word = uint_word(5);
        assert_eq!(word_to_u128(&word), Some(5));
        word[15] = 1;
        assert_eq!(word_to_u128(&word), None);
    }

    #[test]
    fn word_to_bool__only_accepts_zero_and_one() {
        assert_eq!(word_to_bool(&uint_word(0)), Some(false));
        assert_eq!(word_to_bool(&uint_word(1)), Some(true));
        assert_eq!(word_to_bool(&uint_word(2)), None);
    }

    #[test]
    fn parse_quantity__handles_empty_and_regular_values() {
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("1b4").is_err());
        assert_eq!(encode_quantity(436), "0x1b4");
    }

    #[test]
    fn encode_call__prefixes_selector_to_words() {
        let data = encode_call("play(uint256)", &[uint_word(9)]);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &selector("play(uint256)"));
        assert_eq!(data[35], 9);
    }

    #[test]
    fn split_words__requires_whole_words() {
        assert!(split_words(&[0u8; 31]).is_none());
        assert_eq!(split_words(&[0u8; 64]).unwrap().len(), 2);
        assert_eq!(split_words(&[]).unwrap().len(), 0);
    }

    #[test]
    fn parse_decimal_word__handles_values_beyond_u128() {
        let small = parse_decimal_word("258").unwrap();
        assert_eq!(word_to_u128(&small), Some(258));

        // 2^128
        let big = parse_decimal_word("340282366920938463463374607431768211456").unwrap();
        assert_eq!(big[15], 1);
        assert!(big[16..].iter().all(|b| *b == 0));

        assert!(parse_decimal_word("").is_none());
        assert!(parse_decimal_word("12a").is_none());
        // 2^256 overflows
        assert!(
            parse_decimal_word(
                "115792089237316195423570985008687907853269984665640564039457584007913129639936"
            )
            .is_none()
        );
    }
}
