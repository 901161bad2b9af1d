//! Solidity ABI tuple encoding.
//!
//! Only the subset the protocol hashes is supported: static words
//! (`uintN`, `intN`, `address`, `bool`, `bytesN`) and dynamic `bytes`.
//! [`encode`] produces exactly what `abi.encode(a, b, ...)` produces in
//! Solidity: a head of 32-byte words, with dynamic values replaced by
//! offsets into a tail that holds their length and zero-padded contents.

use alloy_primitives::{Address, U256};

/// Size of one ABI word.
pub const WORD: usize = 32;

/// A value to encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Any `uintN`, left-padded.
    Uint(U256),
    /// Any `intN` up to 128 bits, sign-extended.
    Int(i128),
    /// `address`, left-padded.
    Address(Address),
    /// `bool`.
    Bool(bool),
    /// `bytesN` with `N <= 32`, right-padded.
    FixedBytes(Vec<u8>),
    /// Dynamic `bytes`.
    Bytes(Vec<u8>),
}

impl Token {
    fn head_word(&self) -> [u8; WORD] {
        let mut word = [0u8; WORD];
        match self {
            Token::Uint(v) => word = v.to_be_bytes::<WORD>(),
            Token::Int(v) => {
                if *v < 0 {
                    word[..16].fill(0xff);
                }
                word[16..].copy_from_slice(&v.to_be_bytes());
            }
            Token::Address(a) => word[12..].copy_from_slice(a.as_slice()),
            Token::Bool(b) => word[WORD - 1] = u8::from(*b),
            Token::FixedBytes(bytes) => {
                let len = bytes.len().min(WORD);
                word[..len].copy_from_slice(&bytes[..len]);
            }
            Token::Bytes(_) => {}
        }
        word
    }
}

/// Word holding an unsigned integer.
pub fn uint_word(value: u64) -> [u8; WORD] {
    U256::from(value).to_be_bytes::<WORD>()
}

/// ABI-encode a tuple of tokens.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Bytes(bytes) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(bytes.len() as u64));
                tail.extend_from_slice(bytes);
                let padding = (WORD - bytes.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
            other => head.extend_from_slice(&other.head_word()),
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Read the `index`-th 32-byte word of `data`.
pub fn read_word(data: &[u8], index: usize) -> Option<[u8; WORD]> {
    let start = index.checked_mul(WORD)?;
    let slice = data.get(start..start + WORD)?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Some(word)
}

/// Interpret a word as an unsigned integer that must fit in a `u64`.
pub fn word_to_u64(word: &[u8; WORD]) -> Option<u64> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Some(u64::from_be_bytes(buf))
}
