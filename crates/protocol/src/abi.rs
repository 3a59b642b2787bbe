//! Minimal Solidity ABI encoder for the storage contract's call data.
//!
//! Only the shapes the contract uses are supported: `uint256`, `bytes32`,
//! `bytes`, and dynamic arrays of those.

use crate::hash::{H256, keccak256};

const WORD: usize = 32;

/// A single ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `uint256`, left-padded big-endian.
    Uint(u128),
    /// `bytes32`.
    FixedBytes(H256),
    /// Dynamic `bytes`.
    Bytes(Vec<u8>),
    /// Dynamic array `T[]`.
    Array(Vec<Token>),
}

/// Returns the 4-byte function selector for a canonical signature such as
/// `"remove(bytes)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest.as_bytes()[..4]);
    out
}

/// Encodes a function call: selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode_tokens(args));
    out
}

/// Encodes a tuple of tokens using head/tail layout.
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match static_word(token) {
            Some(word) => head.extend(word),
            None => {
                head.extend(uint_word((head_len + tail.len()) as u128));
                tail.extend(encode_dynamic(token));
            }
        }
    }

    head.extend(tail);
    head
}

/// The single head word of a static token; `None` for dynamic ones.
fn static_word(token: &Token) -> Option<[u8; WORD]> {
    match token {
        Token::Uint(v) => Some(uint_word(*v)),
        Token::FixedBytes(h) => Some(*h.as_bytes()),
        Token::Bytes(_) | Token::Array(_) => None,
    }
}

fn encode_dynamic(token: &Token) -> Vec<u8> {
    match token {
        Token::Bytes(data) => {
            let mut out = uint_word(data.len() as u128).to_vec();
            out.extend_from_slice(data);
            let rem = data.len() % WORD;
            if rem != 0 {
                out.resize(out.len() + WORD - rem, 0);
            }
            out
        }
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u128).to_vec();
            out.extend(encode_tokens(items));
            out
        }
        Token::Uint(_) | Token::FixedBytes(_) => Vec::new(),
    }
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&v.to_be_bytes());
    word
}
