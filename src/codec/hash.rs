//! Space identifier hashing and the per-trace collision table.

use std::collections::HashMap;

use super::encode::Aliases;
use super::token::{Token, LOOP_MARKER};

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// DJB2 over the identifier's chars, with 32-bit signed wraparound.
pub fn djb2(input: &str) -> i32 {
    input.chars().fold(5381i32, |hash, c| {
        hash.wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(c as u32 as i32)
    })
}

/// Exactly `len` base-36 digits of `value`, least significant first.
pub fn base36_low_first(mut value: u32, len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        out.push(BASE36_DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out
}

/// Output length chosen by the identifier's length in chars.
pub fn hash_len(identifier: &str) -> usize {
    match identifier.chars().count() {
        0..=7 => 3,
        8..=14 => 4,
        _ => 5,
    }
}

/// The raw (pre-collision) hash payload for an identifier.
pub fn hash_identifier(identifier: &str) -> String {
    base36_low_first(djb2(identifier).unsigned_abs(), hash_len(identifier))
}

/// Per-trace map from emitted Space payload to the identifier that owns it.
///
/// Lives only as long as the trace builder; never serialized.
#[derive(Debug, Clone, Default)]
pub struct IdentifierTable {
    owners: HashMap<String, String>,
}

impl IdentifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, payload: &str) -> Option<&str> {
        self.owners.get(payload).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Claim a payload for `identifier`, prefixing loop markers until the
    /// candidate is unclaimed or already owned by the same identifier.
    fn claim(&mut self, base: String, identifier: &str) -> String {
        let mut candidate = base;
        loop {
            match self.owners.get(&candidate) {
                None => {
                    self.owners.insert(candidate.clone(), identifier.to_string());
                    return candidate;
                }
                Some(owner) if owner == identifier => return candidate,
                Some(_) => candidate.insert(0, LOOP_MARKER),
            }
        }
    }
}

/// Encode a Space (context identity) token.
///
/// Aliased and hashed payloads share one table, so an alias never collides
/// with another identifier's hash within a trace.
pub fn encode_space(identifier: &str, aliases: &Aliases, table: &mut IdentifierTable) -> Token {
    let base = aliases
        .get(identifier)
        .unwrap_or_else(|| hash_identifier(identifier));
    Token::Space(table.claim(base, identifier))
}
