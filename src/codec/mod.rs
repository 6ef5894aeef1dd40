//! Trace codec: the linear token grammar for (space, time, action) events.
//!
//! A trace is a concatenation of tokens, each introduced by one reserved tag
//! character (see [`TokenKind::tag`]). Payloads never contain tag characters,
//! so the stream re-synchronizes on any tag.

pub mod decode;
pub mod encode;
pub mod hash;
pub mod token;

pub use decode::{decode, tokenize, TraceEvent};
pub use encode::{encode_action, encode_time, fold, ticks_in, ActionDescriptor, Aliases};
pub use hash::{djb2, encode_space, hash_identifier, IdentifierTable};
pub use token::{is_tag, sanitize_payload, sanitize_value, Token, TokenKind, CONTINUATION};
