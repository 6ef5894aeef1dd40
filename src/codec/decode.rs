//! Left-to-right trace scanner.

use serde::Serialize;

use super::token::{is_tag, Token, TokenKind, AGAIN};

/// One decoded occurrence, positioned on the trace's tick timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub kind: TokenKind,
    pub payload: String,
    pub offset_ticks: u64,
}

/// Split a serialized trace into tokens.
///
/// Method payloads are attached to the preceding Action. Scanning stops at
/// the first malformed token; everything before it is returned.
pub fn tokenize(trace: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut rest = trace;

    while let Some(tag) = rest.chars().next() {
        let Some(kind) = TokenKind::from_tag(tag) else {
            break;
        };
        let body = &rest[tag.len_utf8()..];
        let end = body.find(is_tag).unwrap_or(body.len());
        let payload = &body[..end];
        rest = &body[end..];

        if payload.is_empty() {
            break;
        }
        let parsed = match kind {
            TokenKind::Space => Some(Token::Space(payload.to_string())),
            TokenKind::Position => Some(Token::Position(payload.to_string())),
            TokenKind::Value => Some(Token::Value(payload.to_string())),
            TokenKind::Action => Some(Token::action(payload)),
            TokenKind::Time => parse_ticks(payload).map(Token::Time),
            TokenKind::Method => {
                let Some(repeats) = parse_intervals(payload) else {
                    break;
                };
                match tokens.last_mut() {
                    Some(Token::Action { intervals, .. }) => {
                        intervals.extend(repeats);
                        continue;
                    }
                    _ => None,
                }
            }
        };
        match parsed {
            Some(token) => tokens.push(token),
            None => break,
        }
    }

    tokens
}

/// Decode a trace into positioned events, expanding folded actions.
pub fn decode(trace: &str) -> Vec<TraceEvent> {
    let mut events = Vec::new();
    let mut offset = 0u64;

    for token in tokenize(trace) {
        match token {
            Token::Time(ticks) => offset = offset.saturating_add(ticks),
            Token::Action { payload, intervals } => {
                events.push(at(TokenKind::Action, payload.clone(), offset));
                for interval in intervals {
                    offset = offset.saturating_add(interval);
                    events.push(at(TokenKind::Action, payload.clone(), offset));
                }
            }
            Token::Space(payload) => events.push(at(TokenKind::Space, payload, offset)),
            Token::Position(payload) => events.push(at(TokenKind::Position, payload, offset)),
            Token::Value(payload) => events.push(at(TokenKind::Value, payload, offset)),
        }
    }

    events
}

fn at(kind: TokenKind, payload: String, offset_ticks: u64) -> TraceEvent {
    TraceEvent {
        kind,
        payload,
        offset_ticks,
    }
}

fn parse_ticks(payload: &str) -> Option<u64> {
    if payload.bytes().all(|b| b.is_ascii_digit()) {
        payload.parse().ok()
    } else {
        None
    }
}

fn parse_intervals(payload: &str) -> Option<Vec<u64>> {
    payload.split(AGAIN).map(parse_ticks).collect()
}
