//! Token accumulation for one actor in one context.

use std::fmt;
use std::sync::Arc;

use crate::codec::{
    encode_action, encode_space, encode_time, fold, sanitize_payload, sanitize_value, ticks_in,
    ActionDescriptor, Aliases, IdentifierTable, Token, CONTINUATION,
};
use crate::util::Clock;

/// Builds one trace: owns the emitted tokens, the identifier table and the
/// tick cursor.
///
/// Sub-tick gaps are never dropped: the cursor only advances by whole ticks,
/// so the remainder is charged to the next emitted interval.
#[derive(Clone)]
pub struct TraceBuilder {
    clock: Arc<dyn Clock>,
    aliases: Arc<Aliases>,
    tick_ms: u64,
    /// Previously serialized trace re-hydrated by [`TraceBuilder::resume`].
    carried: String,
    notes: Vec<Token>,
    table: IdentifierTable,
    cursor_ms: u64,
    elapsed_ticks: u64,
}

impl TraceBuilder {
    pub fn new(clock: Arc<dyn Clock>, aliases: Arc<Aliases>, tick_ms: u64) -> Self {
        let cursor_ms = clock.now_ms();
        Self {
            clock,
            aliases,
            tick_ms: tick_ms.max(1),
            carried: String::new(),
            notes: Vec::new(),
            table: IdentifierTable::new(),
            cursor_ms,
            elapsed_ticks: 0,
        }
    }

    /// An empty trace on the same timeline. Time not yet charged here goes to
    /// the successor's first token.
    pub fn successor(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            aliases: self.aliases.clone(),
            tick_ms: self.tick_ms,
            carried: String::new(),
            notes: Vec::new(),
            table: IdentifierTable::new(),
            cursor_ms: self.cursor_ms,
            elapsed_ticks: 0,
        }
    }

    /// Replace the content with `existing` and restart the cursor at now.
    ///
    /// The gap since the trace was last written is not charged. The carried
    /// text is opaque: a following action never folds into it.
    pub fn resume(&mut self, existing: &str, elapsed_ticks: u64) {
        self.carried = existing.to_string();
        self.notes.clear();
        self.elapsed_ticks = elapsed_ticks;
        self.cursor_ms = self.clock.now_ms();
    }

    pub fn record_space(&mut self, identifier: &str) {
        self.flush_time();
        let token = encode_space(identifier, &self.aliases, &mut self.table);
        self.notes.push(token);
    }

    pub fn record_action(&mut self, descriptor: &ActionDescriptor) {
        self.flush_time();
        let token = encode_action(descriptor, &self.aliases);
        fold(&mut self.notes, token);
    }

    /// Values that sanitize to nothing are not recorded; their time is
    /// charged to the next token.
    pub fn record_position(&mut self, value: &str) {
        let payload = sanitize_payload(value);
        if payload.is_empty() {
            return;
        }
        self.flush_time();
        self.notes.push(Token::Position(payload));
    }

    pub fn record_value(&mut self, value: &str) {
        let payload = sanitize_value(value);
        if payload.is_empty() {
            return;
        }
        self.flush_time();
        self.notes.push(Token::Value(payload));
    }

    /// Append an unterminated continuation marker (`$>`).
    pub fn mark_continuation(&mut self) {
        self.flush_time();
        self.notes.push(Token::Value(CONTINUATION.to_string()));
    }

    /// Drop a trailing unterminated continuation marker. Returns whether one
    /// was present.
    pub fn reopen(&mut self) -> bool {
        if self.notes.last().is_some_and(Token::is_open_continuation) {
            self.notes.pop();
            return true;
        }
        if self.notes.is_empty() {
            let marker = Token::Value(CONTINUATION.to_string()).to_string();
            if let Some(stripped) = self.carried.strip_suffix(marker.as_str()) {
                self.carried = stripped.to_string();
                return true;
            }
        }
        false
    }

    pub fn serialize(&self) -> String {
        let mut out = self.carried.clone();
        for token in &self.notes {
            out.push_str(&token.to_string());
        }
        out
    }

    /// Total ticks charged to this trace, including carried history.
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn is_empty(&self) -> bool {
        self.carried.is_empty() && self.notes.is_empty()
    }

    fn flush_time(&mut self) {
        let now = self.clock.now_ms();
        let ticks = ticks_in(now.saturating_sub(self.cursor_ms), self.tick_ms);
        if let Some(token) = encode_time(ticks) {
            self.notes.push(token);
            self.cursor_ms += ticks * self.tick_ms;
            self.elapsed_ticks += ticks;
        }
    }
}

impl fmt::Debug for TraceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceBuilder")
            .field("tick_ms", &self.tick_ms)
            .field("trace", &self.serialize())
            .field("elapsed_ticks", &self.elapsed_ticks)
            .finish()
    }
}
