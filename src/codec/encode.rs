//! Action, time and fold encoding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::token::{sanitize_payload, Token};

/// Manual aliases: raw identifier (path, link target, element id) to a
/// user-chosen token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aliases(HashMap<String, String>);

impl Aliases {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Sanitized alias for `identifier`, if one is configured and survives
    /// sanitizing.
    pub fn get(&self, identifier: &str) -> Option<String> {
        self.0
            .get(identifier)
            .map(|alias| sanitize_payload(alias))
            .filter(|alias| !alias.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the event source knows about an interacted element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Number of ancestors between the element and the document root.
    pub depth: u32,
    /// Tag or category name, e.g. `a`, `button`.
    pub tag: String,
    /// 1-based position among same-tag siblings.
    pub ordinal: u32,
    /// Link target or element id used for alias lookup.
    pub identifier: Option<String>,
    /// Alias supplied directly on the element.
    pub alias: Option<String>,
}

impl ActionDescriptor {
    pub fn element(depth: u32, tag: impl Into<String>, ordinal: u32) -> Self {
        Self {
            depth,
            tag: tag.into(),
            ordinal,
            ..Default::default()
        }
    }

    pub fn aliased(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Default::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Depth, lowercased tag letters and ordinal, e.g. `3a2`.
    pub fn automatic(&self) -> String {
        let tag: String = self
            .tag
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        format!("{}{}{}", self.depth, tag, self.ordinal.max(1))
    }
}

/// Encode an Action token: element alias, then configured alias, then the
/// automatic descriptor.
pub fn encode_action(descriptor: &ActionDescriptor, aliases: &Aliases) -> Token {
    let direct = descriptor
        .alias
        .as_deref()
        .map(sanitize_payload)
        .filter(|alias| !alias.is_empty());
    let configured = || {
        descriptor
            .identifier
            .as_deref()
            .and_then(|identifier| aliases.get(identifier))
    };
    let payload = direct
        .or_else(configured)
        .unwrap_or_else(|| descriptor.automatic());
    Token::action(payload)
}

/// Whole ticks in `elapsed_ms`.
pub fn ticks_in(elapsed_ms: u64, tick_ms: u64) -> u64 {
    elapsed_ms / tick_ms.max(1)
}

/// A Time token for a positive tick delta.
pub fn encode_time(delta_ticks: u64) -> Option<Token> {
    (delta_ticks > 0).then_some(Token::Time(delta_ticks))
}

/// Run-length fold of a new action onto the emitted token list.
///
/// `[.., Action(p), Time(t)] + Action(p)` becomes `[.., Action(p, +t)]`;
/// anything else appends the action.
pub fn fold(notes: &mut Vec<Token>, action: Token) {
    let new_payload = match &action {
        Token::Action { payload, .. } => payload,
        _ => {
            notes.push(action);
            return;
        }
    };

    let len = notes.len();
    if len >= 2 {
        if let [.., Token::Action { payload, intervals }, Token::Time(ticks)] = &mut notes[..] {
            if payload == new_payload {
                intervals.push(*ticks);
                notes.truncate(len - 1);
                return;
            }
        }
    }
    notes.push(action);
}
