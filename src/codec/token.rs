//! Token grammar: tag alphabet, payload sanitizing and the closed token enum.

use std::fmt;

use serde::Serialize;

/// Separator between repeat intervals inside a Method payload.
pub const AGAIN: char = '.';

/// Prefix character used to disambiguate colliding Space hashes.
pub const LOOP_MARKER: char = '-';

/// Leading character of a continuation marker inside a Value payload.
pub const CONTINUATION: char = '>';

/// The six token kinds, each owning one reserved tag character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Space,
    Time,
    Position,
    Action,
    Method,
    Value,
}

impl TokenKind {
    pub const ALL: [TokenKind; 6] = [
        TokenKind::Space,
        TokenKind::Time,
        TokenKind::Position,
        TokenKind::Action,
        TokenKind::Method,
        TokenKind::Value,
    ];

    pub fn tag(&self) -> char {
        match self {
            TokenKind::Space => '*',
            TokenKind::Time => '~',
            TokenKind::Position => '^',
            TokenKind::Action => '!',
            TokenKind::Method => '+',
            TokenKind::Value => '$',
        }
    }

    pub fn from_tag(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == c)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Space => "space",
            TokenKind::Time => "time",
            TokenKind::Position => "position",
            TokenKind::Action => "action",
            TokenKind::Method => "method",
            TokenKind::Value => "value",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True if `c` is one of the reserved tag characters.
pub fn is_tag(c: char) -> bool {
    TokenKind::from_tag(c).is_some()
}

/// Reduce arbitrary text to the storage-safe payload alphabet.
///
/// Keeps ASCII alphanumerics and `- . : >`; everything else, tag characters
/// and the record separator `_` included, is dropped.
pub fn sanitize_payload(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '>'))
        .collect()
}

/// Sanitize a recorded Value. A leading `>` is dropped so that only a
/// continuation marker can start with one.
pub fn sanitize_value(raw: &str) -> String {
    sanitize_payload(raw)
        .trim_start_matches(CONTINUATION)
        .to_string()
}

/// One unit of the linear trace grammar.
///
/// Method tokens never stand alone here: a folded action carries its repeat
/// intervals directly and serializes them as a trailing Method token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Space(String),
    Time(u64),
    Position(String),
    Action { payload: String, intervals: Vec<u64> },
    Value(String),
}

impl Token {
    pub fn action(payload: impl Into<String>) -> Self {
        Token::Action {
            payload: payload.into(),
            intervals: Vec::new(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Space(_) => TokenKind::Space,
            Token::Time(_) => TokenKind::Time,
            Token::Position(_) => TokenKind::Position,
            Token::Action { .. } => TokenKind::Action,
            Token::Value(_) => TokenKind::Value,
        }
    }

    /// Whether this is an unterminated continuation marker (`$>`).
    pub fn is_open_continuation(&self) -> bool {
        matches!(self, Token::Value(v) if v.len() == 1 && v.starts_with(CONTINUATION))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind().tag())?;
        match self {
            Token::Space(p) | Token::Position(p) | Token::Value(p) => f.write_str(p),
            Token::Time(ticks) => write!(f, "{ticks}"),
            Token::Action { payload, intervals } => {
                f.write_str(payload)?;
                if !intervals.is_empty() {
                    write!(f, "{}", TokenKind::Method.tag())?;
                    for (i, interval) in intervals.iter().enumerate() {
                        if i > 0 {
                            write!(f, "{AGAIN}")?;
                        }
                        write!(f, "{interval}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
