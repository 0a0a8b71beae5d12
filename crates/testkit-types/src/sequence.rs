//! Typed changes-feed sequence tokens.
//!
//! Grammar:
//!
//! ```text
//! plain    := digits+
//! compound := hash "::" digits+
//! hash     := [A-Za-z0-9._-]+
//! ```
//!
//! Channel-cache servers only ever emit plain tokens. Distributed-index
//! servers emit compound tokens, except that the last entry of a single
//! feed read may carry a plain one.

use crate::mode::ClusterMode;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing or validating sequence tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Empty sequence token")]
    Empty,

    #[error("Invalid sequence token '{token}': {reason}")]
    Malformed { token: String, reason: String },

    #[error("Sequence token '{token}' does not match the {mode} token shape")]
    WrongShape { token: String, mode: ClusterMode },

    #[error("Unsupported sequence value: {0}")]
    UnsupportedValue(String),

    /// A plain token appeared before the last entry of a distributed-index feed.
    #[error(
        "Plain sequence token '{token}' for document '{doc_id}' at position {position} of {total}; \
         only the last entry of a distributed_index feed may be plain"
    )]
    PlainBeforeLast {
        doc_id: String,
        token: String,
        position: usize,
        total: usize,
    },
}

/// A changes-feed cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceToken {
    /// Single monotonic sequence number.
    Plain(u64),
    /// `hash::subsequence`, decomposing into (view-sequence, subsequence).
    Compound { hash: String, subsequence: u64 },
}

impl SequenceToken {
    /// The cursor that starts a feed from the beginning.
    pub fn zero() -> Self {
        Self::Plain(0)
    }

    /// Parse a token against the grammar alone, without a mode constraint.
    pub fn parse(input: &str) -> Result<Self, SequenceError> {
        let token = input.trim();
        if token.is_empty() {
            return Err(SequenceError::Empty);
        }

        match token.split_once("::") {
            None => parse_digits(token, token).map(Self::Plain),
            Some((hash, subsequence)) => {
                if hash.is_empty() {
                    return Err(malformed(token, "missing hash before '::'"));
                }
                if let Some(bad) = hash.chars().find(|c| !is_hash_char(*c)) {
                    return Err(malformed(
                        token,
                        &format!("invalid character '{bad}' in hash"),
                    ));
                }
                let subsequence = parse_digits(subsequence, token)?;
                Ok(Self::Compound {
                    hash: hash.to_string(),
                    subsequence,
                })
            }
        }
    }

    /// Parse a token and reject shapes the given mode never produces.
    ///
    /// Channel-cache mode accepts only plain tokens. Distributed-index mode
    /// accepts both shapes here; the position rule for plain tokens is
    /// enforced per feed by [`crate::check_compound_ordering`].
    pub fn parse_for_mode(input: &str, mode: ClusterMode) -> Result<Self, SequenceError> {
        let token = Self::parse(input)?;
        if mode == ClusterMode::ChannelCache && token.is_compound() {
            return Err(SequenceError::WrongShape {
                token: input.trim().to_string(),
                mode,
            });
        }
        Ok(token)
    }

    /// Parse a `seq`/`last_seq` JSON value, which servers send as a number or a string.
    pub fn from_json(value: &Value, mode: ClusterMode) -> Result<Self, SequenceError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(Self::Plain)
                .ok_or_else(|| SequenceError::UnsupportedValue(n.to_string())),
            Value::String(s) => Self::parse_for_mode(s, mode),
            other => Err(SequenceError::UnsupportedValue(other.to_string())),
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound { .. })
    }

    /// `(view-sequence, subsequence)` for compound tokens.
    pub fn components(&self) -> Option<(&str, u64)> {
        match self {
            Self::Compound { hash, subsequence } => Some((hash.as_str(), *subsequence)),
            Self::Plain(_) => None,
        }
    }
}

impl Default for SequenceToken {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(seq) => write!(f, "{seq}"),
            Self::Compound { hash, subsequence } => write!(f, "{hash}::{subsequence}"),
        }
    }
}

fn is_hash_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn parse_digits(digits: &str, token: &str) -> Result<u64, SequenceError> {
    if digits.is_empty() {
        return Err(malformed(token, "expected one or more digits"));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(malformed(token, &format!("unexpected character '{bad}'")));
    }
    digits
        .parse()
        .map_err(|_| malformed(token, "sequence number out of range"))
}

fn malformed(token: &str, reason: &str) -> SequenceError {
    SequenceError::Malformed {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain() {
        assert_eq!(SequenceToken::parse("42").unwrap(), SequenceToken::Plain(42));
        assert_eq!(SequenceToken::parse(" 7\n").unwrap(), SequenceToken::Plain(7));
    }

    #[test]
    fn test_parse_compound() {
        let token = SequenceToken::parse("abc-1.2_x::305").unwrap();
        assert!(token.is_compound());
        assert_eq!(token.components(), Some(("abc-1.2_x", 305)));
        assert_eq!(token.to_string(), "abc-1.2_x::305");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "  ", "12a", "::5", "abc::", "abc::x1", "a:b::1", "abc:::1", "1-0"] {
            assert!(
                SequenceToken::parse(input).is_err(),
                "expected '{input}' to be rejected"
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        let err = SequenceToken::parse("99999999999999999999999").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_channel_cache_rejects_compound() {
        let err = SequenceToken::parse_for_mode("ab::3", ClusterMode::ChannelCache).unwrap_err();
        assert!(matches!(err, SequenceError::WrongShape { .. }));
        assert!(SequenceToken::parse_for_mode("3", ClusterMode::ChannelCache).is_ok());
    }

    #[test]
    fn test_distributed_index_accepts_both_shapes() {
        let mode = ClusterMode::DistributedIndex;
        assert!(SequenceToken::parse_for_mode("ab::3", mode).is_ok());
        assert!(SequenceToken::parse_for_mode("3", mode).is_ok());
    }

    #[test]
    fn test_from_json() {
        let mode = ClusterMode::DistributedIndex;
        assert_eq!(
            SequenceToken::from_json(&json!(12), mode).unwrap(),
            SequenceToken::Plain(12)
        );
        assert_eq!(
            SequenceToken::from_json(&json!("f00::2"), mode).unwrap(),
            SequenceToken::Compound {
                hash: "f00".to_string(),
                subsequence: 2
            }
        );
        assert!(SequenceToken::from_json(&json!(-1), mode).is_err());
        assert!(SequenceToken::from_json(&json!(null), mode).is_err());
    }
}
