// Payload placement for partfuzz
// Decides where an evaluated payload lands relative to the original value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FuzzError;

/// String-insertion strategy of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Payload goes before the original value
    Prefix,
    /// Payload goes after the original value
    Postfix,
    /// Payload is inserted at the byte midpoint of the original value
    Infix,
    /// Payload replaces the original value
    Replace,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Prefix => write!(f, "prefix"),
            RuleType::Postfix => write!(f, "postfix"),
            RuleType::Infix => write!(f, "infix"),
            RuleType::Replace => write!(f, "replace"),
        }
    }
}

impl FromStr for RuleType {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prefix" => Ok(RuleType::Prefix),
            "postfix" => Ok(RuleType::Postfix),
            "infix" => Ok(RuleType::Infix),
            "replace" => Ok(RuleType::Replace),
            other => Err(FuzzError::InvalidRule(format!(
                "wrong rule type '{}', must be prefix/postfix/infix/replace",
                other
            ))),
        }
    }
}

/// Place `replacement` into `original` according to `rule_type`.
///
/// Examples:
/// - prefix("abc", "X")  → "Xabc"
/// - postfix("abc", "X") → "abcX"
/// - infix("abcd", "X")  → "abXcd"
/// - replace("abc", "X") → "X"
///
/// Infix splits at `len / 2` bytes. Values of zero or one byte get the
/// payload appended instead.
pub fn place(rule_type: RuleType, original: &str, replacement: &str) -> String {
    match rule_type {
        RuleType::Prefix => concat(&[replacement.as_bytes(), original.as_bytes()]),
        RuleType::Postfix => concat(&[original.as_bytes(), replacement.as_bytes()]),
        RuleType::Infix => {
            if original.len() <= 1 {
                return concat(&[original.as_bytes(), replacement.as_bytes()]);
            }
            let (left, right) = original.as_bytes().split_at(original.len() / 2);
            concat(&[left, replacement.as_bytes(), right])
        }
        RuleType::Replace => replacement.to_string(),
    }
}

// A midpoint inside a multi-byte character yields invalid UTF-8 at the seams;
// those bytes are replaced rather than shifting the split point.
fn concat(parts: &[&[u8]]) -> String {
    let bytes = parts.concat();
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
